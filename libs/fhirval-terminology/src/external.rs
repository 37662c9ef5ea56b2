//! §9 design note: "Graceful degradation for external systems... encode the
//! external-system predicate as data (a list of URL prefixes), not as inline
//! conditionals, so updates are config-only."

/// URL prefixes for code systems that terminology servers are known not to be
/// authoritative for (ISO, UCUM, MIME, IANA, and similar externally-governed
/// registries). A prefix match here short-circuits both the Direct Terminology
/// Client (§4.4 step 2) and its HTTP-422 fallback (§4.4 step 5).
pub static KNOWN_EXTERNAL_PREFIXES: &[&str] = &[
    "urn:iso:std:iso:3166",
    "urn:ietf:bcp:47",
    "urn:ietf:bcp:13",
    "https://www.iana.org/time-zones",
    "http://unitsofmeasure.org",
    "urn:ietf:rfc:3986",
];

pub fn is_known_external(system: &str) -> bool {
    KNOWN_EXTERNAL_PREFIXES.iter().any(|prefix| system.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_country_system_is_external() {
        assert!(is_known_external("urn:iso:std:iso:3166"));
    }

    #[test]
    fn loinc_is_not_external() {
        assert!(!is_known_external("http://loinc.org"));
    }
}
