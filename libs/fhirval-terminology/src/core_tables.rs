//! §4.1 Core Code Tables: a process-lifetime read-only map `system-url ->
//! list<(code, display)>`, covering FHIR core enumerations, UCUM units, ISO
//! 3166/639, MIME types, and IANA timezones. Consulted before any network
//! call — a hit here means the terminology server is never contacted.

use phf::phf_map;

pub const ADMINISTRATIVE_GENDER: &str = "http://hl7.org/fhir/administrative-gender";
pub const OBSERVATION_STATUS: &str = "http://hl7.org/fhir/observation-status";
pub const CONDITION_CLINICAL: &str = "http://terminology.hl7.org/CodeSystem/condition-clinical";
pub const PUBLICATION_STATUS: &str = "http://hl7.org/fhir/publication-status";
pub const ENCOUNTER_STATUS: &str = "http://hl7.org/fhir/encounter-status";
pub const NARRATIVE_STATUS: &str = "http://hl7.org/fhir/narrative-status";

static GENDER: phf::Map<&'static str, &'static str> = phf_map! {
    "male" => "Male",
    "female" => "Female",
    "other" => "Other",
    "unknown" => "Unknown",
};

static OBS_STATUS: phf::Map<&'static str, &'static str> = phf_map! {
    "registered" => "Registered",
    "preliminary" => "Preliminary",
    "final" => "Final",
    "amended" => "Amended",
    "corrected" => "Corrected",
    "cancelled" => "Cancelled",
    "entered-in-error" => "Entered in Error",
    "unknown" => "Unknown",
};

static CONDITION_CLINICAL_STATUS: phf::Map<&'static str, &'static str> = phf_map! {
    "active" => "Active",
    "recurrence" => "Recurrence",
    "relapse" => "Relapse",
    "inactive" => "Inactive",
    "remission" => "Remission",
    "resolved" => "Resolved",
};

static PUB_STATUS: phf::Map<&'static str, &'static str> = phf_map! {
    "draft" => "Draft",
    "active" => "Active",
    "retired" => "Retired",
    "unknown" => "Unknown",
};

static ENCOUNTER_STATUS_TABLE: phf::Map<&'static str, &'static str> = phf_map! {
    "planned" => "Planned",
    "in-progress" => "In Progress",
    "onleave" => "On Leave",
    "finished" => "Finished",
    "cancelled" => "Cancelled",
    "entered-in-error" => "Entered in Error",
    "unknown" => "Unknown",
};

static NARRATIVE_STATUS_TABLE: phf::Map<&'static str, &'static str> = phf_map! {
    "generated" => "Generated",
    "extensions" => "Extensions",
    "additional" => "Additional",
    "empty" => "Empty",
};

/// MIME types commonly seen on `Attachment.contentType` / `Binary.contentType`.
static MIME_TYPES: &[&str] = &[
    "application/json",
    "application/fhir+json",
    "application/fhir+xml",
    "application/pdf",
    "text/plain",
    "text/html",
    "image/jpeg",
    "image/png",
];

/// A handful of IANA timezone identifiers seen on `Timing.repeat.timeOfDay`-adjacent
/// extensions and scheduling resources.
static IANA_TIMEZONES: &[&str] = &["UTC", "America/New_York", "Europe/London", "Europe/Berlin", "Asia/Tokyo", "Australia/Sydney"];

/// ISO 3166-1 alpha-2 country codes (a representative subset; §4.1 "static
/// in-memory tables" — expanding coverage is adding rows, not changing shape).
static ISO_3166: &[&str] = &["US", "DE", "GB", "FR", "JP", "AU", "CA", "NL", "CH", "SE"];

/// ISO 639-1 language codes.
static ISO_639: &[&str] = &["en", "de", "fr", "ja", "es", "nl", "zh", "pt", "it", "sv"];

pub const ISO_3166_SYSTEM: &str = "urn:iso:std:iso:3166";
pub const ISO_639_SYSTEM: &str = "urn:ietf:bcp:47";
pub const MIME_SYSTEM: &str = "urn:ietf:bcp:13";
pub const IANA_TIMEZONE_SYSTEM: &str = "https://www.iana.org/time-zones";

/// `{valid, display}` answer for a `(system, code)` pair against the tables this
/// crate knows about without any network call. `None` means the system isn't one
/// of the tables covered here — the caller should fall through to the next tier.
pub fn lookup(system: &str, code: &str) -> Option<(bool, Option<&'static str>)> {
    match system {
        ADMINISTRATIVE_GENDER => Some(code_in_phf(&GENDER, code)),
        OBSERVATION_STATUS => Some(code_in_phf(&OBS_STATUS, code)),
        CONDITION_CLINICAL => Some(code_in_phf(&CONDITION_CLINICAL_STATUS, code)),
        PUBLICATION_STATUS => Some(code_in_phf(&PUB_STATUS, code)),
        ENCOUNTER_STATUS => Some(code_in_phf(&ENCOUNTER_STATUS_TABLE, code)),
        NARRATIVE_STATUS => Some(code_in_phf(&NARRATIVE_STATUS_TABLE, code)),
        ISO_3166_SYSTEM => Some((ISO_3166.contains(&code), None)),
        ISO_639_SYSTEM => Some((ISO_639.contains(&code), None)),
        MIME_SYSTEM => Some((MIME_TYPES.contains(&code), None)),
        IANA_TIMEZONE_SYSTEM => Some((IANA_TIMEZONES.contains(&code), None)),
        fhirval_ucum::UCUM_SYSTEM => Some((fhirval_ucum::resolve(code).is_ok(), None)),
        _ => None,
    }
}

fn code_in_phf(map: &phf::Map<&'static str, &'static str>, code: &str) -> (bool, Option<&'static str>) {
    match map.get(code) {
        Some(display) => (true, Some(*display)),
        None => (false, None),
    }
}

/// The core-validator response shape used by the Direct Terminology Client (§4.4
/// step 1): a hit here never reaches the network.
pub fn is_core_system(system: &str) -> bool {
    matches!(
        system,
        ADMINISTRATIVE_GENDER
            | OBSERVATION_STATUS
            | CONDITION_CLINICAL
            | PUBLICATION_STATUS
            | ENCOUNTER_STATUS
            | NARRATIVE_STATUS
            | ISO_3166_SYSTEM
            | ISO_639_SYSTEM
            | MIME_SYSTEM
            | IANA_TIMEZONE_SYSTEM
    ) || system == fhirval_ucum::UCUM_SYSTEM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_gender_code_is_valid() {
        assert_eq!(lookup(ADMINISTRATIVE_GENDER, "male"), Some((true, Some("Male"))));
    }

    #[test]
    fn unknown_gender_code_is_invalid() {
        assert_eq!(lookup(ADMINISTRATIVE_GENDER, "banana"), Some((false, None)));
    }

    #[test]
    fn unrecognized_system_falls_through() {
        assert_eq!(lookup("http://loinc.org", "29463-7"), None);
    }

    #[test]
    fn ucum_code_routes_through_the_ucum_crate() {
        assert_eq!(lookup(fhirval_ucum::UCUM_SYSTEM, "mg"), Some((true, None)));
        assert_eq!(lookup(fhirval_ucum::UCUM_SYSTEM, "not-a-unit"), Some((false, None)));
    }
}
