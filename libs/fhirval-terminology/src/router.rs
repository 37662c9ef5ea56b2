//! §4.3 Terminology Server Router: given `(version, settings)`, returns an
//! ordered list of endpoints — enabled servers that advertise the target
//! version, `circuitOpen = false`, in declared priority order, falling back
//! to a built-in default endpoint when none remain.

use fhirval_core::{FhirVersion, TerminologyServer};

/// A resolved endpoint the Direct Terminology Client can issue requests
/// against, already suffixed with the FHIR-version path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub server_id: Option<String>,
    pub base_url: String,
}

pub fn route(
    version: FhirVersion,
    servers: &[TerminologyServer],
    fallback_base: &str,
) -> Vec<Endpoint> {
    let mut candidates: Vec<&TerminologyServer> = servers
        .iter()
        .filter(|s| s.enabled && !s.circuit_open && s.supports(version))
        .collect();
    candidates.sort_by_key(|s| std::cmp::Reverse(s.priority));

    let mut endpoints: Vec<Endpoint> = candidates
        .into_iter()
        .map(|s| Endpoint {
            server_id: Some(s.id.clone()),
            base_url: versioned_url(&s.url, version),
        })
        .collect();

    if endpoints.is_empty() {
        endpoints.push(Endpoint {
            server_id: None,
            base_url: versioned_url(fallback_base, version),
        });
    }

    endpoints
}

/// Append `/r4`, `/r5`, or `/r6` unless `base` already ends with that suffix.
pub fn versioned_url(base: &str, version: FhirVersion) -> String {
    let suffix = version.path_suffix();
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(&format!("/{suffix}")) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn server(id: &str, priority: i32, enabled: bool, circuit_open: bool, versions: &[&str]) -> TerminologyServer {
        TerminologyServer {
            id: id.to_string(),
            name: id.to_string(),
            url: format!("https://{id}.example.org"),
            fhir_versions: versions.iter().map(|v| v.to_string()).collect::<HashSet<_>>(),
            priority,
            enabled,
            circuit_open,
            last_failure: None,
            consecutive_failures: 0,
        }
    }

    #[test]
    fn orders_by_priority_descending() {
        let servers = vec![server("low", 1, true, false, &["r4"]), server("high", 10, true, false, &["r4"])];
        let routed = route(FhirVersion::R4, &servers, "https://tx.fhir.org");
        assert_eq!(routed[0].server_id.as_deref(), Some("high"));
        assert_eq!(routed[1].server_id.as_deref(), Some("low"));
    }

    #[test]
    fn excludes_disabled_and_open_circuit_servers() {
        let servers = vec![
            server("disabled", 5, false, false, &["r4"]),
            server("tripped", 5, true, true, &["r4"]),
            server("ok", 1, true, false, &["r4"]),
        ];
        let routed = route(FhirVersion::R4, &servers, "https://tx.fhir.org");
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].server_id.as_deref(), Some("ok"));
    }

    #[test]
    fn falls_back_to_default_when_nothing_qualifies() {
        let routed = route(FhirVersion::R5, &[], "https://tx.fhir.org");
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].server_id, None);
        assert_eq!(routed[0].base_url, "https://tx.fhir.org/r5");
    }

    #[test]
    fn versioned_url_does_not_double_suffix() {
        assert_eq!(versioned_url("https://tx.fhir.org/r4", FhirVersion::R4), "https://tx.fhir.org/r4");
        assert_eq!(versioned_url("https://tx.fhir.org/r4/", FhirVersion::R4), "https://tx.fhir.org/r4");
    }

    #[test]
    fn version_mismatch_excludes_server() {
        let servers = vec![server("r5-only", 1, true, false, &["r5"])];
        let routed = route(FhirVersion::R4, &servers, "https://tx.fhir.org");
        assert_eq!(routed[0].server_id, None); // fell back to default
    }
}
