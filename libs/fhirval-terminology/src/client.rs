//! §4.4 Direct Terminology Client: `$validate-code` over HTTP, with timeouts,
//! error classification, and graceful degradation for known-external systems.

use crate::{core_tables, external};
use fhirval_core::FhirVersion;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct ValidateCodeParams {
    pub system: String,
    pub code: String,
    pub display: Option<String>,
    pub value_set: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResponse {
    pub valid: bool,
    pub code: String,
    pub display: Option<String>,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl ValidationResponse {
    fn immediate(valid: bool, code: &str, display: Option<String>, message: Option<String>) -> Self {
        Self { valid, code: code.to_string(), display, message, response_time_ms: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

pub struct TerminologyClient {
    http: reqwest::Client,
    validate_timeout: Duration,
    health_timeout: Duration,
}

impl TerminologyClient {
    pub fn new(validate_timeout: Duration, health_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(validate_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            validate_timeout,
            health_timeout,
        }
    }

    /// §4.4 steps 1-6.
    pub async fn validate_code(&self, params: &ValidateCodeParams, server_url: &str) -> ValidationResponse {
        // Step 1: Core Code Tables.
        if let Some((valid, display)) = core_tables::lookup(&params.system, &params.code) {
            return ValidationResponse::immediate(
                valid,
                if valid { "core-validator" } else { "code-invalid" },
                display.map(str::to_string),
                None,
            );
        }

        // Step 2: graceful degradation for systems terminology servers can't validate.
        if external::is_known_external(&params.system) {
            return ValidationResponse::immediate(true, "external-system-unvalidatable", None, None);
        }

        let start = Instant::now();
        let url = if params.value_set.is_some() {
            format!("{server_url}/ValueSet/$validate-code")
        } else {
            format!("{server_url}/CodeSystem/$validate-code")
        };

        let mut query = vec![("system", params.system.clone()), ("code", params.code.clone())];
        if let Some(display) = &params.display {
            query.push(("display", display.clone()));
        }
        if let Some(value_set) = &params.value_set {
            query.push(("url", value_set.clone()));
        } else if let Some(url_param) = &params.url {
            query.push(("url", url_param.clone()));
        }

        let response = self.http.get(&url).query(&query).send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match response {
            Err(e) if e.is_timeout() => ValidationResponse {
                valid: false,
                code: "TIMEOUT".to_string(),
                display: None,
                message: Some(e.to_string()),
                response_time_ms: elapsed_ms,
            },
            Err(e) => ValidationResponse {
                valid: false,
                code: "NETWORK_ERROR".to_string(),
                display: None,
                message: Some(e.to_string()),
                response_time_ms: elapsed_ms,
            },
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() == 422 && external::is_known_external(&params.system) {
                    return ValidationResponse {
                        response_time_ms: elapsed_ms,
                        ..ValidationResponse::immediate(true, "external-system-unvalidatable", None, None)
                    };
                }
                if !status.is_success() {
                    return ValidationResponse {
                        valid: false,
                        code: format!("HTTP_{}", status.as_u16()),
                        display: None,
                        message: None,
                        response_time_ms: elapsed_ms,
                    };
                }
                match resp.json::<serde_json::Value>().await {
                    Ok(body) => {
                        let parsed = parse_parameters(&body);
                        ValidationResponse { response_time_ms: elapsed_ms, ..parsed }
                    }
                    Err(e) => ValidationResponse {
                        valid: false,
                        code: "INVALID_RESPONSE".to_string(),
                        display: None,
                        message: Some(e.to_string()),
                        response_time_ms: elapsed_ms,
                    },
                }
            }
        }
    }

    /// Fans out in parallel with a fixed cap, preserving input order in the result.
    pub async fn validate_code_batch(
        &self,
        params: &[ValidateCodeParams],
        server_url: &str,
    ) -> Vec<ValidationResponse> {
        const MAX_CONCURRENT: usize = 16;
        let mut results = Vec::with_capacity(params.len());
        for chunk in params.chunks(MAX_CONCURRENT) {
            let futures = chunk.iter().map(|p| self.validate_code(p, server_url));
            results.extend(join_all(futures).await);
        }
        results
    }

    pub async fn check_server_health(&self, server_url: &str, _version: FhirVersion) -> ServerHealth {
        let start = Instant::now();
        let client = reqwest::Client::builder()
            .timeout(self.health_timeout)
            .build()
            .unwrap_or_else(|_| self.http.clone());
        match client.get(format!("{server_url}/metadata")).send().await {
            Ok(resp) if resp.status().is_success() => {
                if start.elapsed() < Duration::from_secs(2) {
                    ServerHealth::Healthy
                } else {
                    ServerHealth::Degraded
                }
            }
            _ => ServerHealth::Unhealthy,
        }
    }
}

/// Extract `{result, display, message}` from a FHIR `Parameters` resource body.
fn parse_parameters(body: &serde_json::Value) -> ValidationResponse {
    let params = body.get("parameter").and_then(|p| p.as_array());
    let mut result = false;
    let mut display = None;
    let mut message = None;

    if let Some(params) = params {
        for param in params {
            let Some(name) = param.get("name").and_then(|v| v.as_str()) else { continue };
            match name {
                "result" => result = param.get("valueBoolean").and_then(|v| v.as_bool()).unwrap_or(false),
                "display" => display = param.get("valueString").and_then(|v| v.as_str()).map(str::to_string),
                "message" => message = param.get("valueString").and_then(|v| v.as_str()).map(str::to_string),
                _ => {}
            }
        }
    }

    ValidationResponse {
        valid: result,
        code: if result { "valid".to_string() } else { "code-invalid".to_string() },
        display,
        message,
        response_time_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_successful_parameters_response() {
        let body = json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "result", "valueBoolean": true},
                {"name": "display", "valueString": "Body Weight"},
            ]
        });
        let parsed = parse_parameters(&body);
        assert!(parsed.valid);
        assert_eq!(parsed.display.as_deref(), Some("Body Weight"));
    }

    #[test]
    fn parses_failed_parameters_response_with_message() {
        let body = json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "result", "valueBoolean": false},
                {"name": "message", "valueString": "code not found in system"},
            ]
        });
        let parsed = parse_parameters(&body);
        assert!(!parsed.valid);
        assert_eq!(parsed.message.as_deref(), Some("code not found in system"));
    }

    #[tokio::test]
    async fn core_table_hit_avoids_network_entirely() {
        let client = TerminologyClient::new(Duration::from_secs(1), Duration::from_secs(1));
        let params = ValidateCodeParams {
            system: core_tables::ADMINISTRATIVE_GENDER.to_string(),
            code: "male".to_string(),
            ..Default::default()
        };
        let response = client.validate_code(&params, "http://unreachable.invalid").await;
        assert!(response.valid);
        assert_eq!(response.code, "core-validator");
    }

    #[tokio::test]
    async fn external_system_degrades_gracefully_without_network() {
        let client = TerminologyClient::new(Duration::from_secs(1), Duration::from_secs(1));
        let params = ValidateCodeParams {
            system: "urn:iso:std:iso:3166".to_string(),
            code: "DE".to_string(),
            ..Default::default()
        };
        let response = client.validate_code(&params, "http://unreachable.invalid").await;
        assert!(response.valid);
        assert_eq!(response.code, "external-system-unvalidatable");
    }
}
