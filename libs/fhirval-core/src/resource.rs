use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource fetched from (or submitted to) a FHIR server, identified uniquely by
/// `(server_id, resource_type, resource_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirResourceRecord {
    pub db_id: String,
    pub server_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub version_id: Option<String>,
    pub data: Value,
    pub fetched_at: DateTime<Utc>,
}

/// A code extracted while walking a resource, carrying enough context for the
/// terminology subsystem and for re-attributing results back to their source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedCode {
    pub system: String,
    pub code: String,
    pub display: Option<String>,
    pub value_set: Option<String>,
    pub path: String,
}

impl ExtractedCode {
    /// Key used for deduplication and cache lookups: `(system, code, valueSet)`.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.system.clone(),
            self.code.clone(),
            self.value_set.clone().unwrap_or_default(),
        )
    }
}

/// Walk a resource's JSON tree collecting `{system, code}` pairs found on
/// `Coding`-shaped objects and bare `code` elements paired with a sibling `system`.
pub fn extract_codes(resource: &Value) -> Vec<ExtractedCode> {
    let mut out = Vec::new();
    walk(resource, String::new(), &mut out);
    out
}

fn walk(value: &Value, path: String, out: &mut Vec<ExtractedCode>) {
    match value {
        Value::Object(map) => {
            if let (Some(Value::String(system)), Some(Value::String(code))) =
                (map.get("system"), map.get("code"))
            {
                out.push(ExtractedCode {
                    system: system.clone(),
                    code: code.clone(),
                    display: map.get("display").and_then(|v| v.as_str()).map(str::to_string),
                    value_set: None,
                    path: path.clone(),
                });
            }
            for (key, child) in map {
                if key == "system" || key == "code" || key == "display" {
                    continue;
                }
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(child, child_path, out);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                walk(item, format!("{path}[{idx}]"), out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_gender_as_plain_field_is_not_a_coding() {
        let patient = json!({"resourceType": "Patient", "gender": "male"});
        let codes = extract_codes(&patient);
        assert!(codes.is_empty());
    }

    #[test]
    fn extracts_coding_nested_in_codeable_concept() {
        let observation = json!({
            "resourceType": "Observation",
            "code": {
                "coding": [
                    {"system": "http://loinc.org", "code": "29463-7", "display": "Body Weight"}
                ]
            }
        });
        let codes = extract_codes(&observation);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].system, "http://loinc.org");
        assert_eq!(codes[0].code, "29463-7");
        assert_eq!(codes[0].path, "code.coding[0]");
    }

    #[test]
    fn dedup_key_ignores_display_and_path() {
        let a = ExtractedCode {
            system: "sys".into(),
            code: "c".into(),
            display: Some("A".into()),
            value_set: None,
            path: "x".into(),
        };
        let b = ExtractedCode {
            system: "sys".into(),
            code: "c".into(),
            display: Some("B".into()),
            value_set: None,
            path: "y".into(),
        };
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
