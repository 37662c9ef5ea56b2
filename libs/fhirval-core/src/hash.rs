use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Canonical, key-order-independent hash of a JSON document. Two documents that are
/// structurally equal (ignoring key order and insignificant whitespace) hash equal.
///
/// This is the single choke point both `resourceHash` and settings content-hashing run
/// through (§9 "Persistence fingerprint"): object keys are sorted recursively before
/// hashing and arrays keep their order (array order is significant in FHIR JSON).
pub fn canonical_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hash_value(value, &mut hasher);
    format!("{:x}", hasher.finalize())
}

fn hash_value(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => {
            hasher.update(b"b");
            hasher.update([*b as u8]);
        }
        Value::Number(n) => {
            hasher.update(b"d");
            // Normalize numeric representation so `1` and `1.0` hash equal.
            let normalized = n.as_f64().unwrap_or(0.0);
            hasher.update(normalized.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"a[");
            for item in items {
                hash_value(item, hasher);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        Value::Object(map) => {
            hasher.update(b"o{");
            // BTreeMap gives us a stable, sorted key order regardless of the
            // insertion order serde_json preserved.
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            for (key, val) in sorted {
                hasher.update(b"k:");
                hasher.update(key.as_bytes());
                hasher.update(b"=");
                hash_value(val, hasher);
                hasher.update(b";");
            }
            hasher.update(b"}");
        }
    }
}

/// `resourceHash` for a `FhirResourceRecord.data` payload.
pub fn resource_hash(data: &Value) -> String {
    canonical_hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"resourceType": "Patient", "id": "p1", "gender": "male"});
        let b = json!({"gender": "male", "id": "p1", "resourceType": "Patient"});
        assert_eq!(resource_hash(&a), resource_hash(&b));
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!({"name": [{"family": "A"}, {"family": "B"}]});
        let b = json!({"name": [{"family": "B"}, {"family": "A"}]});
        assert_ne!(resource_hash(&a), resource_hash(&b));
    }

    #[test]
    fn differing_content_hashes_differently() {
        let a = json!({"resourceType": "Patient", "gender": "male"});
        let b = json!({"resourceType": "Patient", "gender": "female"});
        assert_ne!(resource_hash(&a), resource_hash(&b));
    }

    #[test]
    fn numeric_representation_normalizes() {
        let a = json!({"valueInteger": 1});
        let b = json!({"valueInteger": 1.0});
        assert_eq!(resource_hash(&a), resource_hash(&b));
    }
}
