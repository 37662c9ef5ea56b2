//! Small complex datatypes shared across the version-agnostic resource models.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Publication status shared by conformance resources (`ValueSet`, `CodeSystem`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Active,
    Retired,
    Unknown,
}

/// Contact information for the publisher of a conformance resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telecom: Option<Vec<Value>>,

    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

/// Binding strength for a coded element (`required` means the code must come from
/// the bound value set; the others are advisory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    Required,
    Extensible,
    Preferred,
    Example,
}

/// Describes the context of use for a conformance resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageContext {
    pub code: Value,

    #[serde(flatten)]
    pub value: Value,
}
