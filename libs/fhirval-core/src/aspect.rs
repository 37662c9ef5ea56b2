use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six orthogonal validation dimensions.
///
/// This is a closed tagged variant, not a string: every issue carries its
/// aspect because the evaluator that produced it attached the tag, never
/// because a message was pattern-matched after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aspect {
    Structural,
    Profile,
    Terminology,
    Reference,
    BusinessRule,
    Metadata,
}

impl Aspect {
    pub const ALL: [Aspect; 6] = [
        Aspect::Structural,
        Aspect::Profile,
        Aspect::Terminology,
        Aspect::Reference,
        Aspect::BusinessRule,
        Aspect::Metadata,
    ];
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Aspect::Structural => "structural",
            Aspect::Profile => "profile",
            Aspect::Terminology => "terminology",
            Aspect::Reference => "reference",
            Aspect::BusinessRule => "businessRule",
            Aspect::Metadata => "metadata",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
        };
        write!(f, "{s}")
    }
}

impl Severity {
    /// Parse the severity configured on an aspect toggle (error|warning|information).
    pub fn parse_config(s: &str) -> Option<Self> {
        match s {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "information" => Some(Severity::Information),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FhirVersion {
    R4,
    R5,
    R6,
}

impl FhirVersion {
    pub fn path_suffix(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "r4",
            FhirVersion::R5 => "r5",
            FhirVersion::R6 => "r6",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_information_lowest_fatal_highest() {
        assert!(Severity::Information < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn parse_config_rejects_unknown() {
        assert_eq!(Severity::parse_config("bogus"), None);
        assert_eq!(Severity::parse_config("error"), Some(Severity::Error));
    }
}
