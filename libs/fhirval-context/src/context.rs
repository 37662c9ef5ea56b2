use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single element's structural constraints, trimmed to what the structural and
/// profile aspect evaluators actually consult: cardinality, type, and whether it is
/// itself the target of a profile constraint/invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub path: String,
    pub min: u32,
    pub max: Cardinality,
    pub types: Vec<String>,
    pub is_primitive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Unbounded,
}

impl Cardinality {
    pub fn allows(&self, count: u32) -> bool {
        match self {
            Cardinality::One => count <= 1,
            Cardinality::Unbounded => true,
        }
    }
}

/// A constraint attached to a structure definition or profile, evaluated by the
/// business-rule aspect via the FHIRPath subset evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub key: String,
    pub severity: ConstraintSeverity,
    pub human: String,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintSeverity {
    Error,
    Warning,
}

/// A resolved structure definition: the base resource shape plus any constraints that
/// apply at the resource level. Profiles layer additional elements/constraints over a
/// base definition; both are represented with this same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDefinition {
    pub url: String,
    pub resource_type: String,
    pub base_definition: Option<String>,
    pub elements: Vec<ElementDefinition>,
    pub constraints: Vec<Constraint>,
}

impl StructureDefinition {
    pub fn element(&self, path: &str) -> Option<&ElementDefinition> {
        self.elements.iter().find(|e| e.path == path)
    }
}

/// Read-only access to resolved FHIR conformance resources: base structure
/// definitions for core resource types plus any profiles settings or `meta.profile`
/// reference. Package installation and differential-to-snapshot generation are out of
/// scope (see Non-goals) — this trait only exposes already-resolved definitions.
pub trait FhirContext: Send + Sync {
    /// The base structure definition for a resource type (e.g. `"Patient"`).
    fn base_definition(&self, resource_type: &str) -> Result<&StructureDefinition>;

    /// A profile by canonical URL, if known.
    fn profile(&self, url: &str) -> Option<&StructureDefinition>;

    /// Every profile URL this context can resolve, for the `profiles: list<profile-url>`
    /// settings validation check in §5.
    fn known_profile_urls(&self) -> Vec<&str>;
}

/// An in-process `FhirContext` backed by a static table of core resource types. This
/// is the default implementation: it covers the resource types a validation engine
/// deployment needs out of the box without a package registry client.
#[derive(Debug, Default)]
pub struct StaticFhirContext {
    base: HashMap<String, StructureDefinition>,
    profiles: HashMap<String, StructureDefinition>,
}

impl StaticFhirContext {
    pub fn new() -> Self {
        let mut base = HashMap::new();
        for def in core_definitions() {
            base.insert(def.resource_type.clone(), def);
        }
        Self {
            base,
            profiles: HashMap::new(),
        }
    }

    /// Register a profile (e.g. loaded from settings or a prior `meta.profile` fetch).
    pub fn register_profile(&mut self, def: StructureDefinition) {
        self.profiles.insert(def.url.clone(), def);
    }
}

impl FhirContext for StaticFhirContext {
    fn base_definition(&self, resource_type: &str) -> Result<&StructureDefinition> {
        self.base
            .get(resource_type)
            .ok_or_else(|| Error::StructureDefinitionNotFound(resource_type.to_string()))
    }

    fn profile(&self, url: &str) -> Option<&StructureDefinition> {
        self.profiles.get(url)
    }

    fn known_profile_urls(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

fn elem(path: &str, min: u32, max: Cardinality, types: &[&str]) -> ElementDefinition {
    ElementDefinition {
        path: path.to_string(),
        min,
        max,
        types: types.iter().map(|t| t.to_string()).collect(),
        is_primitive: types.len() == 1 && types[0].chars().next().is_some_and(|c| c.is_lowercase()),
    }
}

/// Minimal, hand-curated structural shapes for the handful of resource types a
/// validation engine encounters most often. This stands in for a fully installed FHIR
/// core package; expanding it is a matter of adding rows, not changing the model.
fn core_definitions() -> Vec<StructureDefinition> {
    use Cardinality::*;
    vec![
        StructureDefinition {
            url: "http://hl7.org/fhir/StructureDefinition/Patient".into(),
            resource_type: "Patient".into(),
            base_definition: None,
            elements: vec![
                elem("Patient.resourceType", 1, One, &["string"]),
                elem("Patient.identifier", 0, Unbounded, &["Identifier"]),
                elem("Patient.gender", 0, One, &["code"]),
                elem("Patient.birthDate", 0, One, &["date"]),
                elem("Patient.name", 0, Unbounded, &["HumanName"]),
            ],
            constraints: vec![Constraint {
                key: "pat-1".into(),
                severity: ConstraintSeverity::Error,
                human: "SHALL at least contain a contact's details or a reference to an organization".into(),
                expression: "name.exists() or identifier.exists()".into(),
            }],
        },
        StructureDefinition {
            url: "http://hl7.org/fhir/StructureDefinition/Observation".into(),
            resource_type: "Observation".into(),
            base_definition: None,
            elements: vec![
                elem("Observation.resourceType", 1, One, &["string"]),
                elem("Observation.status", 1, One, &["code"]),
                elem("Observation.code", 1, One, &["CodeableConcept"]),
                elem("Observation.subject", 0, One, &["Reference"]),
                elem("Observation.value", 0, One, &["string"]),
            ],
            constraints: vec![Constraint {
                key: "obs-6".into(),
                severity: ConstraintSeverity::Error,
                human: "dataAbsentReason SHALL only be present if value[x] is not present".into(),
                expression: "value.exists() implies dataAbsentReason.empty()".into(),
            }],
        },
        StructureDefinition {
            url: "http://hl7.org/fhir/StructureDefinition/Condition".into(),
            resource_type: "Condition".into(),
            base_definition: None,
            elements: vec![
                elem("Condition.resourceType", 1, One, &["string"]),
                elem("Condition.subject", 1, One, &["Reference"]),
                elem("Condition.code", 0, One, &["CodeableConcept"]),
                elem("Condition.clinicalStatus", 0, One, &["CodeableConcept"]),
            ],
            constraints: vec![],
        },
        StructureDefinition {
            url: "http://hl7.org/fhir/StructureDefinition/Practitioner".into(),
            resource_type: "Practitioner".into(),
            base_definition: None,
            elements: vec![
                elem("Practitioner.resourceType", 1, One, &["string"]),
                elem("Practitioner.identifier", 0, Unbounded, &["Identifier"]),
                elem("Practitioner.name", 0, Unbounded, &["HumanName"]),
            ],
            constraints: vec![],
        },
        StructureDefinition {
            url: "http://hl7.org/fhir/StructureDefinition/Encounter".into(),
            resource_type: "Encounter".into(),
            base_definition: None,
            elements: vec![
                elem("Encounter.resourceType", 1, One, &["string"]),
                elem("Encounter.status", 1, One, &["code"]),
                elem("Encounter.class", 0, One, &["Coding"]),
                elem("Encounter.subject", 0, One, &["Reference"]),
            ],
            constraints: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_resource_type() {
        let ctx = StaticFhirContext::new();
        let def = ctx.base_definition("Patient").unwrap();
        assert_eq!(def.resource_type, "Patient");
        assert!(def.element("Patient.gender").is_some());
    }

    #[test]
    fn unknown_resource_type_errors() {
        let ctx = StaticFhirContext::new();
        assert!(ctx.base_definition("Basic").is_err());
    }

    #[test]
    fn registered_profile_is_resolvable() {
        let mut ctx = StaticFhirContext::new();
        let profile = StructureDefinition {
            url: "https://example.org/fhir/StructureDefinition/my-patient".into(),
            resource_type: "Patient".into(),
            base_definition: Some("http://hl7.org/fhir/StructureDefinition/Patient".into()),
            elements: vec![],
            constraints: vec![],
        };
        ctx.register_profile(profile);
        assert!(ctx.profile("https://example.org/fhir/StructureDefinition/my-patient").is_some());
        assert_eq!(ctx.known_profile_urls().len(), 1);
    }

    #[test]
    fn cardinality_allows_respects_bound() {
        assert!(Cardinality::One.allows(1));
        assert!(!Cardinality::One.allows(2));
        assert!(Cardinality::Unbounded.allows(50));
    }
}
