//! Shared data model for the FHIR validation engine.
//!
//! Every other `fhirval-*` crate depends on this one for the vocabulary that crosses
//! component boundaries: aspects, issues, settings, results, and the canonical hashing
//! that ties a resource and a settings snapshot to a cached validation outcome.

pub mod aspect;
pub mod hash;
pub mod issue;
pub mod resource;
pub mod result;
pub mod settings;

pub use aspect::{Aspect, FhirVersion, Severity};
pub use hash::{canonical_hash, resource_hash};
pub use issue::{Issue, IssueCode};
pub use resource::{extract_codes, ExtractedCode, FhirResourceRecord};
pub use result::{penalty_score, AspectBreakdown, ProjectedResult, ValidationResult};
pub use settings::{
    validate_candidate, AspectToggle, Preset, ServerRef, SettingsValidation, TerminologyServer,
    ValidationMode, ValidationSettings,
};
