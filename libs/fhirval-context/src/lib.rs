//! Read-only access to resolved FHIR StructureDefinitions and profiles.
//!
//! Package installation and differential-to-snapshot generation live outside this
//! crate's scope; callers hand in already-resolved definitions (via
//! `StaticFhirContext::register_profile`) or rely on the built-in core resource
//! shapes.

pub mod context;
pub mod error;

pub use context::{
    Cardinality, Constraint, ConstraintSeverity, ElementDefinition, FhirContext,
    StaticFhirContext, StructureDefinition,
};
pub use error::{Error, Result};
