//! A small tree-walking evaluator for the FHIRPath subset that FHIR resource
//! constraints and business rules actually use: path navigation, `exists`/`empty`/
//! `not`/`count`/`all`, equality, and the `and`/`or`/`implies` boolean connectives
//! with FHIRPath's three-valued logic.
//!
//! This does not attempt full FHIRPath (no unions, indexers, arithmetic, or date
//! functions) — the business-rule and profile-constraint aspects only ever need
//! boolean invariant expressions of the shape HL7 StructureDefinitions ship with.

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{Error, Result};
pub use value::Collection;

/// Parse and evaluate `expression` against `resource` in one call, returning the
/// three-valued boolean result FHIR invariant evaluation expects: `Some(true)` the
/// constraint holds, `Some(false)` it's violated, `None` the expression evaluated to
/// an empty collection (treated as vacuously satisfied by callers, per FHIR's
/// invariant-evaluation convention).
pub fn evaluate_bool(expression: &str, resource: &serde_json::Value) -> Result<Option<bool>> {
    let expr = parser::parse(expression)?;
    let result = eval::evaluate(&expr, resource)?;
    Ok(result.as_bool3())
}
