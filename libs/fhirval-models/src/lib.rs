//! Version-agnostic FHIR resource models shared by the terminology and
//! bulk-ingestion subsystems.
//!
//! # Module Organization
//!
//! - `common`: fields present across FHIR R4, R4B, and R5
//!
//! # Design Philosophy
//!
//! - **Version-agnostic core**: common fields present across all FHIR versions
//! - **Extensible**: `extensions` field captures version-specific or custom properties
//! - **Strongly-typed**: type safety for common operations
//! - **Compatible**: works with existing `serde_json::Value`-based code
//!
//! # Example
//!
//! ```rust
//! use fhirval_models::common::{CodeSystem, CodeSystemContentMode, PublicationStatus};
//!
//! let cs_json = serde_json::json!({
//!     "resourceType": "CodeSystem",
//!     "url": "http://example.org/fhir/CodeSystem/local-status",
//!     "status": "active",
//!     "content": "complete"
//! });
//!
//! let cs: CodeSystem = serde_json::from_value(cs_json).unwrap();
//! assert_eq!(cs.status, PublicationStatus::Active);
//! assert_eq!(cs.content, CodeSystemContentMode::Complete);
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;
