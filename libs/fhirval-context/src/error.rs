//! Error types for FHIR context

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("StructureDefinition not found: {0}")]
    StructureDefinitionNotFound(String),

    #[error("Invalid StructureDefinition: {0}")]
    InvalidStructureDefinition(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid FHIR version: {0}")]
    InvalidFhirVersion(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
