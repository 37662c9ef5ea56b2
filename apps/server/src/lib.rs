//! HTTP API for the FHIR resource validation engine (spec.md §6): exposes the
//! validation pipeline, bulk orchestrator, priority queue, settings service,
//! and dashboard aggregator over the wire-compatible surface, and nothing
//! else. FHIR server and terminology server protocols are consumed, not
//! hosted (§1 "Explicitly OUT of scope").

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod request_context;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
