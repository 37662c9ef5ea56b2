//! Request handlers for the §6 HTTP API surface, one module per component.

pub mod bulk;
pub mod dashboard;
pub mod queue;
pub mod settings;
pub mod stream;
pub mod validation;
