//! §4.12 Settings Service: the authoritative, versioned store of
//! `ValidationSettings` — creation, updates, activation, presets, rollback,
//! audit trail, and content-addressed backup/restore.

pub mod audit;
pub mod backup;
pub mod error;
pub mod events;
pub mod service;

pub use audit::AuditEntry;
pub use backup::SettingsBackup;
pub use error::{Result, SettingsError};
pub use events::{EventBus, SettingsEvent};
pub use service::{RestoreOptions, SettingsService, StatisticsReport};
