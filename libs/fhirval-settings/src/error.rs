use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings '{0}' not found")]
    NotFound(String),
    #[error("backup '{0}' not found")]
    BackupNotFound(String),
    #[error("invalid settings: {0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("backup '{0}' failed content-hash verification; it may have been tampered with")]
    BackupCorrupt(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
