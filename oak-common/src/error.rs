//! Common error types for the oak catalog

use thiserror::Error;

/// Common result type for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the store, the hybrid maintainer and the importer
#[derive(Error, Debug)]
pub enum Error {
    /// Storage engine failure (wraps sqlx::Error). Any open transaction is rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Delete blocked by dependent rows
    #[error("{entity} '{key}' is still referenced by: {}", dependents.join(", "))]
    ReferentialConflict {
        entity: &'static str,
        key: String,
        dependents: Vec<String>,
    },

    /// Input rejected by the boundary validation pass
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Import reached a conflicting value and no resolution was supplied
    #[error("Unresolved conflict on '{field}' for species '{species}'")]
    ConflictUnresolved { species: String, field: String },

    /// Stored state changed between classification and commit; nothing was written
    #[error("Stale entry: '{0}' changed while the import was waiting for a resolution")]
    StaleEntry(String),

    /// JSON encode/decode of list columns or import documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decode of import documents
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// NotFound and ReferentialConflict are expected outcomes callers present to users
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::ReferentialConflict { .. })
    }
}
