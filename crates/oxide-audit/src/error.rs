//! Error types for audit synchronization.

use std::path::PathBuf;

/// Errors that can occur while synchronizing audit tables.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// An audit column has no trigger value binding.
    #[error("Audit column '{column}' has no value binding (expected action, state or expression)")]
    MissingValueBinding {
        /// The audit column without a binding.
        column: String,
    },

    /// The configuration is structurally invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Database error without statement context (connection, metadata queries).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A statement failed to execute.
    #[error("Statement failed: {source}\n  SQL: {sql}")]
    Statement {
        /// The offending SQL text.
        sql: String,
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Acquiring the write lock on a data table failed.
    #[error("Failed to lock table '{schema}.{table}': {source}")]
    Lock {
        /// Schema of the data table.
        schema: String,
        /// Data table name.
        table: String,
        /// The underlying error.
        #[source]
        source: Box<AuditError>,
    },

    /// A table expected to exist was not found.
    #[error("Table '{schema}.{table}' not found")]
    TableNotFound {
        /// Schema searched.
        schema: String,
        /// Table name.
        table: String,
    },

    /// Canonicalizing the declared audit columns failed.
    #[error("Failed to canonicalize audit columns: {0}")]
    Canonicalization(Box<AuditError>),

    /// IO error (reading/writing config or script files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config file '{path}': {message}")]
    ConfigParse {
        /// Path to the config file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuditError {
    /// Returns `true` for errors that are raised before any statement
    /// reaches the database.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingValueBinding { .. }
                | Self::InvalidConfig(_)
                | Self::ConfigParse { .. }
        )
    }
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
