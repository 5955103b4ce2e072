//! Error types for the migration engine.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing sections, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The named table, collection or label does not exist in the backend.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// No record was available to infer a schema from.
    #[error("Schema unavailable for {item}: {reason}")]
    SchemaUnavailable { item: String, reason: String },

    /// Backend connection lost or query rejected at the connection level.
    #[error("Connection error ({backend}): {message}")]
    Connection { backend: String, message: String },

    /// A value that cannot be represented on the target backend.
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// The target refused a single row.
    #[error("Insert into {item} failed: {message}")]
    Insert { item: String, message: String },

    /// Creating the destination container failed.
    #[error("Provisioning {item} failed: {message}")]
    Provisioning { item: String, message: String },

    /// A migration job could not be created from the requested columns.
    #[error("Invalid migration job: {0}")]
    InvalidJob(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited report export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error for a backend.
    pub fn connection(backend: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Create a SchemaUnavailable error.
    pub fn schema_unavailable(item: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrateError::SchemaUnavailable {
            item: item.into(),
            reason: reason.into(),
        }
    }

    /// Create an Insert error for a single row.
    pub fn insert(item: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Insert {
            item: item.into(),
            message: message.to_string(),
        }
    }

    /// Create a Provisioning error.
    pub fn provisioning(item: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Provisioning {
            item: item.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error aborts the enclosing job.
    ///
    /// Row-level errors (`UnsupportedValue`, `Insert`) are counted against the
    /// row and the job continues; everything else ends the job as failed.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MigrateError::UnsupportedValue(_) | MigrateError::Insert { .. }
        )
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::InvalidJob(_) => 2,
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => 3,
            MigrateError::ItemNotFound(_) | MigrateError::SchemaUnavailable { .. } => 4,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
