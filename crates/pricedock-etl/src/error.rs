//! Error types for the ETL pipeline
//!
//! Every variant here is fatal to the run. Normalization fallbacks never
//! surface as errors and notifier failures live in [`crate::notify::NotifyError`].

use crate::parser::ParseError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Fatal pipeline errors
#[derive(Error, Debug)]
pub enum EtlError {
    /// Network or transport failure retrieving a listing page or feed file
    #[error("Fetch error for {target}: {message}")]
    Fetch { target: String, message: String },

    /// Malformed gzip stream, malformed XML, or a record missing a required field
    #[error("Parse error in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },

    /// Constraint violation or connectivity failure while writing
    #[error("Upsert error: {0}")]
    Upsert(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn fetch(target: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(file: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            file: file.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short taxonomy label used in logs and failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Fetch { .. } => "FetchError",
            EtlError::Parse { .. } => "ParseError",
            EtlError::Upsert(_) => "UpsertError",
            EtlError::Migration(_) => "MigrationError",
            EtlError::Config(_) => "ConfigError",
            EtlError::Io(_) => "IoError",
        }
    }

    /// Render the error followed by its `source()` chain, one cause per line
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str("\n  caused by: ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}
