//! Error types for the entity-sync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=setup, 3=schema, 4=crawl/substitution, 5=version, 6=io)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for entity-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Setup (exit 2)
    ConnectionFailed,
    OutputCreateFailed,

    // Schema introspection (exit 3)
    TableNotFound,
    SequenceNotFound,
    UniqueIndexMissing,

    // Crawl / substitution (exit 4)
    CrawlQueryFailed,
    EntityNotFound,

    // Version mismatch on import (exit 5)
    VersionMismatch,
    ManifestIncomplete,

    // I/O (exit 6)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::OutputCreateFailed => "OUTPUT_CREATE_FAILED",
            Self::TableNotFound => "TABLE_NOT_FOUND",
            Self::SequenceNotFound => "SEQUENCE_NOT_FOUND",
            Self::UniqueIndexMissing => "UNIQUE_INDEX_MISSING",
            Self::CrawlQueryFailed => "CRAWL_QUERY_FAILED",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::ManifestIncomplete => "MANIFEST_INCOMPLETE",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-6).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::ConnectionFailed | Self::OutputCreateFailed => 2,
            Self::TableNotFound | Self::SequenceNotFound | Self::UniqueIndexMissing => 3,
            Self::CrawlQueryFailed | Self::EntityNotFound => 4,
            Self::VersionMismatch | Self::ManifestIncomplete => 5,
            Self::IoError | Self::JsonError => 6,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in entity-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not connect to database: {0}")]
    ConnectionFailed(String),

    #[error("could not create output file at {path}: {source}")]
    OutputCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("table not found in catalog: {0}")]
    TableNotFound(String),

    #[error("no usable sequence for primary key of table {table} (column {column})")]
    SequenceNotFound { table: String, column: String },

    #[error("table {0} has no main unique index at emission time")]
    UniqueIndexMissing(String),

    #[error("query failed while crawling table {table}: {source}")]
    CrawlQueryFailed {
        table: String,
        #[source]
        source: Box<Error>,
    },

    #[error("no entity found for label '{label}' in table {table}")]
    EntityNotFound { table: String, label: String },

    #[error(
        "version mismatch: import dir has {import_product} {import_version}, server is {server_product} {server_version}"
    )]
    VersionMismatch {
        import_product: String,
        import_version: String,
        server_product: String,
        server_version: String,
    },

    #[error("version manifest at {path} is missing required key '{key}'")]
    ManifestIncomplete { path: PathBuf, key: String },

    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConnectionFailed(_) | Self::Database(_) => ErrorCode::ConnectionFailed,
            Self::OutputCreateFailed { .. } => ErrorCode::OutputCreateFailed,
            Self::TableNotFound(_) => ErrorCode::TableNotFound,
            Self::SequenceNotFound { .. } => ErrorCode::SequenceNotFound,
            Self::UniqueIndexMissing(_) => ErrorCode::UniqueIndexMissing,
            Self::CrawlQueryFailed { .. } => ErrorCode::CrawlQueryFailed,
            Self::EntityNotFound { .. } => ErrorCode::EntityNotFound,
            Self::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Self::ManifestIncomplete { .. } => ErrorCode::ManifestIncomplete,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ConnectionFailed(_) | Self::Database(_) => Some(
                "Check --db-url / ESYNC_DATABASE_URL and that the server accepts connections"
                    .to_string(),
            ),
            Self::TableNotFound(name) => Some(format!(
                "'{name}' is not present in the catalog. Check the schema matches between servers."
            )),
            Self::VersionMismatch { .. } => Some(
                "Export and import must run between servers on the same product/version"
                    .to_string(),
            ),
            Self::ManifestIncomplete { .. } => {
                Some("version.txt must contain 'product_name' and 'version' keys".to_string())
            }
            Self::EntityNotFound { label, .. } => {
                Some(format!("No row matches label '{label}' on the source server"))
            }
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
