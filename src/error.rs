use std::path::PathBuf;

use thiserror::Error;

use crate::compliance::{ComplianceIssue, render_violation};
use crate::config::ConfigError;

/// Main error type covering every fatal failure mode.
///
/// Structural and semantic validation findings are never represented here:
/// they are data, returned inside [`crate::ValidationResult`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema file not found: {}", .path.display())]
    SchemaNotFound { path: PathBuf },

    #[error("Failed to parse schema: {schema} (line {line}, column {column}) - {details}")]
    SchemaParse {
        schema: String,
        line: u32,
        column: u32,
        details: String,
    },

    #[error("{}", render_violation(.schema.as_deref(), .issues))]
    ComplianceViolation {
        schema: Option<PathBuf>,
        issues: Vec<ComplianceIssue>,
    },

    #[error("Schema load error: {schema} - {details}")]
    SchemaLoad { schema: String, details: String },

    #[error("Failed to parse XML instance: {document} (line {line}, column {column}) - {details}")]
    InstanceParse {
        document: String,
        line: u32,
        column: u32,
        details: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversion error: {details}")]
    Conversion { details: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LibXML2 internal error: {0}")]
    Engine(#[from] LibXml2Error),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

impl Error {
    /// Schema-side failures abort validator construction.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::SchemaNotFound { .. }
                | Error::SchemaParse { .. }
                | Error::ComplianceViolation { .. }
                | Error::SchemaLoad { .. }
        )
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema compilation failed: {details}")]
    SchemaCompileFailed { details: String },

    #[error("Schema parser context creation failed")]
    ParserContextCreationFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Document could not be loaded by libxml2: {name}")]
    DocumentLoadFailed { name: String },

    #[error("Validation of {name} ended with internal error code {code}")]
    InternalError { code: i32, name: String },

    #[error("Path is not valid UTF-8 or contains NUL: {}", .path.display())]
    InvalidPath { path: PathBuf },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
