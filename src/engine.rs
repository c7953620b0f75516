//! Contract between the validator façade and the schema validation engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine-assigned subtype of a raw diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawErrorKind {
    /// Content-model violation. `invalid_tag` names an unexpected child.
    Children { invalid_tag: Option<String> },
    /// Lexical/type conversion failure of a simple value.
    Decode,
    /// Any other schema-validity violation.
    Generic,
}

impl RawErrorKind {
    pub fn is_children(&self) -> bool {
        matches!(self, RawErrorKind::Children { .. })
    }

    pub fn invalid_tag(&self) -> Option<&str> {
        match self {
            RawErrorKind::Children { invalid_tag } => invalid_tag.as_deref(),
            _ => None,
        }
    }

    /// Name reported as `error_type` in summaries.
    pub fn name(&self) -> &'static str {
        match self {
            RawErrorKind::Children { .. } => "ChildrenValidationError",
            RawErrorKind::Decode => "DecodeError",
            RawErrorKind::Generic => "ValidationError",
        }
    }
}

/// One diagnostic as produced by the engine. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValidationError {
    pub path: Option<String>,
    pub reason: Option<String>,
    pub kind: RawErrorKind,
    pub line: Option<u32>,
    pub code: Option<i32>,
}

impl RawValidationError {
    pub fn new(kind: RawErrorKind) -> Self {
        Self {
            path: None,
            reason: None,
            kind,
            line: None,
            code: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for RawValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.path.as_deref().unwrap_or("unknown"),
            self.reason.as_deref().unwrap_or("No reason provided")
        )
    }
}

/// How strictly schema compilation diagnostics are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Compile warnings fail schema loading.
    Strict,
    /// Compile warnings are logged and tolerated.
    #[default]
    Lax,
    /// Compile warnings are ignored.
    Skip,
}

impl ValidationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationMode::Strict => "strict",
            ValidationMode::Lax => "lax",
            ValidationMode::Skip => "skip",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "lax" => Ok(ValidationMode::Lax),
            "skip" => Ok(ValidationMode::Skip),
            other => Err(format!(
                "invalid validation mode '{}', expected strict, lax or skip",
                other
            )),
        }
    }
}

/// A schema compiled by the engine, shareable across threads.
///
/// Implementations must be read-only after construction: every call gets
/// its own engine state and returns a freshly allocated error list in
/// discovery order.
#[cfg_attr(test, mockall::automock)]
pub trait CompiledSchema: Send + Sync {
    /// Validate a well-formed document and return every diagnostic.
    fn iter_errors(&self, document: &[u8], name: &str) -> Result<Vec<RawValidationError>>;
}
