//! Two-tier classification of raw validation errors.
//!
//! Decision order, first match wins:
//!
//! 1. Content-model errors ([`RawErrorKind::Children`]) naming an unexpected
//!    child, reporting incomplete content, or reporting a cardinality bound.
//! 2. Any error whose reason contains one of the structural phrases.
//! 3. Everything else is semantic, including errors with no reason.
//!
//! The phrase checks live in [`ReasonRules`], each as its own predicate, so
//! call sites never match on engine text directly.

use serde::{Deserialize, Serialize};

use crate::engine::{RawErrorKind, RawValidationError};
use crate::taxonomy::ErrorTier;

/// Reason phrases that mark an error structural regardless of its kind.
pub const STRUCTURAL_PATTERNS: &[&str] = &[
    "unexpected child",
    "element not allowed",
    "not permitted here",
    "unknown element",
    "invalid child",
];

pub const UNKNOWN_XPATH: &str = "unknown";
pub const NO_REASON: &str = "No reason provided";

/// Flat, serializable view of one classified error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub xpath: String,
    pub error_type: String,
    pub reason: String,
    pub tier: ErrorTier,
}

/// Output of [`ErrorClassifier::classify_all`]. Together the two buckets hold
/// every input error exactly once, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub structural: Vec<RawValidationError>,
    pub semantic: Vec<RawValidationError>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.structural.len() + self.semantic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reason-text predicates. All comparisons are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonRules {
    extra_patterns: Vec<String>,
}

impl ReasonRules {
    /// Add phrases checked alongside [`STRUCTURAL_PATTERNS`].
    pub fn with_extra_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extra_patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn extra_patterns(&self) -> &[String] {
        &self.extra_patterns
    }

    /// "not complete": required content is missing.
    pub fn reports_incomplete_content(&self, reason: &str) -> bool {
        reason.to_lowercase().contains("not complete")
    }

    /// "occurs" with "minimum" or "maximum": a cardinality bound was broken.
    pub fn reports_cardinality_violation(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        reason.contains("occurs") && (reason.contains("minimum") || reason.contains("maximum"))
    }

    /// One of the structural phrases, built-in or configured.
    pub fn matches_structural_pattern(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        STRUCTURAL_PATTERNS.iter().any(|p| reason.contains(p))
            || self.extra_patterns.iter().any(|p| reason.contains(p.as_str()))
    }
}

/// Pure, stateless tier decision. Cheap to clone and safe to share.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    rules: ReasonRules,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ReasonRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ReasonRules {
        &self.rules
    }

    pub fn classify(&self, error: &RawValidationError) -> ErrorTier {
        if self.is_structural_error(error) {
            ErrorTier::Structural
        } else {
            ErrorTier::Semantic
        }
    }

    pub fn is_structural_error(&self, error: &RawValidationError) -> bool {
        let reason = error.reason.as_deref();

        if let RawErrorKind::Children { invalid_tag } = &error.kind {
            if invalid_tag.is_some() {
                return true;
            }
            if let Some(reason) = reason {
                if self.rules.reports_incomplete_content(reason)
                    || self.rules.reports_cardinality_violation(reason)
                {
                    return true;
                }
            }
        }

        reason.is_some_and(|reason| self.rules.matches_structural_pattern(reason))
    }

    /// Split errors into the two tiers, preserving order within each.
    pub fn classify_all(&self, errors: Vec<RawValidationError>) -> Partition {
        let (structural, semantic) = errors
            .into_iter()
            .partition(|error| self.is_structural_error(error));
        Partition {
            structural,
            semantic,
        }
    }

    pub fn summarize(&self, error: &RawValidationError) -> ClassifiedError {
        ClassifiedError {
            xpath: error.path.clone().unwrap_or_else(|| UNKNOWN_XPATH.to_string()),
            error_type: error.kind.name().to_string(),
            reason: error.reason.clone().unwrap_or_else(|| NO_REASON.to_string()),
            tier: self.classify(error),
        }
    }
}
