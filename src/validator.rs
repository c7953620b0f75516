//! Validator façade: schema loading, compliance gating and instance
//! validation behind one reusable object.
//!
//! A [`Validator`] holds an immutable compiled schema and a stateless
//! classifier. Every query allocates its own results, so one validator can
//! be shared (`Arc<Validator>`) by any number of threads validating
//! different documents.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{ClassifiedError, ErrorClassifier, ReasonRules};
use crate::compliance::ComplianceChecker;
use crate::engine::{CompiledSchema, RawValidationError, ValidationMode};
use crate::error::{Error, Result};
use crate::libxml2::{LibXml2Schema, decode_document};
use crate::schema_tree::{SchemaTree, XmlSyntaxError, parse_xml};
use crate::taxonomy::{ErrorTier, Vocabulary};

/// Construction options for [`Validator::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Run the restriction-only linter before compiling.
    pub check_compliance: bool,
    pub mode: ValidationMode,
    pub vocabulary: Vocabulary,
    pub rules: ReasonRules,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            check_compliance: true,
            mode: ValidationMode::default(),
            vocabulary: Vocabulary::default(),
            rules: ReasonRules::default(),
        }
    }
}

impl ValidatorOptions {
    pub fn with_compliance_check(mut self, check_compliance: bool) -> Self {
        self.check_compliance = check_compliance;
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_rules(mut self, rules: ReasonRules) -> Self {
        self.rules = rules;
        self
    }
}

/// Tiered outcome of validating one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub structural_errors: Vec<RawValidationError>,
    pub semantic_errors: Vec<RawValidationError>,
}

impl ValidationResult {
    pub fn error_count(&self) -> usize {
        self.structural_errors.len() + self.semantic_errors.len()
    }

    pub fn has_structural_errors(&self) -> bool {
        !self.structural_errors.is_empty()
    }

    /// Most severe tier present, `None` when the instance is valid.
    pub fn worst_tier(&self) -> Option<ErrorTier> {
        if self.has_structural_errors() {
            Some(ErrorTier::Structural)
        } else if !self.semantic_errors.is_empty() {
            Some(ErrorTier::Semantic)
        } else {
            None
        }
    }

    /// Serializable projection with per-error summaries.
    pub fn report(&self, classifier: &ErrorClassifier) -> ValidationReport {
        ValidationReport {
            valid: self.is_valid,
            error_count: self.error_count(),
            structural_error_count: self.structural_errors.len(),
            semantic_error_count: self.semantic_errors.len(),
            structural_errors: self
                .structural_errors
                .iter()
                .map(|e| classifier.summarize(e))
                .collect(),
            semantic_errors: self
                .semantic_errors
                .iter()
                .map(|e| classifier.summarize(e))
                .collect(),
        }
    }
}

/// Machine-readable report shape returned by
/// [`Validator::validate_and_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub error_count: usize,
    pub structural_error_count: usize,
    pub semantic_error_count: usize,
    pub structural_errors: Vec<ClassifiedError>,
    pub semantic_errors: Vec<ClassifiedError>,
}

impl ValidationReport {
    pub fn worst_tier(&self) -> Option<ErrorTier> {
        if self.structural_error_count > 0 {
            Some(ErrorTier::Structural)
        } else if self.semantic_error_count > 0 {
            Some(ErrorTier::Semantic)
        } else {
            None
        }
    }
}

pub struct Validator {
    schema: Arc<dyn CompiledSchema>,
    schema_name: String,
    classifier: ErrorClassifier,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("schema_name", &self.schema_name)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// Load a schema file, lint it when `options.check_compliance` is set,
    /// then compile it.
    ///
    /// # Errors
    ///
    /// * [`Error::SchemaNotFound`] / [`Error::SchemaParse`] for a missing or
    ///   malformed file.
    /// * [`Error::ComplianceViolation`] carrying every issue found. The
    ///   schema is not compiled in that case.
    /// * [`Error::SchemaLoad`] when the engine rejects the schema.
    pub fn new(schema_path: &Path, options: ValidatorOptions) -> Result<Self> {
        let tree = SchemaTree::from_path(schema_path)?;

        if options.check_compliance {
            ComplianceChecker::new(options.vocabulary.clone())
                .check(&tree)
                .into_result(Some(schema_path))?;
        }

        let compiled = LibXml2Schema::compile(schema_path, options.mode)?;
        debug!(
            schema = %schema_path.display(),
            mode = %options.mode,
            check_compliance = options.check_compliance,
            "validator ready"
        );

        Ok(Self {
            schema: Arc::new(compiled),
            schema_name: schema_path.display().to_string(),
            classifier: ErrorClassifier::with_rules(options.rules),
        })
    }

    /// Validator with default options: compliance checked, lax mode.
    pub fn from_path(schema_path: &Path) -> Result<Self> {
        Self::new(schema_path, ValidatorOptions::default())
    }

    /// Wrap an already compiled schema. No compliance check runs.
    pub fn from_compiled(
        schema: Arc<dyn CompiledSchema>,
        schema_name: impl Into<String>,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            schema,
            schema_name: schema_name.into(),
            classifier,
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Validate an instance file.
    ///
    /// Content violations are returned in the result; only unreadable or
    /// malformed documents are errors.
    pub fn validate(&self, instance: &Path) -> Result<ValidationResult> {
        let (name, document) = read_instance(instance)?;
        self.validate_bytes(&name, &document)
    }

    /// Validate an in-memory instance; `name` labels diagnostics.
    pub fn validate_document(&self, name: &str, xml: &str) -> Result<ValidationResult> {
        self.validate_bytes(name, xml.as_bytes())
    }

    /// Validate raw instance bytes in whatever encoding they declare.
    pub fn validate_bytes(&self, name: &str, document: &[u8]) -> Result<ValidationResult> {
        let errors = self.raw_errors(name, document)?;
        let is_valid = errors.is_empty();
        let partition = self.classifier.classify_all(errors);

        debug!(
            document = name,
            structural = partition.structural.len(),
            semantic = partition.semantic.len(),
            "instance classified"
        );

        Ok(ValidationResult {
            is_valid,
            structural_errors: partition.structural,
            semantic_errors: partition.semantic,
        })
    }

    /// Structural-tier errors only.
    pub fn validate_structure(&self, instance: &Path) -> Result<Vec<RawValidationError>> {
        Ok(self.validate(instance)?.structural_errors)
    }

    pub fn validate_and_report(&self, instance: &Path) -> Result<ValidationReport> {
        Ok(self.validate(instance)?.report(&self.classifier))
    }

    /// Every classified error in engine discovery order.
    pub fn iter_errors(&self, instance: &Path) -> Result<Vec<ClassifiedError>> {
        let (name, document) = read_instance(instance)?;
        Ok(self
            .raw_errors(&name, &document)?
            .iter()
            .map(|e| self.classifier.summarize(e))
            .collect())
    }

    /// The engine sees the original bytes; the well-formedness check runs
    /// on their UTF-8 decoding.
    fn raw_errors(&self, name: &str, document: &[u8]) -> Result<Vec<RawValidationError>> {
        let text = decode_document(document).map_err(|e| instance_parse_error(name, e))?;
        parse_xml(&text).map_err(|e| instance_parse_error(name, e))?;
        self.schema.iter_errors(document, name)
    }
}

pub(crate) fn instance_parse_error(name: &str, error: XmlSyntaxError) -> Error {
    Error::InstanceParse {
        document: name.to_string(),
        line: error.line,
        column: error.column,
        details: error.details,
    }
}

fn read_instance(path: &Path) -> Result<(String, Vec<u8>)> {
    let document = std::fs::read(path)?;
    Ok((path.display().to_string(), document))
}
