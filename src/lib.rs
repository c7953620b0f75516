//! # sdc4-validator Library
//!
//! Two-tier XML Schema validation for SDC4 data models. Instance errors are
//! split into structural errors (the document's shape is wrong) and semantic
//! errors (a value is wrong), and schemas can be linted for the
//! restriction-only rule before use.
//!
//! ```no_run
//! use std::path::Path;
//! use sdc4_validator::Validator;
//!
//! let validator = Validator::from_path(Path::new("dm-population.xsd"))?;
//! let report = validator.validate_and_report(Path::new("instance.xml"))?;
//! println!("{} structural error(s)", report.structural_error_count);
//! # Ok::<(), sdc4_validator::Error>(())
//! ```

pub mod batch;
pub mod classifier;
pub mod cli;
pub mod compliance;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod error_reporter;
pub mod libxml2;
pub mod output;
pub mod schema_tree;
pub mod taxonomy;
pub mod validator;

pub use batch::{BatchConfig, BatchSummary, BatchValidator, InstanceOutcome, InstanceStatus};
pub use classifier::{ClassifiedError, ErrorClassifier, Partition, ReasonRules};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use compliance::{
    ComplianceChecker, ComplianceIssue, ComplianceReport, assert_compliance_path,
    check_compliance_path, check_compliance_str,
};
pub use config::{Config, ConfigError, ConfigManager};
pub use convert::{Converter, json_to_xml, xml_to_json};
pub use discovery::InstanceDiscovery;
pub use engine::{CompiledSchema, RawErrorKind, RawValidationError, ValidationMode};
pub use error::{Error, LibXml2Error, Result};
pub use libxml2::LibXml2Schema;
pub use output::Output;
pub use schema_tree::SchemaTree;
pub use taxonomy::{
    DATA_BEARING_ELEMENTS, ErrorTier, SDC4_META_NAMESPACE, SDC4_NAMESPACE, STRUCTURAL_ELEMENTS,
    Vocabulary,
};
pub use validator::{ValidationReport, ValidationResult, Validator, ValidatorOptions};
