use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::ValidationMode;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show the verdict and errors
    Quiet,
    #[default]
    Normal,
    /// Show per-instance timings and error types
    Verbose,
    /// Show everything, including error source chains
    Debug,
}

/// How validation results are rendered on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    /// One line per instance plus totals
    Summary,
}

/// SDC4 schema compliance and two-tier instance validation
#[derive(Parser, Debug, Clone)]
#[command(name = "sdcvalidate")]
#[command(about = "Validate XML instances against SDC4 data-model schemas")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output and debug logging; repeat (-vv) for timestamps and error chains
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (verdicts and errors only)
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validate instances; exits 0 valid, 1 semantic errors only, 2 structural errors
    Validate(ValidateArgs),
    /// Run the SDC4 compliance check on a schema
    CheckSchema(CheckSchemaArgs),
    /// Convert an XML instance to JSON
    #[command(name = "xml2json")]
    Xml2Json(Xml2JsonArgs),
    /// Convert JSON data to a schema-valid XML instance
    #[command(name = "json2xml")]
    Json2Xml(Json2XmlArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the XSD schema file
    pub schema: PathBuf,

    /// Instance files or directories to scan
    #[arg(required = true)]
    pub instances: Vec<PathBuf>,

    /// Skip the SDC4 compliance check (no-xsd:extension rule)
    #[arg(long = "no-compliance-check")]
    pub no_compliance_check: bool,

    /// Output results as JSON (same as --format json)
    #[arg(long = "json", conflicts_with = "format")]
    pub json: bool,

    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Validation mode: strict, lax or skip
    #[arg(long = "mode")]
    pub mode: Option<ValidationMode>,

    /// Instance extensions when scanning directories (comma-separated)
    #[arg(short = 'e', long = "extensions")]
    pub extensions: Option<String>,

    /// Maximum instances validated at once
    #[arg(short = 'j', long = "max-concurrent")]
    pub max_concurrent: Option<usize>,

    /// Per-instance timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,
}

impl ValidateArgs {
    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|raw| {
            raw.split(',')
                .map(normalize_extension)
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        if self.json {
            Some(OutputFormat::Json)
        } else {
            self.format
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckSchemaArgs {
    pub schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct Xml2JsonArgs {
    /// Path to the XML file
    pub xml: PathBuf,

    /// XSD schema the instance must satisfy
    #[arg(long = "schema", required = true)]
    pub schema: PathBuf,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct Json2XmlArgs {
    /// JSON file, or inline JSON text
    pub json: String,

    pub schema: PathBuf,

    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose > 1 {
            VerbosityLevel::Debug
        } else if self.verbose == 1 {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// JSON error payloads are only emitted for `validate --json`.
    pub fn wants_json(&self) -> bool {
        match &self.command {
            Command::Validate(args) => args.output_format() == Some(OutputFormat::Json),
            _ => false,
        }
    }
}

/// `.xml` and `xml` name the same extension.
pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_string()
}
