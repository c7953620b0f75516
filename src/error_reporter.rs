use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::{Error, LibXml2Error};

/// Renders fatal setup errors on stderr with verbosity-dependent detail
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    /// Reporter for a CLI verbosity; `Debug` adds timestamps.
    pub fn for_level(verbosity: VerbosityLevel) -> Self {
        Self::new(verbosity).with_timestamps(verbosity == VerbosityLevel::Debug)
    }

    pub fn with_timestamps(mut self, show_timestamps: bool) -> Self {
        self.show_timestamps = show_timestamps;
        self
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn report(&self, error: &Error) {
        eprintln!("{}", self.format_error(error));
    }

    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    pub fn format_error(&self, error: &Error) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet | VerbosityLevel::Normal => self.format_error_normal(error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
            VerbosityLevel::Debug => self.format_error_debug(error),
        }
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!("Configuration Error: {}\n{}", error, self.get_config_help(error))
            }
            VerbosityLevel::Debug => format!(
                "Configuration Error: {}\nDebug: {:?}\n{}",
                error,
                error,
                self.get_config_help(error)
            ),
        }
    }

    /// Headline for the stage that failed, then the error text.
    fn format_error_normal(&self, error: &Error) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        let body = match error {
            Error::ComplianceViolation { .. } => format!("Schema compliance error:\n{}", error),
            Error::Config(config_error) => return self.format_config_error(config_error),
            e if e.is_schema_error() => format!("Error loading schema: {}", error),
            _ => format!("Error validating XML: {}", error),
        };

        format!("{}{}", timestamp, body)
    }

    fn format_error_verbose(&self, error: &Error) -> String {
        let mut output = self.format_error_normal(error);
        if let Some(suggestion) = suggestion(error) {
            output.push_str("\nSuggestion: ");
            output.push_str(&suggestion);
        }
        output
    }

    fn format_error_debug(&self, error: &Error) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    fn get_config_help(&self, error: &ConfigError) -> String {
        match error {
            ConfigError::Io(_) => "Check that the configuration file exists and is readable".to_string(),
            ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
                "Check the configuration file syntax (TOML/JSON format expected)".to_string()
            }
            ConfigError::Validation(_) => {
                "Fix the offending value in the configuration file, environment or command line"
                    .to_string()
            }
            ConfigError::Environment(_) => {
                "Unset or correct the SDCVALIDATE_* environment variable named above".to_string()
            }
            ConfigError::UnsupportedFormat(_) => {
                "Use a .toml or .json configuration file".to_string()
            }
        }
    }
}

fn suggestion(error: &Error) -> Option<String> {
    match error {
        Error::SchemaNotFound { path } => Some(format!(
            "Verify the schema path is correct: {}",
            path.display()
        )),
        Error::SchemaParse { line, column, .. } => Some(format!(
            "The schema is not well-formed XML; look near line {}, column {}",
            line, column
        )),
        Error::ComplianceViolation { .. } => Some(
            "Rewrite each xsd:extension as an xsd:restriction, or pass --no-compliance-check \
             to validate against the schema as-is"
                .to_string(),
        ),
        Error::SchemaLoad { .. } => Some(
            "Check that imported and included schemas resolve locally; use --mode lax to \
             tolerate schema warnings"
                .to_string(),
        ),
        Error::InstanceParse { line, column, .. } => Some(format!(
            "The instance is not well-formed XML; look near line {}, column {}",
            line, column
        )),
        Error::Io(_) => Some("Check that the file exists and is readable".to_string()),
        Error::Engine(LibXml2Error::InvalidPath { .. }) => {
            Some("Rename the file so its path is valid UTF-8".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::ComplianceIssue;
    use std::path::PathBuf;

    fn not_found() -> Error {
        Error::SchemaNotFound {
            path: PathBuf::from("missing.xsd"),
        }
    }

    #[test]
    fn test_stage_headlines() {
        let reporter = ErrorReporter::new(VerbosityLevel::Normal);

        assert_eq!(
            reporter.format_error(&not_found()),
            "Error loading schema: Schema file not found: missing.xsd"
        );

        let compliance = Error::ComplianceViolation {
            schema: Some(PathBuf::from("dm.xsd")),
            issues: vec![ComplianceIssue::new(
                Some("PatientNameExtended".to_string()),
                "sdc4:XdStringType".to_string(),
            )],
        };
        let message = reporter.format_error(&compliance);
        assert!(message.starts_with("Schema compliance error:\nSchema 'dm.xsd' violates SDC4 compliance:"));

        let instance = Error::InstanceParse {
            document: "doc.xml".to_string(),
            line: 2,
            column: 4,
            details: "unexpected end".to_string(),
        };
        assert!(reporter.format_error(&instance).starts_with("Error validating XML: "));
    }

    #[test]
    fn test_suggestions_only_when_verbose() {
        let normal = ErrorReporter::new(VerbosityLevel::Normal).format_error(&not_found());
        assert!(!normal.contains("Suggestion"));

        let verbose = ErrorReporter::new(VerbosityLevel::Verbose).format_error(&not_found());
        assert!(verbose.contains("Suggestion: Verify the schema path is correct: missing.xsd"));
    }

    #[test]
    fn test_debug_includes_error_chain() {
        let error = Error::Config(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        )));
        let io = Error::Io(std::io::Error::other("disk on fire"));
        let debug = ErrorReporter::new(VerbosityLevel::Debug).format_error(&io);
        assert!(debug.contains("Debug Info:"));
        assert!(debug.contains("Error Chain:"));
        assert!(debug.contains("1: disk on fire"));

        let config = ErrorReporter::new(VerbosityLevel::Normal).format_error(&error);
        assert!(config.starts_with("Configuration Error: IO error: no such file"));
        assert!(config.contains("exists and is readable"));
    }

    #[test]
    fn test_config_error_verbosity() {
        let error = ConfigError::UnsupportedFormat("yaml".to_string());
        assert_eq!(
            ErrorReporter::new(VerbosityLevel::Quiet).format_config_error(&error),
            "Config error: Unsupported configuration file format: yaml"
        );
        assert!(
            ErrorReporter::new(VerbosityLevel::Normal)
                .format_config_error(&error)
                .ends_with("Use a .toml or .json configuration file")
        );
    }

    #[test]
    fn test_timestamps() {
        let reporter = ErrorReporter::new(VerbosityLevel::Normal).with_timestamps(true);
        let message = reporter.format_error(&not_found());
        assert!(message.starts_with('['));
        assert_eq!(&message[9..11], "] ");
    }

    #[test]
    fn test_debug_level_is_timestamped() {
        let debug = ErrorReporter::for_level(VerbosityLevel::Debug).format_error(&not_found());
        assert!(debug.starts_with('['));
        assert!(debug.contains("Error Chain:"));

        let verbose = ErrorReporter::for_level(VerbosityLevel::Verbose).format_error(&not_found());
        assert!(verbose.starts_with("Error loading schema: "));
    }
}
