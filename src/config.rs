use crate::batch::BatchConfig;
use crate::classifier::ReasonRules;
use crate::cli::{Cli, Command, OutputFormat, ValidateArgs, VerbosityLevel, normalize_extension};
use crate::engine::ValidationMode;
use crate::taxonomy::Vocabulary;
use crate::validator::ValidatorOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const ENV_PREFIX: &str = "SDCVALIDATE_";
const APP_DIR: &str = "sdcvalidate";
const CONFIG_NAMES: [&str; 4] = [
    "sdcvalidate.toml",
    "sdcvalidate.json",
    ".sdcvalidate.toml",
    ".sdcvalidate.json",
];

/// Effective settings for one run. Every section tolerates missing keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub classification: ClassificationConfig,
    pub vocabulary: Vocabulary,
    pub output: OutputConfig,
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Run the restriction-only linter before compiling a schema
    pub check_compliance: bool,
    pub mode: ValidationMode,
    /// Instances validated at once; CPU count when unset
    pub max_concurrent: Option<usize>,
    /// Per-instance timeout for batch runs
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Extra reason phrases that mark an error structural
    pub extra_structural_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    /// Timestamped diagnostics with error source chains
    pub debug: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    /// Extensions matched when an instance argument is a directory
    pub extensions: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_compliance: true,
            mode: ValidationMode::Lax,
            max_concurrent: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
        }
    }
}

impl Config {
    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions::default()
            .with_compliance_check(self.validation.check_compliance)
            .with_mode(self.validation.mode)
            .with_vocabulary(self.vocabulary.clone())
            .with_rules(ReasonRules::with_extra_patterns(
                &self.classification.extra_structural_patterns,
            ))
    }

    pub fn batch_config(&self) -> BatchConfig {
        let defaults = BatchConfig::default();
        BatchConfig {
            max_concurrent: self.validation.max_concurrent.unwrap_or(defaults.max_concurrent),
            timeout: Duration::from_secs(self.validation.timeout_seconds),
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.debug {
            VerbosityLevel::Debug
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);
        config.files.extensions = normalize_extensions(&config.files.extensions);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find configuration file in the working directory, then the user
    /// config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let mut candidates: Vec<PathBuf> = CONFIG_NAMES.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join(APP_DIR);
            candidates.extend(CONFIG_NAMES.iter().map(|name| app_config_dir.join(name)));
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::debug!(path = %path.display(), "using configuration file");
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(value) = env_var(env, "CHECK_COMPLIANCE") {
            config.validation.check_compliance = parse_env("CHECK_COMPLIANCE", &value)?;
        }

        if let Some(value) = env_var(env, "MODE") {
            config.validation.mode = parse_env("MODE", &value)?;
        }

        if let Some(value) = env_var(env, "MAX_CONCURRENT") {
            config.validation.max_concurrent = Some(parse_env("MAX_CONCURRENT", &value)?);
        }

        if let Some(value) = env_var(env, "TIMEOUT") {
            config.validation.timeout_seconds = parse_env("TIMEOUT", &value)?;
        }

        // Phrases may contain commas, so they are separated by ';'
        if let Some(value) = env_var(env, "STRUCTURAL_PATTERNS") {
            config.classification.extra_structural_patterns = split_list(&value, ';');
        }

        if let Some(value) = env_var(env, "DATA_MODEL_NAMESPACE") {
            config.vocabulary.data_model_namespace = value;
        }

        if let Some(value) = env_var(env, "VERBOSE") {
            config.output.verbose = parse_env("VERBOSE", &value)?;
        }

        if let Some(value) = env_var(env, "DEBUG") {
            config.output.debug = parse_env("DEBUG", &value)?;
        }

        if let Some(value) = env_var(env, "QUIET") {
            config.output.quiet = parse_env("QUIET", &value)?;
        }

        if let Some(value) = env_var(env, "FORMAT") {
            config.output.format = match value.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                "summary" => OutputFormat::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {}FORMAT value: {}",
                        ENV_PREFIX, value
                    )));
                }
            };
        }

        if let Some(value) = env_var(env, "EXTENSIONS") {
            config.files.extensions = normalize_extensions(&split_list(&value, ','));
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration. Only flags the user actually
    /// passed override earlier layers.
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.verbose > 0 {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.verbose > 1 {
            config.output.debug = true;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
            config.output.debug = false;
        }

        if let Command::Validate(args) = &cli.command {
            Self::merge_validate_args(&mut config, args);
        }

        config
    }

    fn merge_validate_args(config: &mut Config, args: &ValidateArgs) {
        if args.no_compliance_check {
            config.validation.check_compliance = false;
        }
        if let Some(mode) = args.mode {
            config.validation.mode = mode;
        }
        if args.max_concurrent.is_some() {
            config.validation.max_concurrent = args.max_concurrent;
        }
        if let Some(timeout) = args.timeout {
            config.validation.timeout_seconds = timeout;
        }
        if let Some(format) = args.output_format() {
            config.output.format = format;
        }
        if let Some(extensions) = args.get_extensions() {
            config.files.extensions = extensions;
        }
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.validation.max_concurrent == Some(0) {
            return Err(ConfigError::Validation(
                "Maximum concurrency must be greater than 0".to_string(),
            ));
        }

        if config.validation.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if (config.output.verbose || config.output.debug) && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        if config.vocabulary.data_model_namespace.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Data model namespace must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_var(env: &impl EnvProvider, key: &str) -> Option<String> {
    env.get(&format!("{}{}", ENV_PREFIX, key))
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::Environment(format!("Invalid {}{} value: {}", ENV_PREFIX, key, value))
    })
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .filter(|ext| !ext.is_empty())
        .collect()
}
