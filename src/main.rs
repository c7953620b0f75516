use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sdc4_validator::batch::{BatchSummary, BatchValidator, EXIT_STRUCTURAL, EXIT_VALID};
use sdc4_validator::cli::{
    Cli, Command, Json2XmlArgs, OutputFormat, ValidateArgs, VerbosityLevel, Xml2JsonArgs,
};
use sdc4_validator::compliance::ComplianceChecker;
use sdc4_validator::config::{Config, ConfigManager};
use sdc4_validator::convert;
use sdc4_validator::discovery::InstanceDiscovery;
use sdc4_validator::error::Error;
use sdc4_validator::error_reporter::ErrorReporter;
use sdc4_validator::output::{Output, json_error};
use sdc4_validator::validator::Validator;

const EXIT_CONVERSION_FAILED: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose > 0);

    let code = match &cli.command {
        Command::Validate(args) => run_validate(&cli, args).await,
        Command::CheckSchema(args) => run_check_schema(&cli, &args.schema).await,
        Command::Xml2Json(args) => finish_conversion(run_xml2json(args)),
        Command::Json2Xml(args) => finish_conversion(run_json2xml(args)),
    };
    ExitCode::from(code)
}

/// Logs go to stderr so JSON reports on stdout stay parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_validate(cli: &Cli, args: &ValidateArgs) -> u8 {
    let json = cli.wants_json();
    let config = match ConfigManager::load_config(cli).await {
        Ok(config) => config,
        Err(e) => return fail(&ErrorReporter::for_level(cli.verbosity()), &Error::from(e), json),
    };
    let reporter = ErrorReporter::for_level(config.verbosity());
    let json = config.output.format == OutputFormat::Json;

    match validate_instances(&config, args).await {
        Ok(outcomes) => {
            let output = Output::new(config.verbosity(), config.output.format);
            match output.render(&outcomes) {
                Ok(text) => print!("{}", ensure_newline(text)),
                Err(e) => return fail(&reporter, &Error::Conversion { details: e.to_string() }, json),
            }
            BatchSummary::aggregate(&outcomes).exit_code()
        }
        Err(e) => fail(&reporter, &e, json),
    }
}

async fn validate_instances(
    config: &Config,
    args: &ValidateArgs,
) -> sdc4_validator::Result<Vec<sdc4_validator::batch::InstanceOutcome>> {
    let validator = Validator::new(&args.schema, config.validator_options())?;

    let instances = InstanceDiscovery::new()
        .with_extensions(&config.files.extensions)
        .discover_all(&args.instances)
        .await?;
    if instances.is_empty() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no instance files found",
        )));
    }
    debug!(instances = instances.len(), schema = %args.schema.display(), "instances discovered");

    BatchValidator::new(Arc::new(validator), config.batch_config())
        .validate_all(instances)
        .await
}

async fn run_check_schema(cli: &Cli, schema: &Path) -> u8 {
    let config = match ConfigManager::load_config(cli).await {
        Ok(config) => config,
        Err(e) => {
            ErrorReporter::for_level(cli.verbosity()).report_config_error(&e);
            return EXIT_STRUCTURAL;
        }
    };
    let reporter = ErrorReporter::for_level(config.verbosity());

    let checked = ComplianceChecker::new(config.vocabulary.clone())
        .check_path(schema)
        .and_then(|report| report.into_result(Some(schema)));

    match checked {
        Ok(()) => {
            if config.verbosity() > VerbosityLevel::Quiet {
                println!("Schema '{}' is SDC4 compliant.", schema.display());
            }
            info!(schema = %schema.display(), "schema compliant");
            EXIT_VALID
        }
        Err(e) => fail(&reporter, &e, false),
    }
}

fn run_xml2json(args: &Xml2JsonArgs) -> anyhow::Result<()> {
    let value = convert::xml_to_json(&args.xml, &args.schema)?;
    let text = serde_json::to_string_pretty(&value)?;

    match &args.output {
        Some(output) => {
            std::fs::write(output, format!("{}\n", text))
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("Written to {}", output.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run_json2xml(args: &Json2XmlArgs) -> anyhow::Result<()> {
    let data = convert::load_json(&args.json)?;
    convert::json_to_xml(&data, &args.schema, &args.output)?;
    println!("Written to {}", args.output.display());
    Ok(())
}

fn finish_conversion(result: anyhow::Result<()>) -> u8 {
    match result {
        Ok(()) => EXIT_VALID,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_CONVERSION_FAILED
        }
    }
}

/// Setup failures always exit 2; JSON mode reports them on stdout.
fn fail(reporter: &ErrorReporter, error: &Error, json: bool) -> u8 {
    if json {
        match json_error(&error.to_string()) {
            Ok(payload) => println!("{}", payload),
            Err(_) => reporter.report(error),
        }
    } else {
        reporter.report(error);
    }
    EXIT_STRUCTURAL
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
