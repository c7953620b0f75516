//! Rendering of validation outcomes for the terminal.
//!
//! Human output for a single instance reproduces the classic report:
//! `Valid.` or `Invalid: N error(s)` followed by one section per tier.
//! Batches prefix each verdict with the instance path and end with totals.

use atty;
use serde_json::json;
use std::time::Duration;

use crate::batch::{BatchSummary, InstanceOutcome, InstanceStatus};
use crate::classifier::ClassifiedError;
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::taxonomy::ErrorTier;
use crate::validator::ValidationReport;

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";
const CYAN: &str = "36";

pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: format == OutputFormat::Human && atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Render a finished run in the configured format.
    pub fn render(&self, outcomes: &[InstanceOutcome]) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_human(outcomes)),
            OutputFormat::Json => format_json(outcomes),
            OutputFormat::Summary => Ok(self.format_summary_lines(outcomes)),
        }
    }

    pub fn format_human(&self, outcomes: &[InstanceOutcome]) -> String {
        if let [single] = outcomes {
            if let InstanceStatus::Checked { report } = &single.status {
                return self.format_report(report);
            }
        }

        let mut output = String::new();
        for outcome in outcomes {
            if self.verbosity == VerbosityLevel::Quiet && outcome.exit_code() == 0 {
                continue;
            }
            output.push_str(&self.format_outcome(outcome));
        }

        if outcomes.len() > 1 && self.verbosity > VerbosityLevel::Quiet {
            output.push('\n');
            output.push_str(&self.format_summary(&BatchSummary::aggregate(outcomes)));
        }
        output
    }

    /// One instance's verdict and tier sections.
    pub fn format_report(&self, report: &ValidationReport) -> String {
        if report.valid {
            return format!("{}\n", self.colorize("Valid.", GREEN));
        }

        let mut output = format!(
            "{}\n",
            self.colorize(&format!("Invalid: {} error(s)", report.error_count), RED)
        );
        output.push_str(&self.format_tier(ErrorTier::Structural, &report.structural_errors));
        output.push_str(&self.format_tier(ErrorTier::Semantic, &report.semantic_errors));
        output
    }

    fn format_tier(&self, tier: ErrorTier, errors: &[ClassifiedError]) -> String {
        if errors.is_empty() {
            return String::new();
        }

        let mut output = format!("\n  {}: {}\n", tier.label(), errors.len());
        for error in errors {
            if self.verbosity >= VerbosityLevel::Verbose {
                output.push_str(&format!(
                    "    - [{}] ({}) {}\n",
                    error.xpath, error.error_type, error.reason
                ));
            } else {
                output.push_str(&format!("    - [{}] {}\n", error.xpath, error.reason));
            }
        }
        output
    }

    pub fn format_outcome(&self, outcome: &InstanceOutcome) -> String {
        let body = match &outcome.status {
            InstanceStatus::Checked { report } => self.format_report(report),
            InstanceStatus::Failed { message } => {
                format!("{} {}\n", self.colorize("Error:", YELLOW), message)
            }
            InstanceStatus::TimedOut { after } => format!(
                "{}\n",
                self.colorize(&format!("Timed out after {}", format_duration(*after)), YELLOW)
            ),
        };

        if self.verbosity >= VerbosityLevel::Verbose {
            format!(
                "{}: ({}) {}",
                outcome.path.display(),
                format_duration(outcome.duration),
                body
            )
        } else {
            format!("{}: {}", outcome.path.display(), body)
        }
    }

    /// `--format summary`: one line per instance, then totals.
    pub fn format_summary_lines(&self, outcomes: &[InstanceOutcome]) -> String {
        let mut output = String::new();
        for outcome in outcomes {
            let label = match (&outcome.status, outcome.exit_code()) {
                (InstanceStatus::Checked { .. }, 0) => self.colorize("VALID     ", GREEN),
                (InstanceStatus::Checked { .. }, 1) => self.colorize("SEMANTIC  ", YELLOW),
                (InstanceStatus::Checked { .. }, _) => self.colorize("STRUCTURAL", RED),
                (InstanceStatus::Failed { .. }, _) => self.colorize("ERROR     ", YELLOW),
                (InstanceStatus::TimedOut { .. }, _) => self.colorize("TIMEOUT   ", CYAN),
            };
            let detail = outcome
                .report()
                .filter(|report| report.error_count > 0)
                .map(|report| format!(" ({} error(s))", report.error_count))
                .unwrap_or_default();
            output.push_str(&format!("{}  {}{}\n", label, outcome.path.display(), detail));
        }
        output.push('\n');
        output.push_str(&self.format_summary(&BatchSummary::aggregate(outcomes)));
        output
    }

    pub fn format_summary(&self, summary: &BatchSummary) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total instances: {}\n", summary.total));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", GREEN),
            summary.valid
        ));
        if summary.semantic_only > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Semantic errors only:", YELLOW),
                summary.semantic_only
            ));
        }
        if summary.structural > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Structural errors:", RED),
                summary.structural
            ));
        }
        if summary.failed > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Failed:", YELLOW),
                summary.failed
            ));
        }
        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!(
                "  Duration: {}\n",
                format_duration(summary.total_duration)
            ));
        }
        output
    }
}

/// A single checked instance renders as its bare report; anything else as
/// `{"instances": [...], "summary": {...}}`. A single instance that could
/// not be validated renders as the setup-failure payload.
pub fn format_json(outcomes: &[InstanceOutcome]) -> serde_json::Result<String> {
    if let [single] = outcomes {
        return match &single.status {
            InstanceStatus::Checked { report } => serde_json::to_string_pretty(report),
            InstanceStatus::Failed { message } => json_error(message),
            InstanceStatus::TimedOut { after } => {
                json_error(&format!("Timed out after {}", format_duration(*after)))
            }
        };
    }

    serde_json::to_string_pretty(&json!({
        "instances": outcomes,
        "summary": BatchSummary::aggregate(outcomes),
    }))
}

/// `{"error": message, "exit_code": 2}`
pub fn json_error(message: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({
        "error": message,
        "exit_code": crate::batch::EXIT_STRUCTURAL,
    }))
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
