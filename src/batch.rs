//! Bounded-concurrency validation of many instances against one schema.
//!
//! Each instance runs on tokio's blocking pool (libxml2 work is CPU bound)
//! behind a semaphore permit and a per-instance timeout. Outcomes come back
//! in input order whatever order the tasks finish in.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::taxonomy::ErrorTier;
use crate::validator::{ValidationReport, Validator};

/// Exit status for a clean instance.
pub const EXIT_VALID: u8 = 0;
/// Exit status when only semantic errors were found.
pub const EXIT_SEMANTIC: u8 = 1;
/// Exit status for structural errors or any failure to validate.
pub const EXIT_STRUCTURAL: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_concurrent: usize,
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Validation ran; the report may still contain errors.
    Checked { report: ValidationReport },
    /// The instance could not be read or parsed.
    Failed { message: String },
    TimedOut { after: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: InstanceStatus,
    pub duration: Duration,
}

impl InstanceOutcome {
    pub fn exit_code(&self) -> u8 {
        match &self.status {
            InstanceStatus::Checked { report } => match report.worst_tier() {
                None => EXIT_VALID,
                Some(ErrorTier::Semantic) => EXIT_SEMANTIC,
                Some(ErrorTier::Structural) => EXIT_STRUCTURAL,
            },
            InstanceStatus::Failed { .. } | InstanceStatus::TimedOut { .. } => EXIT_STRUCTURAL,
        }
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        match &self.status {
            InstanceStatus::Checked { report } => Some(report),
            _ => None,
        }
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub semantic_only: usize,
    pub structural: usize,
    pub failed: usize,
    pub total_duration: Duration,
}

impl BatchSummary {
    pub fn aggregate(outcomes: &[InstanceOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            summary.total_duration += outcome.duration;
            match (&outcome.status, outcome.exit_code()) {
                (InstanceStatus::Checked { .. }, EXIT_VALID) => summary.valid += 1,
                (InstanceStatus::Checked { .. }, EXIT_SEMANTIC) => summary.semantic_only += 1,
                (InstanceStatus::Checked { .. }, _) => summary.structural += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }

    pub fn all_valid(&self) -> bool {
        self.total > 0 && self.valid == self.total
    }

    /// Worst exit status over the batch.
    pub fn exit_code(&self) -> u8 {
        if self.structural > 0 || self.failed > 0 {
            EXIT_STRUCTURAL
        } else if self.semantic_only > 0 {
            EXIT_SEMANTIC
        } else {
            EXIT_VALID
        }
    }
}

pub struct BatchValidator {
    validator: Arc<Validator>,
    config: BatchConfig,
}

impl BatchValidator {
    pub fn new(validator: Arc<Validator>, config: BatchConfig) -> Self {
        Self { validator, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Validate every path, returning one outcome per input in input order.
    pub async fn validate_all(&self, paths: Vec<PathBuf>) -> Result<Vec<InstanceOutcome>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let total = paths.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        info!(
            instances = total,
            max_concurrent = self.config.max_concurrent,
            "batch validation started"
        );

        let tasks: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let validator = Arc::clone(&self.validator);
                let semaphore = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let timeout = self.config.timeout;

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|_| Error::Concurrency {
                        details: "validation semaphore closed".to_string(),
                    })?;

                    let start = Instant::now();
                    let task_path = path.clone();
                    let work = tokio::task::spawn_blocking(move || {
                        validator.validate_and_report(&task_path)
                    });

                    let status = match tokio::time::timeout(timeout, work).await {
                        Ok(Ok(Ok(report))) => InstanceStatus::Checked { report },
                        Ok(Ok(Err(e))) => InstanceStatus::Failed {
                            message: e.to_string(),
                        },
                        Ok(Err(join_error)) => {
                            return Err(Error::Concurrency {
                                details: format!("Task join error: {}", join_error),
                            });
                        }
                        Err(_) => InstanceStatus::TimedOut { after: timeout },
                    };

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(path = %path.display(), done, total, "instance finished");

                    Ok::<InstanceOutcome, Error>(InstanceOutcome {
                        path,
                        status,
                        duration: start.elapsed(),
                    })
                })
            })
            .collect();

        let joined = try_join_all(tasks).await.map_err(|e| Error::Concurrency {
            details: format!("Task join error: {}", e),
        })?;
        let outcomes = joined.into_iter().collect::<Result<Vec<_>>>()?;

        info!(instances = outcomes.len(), "batch validation finished");
        Ok(outcomes)
    }
}
