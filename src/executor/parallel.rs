//! Bounded parallel probe execution
//!
//! Submits every probe up front; a semaphore caps how many run at once and
//! results are collected in the order probes finish.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::models::{FailureKind, ProbeFailure, ProbeOutcome, RunSummary};
use crate::output::ResultFormatter;
use crate::probe::Probe;
use crate::utils::timer::Timer;

/// Parallel probe executor
pub struct ParallelExecutor {
    max_concurrent: usize,
    show_progress: bool,
    formatter: ResultFormatter,
}

impl ParallelExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            show_progress: true,
            formatter: ResultFormatter::default(),
        }
    }

    /// Print a completion line as each probe finishes
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_formatter(mut self, formatter: ResultFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Run `total` probes, returning outcomes in completion order
    pub async fn run_probes(&self, probe: Arc<dyn Probe>, total: usize) -> Vec<ProbeOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut indices = HashMap::with_capacity(total);

        for index in 1..=total {
            let semaphore = semaphore.clone();
            let probe = probe.clone();

            let handle = tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return ProbeOutcome::fail(
                        index,
                        0,
                        ProbeFailure::new(FailureKind::Internal, "concurrency limiter closed"),
                    );
                };

                debug!("Starting probe {}", index);
                probe.run(index).await
            });

            indices.insert(handle.id(), index);
        }

        let mut outcomes = Vec::with_capacity(total);

        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(e) => {
                    let index = indices.get(&e.id()).copied().unwrap_or_default();
                    error!("Probe {} task failed: {}", index, e);
                    ProbeOutcome::fail(
                        index,
                        0,
                        ProbeFailure::new(FailureKind::Internal, format!("probe task failed: {e}")),
                    )
                }
            };

            if self.show_progress {
                println!("{}", self.formatter.format_progress(outcome.index, total));
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Run the configured number of probes and summarize
    pub async fn run_all(&self, probe: Arc<dyn Probe>, config: &AppConfig) -> RunSummary {
        info!(
            "Running {} probes (max {} concurrent) against {}",
            config.requests, self.max_concurrent, config.deployment
        );

        let timer = Timer::start("run");
        let started_at = timer.started_at();
        let outcomes = self.run_probes(probe, config.requests).await;
        let duration_ms = timer.stop();

        let summary = RunSummary::new(
            config.endpoint.clone(),
            config.deployment.clone(),
            started_at,
            duration_ms,
            outcomes,
        );

        info!(
            "Run completed in {}ms - Pass: {}/{} ({:.1}%)",
            summary.duration_ms,
            summary.passed,
            summary.total,
            summary.pass_rate()
        );

        summary
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(10)
    }
}
