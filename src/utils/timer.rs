//! Wall-clock timing for probes and runs

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::debug;

/// Measures one probe or one run; logs the duration when stopped
#[derive(Debug)]
pub struct Timer {
    label: String,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// UTC timestamp taken when the timer started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Consume the timer, returning whole milliseconds
    pub fn stop(self) -> u64 {
        let elapsed_ms = self.elapsed_ms();
        debug!(label = %self.label, elapsed_ms, "timer stopped");
        elapsed_ms
    }
}
