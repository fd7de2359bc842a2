//! Probe outcome models
//!
//! Defines per-probe outcomes, failure classification, and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::chat::{ChatCompletionResponse, Usage};

/// Probe execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Pass,
    Fail,
}

impl ProbeStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            ProbeStatus::Pass => "✓",
            ProbeStatus::Fail => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeStatus::Pass)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Pass => write!(f, "PASS"),
            ProbeStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Why a probe failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    RateLimited,
    Transport,
    MalformedResponse,
    Gateway,
    Internal,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Authentication => "authentication",
            FailureKind::RateLimited => "rate-limited",
            FailureKind::Transport => "transport",
            FailureKind::MalformedResponse => "malformed-response",
            FailureKind::Gateway => "gateway",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classified probe failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Result of a single probe invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 1-based submission index
    pub index: usize,
    pub status: ProbeStatus,
    pub duration_ms: u64,
    pub model: Option<String>,
    pub content: Option<String>,
    pub usage: Option<Usage>,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    pub fn pass(index: usize, duration_ms: u64, response: &ChatCompletionResponse) -> Self {
        Self {
            index,
            status: ProbeStatus::Pass,
            duration_ms,
            model: Some(response.model.clone()),
            content: response.first_content().map(str::to_string),
            usage: Some(response.usage),
            failure: None,
        }
    }

    pub fn fail(index: usize, duration_ms: u64, failure: ProbeFailure) -> Self {
        Self {
            index,
            status: ProbeStatus::Fail,
            duration_ms,
            model: None,
            content: None,
            usage: None,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Probe {} [{}ms]",
            self.status.symbol(),
            self.index,
            self.duration_ms
        )?;
        if let Some(failure) = &self.failure {
            write!(f, " - {failure}")?;
        }
        Ok(())
    }
}

/// Summary of one smoke-test run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub endpoint: String,
    pub deployment: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    /// Wall-clock time of the whole run
    pub duration_ms: u64,
    pub total_tokens: u64,
    /// Outcomes in completion order
    pub outcomes: Vec<ProbeOutcome>,
}

impl RunSummary {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        outcomes: Vec<ProbeOutcome>,
    ) -> Self {
        let total = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.is_success()).count();

        let mut failures_by_kind = BTreeMap::new();
        for kind in outcomes.iter().filter_map(ProbeOutcome::failure_kind) {
            *failures_by_kind.entry(kind).or_insert(0) += 1;
        }

        let total_tokens = outcomes
            .iter()
            .filter_map(|o| o.usage)
            .map(|u| u.total_tokens)
            .sum();

        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            started_at,
            total,
            passed,
            failed: total - passed,
            failures_by_kind,
            duration_ms,
            total_tokens,
            outcomes,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// Process exit status: 0 when every probe passed, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.is_all_passed() {
            0
        } else {
            1
        }
    }

    /// Summary line printed at the end of a run
    pub fn tally(&self) -> String {
        format!("Results: {}/{} tests passed", self.passed, self.total)
    }

    /// Mean probe latency across successful probes
    pub fn avg_success_ms(&self) -> u64 {
        let successes: Vec<u64> = self
            .outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.duration_ms)
            .collect();
        if successes.is_empty() {
            0
        } else {
            successes.iter().sum::<u64>() / successes.len() as u64
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.tally())?;
        if !self.failures_by_kind.is_empty() {
            let kinds: Vec<String> = self
                .failures_by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            writeln!(f, "Failures: {}", kinds.join(", "))?;
        }
        write!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ChatMessage, Choice};

    fn response() -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: None,
            model: "gpt-4o-mini".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: crate::models::Role::Assistant,
                    content: Some("hello".to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 2,
                total_tokens: 12,
            },
        }
    }

    #[test]
    fn test_outcome_pass_captures_response() {
        let outcome = ProbeOutcome::pass(3, 120, &response());
        assert!(outcome.is_success());
        assert_eq!(outcome.index, 3);
        assert_eq!(outcome.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(outcome.content.as_deref(), Some("hello"));
        assert_eq!(outcome.failure_kind(), None);
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![
            ProbeOutcome::pass(1, 100, &response()),
            ProbeOutcome::fail(
                2,
                40,
                ProbeFailure::new(FailureKind::RateLimited, "429 Too Many Requests"),
            ),
            ProbeOutcome::pass(3, 200, &response()),
            ProbeOutcome::fail(4, 5, ProbeFailure::new(FailureKind::Transport, "refused")),
        ];

        let summary = RunSummary::new("https://gw", "dep", Utc::now(), 300, outcomes);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total_tokens, 24);
        assert_eq!(summary.avg_success_ms(), 150);
        assert_eq!(summary.failures_by_kind.get(&FailureKind::RateLimited), Some(&1));
        assert_eq!(summary.tally(), "Results: 2/4 tests passed");
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_summary_all_passed() {
        let outcomes = vec![ProbeOutcome::pass(1, 10, &response())];
        let summary = RunSummary::new("https://gw", "dep", Utc::now(), 10, outcomes);
        assert!(summary.is_all_passed());
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.pass_rate(), 100.0);
    }

    #[test]
    fn test_empty_run_passes() {
        let summary = RunSummary::new("https://gw", "dep", Utc::now(), 0, Vec::new());
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.tally(), "Results: 0/0 tests passed");
    }

    #[test]
    fn test_outcome_display() {
        let outcome = ProbeOutcome::fail(
            7,
            12,
            ProbeFailure::new(FailureKind::Authentication, "401 Unauthorized"),
        );
        assert_eq!(
            outcome.to_string(),
            "✗ Probe 7 [12ms] - [authentication] 401 Unauthorized"
        );
    }
}
