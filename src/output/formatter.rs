//! Output formatters for probe results
//!
//! Provides per-probe diagnostics plus table, JSON, CSV and summary reports.

use anyhow::{Context, Result};
use std::io::Write;

use crate::config::AppConfig;
use crate::models::{ProbeOutcome, ProbeStatus, RunSummary};

const RULE: &str = "============================================================";

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }

    /// Report format for a saved file, chosen by extension
    pub fn for_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        if lower.ends_with(".csv") {
            OutputFormat::Csv
        } else if lower.ends_with(".txt") || lower.ends_with(".log") {
            OutputFormat::Table
        } else {
            OutputFormat::JsonPretty
        }
    }

    /// Formats meant for other programs; stdout carries only the report
    pub fn is_machine_readable(&self) -> bool {
        matches!(
            self,
            OutputFormat::Json | OutputFormat::JsonPretty | OutputFormat::Csv
        )
    }
}

/// Result formatter
#[derive(Clone, Debug)]
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// Run banner naming the target
    pub fn format_banner(&self, config: &AppConfig) -> String {
        format!(
            "{RULE}\nTesting Azure OpenAI API via APIM Gateway\n{RULE}\nEndpoint: {}\nDeployment: {}\nProbes: {} (max {} concurrent)\n{RULE}",
            config.endpoint, config.deployment, config.requests, config.concurrency
        )
    }

    /// Full diagnostics for one probe: response details or the error
    pub fn format_outcome(&self, outcome: &ProbeOutcome) -> String {
        match outcome.status {
            ProbeStatus::Pass => {
                let mut output = self.paint("✓ Chat completion successful!", "32");
                output.push_str(&format!(
                    "\n\nModel: {}",
                    outcome.model.as_deref().unwrap_or("unknown")
                ));
                output.push_str(&format!(
                    "\n\nResponse:\n{}",
                    outcome.content.as_deref().unwrap_or("")
                ));
                if let Some(usage) = &outcome.usage {
                    output.push_str("\n\nUsage:");
                    output.push_str(&format!("\n  Prompt tokens: {}", usage.prompt_tokens));
                    output.push_str(&format!(
                        "\n  Completion tokens: {}",
                        usage.completion_tokens
                    ));
                    output.push_str(&format!("\n  Total tokens: {}", usage.total_tokens));
                }
                output
            }
            ProbeStatus::Fail => {
                let message = outcome
                    .failure
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                self.paint(&format!("✗ Error during chat completion: {message}"), "31")
            }
        }
    }

    /// One-line form of a probe outcome
    pub fn format_outcome_brief(&self, outcome: &ProbeOutcome) -> String {
        let line = outcome.to_string();
        match outcome.status {
            ProbeStatus::Pass => self.paint(&line, "32"),
            ProbeStatus::Fail => self.paint(&line, "31"),
        }
    }

    /// Completion notice for the probe with the given submission index
    pub fn format_progress(&self, index: usize, total: usize) -> String {
        format!("\n[Test {index}/{total}] Completed")
    }

    /// Format the end-of-run report
    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => {
                serde_json::to_string(summary).context("Failed to serialize summary")?
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(summary).context("Failed to serialize summary")?
            }
            OutputFormat::Csv => self.format_summary_csv(summary)?,
            OutputFormat::Summary => self.format_summary_brief(summary),
        })
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(RULE);
        output.push('\n');

        let tally = summary.tally();
        let tally = if summary.is_all_passed() {
            self.paint(&tally, "32")
        } else {
            self.paint(&tally, "31")
        };
        output.push_str(&tally);
        output.push('\n');

        if !summary.failures_by_kind.is_empty() {
            output.push_str("Failures by kind:\n");
            for (kind, count) in &summary.failures_by_kind {
                output.push_str(&format!("  {:20} {:>5}\n", kind.name(), count));
            }
        }

        output.push_str(&format!(
            "Pass Rate: {:.1}% | Duration: {}ms | Avg latency: {}ms | Tokens: {}\n",
            summary.pass_rate(),
            summary.duration_ms,
            summary.avg_success_ms(),
            summary.total_tokens
        ));
        output.push_str(RULE);

        output
    }

    fn format_summary_csv(&self, summary: &RunSummary) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "index",
            "status",
            "duration_ms",
            "model",
            "prompt_tokens",
            "completion_tokens",
            "total_tokens",
            "failure_kind",
            "message",
        ])?;

        for outcome in &summary.outcomes {
            let usage = outcome.usage.unwrap_or_default();
            writer.write_record([
                outcome.index.to_string(),
                outcome.status.to_string(),
                outcome.duration_ms.to_string(),
                outcome.model.clone().unwrap_or_default(),
                usage.prompt_tokens.to_string(),
                usage.completion_tokens.to_string(),
                usage.total_tokens.to_string(),
                outcome
                    .failure_kind()
                    .map(|k| k.name().to_string())
                    .unwrap_or_default(),
                outcome
                    .failure
                    .as_ref()
                    .map(|f| f.message.clone())
                    .unwrap_or_default(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
        String::from_utf8(bytes).context("CSV output was not UTF-8")
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{} @ {}: {}/{} passed ({:.1}%) in {}ms",
            summary.deployment,
            summary.endpoint,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write the run summary to a file
pub fn write_summary_to_file(path: &str, summary: &RunSummary, format: OutputFormat) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_summary(summary)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {path}"))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write output file: {path}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChatCompletionResponse, ChatMessage, Choice, FailureKind, ProbeFailure, Role, Usage,
    };
    use chrono::Utc;

    fn response() -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: None,
            model: "gpt-4o-mini".to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: Role::Assistant,
                    content: Some("API Management is a gateway.".to_string()),
                },
                finish_reason: None,
            }],
            usage: Usage {
                prompt_tokens: 30,
                completion_tokens: 8,
                total_tokens: 38,
            },
        }
    }

    fn summary() -> RunSummary {
        RunSummary::new(
            "https://gw.example.net",
            "gpt-4o-mini",
            Utc::now(),
            250,
            vec![
                ProbeOutcome::pass(2, 120, &response()),
                ProbeOutcome::fail(
                    1,
                    30,
                    ProbeFailure::new(FailureKind::RateLimited, "429, \"slow\""),
                ),
            ],
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
        assert!(OutputFormat::Csv.is_machine_readable());
        assert!(!OutputFormat::Summary.is_machine_readable());
    }

    #[test]
    fn test_output_format_for_path() {
        assert_eq!(OutputFormat::for_path("run.CSV"), OutputFormat::Csv);
        assert_eq!(OutputFormat::for_path("run.txt"), OutputFormat::Table);
        assert_eq!(OutputFormat::for_path("run.json"), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::for_path("run"), OutputFormat::JsonPretty);
    }

    #[test]
    fn test_format_success_outcome() {
        let formatter = ResultFormatter::default().no_color();
        let output = formatter.format_outcome(&ProbeOutcome::pass(1, 100, &response()));

        assert!(output.starts_with("✓ Chat completion successful!"));
        assert!(output.contains("Model: gpt-4o-mini"));
        assert!(output.contains("API Management is a gateway."));
        assert!(output.contains("Prompt tokens: 30"));
        assert!(output.contains("Total tokens: 38"));
    }

    #[test]
    fn test_format_failed_outcome() {
        let formatter = ResultFormatter::default().no_color();
        let outcome = ProbeOutcome::fail(
            4,
            10,
            ProbeFailure::new(FailureKind::Transport, "connection refused"),
        );

        assert_eq!(
            formatter.format_outcome(&outcome),
            "✗ Error during chat completion: [transport] connection refused"
        );
    }

    #[test]
    fn test_format_progress() {
        let formatter = ResultFormatter::default();
        assert_eq!(formatter.format_progress(7, 100), "\n[Test 7/100] Completed");
    }

    #[test]
    fn test_summary_table() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let output = formatter.format_summary(&summary()).unwrap();

        assert!(output.contains("Results: 1/2 tests passed"));
        assert!(output.contains("rate-limited"));
    }

    #[test]
    fn test_summary_json() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let output = formatter.format_summary(&summary()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["passed"], 1);
        assert_eq!(value["total"], 2);
        assert_eq!(value["failures_by_kind"]["rate_limited"], 1);
        assert_eq!(value["outcomes"][0]["index"], 2);
    }

    #[test]
    fn test_summary_csv_escapes_messages() {
        let formatter = ResultFormatter::new(OutputFormat::Csv);
        let output = formatter.format_summary(&summary()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("index,status,duration_ms"));
        assert!(lines[1].starts_with("2,PASS,120,gpt-4o-mini,30,8,38"));
        assert!(lines[2].ends_with("rate-limited,\"429, \"\"slow\"\"\""));
    }

    #[test]
    fn test_write_summary_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let path = path.to_str().unwrap();

        write_summary_to_file(path, &summary(), OutputFormat::JsonPretty).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\"deployment\": \"gpt-4o-mini\""));
    }
}
