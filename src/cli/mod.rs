//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel chat-completion smoke tests for an LLM gateway
#[derive(Parser, Debug)]
#[command(name = "apim-smoke")]
#[command(version)]
#[command(about = "Smoke-test an Azure OpenAI deployment behind an API gateway")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send parallel chat-completion probes and report pass/fail counts
    Run(RunArgs),

    /// Inspect or create configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Gateway endpoint URL (defaults to $APIM_ENDPOINT)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Deployment (model) name
    #[arg(short, long)]
    pub deployment: Option<String>,

    /// API version query parameter
    #[arg(long)]
    pub api_version: Option<String>,

    /// Number of probes to send
    #[arg(short = 'n', long)]
    pub requests: Option<usize>,

    /// Maximum probes in flight
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Token scope requested from the identity provider
    #[arg(long)]
    pub scope: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save the run summary to file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Print one line per probe instead of full responses
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show {
        /// Configuration file (YAML or JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "apim-smoke.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List supported environment variables
    Env,
}
