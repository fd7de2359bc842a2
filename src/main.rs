//! apim-smoke - LLM Gateway Smoke Test Tool
//!
//! Sends a batch of chat-completion requests through an API-management
//! gateway fronting an Azure OpenAI deployment, with a fixed number in flight
//! at once, and reports how many succeeded.
//!
//! ## Features
//!
//! - Bounded parallel probes (100 requests, 10 concurrent by default)
//! - Bearer tokens from a static token, a service principal, or the Azure CLI
//! - Failures classified as authentication, rate limiting, transport,
//!   malformed response or gateway errors
//! - Multiple output formats (Table, JSON, CSV, Summary)
//! - Exit status 0 only when every probe passed
//!
//! ## Usage
//!
//! ```bash
//! # Probe the gateway named by $APIM_ENDPOINT
//! apim-smoke run
//!
//! # Smaller run with one line per probe
//! apim-smoke run -n 20 -c 5 --quiet
//!
//! # Machine-readable report saved to disk
//! apim-smoke run --format json --output run.json
//!
//! # Show the effective configuration
//! apim-smoke config show
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

mod auth;
mod cli;
mod config;
mod executor;
mod http;
mod models;
mod output;
mod probe;
mod utils;

use auth::{CachedTokenProvider, DefaultCredential, TokenProvider};
use cli::{Args, ConfigAction, RunArgs};
use config::{AppConfig, EnvConfig};
use executor::ParallelExecutor;
use http::GatewayClient;
use output::{OutputFormat, ResultFormatter};
use probe::{ChatProbe, Echo};
use utils::logger::{init_logger, LogLevel};

/// Exit status for setup errors raised before any probe runs
const SETUP_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = match args.log_level.as_deref().map(str::parse::<LogLevel>) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            return ExitCode::from(SETUP_FAILURE);
        }
        None => LogLevel::for_verbosity(args.verbose || env.verbose.unwrap_or(false)),
    };
    init_logger(level);

    let result = match args.command {
        cli::Command::Run(run_args) => run_probes(run_args, &env).await,
        cli::Command::Config(config_args) => {
            manage_config(config_args.action, &env).map(|_| ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(SETUP_FAILURE)
        }
    }
}

async fn run_probes(args: RunArgs, env: &EnvConfig) -> Result<ExitCode> {
    let config = resolve_run_config(&args, env)?;

    let format = match args.format.as_deref().or(env.format.as_deref()) {
        Some(name) => OutputFormat::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown output format: {name}"))?,
        None => OutputFormat::Table,
    };
    let mut formatter = ResultFormatter::new(format);
    if !std::io::stdout().is_terminal() {
        formatter = formatter.no_color();
    }
    let machine = formatter.format().is_machine_readable();

    if !machine {
        println!("{}", formatter.format_banner(&config));
    }

    let credential = DefaultCredential::from_env(Duration::from_secs(config.timeout_secs));
    debug!(
        "Credential sources: {}",
        credential.source_names().join(", ")
    );
    let credential: Arc<dyn TokenProvider> = Arc::new(CachedTokenProvider::new(credential));

    let client = GatewayClient::new(&config)?;
    info!("Probing {}", client.url());

    let echo = if machine {
        Echo::Silent
    } else if args.quiet {
        Echo::Brief
    } else {
        Echo::Full
    };

    let probe = Arc::new(
        ChatProbe::new(&config, client, credential)
            .with_echo(echo)
            .with_formatter(formatter.clone()),
    );

    let executor = ParallelExecutor::new(config.concurrency)
        .with_progress(!machine)
        .with_formatter(formatter.clone());

    let summary = executor.run_all(probe, &config).await;

    println!("{}", formatter.format_summary(&summary)?);

    if let Some(path) = &args.output {
        output::write_summary_to_file(path, &summary, OutputFormat::for_path(path))?;
        info!("Results saved to {}", path);
    }

    Ok(ExitCode::from(summary.exit_code()))
}

/// Layer defaults, config file, environment and flags
fn resolve_run_config(args: &RunArgs, env: &EnvConfig) -> Result<AppConfig> {
    let explicit = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let (mut config, loaded_from) = config::resolve_config(explicit.as_deref())?;
    if let Some(path) = loaded_from {
        info!("Loaded configuration from {}", path.display());
    }

    env.apply(&mut config);

    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(deployment) = &args.deployment {
        config.deployment = deployment.clone();
    }
    if let Some(api_version) = &args.api_version {
        config.api_version = api_version.clone();
    }
    if let Some(requests) = args.requests {
        config.requests = requests;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(temperature) = args.temperature {
        config.prompt.temperature = temperature;
    }
    if let Some(scope) = &args.scope {
        config.scope = scope.clone();
    }

    config.validate()?;
    Ok(config)
}

fn manage_config(action: ConfigAction, env: &EnvConfig) -> Result<()> {
    match action {
        ConfigAction::Show { config } => {
            let explicit = config.or_else(|| env.config_file.as_ref().map(PathBuf::from));
            let (mut resolved, loaded_from) = config::resolve_config(explicit.as_deref())?;
            env.apply(&mut resolved);

            match loaded_from {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No config file found; using defaults"),
            }
            if env.has_any() {
                println!("# Environment overrides applied");
            }
            print!(
                "{}",
                serde_yaml::to_string(&resolved).context("Failed to serialize config")?
            );
        }
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default().save(&path)?;
            println!("Wrote example configuration to {}", path.display());
        }
        ConfigAction::Env => {
            config::print_env_help();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_file_and_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smoke.yaml");
        std::fs::write(
            &path,
            "endpoint: https://file.example.net\nrequests: 50\nconcurrency: 5\n",
        )
        .unwrap();

        let env = EnvConfig {
            requests: Some(40),
            concurrency: Some(8),
            ..Default::default()
        };
        let args = RunArgs {
            config: Some(path),
            concurrency: Some(2),
            temperature: Some(0.1),
            ..Default::default()
        };

        let config = resolve_run_config(&args, &env).unwrap();
        assert_eq!(config.endpoint, "https://file.example.net");
        assert_eq!(config.requests, 40);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.prompt.temperature, 0.1);
    }

    #[test]
    fn test_invalid_flags_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smoke.yaml");
        std::fs::write(&path, "requests: 1\n").unwrap();

        let args = RunArgs {
            config: Some(path),
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(resolve_run_config(&args, &EnvConfig::default()).is_err());
    }

    #[test]
    fn test_flag_fixes_invalid_file_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smoke.yaml");
        std::fs::write(&path, "concurrency: 0\n").unwrap();

        let args = RunArgs {
            config: Some(path),
            concurrency: Some(4),
            ..Default::default()
        };
        let config = resolve_run_config(&args, &EnvConfig::default()).unwrap();
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("apim-smoke.yaml");

        let init = |force| ConfigAction::Init {
            path: path.clone(),
            force,
        };

        manage_config(init(false), &EnvConfig::default()).unwrap();
        assert!(manage_config(init(false), &EnvConfig::default()).is_err());
        manage_config(init(true), &EnvConfig::default()).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }
}
