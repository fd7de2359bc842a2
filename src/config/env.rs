//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "APIM_SMOKE";

/// Unprefixed endpoint variable
const ENDPOINT_VAR: &str = "APIM_ENDPOINT";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Gateway endpoint from APIM_ENDPOINT
    pub endpoint: Option<String>,
    /// Deployment from APIM_SMOKE_DEPLOYMENT
    pub deployment: Option<String>,
    /// API version from APIM_SMOKE_API_VERSION
    pub api_version: Option<String>,
    /// Probe count from APIM_SMOKE_REQUESTS
    pub requests: Option<usize>,
    /// Concurrency limit from APIM_SMOKE_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Timeout from APIM_SMOKE_TIMEOUT
    pub timeout: Option<u64>,
    /// Config file from APIM_SMOKE_CONFIG
    pub config_file: Option<String>,
    /// Output format from APIM_SMOKE_FORMAT
    pub format: Option<String>,
    /// Verbose from APIM_SMOKE_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            endpoint: env::var(ENDPOINT_VAR).ok().filter(|v| !v.is_empty()),
            deployment: get_env("DEPLOYMENT"),
            api_version: get_env("API_VERSION"),
            requests: get_env_parse("REQUESTS"),
            concurrency: get_env_parse("CONCURRENCY"),
            timeout: get_env_parse("TIMEOUT"),
            config_file: get_env("CONFIG"),
            format: get_env("FORMAT"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.endpoint.is_some()
            || self.deployment.is_some()
            || self.api_version.is_some()
            || self.requests.is_some()
            || self.concurrency.is_some()
            || self.timeout.is_some()
            || self.config_file.is_some()
            || self.format.is_some()
            || self.verbose.is_some()
    }

    /// Overlay the variables that are set onto a configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(deployment) = &self.deployment {
            config.deployment = deployment.clone();
        }
        if let Some(api_version) = &self.api_version {
            config.api_version = api_version.clone();
        }
        if let Some(requests) = self.requests {
            config.requests = requests;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.vars.push((ENDPOINT_VAR.to_string(), endpoint.into()));
        self
    }

    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_DEPLOYMENT"), deployment.into()));
        self
    }

    pub fn requests(mut self, requests: usize) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_REQUESTS"), requests.to_string()));
        self
    }

    pub fn concurrency(mut self, concurrency: impl Into<String>) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_CONCURRENCY"), concurrency.into()));
        self
    }

    pub fn verbose(mut self, verbose: impl Into<String>) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_VERBOSE"), verbose.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all supported environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENDPOINT_VAR}                 Gateway endpoint URL");
    println!("  {ENV_PREFIX}_DEPLOYMENT      Deployment (model) name");
    println!("  {ENV_PREFIX}_API_VERSION     API version query parameter");
    println!("  {ENV_PREFIX}_REQUESTS        Number of probes to run");
    println!("  {ENV_PREFIX}_CONCURRENCY     Maximum probes in flight");
    println!("  {ENV_PREFIX}_TIMEOUT         Request timeout in seconds");
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_FORMAT          Output format (table, json, csv, summary)");
    println!("  {ENV_PREFIX}_VERBOSE         Enable verbose output (true/false)");
    println!();
    println!("Credentials (tried in order):");
    println!();
    println!("  {ENV_PREFIX}_TOKEN           Pre-issued bearer token");
    println!("  AZURE_TENANT_ID             Service principal tenant");
    println!("  AZURE_CLIENT_ID             Service principal client id");
    println!("  AZURE_CLIENT_SECRET         Service principal secret");
    println!("  AZURE_AUTHORITY_HOST        Identity provider host (default login.microsoftonline.com)");
    println!("  (fallback)                  `az account get-access-token`");
    println!();
    println!("Example:");
    println!("  export {ENDPOINT_VAR}=https://my-apim.azure-api.net");
    println!("  apim-smoke run --requests 20 --concurrency 5");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.endpoint.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvBuilder::new()
            .endpoint("https://gw.example.net")
            .deployment("gpt-4o")
            .requests(25)
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.endpoint.as_deref(), Some("https://gw.example.net"));
        assert_eq!(config.deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.requests, Some(25));
        assert!(config.has_any());
    }

    #[test]
    fn test_unparseable_values_are_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvBuilder::new()
            .concurrency("ten")
            .verbose("YES")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.concurrency, None);
        assert_eq!(config.verbose, Some(true));
    }

    #[test]
    fn test_apply_overrides_only_set_values() {
        let env = EnvConfig {
            endpoint: Some("https://other.example.net".to_string()),
            concurrency: Some(4),
            ..Default::default()
        };

        let mut config = AppConfig::default();
        env.apply(&mut config);

        assert_eq!(config.endpoint, "https://other.example.net");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.requests, 100);
        assert_eq!(config.deployment, super::super::DEFAULT_DEPLOYMENT);
    }
}
