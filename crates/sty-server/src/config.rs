use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("REPLICATE_API_TOKEN is not set")]
    MissingToken,
    #[error("{name} must be a number, got '{value}'")]
    NotANumber { name: &'static str, value: String },
    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

/// Timing of the status-polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub interval_step: Duration,
    pub max_interval: Duration,
    /// Wall-clock polling budget
    pub budget: Duration,
    pub max_ticks: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            interval_step: Duration::from_millis(200),
            max_interval: Duration::from_millis(3000),
            budget: Duration::from_secs(180),
            max_ticks: 180,
        }
    }
}

/// Process-wide settings, read once at startup and never mutated
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub api_token: String,
    pub api_base: String,
    /// Per-attempt timeout of every outbound call
    pub request_timeout: Duration,
    pub poll: PollConfig,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("api_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .field("poll", &self.poll)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServerConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            api_token: api_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            poll: PollConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Read the environment, after loading `.env` if one exists
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let api_token = env::var("REPLICATE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let defaults = Self::new(api_token);
        let poll_defaults = defaults.poll;

        Ok(Self {
            port: var_or("PORT", defaults.port)?,
            api_base: env::var("REPLICATE_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            request_timeout: Duration::from_secs(var_or(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            poll: PollConfig {
                initial_interval: millis_or("POLL_INITIAL_MS", poll_defaults.initial_interval)?,
                interval_step: millis_or("POLL_STEP_MS", poll_defaults.interval_step)?,
                max_interval: millis_or("POLL_MAX_MS", poll_defaults.max_interval)?,
                budget: Duration::from_secs(var_or(
                    "POLL_BUDGET_SECS",
                    poll_defaults.budget.as_secs(),
                )?),
                max_ticks: poll_defaults.max_ticks,
            },
            max_upload_bytes: var_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            api_token: defaults.api_token,
        })
    }
}

fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotANumber { name, value }),
        Err(_) => Ok(default),
    }
}

fn millis_or(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = var_or(name, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.initial_interval, Duration::from_millis(500));
        assert_eq!(poll.interval_step, Duration::from_millis(200));
        assert_eq!(poll.max_interval, Duration::from_millis(3000));
        assert_eq!(poll.budget, Duration::from_secs(180));
    }

    #[test]
    fn test_request_timeout_shorter_than_budget() {
        let config = ServerConfig::new("token");
        assert!(config.request_timeout < config.poll.budget);
        assert_eq!(config.port, 5000);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ServerConfig::new("r8_secret_value");
        let printed = format!("{config:?}");
        assert!(!printed.contains("r8_secret_value"), "{printed}");
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("api_base"));
    }

    #[test]
    fn test_var_or_falls_back_when_unset() {
        let port: u16 = var_or("STY_SERVER_TEST_UNSET_PORT", 1234).unwrap();
        assert_eq!(port, 1234);
    }
}
