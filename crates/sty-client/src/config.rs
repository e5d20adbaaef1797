use std::env;
use std::time::Duration;
use sty_core::{RetryPolicy, StyleModel};

pub const DEFAULT_BASE_ENDPOINT: &str = "https://ai-style-service.onrender.com/";

/// AI processing is slow. One request outlasts the service's 180 s polling
/// budget plus its submit and fetch calls, so the service's own timeout answer
/// arrives before this one fires.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    base_endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_ENDPOINT)
    }
}

impl ClientConfig {
    pub fn new(base_endpoint: impl Into<String>) -> Self {
        Self {
            base_endpoint: normalize(base_endpoint.into()),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Defaults, with `STYLE_SERVICE_URL` overriding the base endpoint
    pub fn from_env() -> Self {
        match env::var("STYLE_SERVICE_URL") {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Always ends with `/`
    pub fn base_endpoint(&self) -> &str {
        &self.base_endpoint
    }

    pub fn endpoint(&self, model: StyleModel) -> String {
        format!("{}{}", self.base_endpoint, model.route())
    }
}

fn normalize(mut base: String) -> String {
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}
