//! Transport retry policy shared by the service's outbound calls and the
//! client library's inbound call.
//!
//! A failure that carries an HTTP status is classified by that status alone:
//! only `503 Service Unavailable` is worth another attempt. A failure without
//! a status never reached the server, and is retried when its text looks like
//! a connectivity problem.

use std::fmt;
use std::future::Future;
use tracing::warn;

/// 1 initial attempt + 2 retries
pub const MAX_ATTEMPTS: u32 = 3;

/// Substrings that mark a failure as transient connectivity trouble
pub const CONNECTIVITY_MARKERS: [&str; 5] = ["timeout", "connection", "network", "host", "dns"];

const BODY_SNIPPET_CHARS: usize = 512;

/// What went wrong on one network round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub status: Option<u16>,
    pub message: String,
    pub body: Option<String>,
}

impl TransportFailure {
    /// The request never produced a response
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// The server answered with a non-success status.
    ///
    /// The body is kept whole so callers can still parse it; `Display` shortens it.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status: Some(status),
            message: format!("HTTP {status}"),
            body: (!body.trim().is_empty()).then_some(body),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(body) = &self.body {
            write!(f, ": {}", snippet(body))?;
        }
        Ok(())
    }
}

#[cfg(feature = "reqwest")]
impl From<&reqwest::Error> for TransportFailure {
    fn from(err: &reqwest::Error) -> Self {
        use std::error::Error as _;

        // reqwest's top-level message is generic; the useful part sits in the source chain.
        let mut message = String::new();
        if err.is_timeout() {
            message.push_str("timeout: ");
        } else if err.is_connect() {
            message.push_str("connection failed: ");
        }
        message.push_str(&err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            status: err.status().map(|s| s.as_u16()),
            message,
            body: None,
        }
    }
}

/// Truncate a response body to something fit for a log line or error message
pub fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Errors that may wrap a transport failure
pub trait AsTransportFailure {
    /// `None` for failures the retry policy never retries (protocol, decode, ...)
    fn transport_failure(&self) -> Option<&TransportFailure>;
}

impl AsTransportFailure for TransportFailure {
    fn transport_failure(&self) -> Option<&TransportFailure> {
        Some(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Policy that gives up after the first failure
    pub fn never() -> Self {
        Self::new(1)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn classify(&self, failure: &TransportFailure) -> RetryDecision {
        match failure.status {
            Some(503) => RetryDecision::Retry,
            Some(_) => RetryDecision::Fatal,
            None => {
                let text = failure.message.to_ascii_lowercase();
                if CONNECTIVITY_MARKERS.iter().any(|m| text.contains(m)) {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Fatal
                }
            }
        }
    }

    /// Run `attempt` until it succeeds, fails fatally, or attempts run out.
    ///
    /// Attempts are strictly sequential; every attempt rebuilds and re-sends
    /// the whole request. The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsTransportFailure + fmt::Display,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retry = attempts < self.max_attempts
                && err
                    .transport_failure()
                    .is_some_and(|f| self.classify(f) == RetryDecision::Retry);
            if !retry {
                return Err(err);
            }

            warn!(
                operation,
                attempt = attempts,
                max_attempts = self.max_attempts,
                "request failed: {err}. Retrying..."
            );
        }
    }
}
