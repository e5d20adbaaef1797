use serde::{Deserialize, Serialize};

/// Prediction status as reported by the remote API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Where a single request's job stands on our side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted | Self::Processing)
    }

    /// State after observing `status`; terminal states never change
    pub fn advance(self, status: JobStatus) -> Self {
        if self.is_terminal() {
            return self;
        }
        match status {
            JobStatus::Succeeded => Self::Succeeded,
            JobStatus::Failed => Self::Failed,
            JobStatus::Canceled => Self::Canceled,
            JobStatus::Starting | JobStatus::Processing | JobStatus::Unknown => Self::Processing,
        }
    }

    pub fn time_out(self) -> Self {
        if self.is_terminal() { self } else { Self::TimedOut }
    }
}

/// Locator of a submitted remote job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: Option<String>,
    pub status_url: String,
}

/// Result payload of a succeeded job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputReference {
    Url(String),
    /// Degenerate responses that inline the bytes as a data URI
    Inline(Vec<u8>),
}

/// One observation of a job's status
#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate {
    pub status: JobStatus,
    pub output: Option<OutputReference>,
    pub error: Option<String>,
    /// Last non-blank progress log line, for logging only
    pub last_log_line: Option<String>,
}

impl PollUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            output: None,
            error: None,
            last_log_line: None,
        }
    }
}
