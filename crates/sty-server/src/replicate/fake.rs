use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::Instant;
use crate::error::StyleError;
use crate::job::{JobHandle, JobStatus, OutputReference, PollUpdate};
use crate::replicate::{PredictionApi, PredictionRequest};

pub fn succeeded_with(output: OutputReference) -> PollUpdate {
    let mut update = PollUpdate::new(JobStatus::Succeeded);
    update.output = Some(output);
    update
}

/// Scripted in-memory prediction API
pub struct FakeApi {
    created: Instant,
    submit_error: Option<StyleError>,
    poll_error: Option<StyleError>,
    updates: Mutex<VecDeque<PollUpdate>>,
    repeat: Option<PollUpdate>,
    output_bytes: Vec<u8>,
    submitted: Mutex<Vec<PredictionRequest>>,
    polls: Mutex<Vec<Duration>>,
    fetches: Mutex<u32>,
}

impl FakeApi {
    fn base() -> Self {
        Self {
            created: Instant::now(),
            submit_error: None,
            poll_error: None,
            updates: Mutex::new(VecDeque::new()),
            repeat: None,
            output_bytes: Vec::new(),
            submitted: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn with_updates(updates: Vec<PollUpdate>) -> Self {
        Self {
            updates: Mutex::new(updates.into()),
            ..Self::base()
        }
    }

    pub fn always(update: PollUpdate) -> Self {
        Self {
            repeat: Some(update),
            ..Self::base()
        }
    }

    pub fn with_poll_error(err: StyleError) -> Self {
        Self {
            poll_error: Some(err),
            ..Self::base()
        }
    }

    pub fn with_submit_error(err: StyleError) -> Self {
        Self {
            submit_error: Some(err),
            ..Self::base()
        }
    }

    pub fn output_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.output_bytes = bytes;
        self
    }

    pub fn submitted(&self) -> Vec<PredictionRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    /// Time of each poll, relative to construction
    pub fn poll_offsets(&self) -> Vec<Duration> {
        self.polls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl PredictionApi for FakeApi {
    async fn submit(&self, request: &PredictionRequest) -> Result<JobHandle, StyleError> {
        self.submitted.lock().unwrap().push(request.clone());
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        Ok(JobHandle {
            id: Some("fake".into()),
            status_url: "https://api.test/predictions/fake".into(),
        })
    }

    async fn poll(&self, _handle: &JobHandle) -> Result<PollUpdate, StyleError> {
        self.polls.lock().unwrap().push(self.created.elapsed());
        if let Some(err) = &self.poll_error {
            return Err(err.clone());
        }
        let next = self.updates.lock().unwrap().pop_front();
        Ok(next
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| PollUpdate::new(JobStatus::Processing)))
    }

    async fn fetch_output(&self, output: &OutputReference) -> Result<Vec<u8>, StyleError> {
        *self.fetches.lock().unwrap() += 1;
        match output {
            OutputReference::Inline(bytes) => Ok(bytes.clone()),
            OutputReference::Url(_) => Ok(self.output_bytes.clone()),
        }
    }
}
