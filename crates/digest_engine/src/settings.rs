use std::time::Duration;

use url::Url;

use crate::{ApiError, BackoffPolicy, FailureKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Root of the server API; endpoint paths are appended to it.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to one-shot requests only, never to streams.
    pub request_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub poll_interval: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8008/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            poll_interval: Duration::from_millis(2000),
        }
    }
}

impl ClientSettings {
    /// Builds `{base_url}/{segments...}`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::new(FailureKind::InvalidUrl, "base url cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn job_status_url(&self, job_id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["jobs", job_id, "status"])
    }

    pub fn job_stream_url(&self, job_id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["jobs", job_id, "subscribe"])
    }

    pub fn jobs_url(&self) -> Result<Url, ApiError> {
        self.endpoint(&["jobs"])
    }

    pub fn chat_url(&self, chat_id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["chat", chat_id])
    }

    pub fn chat_ask_url(&self, chat_id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["chat", chat_id, "ask"])
    }

    pub fn chat_stream_url(&self, chat_id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["chat", chat_id, "subscribe"])
    }
}
