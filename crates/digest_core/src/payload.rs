//! Wire shapes exchanged with the digest server and their decoding.
//!
//! Everything here is plain serde data. Decoding helpers return
//! [`PayloadError`] so reducers can log and drop malformed input without
//! touching connection state.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed {what} payload: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn decode<T: for<'de> Deserialize<'de>>(what: &'static str, raw: &str) -> Result<T, PayloadError> {
    serde_json::from_str(raw).map_err(|source| PayloadError::Malformed { what, source })
}

/// Fine-grained processing stage reported by the job stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Starting,
    Preparing,
    Downloading,
    Downloaded,
    Transcribing,
    Transcribed,
    Summarizing,
    Summarized,
    Success,
    Error,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Starting => "starting",
            JobPhase::Preparing => "preparing",
            JobPhase::Downloading => "downloading",
            JobPhase::Downloaded => "downloaded",
            JobPhase::Transcribing => "transcribing",
            JobPhase::Transcribed => "transcribed",
            JobPhase::Summarizing => "summarizing",
            JobPhase::Summarized => "summarized",
            JobPhase::Success => "success",
            JobPhase::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Success | JobPhase::Error)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse job status resolved once before streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Partially known video metadata. Every field is optional so that deltas
/// can be merged into what is already known.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_filepath: Option<String>,
    /// Fields this client does not model, kept so merges stay lossless.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl VideoMetadata {
    /// Shallow merge: fields present in `patch` overwrite, absent ones are kept.
    pub fn merge(&mut self, patch: VideoMetadata) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.video_id, patch.video_id);
        take(&mut self.title, patch.title);
        take(&mut self.status, patch.status);
        take(&mut self.duration, patch.duration);
        take(&mut self.uploader, patch.uploader);
        take(&mut self.upload_date, patch.upload_date);
        take(&mut self.thumbnail_url, patch.thumbnail_url);
        take(&mut self.webpage_url, patch.webpage_url);
        take(&mut self.transcript_filepath, patch.transcript_filepath);
        self.extra.extend(patch.extra);
    }
}

/// Full job state as sent on the first message of a job subscription and
/// embedded in status responses.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct JobStateSnapshot {
    #[serde(default)]
    pub status: Option<JobPhase>,
    #[serde(default)]
    pub download_progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_transcript")]
    pub transcript_buffer: Vec<TranscriptSegment>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary_buffer: String,
    #[serde(default)]
    pub video: Option<VideoMetadata>,
}

// Older servers initialise the transcript buffer as an empty string.
fn lenient_transcript<'de, D>(deserializer: D) -> Result<Vec<TranscriptSegment>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Segments(Vec<TranscriptSegment>),
        Legacy(#[allow(dead_code)] String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Segments(segments)) => segments,
        Some(Raw::Legacy(_)) | None => Vec::new(),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of `GET /jobs/{id}/status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub state: Option<JobStateSnapshot>,
    #[serde(default)]
    pub video: Option<VideoMetadata>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub status: JobPhase,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadProgress {
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SummaryChunk {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
}

/// Delta carried by a named `update` event on the job stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobEvent {
    StatusUpdate(StatusUpdate),
    DownloadProgress(DownloadProgress),
    TranscriptSegment(TranscriptSegment),
    SummaryChunk(SummaryChunk),
    VideoMetadata(VideoMetadata),
    Error(ErrorPayload),
}

pub fn decode_job_snapshot(raw: &str) -> Result<JobStateSnapshot, PayloadError> {
    decode("job snapshot", raw)
}

pub fn decode_job_event(raw: &str) -> Result<JobEvent, PayloadError> {
    decode("job update", raw)
}

pub fn decode_job_status(raw: &str) -> Result<JobStatusResponse, PayloadError> {
    decode("job status", raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Untagged chat stream message: the server's current reply text. Other
/// fields the server sends alongside it are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatSnapshot {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AskResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

pub fn decode_chat_snapshot(raw: &str) -> Result<ChatSnapshot, PayloadError> {
    decode("chat snapshot", raw)
}

pub fn decode_stream_error(raw: &str) -> Result<ErrorPayload, PayloadError> {
    decode("stream error", raw)
}

/// Decodes a `token` event. Tokens are JSON strings; anything else is kept
/// verbatim so no text is lost.
pub fn decode_token(raw: &str) -> Result<String, PayloadError> {
    decode("token", raw)
}

/// Entry of the `GET /jobs` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideosResponse {
    pub videos: Vec<Video>,
}

/// Case-insensitive match on title, uploader, or video id. A blank query
/// keeps every video.
pub fn filter_videos<'a>(videos: &'a [Video], query: &str) -> Vec<&'a Video> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return videos.iter().collect();
    }
    videos
        .iter()
        .filter(|video| {
            video.title.to_lowercase().contains(&query)
                || video
                    .uploader
                    .as_deref()
                    .is_some_and(|uploader| uploader.to_lowercase().contains(&query))
                || video.video_id.to_lowercase().contains(&query)
        })
        .collect()
}
