use crate::payload::{JobEvent, JobPhase, JobStateSnapshot, TranscriptSegment, VideoMetadata};
use crate::stream::IdSeq;
use crate::{ConnectionStatus, JobStatus, JobView, RequestId, SubscriptionId};

pub(crate) const PROCESSING_ERROR: &str = "Processing error occurred";
pub(crate) const RECONNECT_EXHAUSTED: &str =
    "Failed to connect to real-time updates after multiple attempts";

/// Reconciled progress of one job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobState {
    pub status: JobPhase,
    pub download_progress: Option<f64>,
    pub transcript_buffer: Vec<TranscriptSegment>,
    pub summary_buffer: String,
    pub video: Option<VideoMetadata>,
}

impl JobState {
    pub fn from_snapshot(snapshot: JobStateSnapshot, fallback_status: JobPhase) -> Self {
        Self {
            status: snapshot.status.unwrap_or(fallback_status),
            download_progress: snapshot.download_progress,
            transcript_buffer: snapshot.transcript_buffer,
            summary_buffer: snapshot.summary_buffer,
            video: snapshot.video,
        }
    }

    pub(crate) fn merge_video(&mut self, patch: VideoMetadata) {
        match self.video.as_mut() {
            Some(video) => video.merge(patch),
            None => self.video = Some(patch),
        }
    }
}

/// Outcome of applying one job delta, for the caller to fold into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Applied {
    State,
    Succeeded,
    Failed(String),
}

impl JobState {
    pub(crate) fn apply(&mut self, event: JobEvent) -> Applied {
        match event {
            JobEvent::StatusUpdate(update) => {
                self.status = update.status;
                if update.status == JobPhase::Success {
                    return Applied::Succeeded;
                }
            }
            JobEvent::DownloadProgress(progress) => {
                self.download_progress = Some(progress.progress.clamp(0.0, 100.0));
            }
            JobEvent::TranscriptSegment(segment) => self.transcript_buffer.push(segment),
            JobEvent::SummaryChunk(chunk) => self.summary_buffer.push_str(&chunk.content),
            JobEvent::VideoMetadata(patch) => self.merge_video(patch),
            JobEvent::Error(payload) => {
                return Applied::Failed(
                    payload
                        .error
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or_else(|| PROCESSING_ERROR.to_string()),
                );
            }
        }
        Applied::State
    }
}

/// Everything the job view knows: coarse status, reconciled state, and the
/// health of the live subscription.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobSession {
    job_id: Option<String>,
    job_status: Option<JobStatus>,
    state: Option<JobState>,
    connection: ConnectionStatus,
    error: Option<String>,
    loading: bool,
    pending_fetch: Option<RequestId>,
    subscription: Option<SubscriptionId>,
    ids: IdSeq,
    dirty: bool,
}

impl JobSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.job_id.clone(),
            job_status: self.job_status,
            state: self.state.clone(),
            connection: self.connection,
            error: self.error.clone(),
            loading: self.loading,
            dirty: self.dirty,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn state(&self) -> Option<&JobState> {
        self.state.as_ref()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// True once nothing more will arrive without user action.
    pub fn is_settled(&self) -> bool {
        !self.loading
            && self.pending_fetch.is_none()
            && self.subscription.is_none()
            && self.job_id.is_some()
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drops everything tied to the current subject and returns the
    /// subscription that must be closed, if any.
    pub(crate) fn reset_subject(&mut self, job_id: Option<String>) -> Option<SubscriptionId> {
        let previous = self.subscription.take();
        self.job_id = job_id;
        self.job_status = None;
        self.state = None;
        self.connection = ConnectionStatus::Disconnected;
        self.error = None;
        self.loading = false;
        self.pending_fetch = None;
        self.mark_dirty();
        previous
    }

    pub(crate) fn begin_fetch(&mut self) -> RequestId {
        let request = self.ids.request();
        self.pending_fetch = Some(request);
        self.loading = true;
        self.mark_dirty();
        request
    }

    pub(crate) fn finish_fetch(&mut self, request: RequestId) -> bool {
        if self.pending_fetch != Some(request) {
            return false;
        }
        self.pending_fetch = None;
        self.loading = false;
        self.mark_dirty();
        true
    }

    pub(crate) fn begin_subscription(&mut self) -> SubscriptionId {
        let subscription = self.ids.subscription();
        self.subscription = Some(subscription);
        self.connection = ConnectionStatus::Connecting;
        self.mark_dirty();
        subscription
    }

    pub(crate) fn end_subscription(&mut self, connection: ConnectionStatus) {
        self.subscription = None;
        self.set_connection(connection);
    }

    pub(crate) fn is_live(&self, subscription: SubscriptionId) -> bool {
        self.subscription == Some(subscription)
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionStatus) {
        if self.connection != connection {
            self.connection = connection;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_job_status(&mut self, status: JobStatus) {
        if self.job_status != Some(status) {
            self.job_status = Some(status);
            self.mark_dirty();
        }
    }

    pub(crate) fn job_status(&self) -> Option<JobStatus> {
        self.job_status
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        if self.error != error {
            self.error = error;
            self.mark_dirty();
        }
    }

    pub(crate) fn replace_state(&mut self, state: JobState) {
        self.state = Some(state);
        self.mark_dirty();
    }

    pub(crate) fn state_mut(&mut self) -> &mut JobState {
        self.dirty = true;
        self.state.get_or_insert_with(JobState::default)
    }
}
