use crate::{ChatMessage, ChatPhase, ConnectionStatus, JobState, JobStatus};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobView {
    pub job_id: Option<String>,
    pub job_status: Option<JobStatus>,
    pub state: Option<JobState>,
    pub connection: ConnectionStatus,
    pub error: Option<String>,
    pub loading: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatView {
    pub chat_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub phase: ChatPhase,
    /// Reply text received so far for the current turn.
    pub streaming_text: String,
    pub error: Option<String>,
    pub loading: bool,
    pub dirty: bool,
}

impl ChatView {
    pub fn is_busy(&self) -> bool {
        self.phase != ChatPhase::Idle
    }
}
