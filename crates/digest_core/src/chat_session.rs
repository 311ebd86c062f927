use crate::stream::IdSeq;
use crate::{ChatMessage, ChatView, RequestId, SubscriptionId};

pub(crate) const STREAM_ERROR: &str = "An error occurred during streaming";
pub(crate) const CONNECTION_FAILED: &str = "Connection to chat stream failed";
pub(crate) const CLOSED_EARLY: &str = "Chat stream closed before the response completed";

/// Where the current question/answer turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    /// Question submitted, stream not confirmed open yet.
    Thinking,
    /// Tokens are arriving.
    Streaming,
}

/// One chat conversation and the reply currently being streamed into it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSession {
    chat_id: Option<String>,
    messages: Vec<ChatMessage>,
    phase: ChatPhase,
    accumulator: String,
    error: Option<String>,
    loading: bool,
    turn: u64,
    finalized_turn: Option<u64>,
    pending_history: Option<RequestId>,
    subscription: Option<SubscriptionId>,
    ids: IdSeq,
    dirty: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ChatView {
        ChatView {
            chat_id: self.chat_id.clone(),
            messages: self.messages.clone(),
            phase: self.phase,
            streaming_text: self.accumulator.clone(),
            error: self.error.clone(),
            loading: self.loading,
            dirty: self.dirty,
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn reset_subject(&mut self, chat_id: Option<String>) -> Option<SubscriptionId> {
        let previous = self.subscription.take();
        self.chat_id = chat_id;
        self.messages.clear();
        self.phase = ChatPhase::Idle;
        self.accumulator.clear();
        self.error = None;
        self.loading = false;
        self.pending_history = None;
        self.mark_dirty();
        previous
    }

    pub(crate) fn begin_history(&mut self) -> RequestId {
        let request = self.ids.request();
        self.pending_history = Some(request);
        self.loading = true;
        self.mark_dirty();
        request
    }

    pub(crate) fn finish_history(&mut self, request: RequestId) -> bool {
        if self.pending_history != Some(request) {
            return false;
        }
        self.pending_history = None;
        self.loading = false;
        self.mark_dirty();
        true
    }

    /// Installs loaded history ahead of anything appended locally meanwhile.
    pub(crate) fn install_history(&mut self, history: Vec<ChatMessage>) {
        let local = std::mem::replace(&mut self.messages, history);
        self.messages.extend(local);
        self.mark_dirty();
    }

    pub(crate) fn start_turn(&mut self, question: &str) -> u64 {
        self.turn += 1;
        self.messages.push(ChatMessage::user(question));
        self.phase = ChatPhase::Thinking;
        self.accumulator.clear();
        self.error = None;
        self.mark_dirty();
        self.turn
    }

    pub(crate) fn begin_subscription(&mut self) -> SubscriptionId {
        let subscription = self.ids.subscription();
        self.subscription = Some(subscription);
        subscription
    }

    pub(crate) fn is_live(&self, subscription: SubscriptionId) -> bool {
        self.subscription == Some(subscription)
    }

    pub(crate) fn set_phase(&mut self, phase: ChatPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.mark_dirty();
        }
    }

    pub(crate) fn push_token(&mut self, token: &str) {
        self.accumulator.push_str(token);
        self.mark_dirty();
    }

    pub(crate) fn replace_accumulated(&mut self, text: String) {
        if self.accumulator != text {
            self.accumulator = text;
            self.mark_dirty();
        }
    }

    /// Appends the accumulated reply once per turn. Returns whether a
    /// message was added.
    pub(crate) fn finalize_turn(&mut self) -> bool {
        if self.finalized_turn == Some(self.turn) {
            return false;
        }
        self.finalized_turn = Some(self.turn);
        let reply = std::mem::take(&mut self.accumulator);
        if reply.is_empty() {
            return false;
        }
        self.messages.push(ChatMessage::assistant(reply));
        self.mark_dirty();
        true
    }

    /// Returns to idle, dropping the partial reply and the subscription.
    pub(crate) fn end_turn(&mut self) -> Option<SubscriptionId> {
        self.phase = ChatPhase::Idle;
        self.accumulator.clear();
        self.mark_dirty();
        self.subscription.take()
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        if self.error != error {
            self.error = error;
            self.mark_dirty();
        }
    }
}
