use crate::{ChatMessage, JobStatusResponse, RequestId, StreamInput, SubscriptionId};

#[derive(Debug, Clone, PartialEq)]
pub enum JobMsg {
    /// Start tracking a job. Any previous subject is torn down first.
    Watch(String),
    /// User-initiated retry of the current job: re-resolve status from scratch.
    Refetch,
    /// Result of the one-shot status fetch.
    StatusFetched {
        request: RequestId,
        result: Result<JobStatusResponse, String>,
    },
    /// Input from the job stream subscription.
    Stream {
        subscription: SubscriptionId,
        input: StreamInput,
    },
    /// Tear the session down (view disposed).
    Close,
    ClearError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMsg {
    /// Bind the session to a chat and load its history.
    Open(String),
    HistoryLoaded {
        request: RequestId,
        result: Result<Vec<ChatMessage>, String>,
    },
    /// User asked a question.
    Ask(String),
    /// The server registered the question for `turn`.
    AskAccepted { turn: u64 },
    /// Registering the question for `turn` failed.
    AskFailed { turn: u64, message: String },
    /// Input from the chat stream subscription.
    Stream {
        subscription: SubscriptionId,
        input: StreamInput,
    },
    Close,
    ClearError,
}
