use crate::{RequestId, SubscriptionId};

/// Work requested by a reducer. Results come back as messages carrying the
/// same request, subscription, or turn id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchJobStatus {
        request: RequestId,
        job_id: String,
    },
    OpenJobStream {
        subscription: SubscriptionId,
        job_id: String,
    },
    CloseJobStream {
        subscription: SubscriptionId,
    },
    FetchChatHistory {
        request: RequestId,
        chat_id: String,
    },
    SubmitQuestion {
        turn: u64,
        chat_id: String,
        question: String,
    },
    OpenChatStream {
        subscription: SubscriptionId,
        chat_id: String,
    },
    CloseChatStream {
        subscription: SubscriptionId,
    },
}
