//! Digest core: pure reducers for job progress and chat streams.
//!
//! Nothing in this crate performs I/O. Sessions are advanced by
//! [`update_job`] and [`update_chat`], which return [`Effect`]s for the
//! caller to execute; results come back as messages.
mod chat_session;
mod effect;
mod job_session;
mod msg;
pub mod payload;
mod stream;
mod update;
mod view_model;

pub use chat_session::{ChatPhase, ChatSession};
pub use effect::Effect;
pub use job_session::{JobSession, JobState};
pub use msg::{ChatMsg, JobMsg};
pub use payload::{
    filter_videos, ChatMessage, ChatRole, JobPhase, JobStatus, JobStatusResponse,
    TranscriptSegment, Video, VideoMetadata,
};
pub use stream::{ConnectionStatus, RequestId, StreamInput, SubscriptionId};
pub use update::{update_chat, update_job};
pub use view_model::{ChatView, JobView};
