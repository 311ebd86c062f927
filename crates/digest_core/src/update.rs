use digest_logging::{digest_debug, digest_info, digest_warn};

use crate::chat_session::{CLOSED_EARLY, CONNECTION_FAILED, STREAM_ERROR};
use crate::job_session::{Applied, RECONNECT_EXHAUSTED};
use crate::payload::{
    decode_chat_snapshot, decode_job_event, decode_job_snapshot, decode_stream_error,
    decode_token, JobPhase,
};
use crate::{
    ChatMsg, ChatPhase, ChatSession, ConnectionStatus, Effect, JobMsg, JobSession, JobState,
    JobStatus, StreamInput,
};

const UPDATE_EVENT: &str = "update";
const TOKEN_EVENT: &str = "token";
const COMPLETE_EVENT: &str = "complete";
const ERROR_EVENT: &str = "error";

/// Pure job reducer: applies a message to the session and returns any effects.
pub fn update_job(mut session: JobSession, msg: JobMsg) -> (JobSession, Vec<Effect>) {
    let effects = match msg {
        JobMsg::Watch(job_id) => watch_job(&mut session, job_id),
        JobMsg::Refetch => match session.job_id().map(ToOwned::to_owned) {
            Some(job_id) => watch_job(&mut session, job_id),
            None => Vec::new(),
        },
        JobMsg::StatusFetched { request, result } => {
            if !session.finish_fetch(request) {
                digest_debug!("Dropping stale status result {}", request);
                return (session, Vec::new());
            }
            match result {
                Ok(response) => {
                    session.set_job_status(response.status);
                    let fallback = match response.status {
                        JobStatus::Completed => JobPhase::Success,
                        JobStatus::InProgress | JobStatus::NotStarted => JobPhase::Starting,
                    };
                    if let Some(snapshot) = response.state {
                        session.replace_state(JobState::from_snapshot(snapshot, fallback));
                    }
                    if let Some(video) = response.video {
                        session.state_mut().merge_video(video);
                    }
                    match (response.status, session.job_id().map(ToOwned::to_owned)) {
                        (JobStatus::InProgress, Some(job_id)) => {
                            let subscription = session.begin_subscription();
                            digest_info!("Job {} in progress; opening {}", job_id, subscription);
                            vec![Effect::OpenJobStream {
                                subscription,
                                job_id,
                            }]
                        }
                        _ => {
                            session.set_connection(ConnectionStatus::Disconnected);
                            Vec::new()
                        }
                    }
                }
                Err(message) => {
                    // Fatal for this session; retry is the caller's call.
                    session.set_error(Some(message));
                    session.set_connection(ConnectionStatus::Error);
                    Vec::new()
                }
            }
        }
        JobMsg::Stream {
            subscription,
            input,
        } => {
            if !session.is_live(subscription) {
                digest_debug!("Dropping input from superseded {}", subscription);
                return (session, Vec::new());
            }
            apply_job_input(&mut session, input);
            Vec::new()
        }
        JobMsg::Close => session
            .reset_subject(None)
            .map(|subscription| Effect::CloseJobStream { subscription })
            .into_iter()
            .collect(),
        JobMsg::ClearError => {
            session.set_error(None);
            Vec::new()
        }
    };

    (session, effects)
}

fn watch_job(session: &mut JobSession, job_id: String) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);
    if let Some(subscription) = session.reset_subject(Some(job_id.clone())) {
        effects.push(Effect::CloseJobStream { subscription });
    }
    let request = session.begin_fetch();
    effects.push(Effect::FetchJobStatus { request, job_id });
    effects
}

fn apply_job_input(session: &mut JobSession, input: StreamInput) {
    match input {
        StreamInput::Connecting { attempt } => {
            if attempt > 0 {
                digest_info!("Job stream reconnect attempt {}", attempt);
            }
            session.set_connection(ConnectionStatus::Connecting);
        }
        StreamInput::Opened => {
            session.set_connection(ConnectionStatus::Connected);
        }
        StreamInput::Message { event: None, data } => match decode_job_snapshot(&data) {
            Ok(snapshot) => {
                session.replace_state(JobState::from_snapshot(snapshot, JobPhase::Starting));
                if session.job_status() != Some(JobStatus::Completed) {
                    session.set_job_status(JobStatus::InProgress);
                }
            }
            Err(err) => digest_warn!("{}", err),
        },
        StreamInput::Message {
            event: Some(event),
            data,
        } if event == UPDATE_EVENT => match decode_job_event(&data) {
            Ok(delta) => match session.state_mut().apply(delta) {
                Applied::State => {}
                Applied::Succeeded => session.set_job_status(JobStatus::Completed),
                Applied::Failed(message) => {
                    session.set_error(Some(message));
                    session.set_connection(ConnectionStatus::Error);
                }
            },
            Err(err) => digest_warn!("{}", err),
        },
        StreamInput::Message { event: Some(event), .. } => {
            digest_debug!("Ignoring job stream event '{}'", event);
        }
        StreamInput::TransportError { message, retry_in } => {
            digest_warn!("Job stream error: {} (retry in {:?})", message, retry_in);
            session.set_connection(ConnectionStatus::Error);
        }
        StreamInput::GaveUp { message } => {
            digest_warn!("Job stream gave up: {}", message);
            session.set_error(Some(RECONNECT_EXHAUSTED.to_string()));
            session.end_subscription(ConnectionStatus::Error);
        }
        StreamInput::ServerClosed => {
            digest_info!("Job stream closed by server");
            session.end_subscription(ConnectionStatus::Disconnected);
        }
    }
}

/// Pure chat reducer: applies a message to the session and returns any effects.
pub fn update_chat(mut session: ChatSession, msg: ChatMsg) -> (ChatSession, Vec<Effect>) {
    let effects = match msg {
        ChatMsg::Open(chat_id) => {
            let mut effects = Vec::with_capacity(2);
            if let Some(subscription) = session.reset_subject(Some(chat_id.clone())) {
                effects.push(Effect::CloseChatStream { subscription });
            }
            let request = session.begin_history();
            effects.push(Effect::FetchChatHistory { request, chat_id });
            effects
        }
        ChatMsg::HistoryLoaded { request, result } => {
            if !session.finish_history(request) {
                digest_debug!("Dropping stale history result {}", request);
                return (session, Vec::new());
            }
            match result {
                Ok(history) => session.install_history(history),
                Err(message) => session.set_error(Some(message)),
            }
            Vec::new()
        }
        ChatMsg::Ask(question) => {
            let Some(chat_id) = session.chat_id().map(ToOwned::to_owned) else {
                digest_warn!("Question asked before a chat was opened");
                return (session, Vec::new());
            };
            if session.phase() != ChatPhase::Idle || question.trim().is_empty() {
                return (session, Vec::new());
            }
            let turn = session.start_turn(&question);
            vec![Effect::SubmitQuestion {
                turn,
                chat_id,
                question,
            }]
        }
        ChatMsg::AskAccepted { turn } => {
            if turn != session.turn() || session.phase() != ChatPhase::Thinking {
                digest_debug!("Dropping acceptance for stale turn {}", turn);
                return (session, Vec::new());
            }
            match session.chat_id().map(ToOwned::to_owned) {
                Some(chat_id) => {
                    let subscription = session.begin_subscription();
                    vec![Effect::OpenChatStream {
                        subscription,
                        chat_id,
                    }]
                }
                None => Vec::new(),
            }
        }
        ChatMsg::AskFailed { turn, message } => {
            if turn != session.turn() || session.phase() != ChatPhase::Thinking {
                return (session, Vec::new());
            }
            session.set_error(Some(message));
            close_chat_turn(&mut session)
        }
        ChatMsg::Stream {
            subscription,
            input,
        } => {
            if !session.is_live(subscription) {
                digest_debug!("Dropping input from superseded {}", subscription);
                return (session, Vec::new());
            }
            apply_chat_input(&mut session, input)
        }
        ChatMsg::Close => session
            .reset_subject(None)
            .map(|subscription| Effect::CloseChatStream { subscription })
            .into_iter()
            .collect(),
        ChatMsg::ClearError => {
            session.set_error(None);
            Vec::new()
        }
    };

    (session, effects)
}

fn apply_chat_input(session: &mut ChatSession, input: StreamInput) -> Vec<Effect> {
    match input {
        StreamInput::Connecting { .. } => Vec::new(),
        StreamInput::Opened => {
            mark_streaming(session);
            Vec::new()
        }
        StreamInput::Message { event: None, data } => {
            match decode_chat_snapshot(&data) {
                Ok(snapshot) => session.replace_accumulated(snapshot.text),
                Err(err) => digest_warn!("{}", err),
            }
            Vec::new()
        }
        StreamInput::Message {
            event: Some(event),
            data,
        } => match event.as_str() {
            TOKEN_EVENT => {
                mark_streaming(session);
                match decode_token(&data) {
                    Ok(token) => session.push_token(&token),
                    Err(err) => {
                        digest_warn!("{}; keeping raw token text", err);
                        session.push_token(&data);
                    }
                }
                Vec::new()
            }
            COMPLETE_EVENT => {
                if !session.finalize_turn() {
                    digest_debug!("Turn {} already finalized", session.turn());
                }
                close_chat_turn(session)
            }
            ERROR_EVENT => {
                let message = decode_stream_error(&data)
                    .ok()
                    .and_then(|payload| payload.error)
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| STREAM_ERROR.to_string());
                digest_warn!("Chat stream error event: {}", message);
                session.set_error(Some(message));
                close_chat_turn(session)
            }
            other => {
                digest_debug!("Ignoring chat stream event '{}'", other);
                Vec::new()
            }
        },
        StreamInput::TransportError { message, .. } | StreamInput::GaveUp { message } => {
            digest_warn!("Chat stream failed: {}", message);
            session.set_error(Some(CONNECTION_FAILED.to_string()));
            close_chat_turn(session)
        }
        StreamInput::ServerClosed => {
            if session.phase() != ChatPhase::Idle {
                session.set_error(Some(CLOSED_EARLY.to_string()));
            }
            session.end_turn();
            Vec::new()
        }
    }
}

fn mark_streaming(session: &mut ChatSession) {
    if session.phase() == ChatPhase::Thinking {
        session.set_phase(ChatPhase::Streaming);
    }
}

fn close_chat_turn(session: &mut ChatSession) -> Vec<Effect> {
    session
        .end_turn()
        .map(|subscription| Effect::CloseChatStream { subscription })
        .into_iter()
        .collect()
}
