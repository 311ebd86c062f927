use std::sync::Arc;

use digest_core::{ChatMsg, Effect, JobMsg, StreamInput, SubscriptionId};
use digest_engine::{
    BackoffPolicy, ClientSettings, DigestApi, EventTransport, StreamManager, StreamSignal,
};
use digest_logging::{digest_info, digest_warn};
use tokio::sync::mpsc;

use crate::app::AppMsg;

/// Executes reducer effects against the engine. Every outcome re-enters the
/// app loop as an [`AppMsg`].
pub struct EffectRunner {
    api: Arc<dyn DigestApi>,
    settings: ClientSettings,
    job_streams: StreamManager,
    chat_streams: StreamManager,
    msg_tx: mpsc::UnboundedSender<AppMsg>,
}

impl EffectRunner {
    /// Must be called from within a tokio runtime.
    pub fn new(
        api: Arc<dyn DigestApi>,
        transport: Arc<dyn EventTransport>,
        settings: ClientSettings,
        msg_tx: mpsc::UnboundedSender<AppMsg>,
    ) -> Self {
        let job_tx = msg_tx.clone();
        let job_streams = StreamManager::new(
            transport.clone(),
            settings.backoff,
            Arc::new(move |signal: StreamSignal| {
                let _ = job_tx.send(job_signal(signal));
            }),
        );
        // A failed chat stream ends the turn; the user asks again.
        let chat_tx = msg_tx.clone();
        let chat_streams = StreamManager::new(
            transport,
            BackoffPolicy::no_retry(),
            Arc::new(move |signal: StreamSignal| {
                let _ = chat_tx.send(chat_signal(signal));
            }),
        );
        Self {
            api,
            settings,
            job_streams,
            chat_streams,
            msg_tx,
        }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::FetchJobStatus { request, job_id } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let result = api
                        .fetch_job_status(&job_id)
                        .await
                        .map_err(|err| err.to_string());
                    let _ = tx.send(AppMsg::Job(JobMsg::StatusFetched { request, result }));
                });
            }
            Effect::OpenJobStream {
                subscription,
                job_id,
            } => match self.settings.job_stream_url(&job_id) {
                Ok(url) => self.job_streams.connect(subscription, url),
                Err(err) => self.refuse(job_signal, subscription, err.to_string()),
            },
            Effect::CloseJobStream { subscription } => {
                self.job_streams.disconnect_subscription(subscription);
            }
            Effect::FetchChatHistory { request, chat_id } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let result = api
                        .fetch_chat_history(&chat_id)
                        .await
                        .map_err(|err| err.to_string());
                    let _ = tx.send(AppMsg::Chat(ChatMsg::HistoryLoaded { request, result }));
                });
            }
            Effect::SubmitQuestion {
                turn,
                chat_id,
                question,
            } => {
                digest_info!("Submitting question for turn {} of chat {}", turn, chat_id);
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let msg = match api.ask_question(&chat_id, &question).await {
                        Ok(()) => ChatMsg::AskAccepted { turn },
                        Err(err) => ChatMsg::AskFailed {
                            turn,
                            message: err.message,
                        },
                    };
                    let _ = tx.send(AppMsg::Chat(msg));
                });
            }
            Effect::OpenChatStream {
                subscription,
                chat_id,
            } => match self.settings.chat_stream_url(&chat_id) {
                Ok(url) => self.chat_streams.connect(subscription, url),
                Err(err) => self.refuse(chat_signal, subscription, err.to_string()),
            },
            Effect::CloseChatStream { subscription } => {
                self.chat_streams.disconnect_subscription(subscription);
            }
        }
    }

    /// Reports a stream that could not even be attempted.
    fn refuse(
        &self,
        wrap: fn(StreamSignal) -> AppMsg,
        subscription: SubscriptionId,
        message: String,
    ) {
        digest_warn!("Cannot open {}: {}", subscription, message);
        let _ = self.msg_tx.send(wrap(StreamSignal {
            subscription,
            input: StreamInput::GaveUp { message },
        }));
    }
}

fn job_signal(signal: StreamSignal) -> AppMsg {
    AppMsg::Job(JobMsg::Stream {
        subscription: signal.subscription,
        input: signal.input,
    })
}

fn chat_signal(signal: StreamSignal) -> AppMsg {
    AppMsg::Chat(ChatMsg::Stream {
        subscription: signal.subscription,
        input: signal.input,
    })
}
