use std::collections::VecDeque;
use std::io::{self, BufRead, Stdout};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context};
use digest_core::{
    filter_videos, update_chat, update_job, ChatMsg, ChatPhase, ChatSession, JobMsg, JobSession,
    JobStatus,
};
use digest_engine::{
    ClientSettings, DigestApi, EventTransport, ListPoller, ReqwestApi, ReqwestTransport,
};
use digest_logging::{digest_debug, digest_info};
use tokio::sync::mpsc;

use crate::cli::Command;
use crate::effects::EffectRunner;
use crate::render::Renderer;

const QUIT_COMMAND: &str = "/quit";

/// Everything the event loop reacts to.
#[derive(Debug)]
pub enum AppMsg {
    Job(JobMsg),
    Chat(ChatMsg),
    /// One line typed by the user.
    Line(String),
    InputClosed,
}

pub async fn run(command: Command, settings: ClientSettings) -> anyhow::Result<()> {
    let api: Arc<dyn DigestApi> =
        Arc::new(ReqwestApi::new(settings.clone()).context("Failed to build HTTP client")?);
    match command {
        Command::Watch { job_id } => App::new(api, settings)?.watch(job_id).await,
        Command::Ask { chat_id, question } => {
            App::new(api, settings)?.ask(chat_id, question).await
        }
        Command::Chat { chat_id } => {
            let app = App::new(api, settings)?;
            spawn_stdin_reader(app.msg_tx.clone());
            app.chat(chat_id).await
        }
        Command::Videos { watch, search } => {
            list_videos(api, &settings, watch, search.unwrap_or_default()).await
        }
    }
}

/// Single-threaded event loop: one message at a time, each applied to
/// completion before the next is taken.
struct App {
    runner: EffectRunner,
    msg_tx: mpsc::UnboundedSender<AppMsg>,
    msg_rx: mpsc::UnboundedReceiver<AppMsg>,
    renderer: Renderer<Stdout>,
    job: JobSession,
    chat: ChatSession,
    questions: VecDeque<String>,
    input_closed: bool,
}

impl App {
    fn new(api: Arc<dyn DigestApi>, settings: ClientSettings) -> anyhow::Result<Self> {
        let transport: Arc<dyn EventTransport> = Arc::new(
            ReqwestTransport::new(settings.connect_timeout)
                .context("Failed to build stream client")?,
        );
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let runner = EffectRunner::new(api, transport, settings, msg_tx.clone());
        Ok(Self {
            runner,
            msg_tx,
            msg_rx,
            renderer: Renderer::new(io::stdout()),
            job: JobSession::new(),
            chat: ChatSession::new(),
            questions: VecDeque::new(),
            input_closed: false,
        })
    }

    async fn watch(mut self, job_id: String) -> anyhow::Result<()> {
        self.dispatch(AppMsg::Job(JobMsg::Watch(job_id.clone())))?;
        while !job_finished(&self.job) {
            self.next().await?;
        }
        self.dispatch(AppMsg::Job(JobMsg::Close))?;
        self.renderer.finish()?;

        let view = self.job.view();
        let succeeded = view.job_status == Some(JobStatus::Completed) && view.error.is_none();
        if !succeeded {
            bail!("Job {job_id} did not complete");
        }
        Ok(())
    }

    async fn ask(mut self, chat_id: String, question: String) -> anyhow::Result<()> {
        if question.trim().is_empty() {
            bail!("The question is empty");
        }
        self.questions.push_back(question);
        self.input_closed = true;
        let app = self.converse(chat_id).await?;
        match app.chat.view().error {
            Some(error) => bail!(error),
            None => Ok(()),
        }
    }

    async fn chat(self, chat_id: String) -> anyhow::Result<()> {
        digest_info!("Interactive chat on {}; {} to leave", chat_id, QUIT_COMMAND);
        self.converse(chat_id).await.map(|_| ())
    }

    async fn converse(mut self, chat_id: String) -> anyhow::Result<Self> {
        self.dispatch(AppMsg::Chat(ChatMsg::Open(chat_id)))?;
        while !self.chat_finished() {
            self.next().await?;
        }
        self.dispatch(AppMsg::Chat(ChatMsg::Close))?;
        self.renderer.finish()?;
        Ok(self)
    }

    fn chat_finished(&self) -> bool {
        self.input_closed && self.questions.is_empty() && self.chat_ready()
    }

    /// History is in and no turn is running.
    fn chat_ready(&self) -> bool {
        self.chat.chat_id().is_some()
            && self.chat.phase() == ChatPhase::Idle
            && !self.chat.view().loading
    }

    async fn next(&mut self) -> anyhow::Result<()> {
        let msg = self
            .msg_rx
            .recv()
            .await
            .context("Message channel closed")?;
        self.dispatch(msg)
    }

    fn dispatch(&mut self, msg: AppMsg) -> anyhow::Result<()> {
        match msg {
            AppMsg::Job(msg) => {
                let (mut session, effects) = update_job(std::mem::take(&mut self.job), msg);
                if session.consume_dirty() {
                    self.renderer.job(&session.view())?;
                }
                self.job = session;
                self.runner.run(effects);
            }
            AppMsg::Chat(msg) => {
                let (mut session, effects) = update_chat(std::mem::take(&mut self.chat), msg);
                if session.consume_dirty() {
                    self.renderer.chat(&session.view())?;
                }
                self.chat = session;
                self.runner.run(effects);
            }
            AppMsg::Line(line) => {
                let line = line.trim();
                if line == QUIT_COMMAND {
                    self.input_closed = true;
                } else if !line.is_empty() {
                    self.questions.push_back(line.to_string());
                }
            }
            AppMsg::InputClosed => self.input_closed = true,
        }
        self.submit_next_question()
    }

    fn submit_next_question(&mut self) -> anyhow::Result<()> {
        if !self.chat_ready() {
            return Ok(());
        }
        match self.questions.pop_front() {
            Some(question) => self.dispatch(AppMsg::Chat(ChatMsg::Ask(question))),
            None => Ok(()),
        }
    }
}

/// A processing error reported on the stream does not end the watch; the
/// server may still send further updates or a close.
fn job_finished(job: &JobSession) -> bool {
    job.is_settled() || job.state().is_some_and(|state| state.status.is_terminal())
}

fn spawn_stdin_reader(msg_tx: mpsc::UnboundedSender<AppMsg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if msg_tx.send(AppMsg::Line(line)).is_err() {
                return;
            }
        }
        digest_debug!("Standard input closed");
        let _ = msg_tx.send(AppMsg::InputClosed);
    });
}

async fn list_videos(
    api: Arc<dyn DigestApi>,
    settings: &ClientSettings,
    watch: bool,
    search: String,
) -> anyhow::Result<()> {
    let mut renderer = Renderer::new(io::stdout());
    let videos = api
        .fetch_videos()
        .await
        .context("Failed to fetch the video list")?;
    renderer.videos(&filter_videos(&videos, &search))?;
    if !watch {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = ListPoller::new(api, settings.poll_interval, move |videos| {
        let _ = tx.send(videos);
    });
    poller.start();
    while let Some(videos) = rx.recv().await {
        renderer.videos(&filter_videos(&videos, &search))?;
    }
    poller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use digest_core::{Effect, StreamInput, SubscriptionId};

    use super::*;

    fn streaming_job() -> (JobSession, SubscriptionId) {
        let (job, effects) = update_job(JobSession::new(), JobMsg::Watch("v1".into()));
        let [Effect::FetchJobStatus { request, .. }] = effects[..] else {
            panic!("unexpected effects {effects:?}");
        };
        let status = digest_core::payload::decode_job_status(r#"{"status":"in_progress"}"#);
        let (job, effects) = update_job(
            job,
            JobMsg::StatusFetched {
                request,
                result: Ok(status.unwrap()),
            },
        );
        let [Effect::OpenJobStream { subscription, .. }] = effects[..] else {
            panic!("unexpected effects {effects:?}");
        };
        (job, subscription)
    }

    fn feed(job: JobSession, subscription: SubscriptionId, input: StreamInput) -> JobSession {
        update_job(job, JobMsg::Stream { subscription, input }).0
    }

    #[test]
    fn processing_error_keeps_watching_until_close() {
        let (job, subscription) = streaming_job();
        let job = feed(job, subscription, StreamInput::Opened);
        let job = feed(
            job,
            subscription,
            StreamInput::message(
                Some("update"),
                r#"{"type":"error","data":{"error":"yt-dlp failed"}}"#,
            ),
        );
        assert_eq!(job.view().error.as_deref(), Some("yt-dlp failed"));
        assert!(!job_finished(&job));

        let job = feed(
            job,
            subscription,
            StreamInput::message(
                Some("update"),
                r#"{"type":"status_update","data":{"status":"transcribing"}}"#,
            ),
        );
        assert!(!job_finished(&job));

        let job = feed(job, subscription, StreamInput::ServerClosed);
        assert!(job_finished(&job));
    }

    #[test]
    fn giving_up_or_terminal_phase_ends_the_watch() {
        let (job, subscription) = streaming_job();
        let gave_up = feed(
            job.clone(),
            subscription,
            StreamInput::GaveUp {
                message: "http status 503".into(),
            },
        );
        assert!(job_finished(&gave_up));

        let succeeded = feed(
            job,
            subscription,
            StreamInput::message(
                Some("update"),
                r#"{"type":"status_update","data":{"status":"success"}}"#,
            ),
        );
        assert!(job_finished(&succeeded));
    }
}
