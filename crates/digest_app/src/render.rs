//! Incremental terminal output. Each call prints only what changed since the
//! previous view.

use std::io::{self, Write};

use digest_core::{ChatPhase, ChatRole, ChatView, JobStatus, JobView, Video};

pub struct Renderer<W: Write> {
    out: W,
    mid_line: bool,
    last_error: Option<String>,
    status_line: String,
    title: Option<String>,
    segments: usize,
    summary: String,
    messages: usize,
    streamed: String,
    video_table: String,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            mid_line: false,
            last_error: None,
            status_line: String::new(),
            title: None,
            segments: 0,
            summary: String::new(),
            messages: 0,
            streamed: String::new(),
            video_table: String::new(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn break_line(&mut self) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        Ok(())
    }

    /// Ends any partially written line.
    pub fn finish(&mut self) -> io::Result<()> {
        self.break_line()?;
        self.out.flush()
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        self.break_line()?;
        writeln!(self.out, "{text}")
    }

    fn inline(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        write!(self.out, "{text}")?;
        self.mid_line = !text.ends_with('\n');
        Ok(())
    }

    fn error(&mut self, error: &Option<String>) -> io::Result<()> {
        if error != &self.last_error {
            if let Some(message) = error {
                self.line(&format!("error: {message}"))?;
            }
            self.last_error = error.clone();
        }
        Ok(())
    }

    pub fn job(&mut self, view: &JobView) -> io::Result<()> {
        self.error(&view.error)?;

        let status = job_status_line(view);
        if status != self.status_line {
            self.line(&format!("[{status}]"))?;
            self.status_line = status;
        }

        if let Some(state) = &view.state {
            let title = state.video.as_ref().and_then(|video| video.title.clone());
            if title.is_some() && title != self.title {
                self.line(&format!("title: {}", title.as_deref().unwrap_or_default()))?;
                self.title = title;
            }

            // A snapshot may replace the buffer with a shorter one.
            let printed = self.segments.min(state.transcript_buffer.len());
            for segment in &state.transcript_buffer[printed..] {
                let text = format!("{} {}", timestamp(segment.start), segment.text.trim());
                self.line(&text)?;
            }
            self.segments = state.transcript_buffer.len();

            match state.summary_buffer.strip_prefix(self.summary.as_str()) {
                Some(rest) => self.inline(rest)?,
                None => {
                    self.break_line()?;
                    self.inline(&state.summary_buffer)?;
                }
            }
            self.summary.clone_from(&state.summary_buffer);
        }
        self.out.flush()
    }

    pub fn chat(&mut self, view: &ChatView) -> io::Result<()> {
        let printed = self.messages.min(view.messages.len());
        for message in &view.messages[printed..] {
            match message.role {
                // Already shown token by token.
                ChatRole::Assistant
                    if !self.streamed.is_empty() && message.content == self.streamed =>
                {
                    self.break_line()?;
                }
                ChatRole::Assistant => self.line(&format!("assistant> {}", message.content))?,
                ChatRole::User => self.line(&format!("you> {}", message.content))?,
            }
            if message.role == ChatRole::Assistant {
                self.streamed.clear();
            }
        }
        self.messages = view.messages.len();

        if view.phase == ChatPhase::Idle {
            if !self.streamed.is_empty() {
                // The turn ended without a finalized reply.
                self.break_line()?;
                self.streamed.clear();
            }
        } else if !view.streaming_text.is_empty() {
            match view.streaming_text.strip_prefix(self.streamed.as_str()) {
                Some(rest) if !self.streamed.is_empty() => self.inline(rest)?,
                _ => {
                    self.break_line()?;
                    self.inline(&format!("assistant> {}", view.streaming_text))?;
                }
            }
            self.streamed.clone_from(&view.streaming_text);
        }

        self.error(&view.error)?;
        self.out.flush()
    }

    /// Prints the list when it differs from the last one printed.
    pub fn videos(&mut self, videos: &[&Video]) -> io::Result<()> {
        let mut table = format!("{} video(s)\n", videos.len());
        for video in videos {
            table.push_str(&format!(
                "{:<14} {:<12} {}\n",
                video.video_id, video.status, video.title
            ));
        }
        if table == self.video_table {
            return Ok(());
        }
        self.break_line()?;
        self.inline(&table)?;
        self.video_table = table;
        self.out.flush()
    }
}

fn job_status_line(view: &JobView) -> String {
    let overall = match view.job_status {
        Some(JobStatus::NotStarted) => "not started",
        Some(JobStatus::InProgress) => "in progress",
        Some(JobStatus::Completed) => "completed",
        None if view.loading => "loading",
        None => "unknown",
    };
    let mut line = match &view.state {
        Some(state) => format!("{overall} | {}", state.status),
        None => overall.to_string(),
    };
    if let Some(progress) = view.state.as_ref().and_then(|state| state.download_progress) {
        line.push_str(&format!(" | download {progress:.0}%"));
    }
    line.push_str(&format!(" | {}", view.connection));
    line
}

fn timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("[{:02}:{:02}]", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use digest_core::{ChatMessage, ConnectionStatus, JobPhase, JobState, TranscriptSegment};

    use super::*;

    fn output(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn job_view(summary: &str, segments: usize) -> JobView {
        JobView {
            job_id: Some("v1".into()),
            job_status: Some(JobStatus::InProgress),
            state: Some(JobState {
                status: JobPhase::Summarizing,
                transcript_buffer: (0..segments)
                    .map(|n| TranscriptSegment {
                        start: n as f64 * 65.0,
                        end: n as f64 * 65.0 + 5.0,
                        text: format!("line {n}"),
                    })
                    .collect(),
                summary_buffer: summary.into(),
                ..JobState::default()
            }),
            connection: ConnectionStatus::Connected,
            ..JobView::default()
        }
    }

    #[test]
    fn job_output_is_incremental() {
        let mut renderer = Renderer::new(Vec::new());
        renderer.job(&job_view("", 1)).unwrap();
        renderer.job(&job_view("Hello", 2)).unwrap();
        renderer.job(&job_view("Hello world", 2)).unwrap();

        assert_eq!(
            output(renderer),
            "[in progress | summarizing | connected]\n\
             [00:00] line 0\n\
             [01:05] line 1\n\
             Hello world"
        );
    }

    #[test]
    fn streamed_reply_is_not_repeated_when_finalized() {
        let mut renderer = Renderer::new(Vec::new());
        let mut view = ChatView {
            chat_id: Some("c1".into()),
            messages: vec![ChatMessage::user("Q")],
            phase: ChatPhase::Streaming,
            streaming_text: "Hel".into(),
            ..ChatView::default()
        };
        renderer.chat(&view).unwrap();
        view.streaming_text = "Hello".into();
        renderer.chat(&view).unwrap();
        view.messages.push(ChatMessage::assistant("Hello"));
        view.streaming_text.clear();
        view.phase = ChatPhase::Idle;
        renderer.chat(&view).unwrap();

        assert_eq!(output(renderer), "you> Q\nassistant> Hello\n");
    }

    #[test]
    fn failed_turn_ends_line_before_error() {
        let mut renderer = Renderer::new(Vec::new());
        let mut view = ChatView {
            messages: vec![ChatMessage::user("Q")],
            phase: ChatPhase::Streaming,
            streaming_text: "Par".into(),
            ..ChatView::default()
        };
        renderer.chat(&view).unwrap();
        view.phase = ChatPhase::Idle;
        view.streaming_text.clear();
        view.error = Some("Connection to chat stream failed".into());
        renderer.chat(&view).unwrap();

        assert_eq!(
            output(renderer),
            "you> Q\nassistant> Par\nerror: Connection to chat stream failed\n"
        );
    }

    #[test]
    fn unchanged_video_list_is_printed_once() {
        let video = Video {
            video_id: "v1".into(),
            title: "Talk".into(),
            status: "completed".into(),
            duration: None,
            uploader: None,
            upload_date: None,
            thumbnail_url: None,
            webpage_url: None,
        };
        let mut renderer = Renderer::new(Vec::new());
        renderer.videos(&[&video]).unwrap();
        renderer.videos(&[&video]).unwrap();

        let text = output(renderer);
        assert_eq!(text.matches("1 video(s)").count(), 1);
        assert!(text.contains("v1"));
    }
}
