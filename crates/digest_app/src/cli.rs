use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Follow video digest jobs and chat about them from the terminal.
#[derive(Debug, Parser)]
#[command(name = "digest", version)]
pub struct Cli {
    /// Root of the server API, e.g. http://localhost:8008/api.
    #[arg(long, env = "DIGEST_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// RON settings file. Defaults to ./digest.ron when present.
    #[arg(long, env = "DIGEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of the terminal.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Keep logging to the terminal when a log file is set.
    #[arg(long, global = true)]
    pub log_terminal: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Follow a processing job until it finishes.
    Watch { job_id: String },
    /// Ask one question about a video and print the streamed answer.
    Ask { chat_id: String, question: String },
    /// Interactive chat: every line read from stdin is a question.
    Chat { chat_id: String },
    /// List known videos.
    Videos {
        /// Keep refreshing the list.
        #[arg(long)]
        watch: bool,
        /// Only show videos whose title, uploader, or id matches.
        #[arg(long)]
        search: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "digest",
            "ask",
            "c1",
            "What is it about?",
            "--base-url",
            "http://example.com/api",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://example.com/api"));
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Command::Ask {
                chat_id: "c1".into(),
                question: "What is it about?".into()
            }
        );
    }

    #[test]
    fn videos_flags() {
        let cli = Cli::try_parse_from(["digest", "videos", "--watch", "--search", "rust"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Videos {
                watch: true,
                search: Some("rust".into())
            }
        );
    }
}
