//! Settings resolution: defaults, then `digest.ron`, then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context};
use digest_engine::{BackoffPolicy, ClientSettings};
use digest_logging::LogDestination;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

pub const DEFAULT_CONFIG_FILE: &str = "digest.ron";

/// On-disk settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub max_reconnect_attempts: u32,
    pub poll_interval_ms: u64,
    pub log_file: Option<PathBuf>,
    /// Also log to the terminal when `log_file` is set.
    pub log_terminal: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        let settings = ClientSettings::default();
        Self {
            base_url: settings.base_url,
            connect_timeout_ms: millis(settings.connect_timeout),
            request_timeout_ms: millis(settings.request_timeout),
            backoff_base_ms: millis(settings.backoff.base),
            max_reconnect_attempts: settings.backoff.max_attempts,
            poll_interval_ms: millis(settings.poll_interval),
            log_file: None,
            log_terminal: false,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub settings: ClientSettings,
    pub log_file: Option<PathBuf>,
    pub log_terminal: bool,
    pub log_level: LevelFilter,
}

impl AppConfig {
    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) if self.log_terminal => LogDestination::Both(path.clone()),
            Some(path) => LogDestination::File(path.clone()),
            None => LogDestination::Terminal,
        }
    }
}

/// Reads the settings file and overlays the command line. An explicitly
/// named file must exist; the default one is optional.
pub fn load(cli: &Cli) -> anyhow::Result<AppConfig> {
    let file = match &cli.config {
        Some(path) => read_file(path)?,
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                read_file(path)?
            } else {
                FileConfig::default()
            }
        }
    };
    resolve(file, cli)
}

pub fn read_file(path: &Path) -> anyhow::Result<FileConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    ron::from_str(&text).with_context(|| format!("Failed to parse config file {}", path.display()))
}

pub fn resolve(file: FileConfig, cli: &Cli) -> anyhow::Result<AppConfig> {
    ensure!(
        file.poll_interval_ms > 0,
        "poll_interval_ms must be greater than zero"
    );
    let settings = ClientSettings {
        base_url: cli.base_url.clone().unwrap_or(file.base_url),
        connect_timeout: Duration::from_millis(file.connect_timeout_ms),
        request_timeout: Duration::from_millis(file.request_timeout_ms),
        backoff: BackoffPolicy::new(
            Duration::from_millis(file.backoff_base_ms),
            file.max_reconnect_attempts,
        ),
        poll_interval: Duration::from_millis(file.poll_interval_ms),
    };
    Ok(AppConfig {
        settings,
        log_file: cli.log_file.clone().or(file.log_file),
        log_terminal: cli.log_terminal || file.log_terminal,
        log_level: level_for(cli.verbose),
    })
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
