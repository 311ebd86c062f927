use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use digest_core::Video;
use digest_logging::{digest_debug, digest_warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::DigestApi;

type RefreshFn = dyn Fn(Vec<Video>) + Send + Sync;

/// Shortest accepted refresh period; `tokio::time::interval` rejects zero.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Default)]
struct PollerInner {
    consumers: usize,
    task: Option<JoinHandle<()>>,
}

/// Fixed-interval refresher of the video list. However many consumers call
/// [`ListPoller::start`], at most one timer task runs; it stops when the
/// last consumer calls [`ListPoller::stop`].
pub struct ListPoller {
    api: Arc<dyn DigestApi>,
    interval: Duration,
    on_refresh: Arc<RefreshFn>,
    inner: Mutex<PollerInner>,
}

impl ListPoller {
    pub fn new(
        api: Arc<dyn DigestApi>,
        interval: Duration,
        on_refresh: impl Fn(Vec<Video>) + Send + Sync + 'static,
    ) -> Self {
        if interval < MIN_POLL_INTERVAL {
            digest_warn!(
                "Poll interval {:?} is too short; using {:?}",
                interval,
                MIN_POLL_INTERVAL
            );
        }
        Self {
            api,
            interval: interval.max(MIN_POLL_INTERVAL),
            on_refresh: Arc::new(on_refresh),
            inner: Mutex::new(PollerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a consumer and returns the consumer count. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> usize {
        let mut inner = self.lock();
        inner.consumers += 1;
        if inner.task.is_none() {
            digest_debug!("Starting list poller every {:?}", self.interval);
            inner.task = Some(tokio::spawn(poll_loop(
                self.api.clone(),
                self.interval,
                self.on_refresh.clone(),
            )));
        }
        inner.consumers
    }

    /// Releases a consumer and returns the remaining count.
    pub fn stop(&self) -> usize {
        let mut inner = self.lock();
        inner.consumers = inner.consumers.saturating_sub(1);
        if inner.consumers == 0 {
            if let Some(task) = inner.task.take() {
                digest_debug!("Stopping list poller");
                task.abort();
            }
        }
        inner.consumers
    }

    pub fn is_running(&self) -> bool {
        self.lock().task.is_some()
    }

    pub fn consumers(&self) -> usize {
        self.lock().consumers
    }
}

impl Drop for ListPoller {
    fn drop(&mut self) {
        if let Some(task) = self.lock().task.take() {
            task.abort();
        }
    }
}

async fn poll_loop(api: Arc<dyn DigestApi>, period: Duration, on_refresh: Arc<RefreshFn>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match api.fetch_videos().await {
            Ok(videos) => on_refresh(videos),
            Err(err) => digest_warn!("Video polling failed: {}", err),
        }
    }
}
