//! Timer-driven change detection.
//!
//! A [`ChangeWatcher`] is either stopped or running. While running it polls
//! its provider every `poll_interval`, compares the result with the last
//! snapshot by exact string equality, and awaits the registered callback when
//! they differ. Ticks never overlap: a tick that comes due while the previous
//! one is still in flight is dropped, not queued.

use async_trait::async_trait;
use keepsake_util::Identifier;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Produces an opaque, comparable serialization of the current file tree.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<String>;
}

#[async_trait]
impl<F, Fut> SnapshotProvider for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    async fn snapshot(&self) -> anyhow::Result<String> {
        self().await
    }
}

/// Invoked once per detected change.
#[async_trait]
pub trait ChangeCallback: Send + Sync {
    async fn on_change(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> ChangeCallback for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_change(&self) -> anyhow::Result<()> {
        self().await
    }
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Time between two polls.
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another poll was still in flight; this one was dropped.
    Skipped,
    /// No baseline existed yet; the fresh snapshot became the baseline.
    Seeded,
    /// The snapshot matched the baseline.
    Unchanged,
    /// The snapshot differed; the baseline was replaced and the callback ran.
    Changed,
    /// The watcher was stopped or restarted while this poll was in flight.
    Stale,
    /// The provider or the callback returned an error.
    Failed,
}

/// Polling change detector.
///
/// # Example
///
/// ```no_run
/// use keepsake_watch::{ChangeWatcher, WatcherConfig};
///
/// # async fn example() {
/// let watcher = ChangeWatcher::new(WatcherConfig::default());
/// watcher.on_change(|| async {
///     println!("workspace changed");
///     Ok::<_, anyhow::Error>(())
/// });
/// watcher.start(|| async { Ok::<_, anyhow::Error>(String::from("tree")) });
/// // ...
/// watcher.stop();
/// # }
/// ```
pub struct ChangeWatcher {
    id: String,
    poll_interval: Mutex<Duration>,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveLoop>>,
}

struct ActiveLoop {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

/// State visible to the polling task.
struct Shared {
    last_snapshot: Mutex<Option<String>>,
    busy: AtomicBool,
    running: AtomicBool,
    /// Bumped on every start and stop so in-flight work can tell it is stale.
    generation: AtomicU64,
    callback: RwLock<Option<Arc<dyn ChangeCallback>>>,
}

impl ChangeWatcher {
    /// Create a stopped watcher.
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            id: Identifier::watcher(),
            poll_interval: Mutex::new(config.poll_interval),
            shared: Arc::new(Shared {
                last_snapshot: Mutex::new(None),
                busy: AtomicBool::new(false),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                callback: RwLock::new(None),
            }),
            active: Mutex::new(None),
        }
    }

    /// Unique id of this watcher, used in log output.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register the change callback, replacing any previous one.
    pub fn on_change<C: ChangeCallback + 'static>(&self, callback: C) {
        let mut slot = self
            .shared
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    /// Change the poll interval. Only affects later calls to [`start`](Self::start).
    pub fn set_poll_interval(&self, interval: Duration) {
        *lock(&self.poll_interval) = interval;
    }

    /// The interval the next [`start`](Self::start) will use.
    pub fn poll_interval(&self) -> Duration {
        *lock(&self.poll_interval)
    }

    /// Whether the polling loop is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The current baseline snapshot, if one has been observed.
    pub fn last_snapshot(&self) -> Option<String> {
        lock(&self.shared.last_snapshot).clone()
    }

    /// Start polling `provider`.
    ///
    /// Immediately requests one snapshot in the background to seed the
    /// baseline, then polls every interval, the first poll one interval from
    /// now. Calling `start` on a running watcher does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<P: SnapshotProvider + 'static>(&self, provider: P) {
        let mut active = lock(&self.active);
        if active.is_some() {
            info!(watcher = %self.id, "Watcher already running, ignoring start");
            return;
        }

        let provider: Arc<dyn SnapshotProvider> = Arc::new(provider);
        let period = self.poll_interval();
        let generation = {
            let _baseline = lock(&self.shared.last_snapshot);
            self.shared.running.store(true, Ordering::SeqCst);
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let seed = {
            let shared = Arc::clone(&self.shared);
            let provider = Arc::clone(&provider);
            let id = self.id.clone();
            async move { shared.seed(provider.as_ref(), generation, &id).await }
        };
        tokio::spawn(seed);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.shared),
            provider,
            period,
            generation,
            cancel.clone(),
            self.id.clone(),
        ));

        info!(watcher = %self.id, interval_ms = period.as_millis() as u64, "Watcher started");
        *active = Some(ActiveLoop {
            cancel,
            _handle: handle,
        });
    }

    /// Stop polling and forget the baseline.
    ///
    /// A poll already in flight runs to completion but neither updates the
    /// baseline nor invokes the callback. Stopping a stopped watcher does
    /// nothing.
    pub fn stop(&self) {
        let Some(active) = lock(&self.active).take() else {
            debug!(watcher = %self.id, "Watcher already stopped");
            return;
        };

        {
            // Same lock as the baseline commit in `tick`, so no poll can
            // write a baseline once this block has run.
            let mut baseline = lock(&self.shared.last_snapshot);
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            *baseline = None;
        }
        active.cancel.cancel();
        info!(watcher = %self.id, "Watcher stopped");
    }

    /// Run one poll right now, outside the timer.
    ///
    /// Subject to the same no-overlap rule as timer ticks.
    pub async fn poll_once(&self, provider: &dyn SnapshotProvider) -> TickOutcome {
        self.shared.tick(provider, None, &self.id).await
    }

    /// Replace the baseline with a fresh snapshot without firing the callback.
    ///
    /// Useful right after the application itself changed files, so the next
    /// tick does not report that change back to it.
    pub async fn update_snapshot(&self, provider: &dyn SnapshotProvider) -> anyhow::Result<()> {
        let snapshot = provider.snapshot().await?;
        *lock(&self.shared.last_snapshot) = Some(snapshot);
        debug!(watcher = %self.id, "Baseline refreshed");
        Ok(())
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(active) = lock(&self.active).take() {
            active.cancel.cancel();
        }
    }
}

impl Shared {
    fn is_current(&self, generation: Option<u64>) -> bool {
        match generation {
            None => true,
            Some(generation) => {
                self.running.load(Ordering::SeqCst)
                    && self.generation.load(Ordering::SeqCst) == generation
            }
        }
    }

    fn callback(&self) -> Option<Arc<dyn ChangeCallback>> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn seed(&self, provider: &dyn SnapshotProvider, generation: u64, id: &str) {
        match provider.snapshot().await {
            Ok(snapshot) => {
                let mut last = lock(&self.last_snapshot);
                if !self.is_current(Some(generation)) {
                    return;
                }
                if last.is_none() {
                    *last = Some(snapshot);
                    debug!(watcher = %id, "Baseline seeded");
                }
            }
            Err(e) => warn!(watcher = %id, error = %e, "Initial snapshot failed"),
        }
    }

    /// One poll. `generation` is `Some` for timer ticks, which are discarded
    /// once the watcher has been stopped or restarted.
    async fn tick(
        &self,
        provider: &dyn SnapshotProvider,
        generation: Option<u64>,
        id: &str,
    ) -> TickOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!(watcher = %id, "Previous poll still in flight, skipping tick");
            return TickOutcome::Skipped;
        };

        let fresh = match provider.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(watcher = %id, error = %e, "Snapshot provider failed");
                return TickOutcome::Failed;
            }
        };

        {
            let mut last = lock(&self.last_snapshot);
            if !self.is_current(generation) {
                debug!(watcher = %id, "Discarding poll from a stopped watcher");
                return TickOutcome::Stale;
            }
            let previous = last.as_deref();
            if previous == Some(fresh.as_str()) {
                return TickOutcome::Unchanged;
            }
            let seeded = previous.is_none();
            *last = Some(fresh);
            if seeded {
                debug!(watcher = %id, "Baseline adopted from poll");
                return TickOutcome::Seeded;
            }
        }

        if !self.is_current(generation) {
            debug!(watcher = %id, "Watcher stopped before change could be reported");
            return TickOutcome::Stale;
        }
        debug!(watcher = %id, "Change detected");
        let Some(callback) = self.callback() else {
            return TickOutcome::Changed;
        };
        match callback.on_change().await {
            Ok(()) => TickOutcome::Changed,
            Err(e) => {
                warn!(watcher = %id, error = %e, "Change callback failed");
                TickOutcome::Failed
            }
        }
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    provider: Arc<dyn SnapshotProvider>,
    period: Duration,
    generation: u64,
    cancel: CancellationToken,
    id: String,
) {
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Polls run detached so the timer keeps ticking; overlap is
                // rejected by the busy flag.
                let shared = Arc::clone(&shared);
                let provider = Arc::clone(&provider);
                let id = id.clone();
                tokio::spawn(async move {
                    shared.tick(provider.as_ref(), Some(generation), &id).await;
                });
            }
        }
    }
    debug!(watcher = %id, "Polling loop exited");
}

/// Holds the busy flag for the duration of one poll.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
