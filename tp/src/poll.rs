//! Self-rescheduling poll loop with pause/resume/reset semantics

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::trace;

/// Interval used by callers that do not configure one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);

/// Boxed async task run on every poll iteration.
pub type PollTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Options for a [`TimeoutPoll`].
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Run the task right away on `resume()` instead of waiting one interval.
    pub immediate: bool,

    /// Maximum number of iterations; `None` means unbounded.
    pub max: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            immediate: false,
            max: Some(100),
        }
    }
}

/// An independently controllable polling loop.
///
/// Construction with `immediate` auto-starts the loop; otherwise call
/// [`resume`](TimeoutPoll::resume). Dropping the handle pauses the loop and
/// clears any armed timer, so a loop cannot schedule work past its owner.
///
/// Must be used within a tokio runtime.
pub struct TimeoutPoll {
    inner: Arc<Inner>,
}

struct Inner {
    task: PollTask,
    interval: Duration,
    immediate: bool,
    max: Option<u32>,
    active: AtomicBool,
    times: AtomicU32,
    /// The armed (sleeping) timer task, if any. At most one per handle.
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Lock the timer slot, surviving a poisoned mutex.
fn lock_timer(timer: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TimeoutPoll {
    /// Create a poll loop running `task` every `interval`.
    pub fn new(task: PollTask, interval: Duration, options: PollOptions) -> Self {
        let poll = Self {
            inner: Arc::new(Inner {
                task,
                interval,
                immediate: options.immediate,
                max: options.max,
                active: AtomicBool::new(false),
                times: AtomicU32::new(0),
                timer: Mutex::new(None),
            }),
        };

        if poll.inner.immediate {
            poll.resume();
        }

        poll
    }

    /// Start or restart the loop. Idempotent while active.
    ///
    /// With `immediate`, the task runs before the first delay is scheduled;
    /// otherwise the first delay is armed right away.
    pub fn resume(&self) {
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return;
        }

        trace!("poll resumed");
        if self.inner.immediate {
            // Run one iteration now; the chain re-arms itself afterwards.
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                Inner::iterate(inner).await;
            });
        } else {
            Inner::arm(&self.inner);
        }
    }

    /// Stop future iterations.
    ///
    /// An already armed timer is left in place; when it fires it finds the
    /// loop inactive and does nothing.
    pub fn pause(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        trace!("poll paused");
    }

    /// Clear any armed timer, mark inactive, zero the iteration counter.
    pub fn reset(&self) {
        self.inner.clear();
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.times.store(0, Ordering::SeqCst);
        trace!("poll reset");
    }

    /// Whether the loop is currently active.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Iterations run since construction or the last `reset()`.
    pub fn iterations(&self) -> u32 {
        self.inner.times.load(Ordering::SeqCst)
    }
}

impl Drop for TimeoutPoll {
    fn drop(&mut self) {
        self.pause();
        self.inner.clear();
    }
}

impl Inner {
    fn clear(&self) {
        if let Some(timer) = lock_timer(&self.timer).take() {
            timer.abort();
        }
    }

    /// Arm a one-shot timer for one interval, replacing any pending timer.
    fn arm(inner: &Arc<Inner>) {
        let mut slot = lock_timer(&inner.timer);
        if let Some(timer) = slot.take() {
            timer.abort();
        }

        let chained = Arc::clone(inner);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(chained.interval).await;
            Inner::iterate(chained).await;
        }));
    }

    async fn iterate(inner: Arc<Inner>) {
        if !inner.active.load(Ordering::SeqCst) {
            return;
        }

        if let Some(max) = inner.max
            && inner.times.load(Ordering::SeqCst) >= max
        {
            trace!(max, "poll reached its iteration bound");
            return;
        }
        inner.times.fetch_add(1, Ordering::SeqCst);

        (inner.task)().await;
        Inner::arm(&inner);
    }
}
