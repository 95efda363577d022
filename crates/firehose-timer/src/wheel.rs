use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Configuration for a [`TimingWheel`].
#[derive(Debug, Clone, Copy)]
pub struct WheelConfig {
    /// Number of buckets. Determines how many distinct tick offsets within
    /// a revolution can be distinguished without a round-trip.
    pub wheel_size: usize,
    /// Duration of a single tick. Delays are rounded up to the nearest
    /// multiple of this.
    pub tick_duration: Duration,
}

impl WheelConfig {
    #[must_use]
    pub const fn new(wheel_size: usize, tick_duration: Duration) -> Self {
        assert!(wheel_size > 0, "wheel_size must be non-zero");
        Self {
            wheel_size,
            tick_duration,
        }
    }

    /// Tuned for sub-millisecond scheduling granularity at the cost of a
    /// busier background thread.
    #[must_use]
    pub const fn low_latency() -> Self {
        Self::new(512, Duration::from_millis(1))
    }

    /// Tuned for coarse, high-volume scheduling (debounce/throttle windows
    /// measured in tens of milliseconds or more).
    #[must_use]
    pub const fn high_throughput() -> Self {
        Self::new(4096, Duration::from_millis(10))
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self::low_latency()
    }
}

struct Entry {
    rounds: u64,
    cancelled: Arc<AtomicBool>,
    callback: Box<dyn FnOnce() + Send + 'static>,
}

struct Bucket {
    entries: Vec<Entry>,
}

struct Inner {
    buckets: Vec<Mutex<Bucket>>,
    cursor: AtomicU64,
    tick_duration: Duration,
    shutdown: AtomicBool,
    wake: Condvar,
    wake_lock: Mutex<()>,
    panic_hook: Arc<dyn Fn(String) + Send + Sync>,
}

/// A hashed timing wheel running a single background thread.
///
/// Scheduling is `O(1)`: an entry is pushed into the bucket its delay lands
/// on, along with a round count for delays spanning more than one
/// revolution. Each tick the background thread drains exactly one bucket,
/// decrementing round counters for entries not yet due and firing the rest.
pub struct TimingWheel {
    inner: Arc<Inner>,
    join: Option<JoinHandle<()>>,
}

/// A cancellable handle to a scheduled entry.
///
/// Dropping the handle does **not** cancel the timer; call [`cancel`](TimerHandle::cancel)
/// explicitly. This mirrors the rest of the crate's handles, which are plain
/// tokens rather than RAII guards, since a dispatcher often wants to hand the
/// handle off to unrelated code.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl TimingWheel {
    /// Creates a wheel whose callbacks, if they panic, are only logged via
    /// `tracing::error!`. Most callers running inside a dispatcher should
    /// use [`TimingWheel::with_panic_hook`] instead so a panicking callback
    /// is also routed to the configured error handler.
    #[must_use]
    pub fn new(config: WheelConfig) -> Self {
        Self::with_panic_hook(
            config,
            Arc::new(|message: String| {
                tracing::error!(%message, "timer callback panicked");
            }),
        )
    }

    /// Creates a wheel, invoking `panic_hook` with the panic message
    /// whenever a scheduled callback unwinds instead of returning
    /// normally. The callback is always caught so one bad timer firing
    /// never kills the wheel's background thread.
    #[must_use]
    pub fn with_panic_hook(
        config: WheelConfig,
        panic_hook: Arc<dyn Fn(String) + Send + Sync>,
    ) -> Self {
        let buckets = (0..config.wheel_size)
            .map(|_| {
                Mutex::new(Bucket {
                    entries: Vec::new(),
                })
            })
            .collect();

        let inner = Arc::new(Inner {
            buckets,
            cursor: AtomicU64::new(0),
            tick_duration: config.tick_duration,
            shutdown: AtomicBool::new(false),
            wake: Condvar::new(),
            wake_lock: Mutex::new(()),
            panic_hook,
        });

        let worker_inner = Arc::clone(&inner);
        let join = std::thread::Builder::new()
            .name("firehose-timer".into())
            .spawn(move || run(&worker_inner))
            .expect("failed to spawn timer thread");

        Self {
            inner,
            join: Some(join),
        }
    }

    /// Schedules `callback` to run after `delay`, rounded up to the nearest
    /// tick. Returns a handle that can cancel the firing before it happens.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let wheel_size = self.inner.buckets.len() as u64;
        let tick_nanos = self.inner.tick_duration.as_nanos().max(1);
        let delay_ticks = ((delay.as_nanos() + tick_nanos - 1) / tick_nanos).max(1) as u64;

        let cursor = self.inner.cursor.load(Ordering::Acquire);
        let target = cursor + delay_ticks;
        let bucket_index = (target % wheel_size) as usize;
        let rounds = delay_ticks / wheel_size;

        let cancelled = Arc::new(AtomicBool::new(false));
        let entry = Entry {
            rounds,
            cancelled: Arc::clone(&cancelled),
            callback: Box::new(callback),
        };

        let mut bucket = self.inner.buckets[bucket_index].lock().unwrap();
        bucket.entries.push(entry);
        drop(bucket);

        tracing::trace!(bucket_index, rounds, ?delay, "scheduled timer entry");
        TimerHandle { cancelled }
    }
}

impl Drop for TimingWheel {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        let _guard = self.inner.wake_lock.lock().unwrap();
        drop(_guard);
        self.inner.wake.notify_all();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run(inner: &Arc<Inner>) {
    let wheel_size = inner.buckets.len() as u64;
    loop {
        let guard = inner.wake_lock.lock().unwrap();
        if inner.shutdown.load(Ordering::Acquire) {
            return;
        }
        let (_guard, timeout) = inner
            .wake
            .wait_timeout(guard, inner.tick_duration)
            .unwrap();
        let _ = timeout;
        if inner.shutdown.load(Ordering::Acquire) {
            return;
        }

        let cursor = inner.cursor.fetch_add(1, Ordering::AcqRel);
        let index = (cursor % wheel_size) as usize;

        let due = {
            let mut bucket = inner.buckets[index].lock().unwrap();
            let mut due = Vec::new();
            let mut remaining = Vec::with_capacity(bucket.entries.len());
            for mut entry in bucket.entries.drain(..) {
                if entry.rounds == 0 {
                    due.push(entry);
                } else {
                    entry.rounds -= 1;
                    remaining.push(entry);
                }
            }
            bucket.entries = remaining;
            due
        };

        for entry in due {
            if entry.cancelled.load(Ordering::Acquire) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)()));
            if let Err(payload) = outcome {
                let message = panic_message(&*payload);
                (inner.panic_hook)(message);
            }
        }
    }
}

/// Extracts a printable message from a `catch_unwind` payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn fires_after_delay() {
        let wheel = TimingWheel::new(WheelConfig::new(16, Duration::from_millis(5)));
        let (tx, rx) = mpsc::channel();
        wheel.schedule(Duration::from_millis(20), move || {
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(1))
            .expect("timer did not fire");
    }

    #[test]
    fn cancelled_entry_does_not_fire() {
        let wheel = TimingWheel::new(WheelConfig::new(16, Duration::from_millis(5)));
        let (tx, rx) = mpsc::channel();
        let handle = wheel.schedule(Duration::from_millis(20), move || {
            tx.send(()).unwrap();
        });
        handle.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn multi_revolution_delay_fires() {
        // wheel_size=4, tick=2ms -> one revolution is 8ms; schedule past it.
        let wheel = TimingWheel::new(WheelConfig::new(4, Duration::from_millis(2)));
        let (tx, rx) = mpsc::channel();
        wheel.schedule(Duration::from_millis(50), move || {
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(1))
            .expect("multi-revolution timer did not fire");
    }

    #[test]
    fn many_entries_in_same_bucket_all_fire() {
        let wheel = TimingWheel::new(WheelConfig::new(8, Duration::from_millis(2)));
        let (tx, rx) = mpsc::channel();
        for _ in 0..32 {
            let tx = tx.clone();
            wheel.schedule(Duration::from_millis(10), move || {
                tx.send(()).unwrap();
            });
        }
        drop(tx);
        let mut count = 0;
        while rx.recv_timeout(Duration::from_secs(1)).is_ok() {
            count += 1;
        }
        assert_eq!(count, 32);
    }
}
