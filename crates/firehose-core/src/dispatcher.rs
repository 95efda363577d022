use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use firehose_timer::TimingWheel;

use crate::config::FirehoseConfig;
use crate::error::{panic_message, DispatchError};
use crate::key::{Key, Selector};
use crate::registry::{Consumer, Registry, Rewriter};
use crate::ring_handoff::{RingHandoff, Task};

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// Sets the thread-local reentrancy flag for the lifetime of the guard,
/// restoring the previous value on drop — including on a panicking unwind,
/// so a consumer panic never leaves a worker thread permanently "inside" a
/// dispatch it has already left.
struct ReentrancyGuard {
    previous: bool,
}

impl ReentrancyGuard {
    fn enter() -> Self {
        let previous = IN_DISPATCH.with(|flag| flag.replace(true));
        Self { previous }
    }

    fn is_active() -> bool {
        IN_DISPATCH.with(Cell::get)
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        IN_DISPATCH.with(|flag| flag.set(self.previous));
    }
}

struct Inner<K, V> {
    registry: Arc<Registry<K, V>>,
    handoff: RingHandoff,
    config: FirehoseConfig<K>,
    timer: OnceLock<Arc<TimingWheel>>,
    shut_down: AtomicBool,
}

impl<K, V> Inner<K, V>
where
    K: Key + std::fmt::Debug,
    V: Send + Sync + 'static,
{
    fn dispatch_one(&self, key: &K, value: &V) {
        let registrations = self.registry.select(key);
        for registration in registrations {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                (registration.consumer)(&registration.key, value);
            }));
            if let Err(payload) = outcome {
                let message = panic_message(&*payload);
                tracing::warn!(key = ?registration.key, %message, "consumer panicked");
                (self.config.error_handler)(DispatchError::ConsumerPanicked {
                    key: registration.key,
                    payload: message,
                });
            }
        }
    }
}

/// The keyed publish/subscribe dispatch bus: publishes events, enforces
/// backpressure, routes through the [`Registry`], and runs consumers on a
/// fixed pool of worker threads draining the [`RingHandoff`].
pub struct Firehose<K, V> {
    inner: Arc<Inner<K, V>>,
    workers: Vec<JoinHandle<()>>,
}

impl<K, V> Firehose<K, V>
where
    K: Key + std::fmt::Debug,
    V: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(config: FirehoseConfig<K>) -> Self {
        Self::with_registry(Arc::new(Registry::new()), config)
    }

    fn with_registry(registry: Arc<Registry<K, V>>, config: FirehoseConfig<K>) -> Self {
        let inner = Arc::new(Inner {
            registry,
            handoff: RingHandoff::new(config.ring_capacity),
            config,
            timer: OnceLock::new(),
            shut_down: AtomicBool::new(false),
        });

        let workers = (0..inner.config.workers)
            .map(|id| {
                let worker_inner = Arc::clone(&inner);
                std::thread::Builder::new()
                    .name(format!("firehose-worker-{id}"))
                    .spawn(move || worker_loop(&worker_inner))
                    .expect("failed to spawn firehose worker")
            })
            .collect();

        Self { inner, workers }
    }

    /// Publishes `value` under `key`. Every registration currently matching
    /// `key` observes `(key, value)` exactly once, in `select` order,
    /// unless its consumer panics.
    ///
    /// When called from within a running consumer (reentrant dispatch),
    /// delivery happens synchronously on the current worker, depth-first,
    /// bypassing both the backpressure gate and the ring handoff.
    /// Otherwise the publisher claims a handoff slot — blocking with
    /// adaptive backoff if the handoff is full — and enqueues a task for a
    /// worker to run.
    pub fn notify(&self, key: K, value: V) -> &Self {
        if ReentrancyGuard::is_active() {
            self.inner.dispatch_one(&key, &value);
            return self;
        }

        if self.inner.shut_down.load(Ordering::Acquire) {
            tracing::trace!(?key, "notify after shutdown, dropping");
            return self;
        }

        if !self.inner.handoff.claim_slot_blocking() {
            tracing::trace!(?key, "handoff closed while waiting for a slot, dropping");
            return self;
        }

        let inner = Arc::clone(&self.inner);
        let key_for_task = key;
        let task: Task = Box::new(move || {
            let error_key = key_for_task.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                inner.dispatch_one(&key_for_task, &value);
            }));
            if let Err(payload) = outcome {
                let message = panic_message(&*payload);
                tracing::error!(key = ?error_key, %message, "dispatch failed outside consumer");
                (inner.config.error_handler)(DispatchError::DispatchFailure {
                    key: error_key,
                    reason: message,
                });
            }
        });
        self.inner.handoff.push(task);
        self
    }

    /// Registers `consumer` under the exact key `key`.
    pub fn on(&self, key: K, consumer: Consumer<K, V>) -> u64 {
        self.inner.registry.register(key, consumer)
    }

    /// Registers a selector with a rewriter producing derived
    /// `(key, consumer)` pairs on match.
    pub fn on_selector(&self, selector: Selector<K>, rewriter: Rewriter<K, V>) -> u64 {
        self.inner.registry.register_selector(selector, rewriter)
    }

    /// Removes all exact registrations under `key`.
    pub fn unregister(&self, key: &K) -> bool {
        self.inner.registry.unregister(key)
    }

    /// Removes every registration (exact or selector) whose id is in
    /// `ids`.
    pub fn unregister_ids(&self, ids: &[u64]) -> bool {
        ids.iter().fold(false, |acc, id| self.inner.registry.unregister_id(*id) || acc)
    }

    /// Removes every exact registration whose key satisfies `predicate`,
    /// plus every selector registration among `selector_ids` (selector
    /// equality to a predicate is implementation-defined, so callers name
    /// the selectors they mean by the id `on_selector` returned).
    pub fn unregister_matching<P>(&self, predicate: P, selector_ids: &[u64]) -> bool
    where
        P: Fn(&K) -> bool,
    {
        self.inner.registry.unregister_matching(predicate, selector_ids)
    }

    /// Lazily constructs and returns the timing wheel backing timer-driven
    /// operators, on first access.
    ///
    /// A panicking timer callback (e.g. a debounce/throttle firing) is
    /// caught rather than allowed to unwind through the wheel's background
    /// thread, and routed to this dispatcher's error handler as
    /// [`DispatchError::TimerCallbackFailed`].
    pub fn timer(&self) -> &Arc<TimingWheel> {
        self.inner.timer.get_or_init(|| {
            let error_handler = Arc::clone(&self.inner.config.error_handler);
            Arc::new(TimingWheel::with_panic_hook(
                self.inner.config.wheel_config(),
                Arc::new(move |reason: String| {
                    error_handler(DispatchError::TimerCallbackFailed { reason });
                }),
            ))
        })
    }

    /// Returns a new dispatcher sharing this one's registry but with its
    /// own ring handoff and worker pool, sized by `config`.
    #[must_use]
    pub fn fork(&self, config: FirehoseConfig<K>) -> Self {
        Self::with_registry(Arc::clone(&self.inner.registry), config)
    }

    /// Signals the ring handoff to stop admitting new tasks. In-flight
    /// workers finish whatever task they're currently running, then drain
    /// the remaining queue before exiting. Joins all worker threads before
    /// returning.
    pub fn shutdown(mut self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.handoff.close();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop<K, V>(inner: &Arc<Inner<K, V>>)
where
    K: Key + std::fmt::Debug,
    V: Send + Sync + 'static,
{
    while let Some(task) = inner.handoff.pop() {
        let _guard = ReentrancyGuard::enter();
        task();
        drop(_guard);
        inner.handoff.release_slot();
    }
}
