//! Declarative stream pipelines materialized onto a `firehose-core`
//! dispatcher.
//!
//! A [`Pipe`] is an immutable ordered sequence of stream suppliers.
//! Operator methods (`map`, `scan`, `filter`, ...) return a new `Pipe`
//! extending the sequence; the prior value is left untouched since the
//! sequence itself is an `Arc<Vec<Arc<dyn StageSupplier<K, T>>>>` and
//! extending it clones the `Arc` pointers into a fresh, one-longer `Vec`.
//! `subscribe` walks the sequence once, registering one consumer per stage
//! on the shared dispatcher, each publishing to the next stage's key.

mod operators;
mod stage;
mod subscription;
mod value;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use firehose_core::{Atom, Key, StageKey};

pub use stage::{PipeDispatcher, StageSupplier};
pub use subscription::Subscription;
pub use value::PipeValue;

use operators::{
    CoalesceStage, FilterStage, MapStage, MapWithStage, PartitionStage, ScanStage, SlideStage,
};

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// An immutable, composable description of a stream pipeline over values
/// of type `T`, keyed by application keys `K`.
pub struct Pipe<K, T>
where
    K: Key,
    T: Send + Sync + 'static,
{
    stages: Arc<Vec<Arc<dyn StageSupplier<K, T>>>>,
}

impl<K, T> Clone for Pipe<K, T>
where
    K: Key,
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            stages: Arc::clone(&self.stages),
        }
    }
}

impl<K, T> Default for Pipe<K, T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Pipe<K, T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Arc::new(Vec::new()),
        }
    }

    fn extend(&self, stage: Arc<dyn StageSupplier<K, T>>) -> Self {
        let mut next = (*self.stages).clone();
        next.push(stage);
        Self {
            stages: Arc::new(next),
        }
    }

    /// Publishes `f(v)` downstream for every event.
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.extend(Arc::new(MapStage { f: Arc::new(f) }))
    }

    /// Like `map`, but `f` is given a handle to a per-subscription `Atom<S>`
    /// it may read and mutate across events.
    #[must_use]
    pub fn map_with<F, S>(&self, init: S, f: F) -> Self
    where
        F: Fn(&Atom<S>, &T) -> T + Send + Sync + 'static,
        S: Clone + Send + Sync + 'static,
    {
        self.extend(Arc::new(MapWithStage {
            f: Arc::new(f),
            init,
        }))
    }

    /// Accumulates `s' = f(s, v)` in a per-subscription `Atom<T>` seeded
    /// with `init`, publishing each new `s'` downstream.
    #[must_use]
    pub fn scan<F>(&self, init: T, f: F) -> Self
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        self.extend(Arc::new(ScanStage {
            f: Arc::new(f),
            init,
        }))
    }

    /// Publishes only events for which `predicate(v)` holds.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.extend(Arc::new(FilterStage {
            predicate: Arc::new(predicate),
        }))
    }

    /// Maintains a per-subscription window, appending each event and
    /// applying `drop` to the result (e.g. keep only the last N), then
    /// publishing the resulting window downstream.
    #[must_use]
    pub fn slide<D>(&self, drop: D) -> Self
    where
        D: Fn(Vec<T>) -> Vec<T> + Send + Sync + 'static,
    {
        self.extend(Arc::new(SlideStage {
            drop: Arc::new(drop),
        }))
    }

    /// Accumulates events into a per-subscription buffer; whenever
    /// `emit_when_full` holds for the buffer-so-far, publishes it
    /// downstream and resets the buffer. The append/test/reset sequence
    /// commits atomically with respect to concurrent events on the same
    /// key.
    #[must_use]
    pub fn partition<F>(&self, emit_when_full: F) -> Self
    where
        F: Fn(&[T]) -> bool + Send + Sync + 'static,
    {
        self.extend(Arc::new(PartitionStage {
            emit_when_full: Arc::new(emit_when_full),
        }))
    }

    /// Trailing-edge coalescing: every event resets a `period`-long quiet
    /// timer; only the last value observed before the window elapses in
    /// silence is published downstream.
    ///
    /// `debounce` and `throttle` are the same stage under two names — see
    /// the crate-level design notes for why.
    #[must_use]
    pub fn debounce(&self, period: Duration) -> Self {
        self.extend(Arc::new(CoalesceStage::new(period)))
    }

    /// See [`Pipe::debounce`].
    #[must_use]
    pub fn throttle(&self, period: Duration) -> Self {
        self.extend(Arc::new(CoalesceStage::new(period)))
    }

    /// Appends a terminal sink and materializes the whole pipeline in one
    /// call: equivalent to pushing a consume stage, then `subscribe`.
    ///
    /// `consumer` only ever sees `PipeValue::Item` output — a pipeline
    /// ending in `slide`/`partition` publishes `PipeValue::Window` instead
    /// and needs [`Pipe::consume_windows`] for its sink to see anything.
    pub fn consume<F>(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        source_key: K,
        consumer: F,
    ) -> Subscription<K, T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let with_sink = self.extend(Arc::new(ConsumeStage {
            consumer: Arc::new(consumer),
        }));
        with_sink.subscribe(dispatcher, source_key)
    }

    /// Like [`Pipe::consume`], but for a pipeline whose last stage is
    /// `slide` or `partition`: `consumer` is invoked with each emitted
    /// window (`PipeValue::Window`), and plain `Item` output (from a
    /// pipeline with no windowing stage) is silently ignored rather than
    /// the other way around.
    pub fn consume_windows<F>(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        source_key: K,
        consumer: F,
    ) -> Subscription<K, T>
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        let with_sink = self.extend(Arc::new(ConsumeWindowStage {
            consumer: Arc::new(consumer),
        }));
        with_sink.subscribe(dispatcher, source_key)
    }

    /// Materializes the pipeline onto `dispatcher`: each stage is assigned
    /// a fresh internal destination key and registered as a consumer that
    /// publishes to the next stage's key. Returns a handle that can tear
    /// down every registration this call created.
    ///
    /// Stage 0 registers at the plain root key derived from `source_key`,
    /// shared across every subscription at that key (so publishing to the
    /// application key fans out to all of them, as an ordinary `Registry`
    /// registration would). Every later stage's key is scoped to this one
    /// subscription by a unique tag, so two independent subscriptions over
    /// the same source never cross-deliver into each other's internal
    /// stages.
    pub fn subscribe(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        source_key: K,
    ) -> Subscription<K, T> {
        let subscription_id = SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root_key = StageKey::root(source_key);
        let mut current_key = root_key.clone();
        let mut ids = Vec::with_capacity(self.stages.len());

        for (i, supplier) in self.stages.iter().enumerate() {
            let destination_key = if i == 0 {
                current_key.derive(subscription_id)
            } else {
                current_key.derive(i as u64)
            };
            let consumer =
                supplier.build(dispatcher, current_key.clone(), destination_key.clone());
            let id = dispatcher.on(current_key.clone(), consumer);
            ids.push(id);
            current_key = destination_key;
        }

        tracing::debug!(stages = self.stages.len(), "subscribed pipeline");
        Subscription::new(Arc::clone(dispatcher), ids, root_key, current_key)
    }
}

struct ConsumeStage<T> {
    consumer: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<K, T> StageSupplier<K, T> for ConsumeStage<T>
where
    K: Key,
    T: Send + Sync + 'static,
{
    fn build(
        &self,
        _dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        _destination: StageKey<K>,
    ) -> firehose_core::Consumer<StageKey<K>, PipeValue<T>> {
        let consumer = Arc::clone(&self.consumer);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(item) = v.as_item() {
                consumer(item);
            }
        })
    }
}

struct ConsumeWindowStage<T> {
    consumer: Arc<dyn Fn(&[T]) + Send + Sync>,
}

impl<K, T> StageSupplier<K, T> for ConsumeWindowStage<T>
where
    K: Key,
    T: Send + Sync + 'static,
{
    fn build(
        &self,
        _dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        _destination: StageKey<K>,
    ) -> firehose_core::Consumer<StageKey<K>, PipeValue<T>> {
        let consumer = Arc::clone(&self.consumer);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(window) = v.as_window() {
                consumer(window);
            }
        })
    }
}
