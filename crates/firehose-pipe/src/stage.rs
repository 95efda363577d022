use std::sync::Arc;

use firehose_core::{Consumer, Firehose, Key, StageKey};

use crate::value::PipeValue;

/// A dispatcher keyed by pipeline-internal [`StageKey`]s carrying
/// [`PipeValue`]s — the shared substrate every materialized stage runs
/// against.
pub type PipeDispatcher<K, T> = Firehose<StageKey<K>, PipeValue<T>>;

/// One link in a [`crate::Pipe`]. Given the dispatcher it will be
/// materialized onto, the key it should register at, and the key it
/// should publish its output under, produces the consumer to register.
///
/// Suppliers are stateless descriptions: `build` is called once per
/// `subscribe`, so any per-stage state (an `Atom`, a pending timer handle)
/// is created fresh inside `build` and captured by the returned consumer —
/// the same `Pipe` value can be subscribed more than once without stages
/// sharing state across subscriptions.
pub trait StageSupplier<K, T>: Send + Sync
where
    K: Key,
    T: Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>>;
}
