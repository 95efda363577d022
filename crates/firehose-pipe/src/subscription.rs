use std::sync::Arc;

use firehose_core::StageKey;

use crate::stage::PipeDispatcher;

/// A handle returned by `Pipe::subscribe`, capable of tearing down every
/// registration the materialized pipeline created.
pub struct Subscription<K, T>
where
    K: firehose_core::Key,
    T: Send + Sync + 'static,
{
    dispatcher: Arc<PipeDispatcher<K, T>>,
    registration_ids: Vec<u64>,
    source_key: StageKey<K>,
    terminal_key: StageKey<K>,
}

impl<K, T> Subscription<K, T>
where
    K: firehose_core::Key,
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        dispatcher: Arc<PipeDispatcher<K, T>>,
        registration_ids: Vec<u64>,
        source_key: StageKey<K>,
        terminal_key: StageKey<K>,
    ) -> Self {
        Self {
            dispatcher,
            registration_ids,
            source_key,
            terminal_key,
        }
    }

    /// The internal key the pipeline was materialized at; publish here (or
    /// to the application key it was derived from) to feed the pipeline.
    #[must_use]
    pub fn source_key(&self) -> &StageKey<K> {
        &self.source_key
    }

    /// The key the last stage in the pipeline publishes its output under.
    /// For a pipeline with no terminal sink stage attached (a plain
    /// `subscribe`, as opposed to `consume`/`consume_windows`), nothing is
    /// registered here yet — register a consumer at this key to observe
    /// the pipeline's output directly, including `PipeValue::Window`
    /// values from a trailing `slide`/`partition` stage.
    #[must_use]
    pub fn terminal_key(&self) -> &StageKey<K> {
        &self.terminal_key
    }

    /// Removes every registration this subscription created.
    pub fn unsubscribe(self) {
        tracing::debug!(count = self.registration_ids.len(), "unsubscribing pipeline");
        self.dispatcher.unregister_ids(&self.registration_ids);
    }
}
