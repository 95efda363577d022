//! Async stream forwarding a dispatcher subscription to a pull-based
//! consumer, and the extension trait that creates one.

use crate::config::ReactiveConfig;
use firehose_core::{Firehose, Key};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

/// A live subscription to a dispatcher key, exposed as a `futures_core::Stream`.
///
/// On subscription, registers a consumer for `key` that clones each
/// matching value into an internal bounded channel; `poll_next` drains that
/// channel. The channel's own bounded capacity *is* the backpressure
/// mechanism (see [`ReactiveConfig`]) rather than a hand-rolled demand
/// counter: a full channel makes the consumer's `blocking_send` block the
/// dispatcher worker that's running it, which in turn stalls that worker's
/// ring handoff — the same propagation path an ordinary slow consumer would
/// cause.
///
/// Dropping the stream unregisters the consumer, per §4.7 of the design:
/// "Cancellation unregisters the consumer."
pub struct FirehoseStream<K, V> {
    dispatcher: Arc<Firehose<K, V>>,
    registration_id: u64,
    receiver: mpsc::Receiver<V>,
    unregistered: bool,
}

impl<K, V> FirehoseStream<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    /// Unregisters the backing consumer immediately, rather than waiting
    /// for drop. Idempotent.
    pub fn cancel(&mut self) {
        if !self.unregistered {
            self.dispatcher.unregister_ids(&[self.registration_id]);
            self.unregistered = true;
        }
    }
}

impl<K, V> Stream for FirehoseStream<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    type Item = V;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<K, V> Drop for FirehoseStream<K, V> {
    fn drop(&mut self) {
        // `cancel()` may already have unregistered us; dropping after a
        // legitimate cancel is the normal, expected path, not a violation.
        if !self.unregistered {
            self.dispatcher.unregister_ids(&[self.registration_id]);
        }
    }
}

/// Extension trait adding [`subscribe_stream`](FirehoseStreamExt::subscribe_stream)
/// to a shared dispatcher.
pub trait FirehoseStreamExt<K, V> {
    /// Registers a consumer for `key` and returns a `Stream` that yields
    /// every value published to it from here on.
    fn subscribe_stream(&self, key: K, config: ReactiveConfig) -> FirehoseStream<K, V>;
}

impl<K, V> FirehoseStreamExt<K, V> for Arc<Firehose<K, V>>
where
    K: Key,
    V: Clone + Send + Sync + 'static,
{
    fn subscribe_stream(&self, key: K, config: ReactiveConfig) -> FirehoseStream<K, V> {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let registration_id = self.on(
            key,
            Arc::new(move |_k: &K, v: &V| {
                let value = v.clone();
                if tx.blocking_send(value).is_err() {
                    tracing::trace!("subscriber stream dropped, discarding event");
                }
            }),
        );
        FirehoseStream {
            dispatcher: Arc::clone(self),
            registration_id,
            receiver: rx,
            unregistered: false,
        }
    }
}
