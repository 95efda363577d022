//! Async sink forwarding accepted items into a `firehose-core` dispatcher.

#[cfg(debug_assertions)]
use crate::invariants::debug_assert_item_notified;
use firehose_core::{Firehose, Key};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_sink::Sink;
use pin_project_lite::pin_project;

pin_project! {
    /// Bridges a pull-based `Sink<(K, V)>` onto [`Firehose::notify`].
    ///
    /// `notify` already owns its own backpressure (the dispatcher's ring
    /// handoff claim-slot gate) and blocks the calling thread until a slot
    /// is free, rather than yielding a `Poll::Pending`. `FirehoseSink`
    /// therefore reports `poll_ready` as always ready and does the actual
    /// (possibly blocking) work in `start_send` — the same contract
    /// `futures` documents for sinks whose readiness can't be observed
    /// without performing the send. Closing the sink is a no-op on the
    /// dispatcher: a `Firehose`'s lifecycle is independent of any one sink
    /// and is ended explicitly via `Firehose::shutdown`.
    pub struct FirehoseSink<K, V> {
        dispatcher: Arc<Firehose<K, V>>,
    }
}

impl<K, V> FirehoseSink<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(dispatcher: Arc<Firehose<K, V>>) -> Self {
        Self { dispatcher }
    }
}

impl<K, V> Sink<(K, V)> for FirehoseSink<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    type Error = Infallible;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: (K, V)) -> Result<(), Self::Error> {
        let this = self.project();
        let (key, value) = item;
        this.dispatcher.notify(key, value);
        #[cfg(debug_assertions)]
        debug_assert_item_notified!(true);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
