//! Reactive-streams bridge for `firehose-core`.
//!
//! Bridges pull-based `futures_core::Stream` / `futures_sink::Sink`
//! consumers onto a [`firehose_core::Firehose`]:
//!
//! - [`FirehoseSink`]: a `Sink<(K, V)>` that forwards every accepted item to
//!   [`firehose_core::Firehose::notify`].
//! - [`FirehoseStreamExt::subscribe_stream`]: registers a consumer for a key
//!   and returns a `Stream<Item = V>` fed from it; dropping (or
//!   [`FirehoseStream::cancel`]ing) the stream unregisters the consumer.
//!
//! # Example
//!
//! ```ignore
//! use firehose_core::{Firehose, FirehoseConfig};
//! use firehose_reactive::{FirehoseSink, FirehoseStreamExt, ReactiveConfig};
//! use futures_util::{SinkExt, StreamExt};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let hose = Arc::new(Firehose::new(FirehoseConfig::new()));
//! let mut stream = hose.subscribe_stream("prices", ReactiveConfig::default());
//! let mut sink = FirehoseSink::new(Arc::clone(&hose));
//!
//! sink.send(("prices", 42)).await.unwrap();
//! assert_eq!(stream.next().await, Some(42));
//! # }
//! ```

mod config;
mod invariants;
mod sink;
mod stream;

pub use config::ReactiveConfig;
pub use sink::FirehoseSink;
pub use stream::{FirehoseStream, FirehoseStreamExt};
