//! Configuration for the reactive-streams bridge.

/// Configuration for a [`crate::FirehoseStream`] subscription.
///
/// Mirrors the teacher's `StreamConfig` builder: a plain struct set through
/// chainable `with_*` methods, with named presets for common deployment
/// shapes.
#[derive(Debug, Clone, Copy)]
pub struct ReactiveConfig {
    /// Capacity of the bounded channel bridging dispatcher delivery
    /// (synchronous, on a worker thread) to the stream's `poll_next`
    /// (asynchronous). This capacity *is* the demand/backpressure signal —
    /// see `firehose-reactive`'s crate docs.
    pub channel_capacity: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

impl ReactiveConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "channel_capacity must be non-zero");
        self.channel_capacity = capacity;
        self
    }

    /// Small buffer: a slow subscriber applies backpressure to the
    /// dispatcher worker almost immediately.
    #[must_use]
    pub fn low_latency() -> Self {
        Self::new().with_channel_capacity(64)
    }

    /// Large buffer: absorbs bursts before a slow subscriber starts
    /// stalling dispatcher workers.
    #[must_use]
    pub fn high_throughput() -> Self {
        Self::new().with_channel_capacity(16_384)
    }
}
