use std::sync::Arc;
use std::time::Duration;

use firehose_timer::WheelConfig;

use crate::error::DispatchError;

/// Builder-style configuration for a [`crate::Firehose`].
///
/// Mirrors the teacher's `Config`/`StreamConfig` pattern: plain fields set
/// through chainable `with_*` methods, validated at construction, with
/// named presets for common deployment shapes.
#[derive(Clone)]
pub struct FirehoseConfig<K> {
    pub(crate) workers: usize,
    pub(crate) ring_capacity: usize,
    pub(crate) wheel_tick: Duration,
    pub(crate) wheel_size: usize,
    pub(crate) error_handler: Arc<dyn Fn(DispatchError<K>) + Send + Sync>,
}

impl<K> std::fmt::Debug for FirehoseConfig<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirehoseConfig")
            .field("workers", &self.workers)
            .field("ring_capacity", &self.ring_capacity)
            .field("wheel_tick", &self.wheel_tick)
            .field("wheel_size", &self.wheel_size)
            .finish_non_exhaustive()
    }
}

impl<K: std::fmt::Debug + Send + Sync + 'static> FirehoseConfig<K> {
    /// Default handler: logs via `tracing::error!` and otherwise does
    /// nothing. The engine never aborts on a consumer error.
    fn default_error_handler() -> Arc<dyn Fn(DispatchError<K>) + Send + Sync> {
        Arc::new(|err: DispatchError<K>| {
            tracing::error!(error = ?err, "dispatch error");
        })
    }

    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: 4,
            ring_capacity: 65_536,
            wheel_tick: Duration::from_millis(10),
            wheel_size: 512,
            error_handler: Self::default_error_handler(),
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        assert!(workers > 0, "workers must be non-zero");
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "ring_capacity must be non-zero");
        self.ring_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_wheel_tick(mut self, tick: Duration) -> Self {
        self.wheel_tick = tick;
        self
    }

    #[must_use]
    pub fn with_wheel_size(mut self, size: usize) -> Self {
        assert!(size > 0, "wheel_size must be non-zero");
        self.wheel_size = size;
        self
    }

    #[must_use]
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(DispatchError<K>) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub(crate) fn wheel_config(&self) -> WheelConfig {
        WheelConfig::new(self.wheel_size, self.wheel_tick)
    }

    /// Small ring, few workers, fine-grained tick — favors latency over
    /// throughput.
    #[must_use]
    pub fn low_latency() -> Self {
        Self::new()
            .with_workers(2)
            .with_ring_capacity(1024)
            .with_wheel_tick(Duration::from_millis(1))
            .with_wheel_size(256)
    }

    /// Large ring, more workers, coarse tick — favors sustained throughput.
    #[must_use]
    pub fn high_throughput() -> Self {
        Self::new()
            .with_workers(num_cpus_fallback())
            .with_ring_capacity(262_144)
            .with_wheel_tick(Duration::from_millis(20))
            .with_wheel_size(4096)
    }
}

impl<K: std::fmt::Debug + Send + Sync + 'static> Default for FirehoseConfig<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Avoids a hard dependency on a CPU-counting crate for a single default
/// value; falls back to a conservative fixed count when unavailable.
fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8)
}
