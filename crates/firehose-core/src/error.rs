use std::fmt;

/// Errors surfaced by the dispatch core.
///
/// Everything except [`DispatchError::PreconditionViolation`] is routed
/// through the configured error handler rather than returned to a caller —
/// a consumer panic or a backpressure hiccup on worker N has no sensible
/// `Result` to return to publisher M.
#[derive(thiserror::Error)]
pub enum DispatchError<K> {
    #[error("precondition violation: {reason}")]
    PreconditionViolation { reason: String },

    #[error("consumer panicked while handling key {key:?}: {payload}")]
    ConsumerPanicked { key: K, payload: String },

    #[error("dispatch failed for key {key:?}: {reason}")]
    DispatchFailure { key: K, reason: String },

    #[error("backpressure wait interrupted")]
    BackpressureInterrupted,

    #[error("timer callback failed: {reason}")]
    TimerCallbackFailed { reason: String },
}

// Manual Debug: deriving would require `K: Debug` on every variant even
// though only the key-carrying ones need it, and thiserror's derive ties
// Display's bound to whatever Debug derives, so this is spelled out by hand.
impl<K: fmt::Debug> fmt::Debug for DispatchError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreconditionViolation { reason } => {
                f.debug_struct("PreconditionViolation").field("reason", reason).finish()
            }
            Self::ConsumerPanicked { key, payload } => f
                .debug_struct("ConsumerPanicked")
                .field("key", key)
                .field("payload", payload)
                .finish(),
            Self::DispatchFailure { key, reason } => f
                .debug_struct("DispatchFailure")
                .field("key", key)
                .field("reason", reason)
                .finish(),
            Self::BackpressureInterrupted => write!(f, "BackpressureInterrupted"),
            Self::TimerCallbackFailed { reason } => {
                f.debug_struct("TimerCallbackFailed").field("reason", reason).finish()
            }
        }
    }
}

/// Extracts a printable message from a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
