//! Debug assertion macros for reactive-bridge invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`) — zero overhead
//! in release.

// =============================================================================
// INV-SINK-01: Every accepted item reaches notify
// =============================================================================

/// Assert that `start_send` forwarded its item to the dispatcher exactly
/// once before returning.
macro_rules! debug_assert_item_notified {
    ($notified:expr) => {
        debug_assert!($notified, "INV-SINK-01 violated: accepted item was not forwarded to notify()")
    };
}

pub(crate) use debug_assert_item_notified;
