use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use firehose_core::Registry;
use proptest::prelude::*;

/// Selection order is stable: exact registrations always come back in the
/// order they were inserted, regardless of how many unrelated keys are
/// interleaved in between.
proptest! {
    #[test]
    fn select_preserves_insertion_order(n in 1usize..50) {
        let registry: Registry<u32, u32> = Registry::new();
        for i in 0..n as u32 {
            registry.register(0, Arc::new(move |_k: &u32, _v: &u32| {
                let _ = i;
            }));
            // interleave an unrelated key's registration
            registry.register(i + 1000, Arc::new(|_k: &u32, _v: &u32| {}));
        }
        let results = registry.select(&0);
        prop_assert_eq!(results.len(), n);
    }

    #[test]
    fn unregistered_key_never_reappears(n in 1usize..20) {
        let registry: Registry<u32, u32> = Registry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..n {
            let counter = Arc::clone(&counter);
            registry.register(7, Arc::new(move |_k: &u32, _v: &u32| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        prop_assert_eq!(registry.select(&7).len(), n);
        registry.unregister(&7);
        prop_assert!(registry.select(&7).is_empty());
    }
}
