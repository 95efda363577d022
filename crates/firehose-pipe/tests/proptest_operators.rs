//! Property: `slide`'s window never exceeds the length the `drop` function
//! enforces, for arbitrary input sequences.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use firehose_core::{FirehoseConfig, StageKey};
use firehose_pipe::{Pipe, PipeValue};
use proptest::prelude::*;

fn dispatcher() -> Arc<firehose_pipe::PipeDispatcher<&'static str, i64>> {
    let config: FirehoseConfig<StageKey<&'static str>> =
        FirehoseConfig::new().with_workers(2).with_ring_capacity(256);
    Arc::new(firehose_core::Firehose::new(config))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn slide_window_never_exceeds_cap(values in prop::collection::vec(any::<i64>(), 0..50)) {
        let hose = dispatcher();
        let windows: Arc<Mutex<Vec<Vec<i64>>>> = Arc::new(Mutex::new(Vec::new()));
        let windows2 = Arc::clone(&windows);

        let pipe: Pipe<&'static str, i64> = Pipe::new().slide(|mut seq: Vec<i64>| {
            if seq.len() > 3 {
                seq.remove(0);
            }
            seq
        });
        let _sub = pipe.consume_windows(&hose, "K1", move |window| {
            windows2.lock().unwrap().push(window.to_vec())
        });

        let count = values.len();
        for v in values {
            hose.notify(StageKey::root("K1"), PipeValue::Item(v));
        }
        std::thread::sleep(Duration::from_millis(20 + count as u64));

        let observed = windows.lock().unwrap();
        prop_assert_eq!(observed.len(), count);
        for window in observed.iter() {
            prop_assert!(window.len() <= 3);
        }
    }
}
