//! Black-box pipeline behavior: operators not already covered by
//! `firehose-pipe`'s unit tests, plus subscription teardown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use firehose_core::{Atom, FirehoseConfig, StageKey};
use firehose_pipe::{Pipe, PipeDispatcher};

fn dispatcher() -> Arc<PipeDispatcher<&'static str, i64>> {
    let config: FirehoseConfig<StageKey<&'static str>> =
        FirehoseConfig::new().with_workers(2).with_ring_capacity(64);
    Arc::new(firehose_core::Firehose::new(config))
}

#[test]
fn map_with_reads_and_mutates_per_subscription_atom() {
    let hose = dispatcher();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);

    // Running sum, but via map_with rather than scan, to exercise the
    // supplied Atom directly.
    let pipe: Pipe<&'static str, i64> = Pipe::new().map_with(0i64, |state: &Atom<i64>, v| {
        *state.swap(|s| s + v)
    });
    let _sub = pipe.consume(&hose, "K1", move |v| seen2.lock().unwrap().push(*v));

    for v in [1, 2, 3] {
        hose.notify(StageKey::root("K1"), firehose_pipe::PipeValue::Item(v));
    }
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*seen.lock().unwrap(), vec![1, 3, 6]);
}

#[test]
fn throttle_emits_last_value_once_after_quiet_period() {
    let hose = dispatcher();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);

    let pipe: Pipe<&'static str, i64> = Pipe::new().throttle(Duration::from_millis(60));
    let _sub = pipe.consume(&hose, "K1", move |v| seen2.lock().unwrap().push(*v));

    hose.notify(StageKey::root("K1"), firehose_pipe::PipeValue::Item(1));
    std::thread::sleep(Duration::from_millis(30));
    hose.notify(StageKey::root("K1"), firehose_pipe::PipeValue::Item(2));
    std::thread::sleep(Duration::from_millis(200));

    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn unsubscribe_tears_down_every_registration() {
    let hose = dispatcher();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);

    let pipe: Pipe<&'static str, i64> = Pipe::new().map(|v| v + 1);
    let sub = pipe.consume(&hose, "K1", move |v| seen2.lock().unwrap().push(*v));

    hose.notify(StageKey::root("K1"), firehose_pipe::PipeValue::Item(1));
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(*seen.lock().unwrap(), vec![2]);

    sub.unsubscribe();

    hose.notify(StageKey::root("K1"), firehose_pipe::PipeValue::Item(2));
    std::thread::sleep(Duration::from_millis(30));
    // No further delivery: the map stage's registration is gone.
    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn two_independent_subscriptions_do_not_cross_deliver() {
    let hose = dispatcher();
    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));

    let pipe: Pipe<&'static str, i64> = Pipe::new().map(|v| v * 10);
    let seen_a2 = Arc::clone(&seen_a);
    let _sub_a = pipe.consume(&hose, "K1", move |v| seen_a2.lock().unwrap().push(*v));
    let seen_b2 = Arc::clone(&seen_b);
    let _sub_b = pipe.consume(&hose, "K1", move |v| seen_b2.lock().unwrap().push(*v));

    hose.notify(StageKey::root("K1"), firehose_pipe::PipeValue::Item(4));
    std::thread::sleep(Duration::from_millis(30));

    // Both subscriptions receive the root-keyed event (fan-out at the root
    // key is shared), and each independently produces its own mapped
    // output — no stage-local cross-talk.
    assert_eq!(*seen_a.lock().unwrap(), vec![40]);
    assert_eq!(*seen_b.lock().unwrap(), vec![40]);
}
