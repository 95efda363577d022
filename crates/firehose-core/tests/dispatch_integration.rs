use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use firehose_core::{Firehose, FirehoseConfig};

#[test]
fn error_isolation_invokes_handler_once_and_other_consumer_once() {
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let handler_calls2 = Arc::clone(&handler_calls);
    let config: FirehoseConfig<&'static str> = FirehoseConfig::new()
        .with_workers(2)
        .with_ring_capacity(16)
        .with_error_handler(move |_err| {
            handler_calls2.fetch_add(1, Ordering::SeqCst);
        });
    let hose: Firehose<&'static str, i32> = Firehose::new(config);

    hose.on("k", Arc::new(|_k: &&'static str, _v: &i32| panic!("boom")));
    let second_calls = Arc::new(AtomicUsize::new(0));
    let second_calls2 = Arc::clone(&second_calls);
    hose.on(
        "k",
        Arc::new(move |_k: &&'static str, _v: &i32| {
            second_calls2.fetch_add(1, Ordering::SeqCst);
        }),
    );

    hose.notify("k", 1);
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    hose.shutdown();
}

#[test]
fn panicking_timer_callback_reaches_error_handler_and_wheel_survives() {
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let handler_calls2 = Arc::clone(&handler_calls);
    let config: FirehoseConfig<&'static str> = FirehoseConfig::new()
        .with_workers(1)
        .with_ring_capacity(16)
        .with_error_handler(move |_err| {
            handler_calls2.fetch_add(1, Ordering::SeqCst);
        });
    let hose: Firehose<&'static str, i32> = Firehose::new(config);

    hose.timer().schedule(Duration::from_millis(1), || panic!("boom"));

    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = Arc::clone(&fired);
    hose.timer().schedule(Duration::from_millis(5), move || {
        fired2.fetch_add(1, Ordering::SeqCst);
    });

    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1, "wheel must keep firing after a panicking callback");
    hose.shutdown();
}

#[test]
fn backpressure_all_publishes_eventually_delivered() {
    let config: FirehoseConfig<&'static str> = FirehoseConfig::new()
        .with_workers(4)
        .with_ring_capacity(2);
    let hose: Firehose<&'static str, i32> = Firehose::new(config);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    hose.on(
        "k",
        Arc::new(move |_k: &&'static str, v: &i32| {
            std::thread::sleep(Duration::from_millis(1));
            seen2.lock().unwrap().push(*v);
        }),
    );

    for i in 0..100 {
        hose.notify("k", i);
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if seen.lock().unwrap().len() == 100 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "timed out waiting for delivery");
        std::thread::sleep(Duration::from_millis(10));
    }

    hose.shutdown();
}
