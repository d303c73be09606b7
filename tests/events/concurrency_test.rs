/*!
 * Cross-thread behaviour: close racing dispatch, timeouts, resets
 */

use irq_event_core::{
    CoreConfig, EventCore, EventError, EventTime, ModuleSpec, SubscriptionMode, Timeout,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn core() -> EventCore {
    EventCore::new(CoreConfig::default()).unwrap()
}

#[test]
fn test_close_during_dispatch_storm() {
    let core = core();
    let m = core.install_module(ModuleSpec::new("storm", 8)).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let passes = Arc::new(AtomicU64::new(0));

    let producer = {
        let core = core.clone();
        let stop = Arc::clone(&stop);
        let passes = Arc::clone(&passes);
        thread::spawn(move || {
            let mut t = 0;
            while !stop.load(Ordering::Relaxed) {
                core.dispatch(m, 0xff, EventTime::from_seconds(t), None)
                    .unwrap();
                passes.fetch_add(1, Ordering::Relaxed);
                t += 1;
            }
        })
    };

    for round in 0..200u32 {
        let c = core.open(round, Some(m)).unwrap();
        for source in 0..8 {
            core.connect(c, None, source, SubscriptionMode::Queued).unwrap();
        }
        let _ = core.read(c, Some(Timeout::Immediate));
        core.close(c).unwrap();

        let module = core.module(m).unwrap();
        for source in 0..8 {
            assert!(!module.subscribers(source).contains(&c));
        }
    }

    stop.store(true, Ordering::Relaxed);
    producer.join().unwrap();
    assert!(passes.load(Ordering::Relaxed) > 0);
    assert_eq!(core.client_count(), 0);
    assert_eq!(core.module(m).unwrap().report().subscribers, 0);
}

#[test]
fn test_closed_client_never_sees_later_dispatch() {
    let core = core();
    let m = core.install_module(ModuleSpec::new("ctr", 8)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 1, SubscriptionMode::Queued).unwrap();
    let client = core.client(c).unwrap();

    core.close(c).unwrap();
    let report = core.dispatch(m, 0b10, EventTime::ZERO, None).unwrap();
    assert_eq!(report.delivered, 0);
    assert!(client.endpoint().queue().is_empty());
}

#[test]
#[serial]
fn test_timeout_fidelity() {
    let core = core();
    let c = core.open(1, None).unwrap();

    for ms in [20u64, 60, 150] {
        let start = Instant::now();
        let result = core.read(c, Some(Timeout::from_millis(ms)));
        let elapsed = start.elapsed();

        assert_eq!(result, Err(EventError::TimedOut));
        assert!(elapsed >= Duration::from_millis(ms), "woke early: {:?}", elapsed);
        assert!(
            elapsed < Duration::from_millis(ms + 500),
            "overslept: {:?}",
            elapsed
        );
    }
}

#[test]
#[serial]
fn test_signal_wakes_blocked_reader_promptly() {
    let core = core();
    let m = core.install_module(ModuleSpec::new("ctr", 8)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 0, SubscriptionMode::Queued).unwrap();

    let reader = {
        let core = core.clone();
        thread::spawn(move || {
            let start = Instant::now();
            let read = core.read(c, Some(Timeout::from_millis(5000)));
            (read, start.elapsed())
        })
    };

    let client = core.client(c).unwrap();
    let start = Instant::now();
    while client.endpoint().semaphore().waiters() == 0 {
        assert!(start.elapsed() < Duration::from_secs(5));
        thread::sleep(Duration::from_millis(1));
    }
    core.dispatch(m, 1, EventTime::from_seconds(42), None).unwrap();

    let (read, elapsed) = reader.join().unwrap();
    assert_eq!(read.unwrap().event.time, EventTime::from_seconds(42));
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn test_abort_read_through_core() {
    let core = core();
    let c = core.open(1, None).unwrap();
    let reader = {
        let core = core.clone();
        thread::spawn(move || core.read(c, Some(Timeout::Infinite)))
    };

    let client = core.client(c).unwrap();
    let start = Instant::now();
    while client.endpoint().semaphore().waiters() == 0 {
        assert!(start.elapsed() < Duration::from_secs(5));
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(core.abort_read(c), Ok(1));
    assert_eq!(reader.join().unwrap(), Err(EventError::Aborted));

    // The handle stays usable
    assert_eq!(
        core.read(c, Some(Timeout::Immediate)),
        Err(EventError::TimedOut)
    );
}

#[test]
fn test_reset_wakes_every_connected_reader() {
    let core = core();
    let m = core.install_module(ModuleSpec::new("ctr", 8)).unwrap();
    let clients: Vec<_> = (0..3)
        .map(|pid| {
            let c = core.open(pid, Some(m)).unwrap();
            core.connect(c, None, 0, SubscriptionMode::Queued).unwrap();
            c
        })
        .collect();

    let readers: Vec<_> = clients
        .iter()
        .map(|&c| {
            let core = core.clone();
            thread::spawn(move || core.read(c, Some(Timeout::Infinite)))
        })
        .collect();

    for &c in &clients {
        let client = core.client(c).unwrap();
        let start = Instant::now();
        while client.endpoint().semaphore().waiters() == 0 {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
    }

    assert_eq!(core.reset_module(m), Ok(3));
    for reader in readers {
        assert_eq!(reader.join().unwrap(), Err(EventError::Reset));
    }
    assert_eq!(core.stats().resets, 3);
}
