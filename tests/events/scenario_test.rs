/*!
 * End-to-end scenarios through the public event core API
 */

use irq_event_core::{
    ControlRequest, ControlResponse, CoreConfig, EventCore, EventError, EventTime, ModuleSpec,
    SubscriptionMode, Timeout,
};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn core_with_capacity(queue_capacity: usize) -> EventCore {
    let config = CoreConfig {
        queue_capacity,
        ..CoreConfig::default()
    };
    EventCore::new(config).unwrap()
}

#[test]
fn test_two_subscribers_one_bystander() {
    let core = core_with_capacity(8);
    let m = core.install_module(ModuleSpec::new("ctr", 16)).unwrap();
    let a = core.open(1, Some(m)).unwrap();
    let b = core.open(2, Some(m)).unwrap();
    let c = core.open(3, Some(m)).unwrap();
    core.connect(a, Some(m), 3, SubscriptionMode::Queued).unwrap();
    core.connect(b, Some(m), 3, SubscriptionMode::Queued).unwrap();

    let report = core
        .dispatch(m, 0b1000, EventTime::from_seconds(100), None)
        .unwrap();
    assert_eq!(report.delivered, 2);

    for client in [a, b] {
        let read = core.read(client, None).unwrap();
        assert_eq!(read.event.connection.source, 3);
        assert_eq!(read.event.connection.module, m);
        assert_eq!(read.event.time, EventTime::from_seconds(100));
        assert_eq!(read.missed, 0);
    }

    let start = Instant::now();
    assert_eq!(
        core.read(c, Some(Timeout::from_millis(100))),
        Err(EventError::TimedOut)
    );
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_overflow_keeps_oldest_four() {
    let core = core_with_capacity(4);
    let m = core.install_module(ModuleSpec::new("ctr", 8)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 2, SubscriptionMode::Queued).unwrap();

    let mut dropped = 0;
    for t in 1..=5 {
        dropped += core
            .dispatch(m, 0b100, EventTime::from_seconds(t), None)
            .unwrap()
            .dropped;
    }
    assert_eq!(dropped, 1);
    assert_eq!(
        core.control(c, ControlRequest::GetQueueDepth),
        Ok(ControlResponse::QueueDepth(4))
    );

    let first = core.read(c, Some(Timeout::Immediate)).unwrap();
    assert_eq!(first.event.time, EventTime::from_seconds(1));
    assert_eq!(first.missed, 1);

    let rest: Vec<u64> = (0..3)
        .map(|_| core.read(c, Some(Timeout::Immediate)).unwrap().event.time.seconds)
        .collect();
    assert_eq!(rest, vec![2, 3, 4]);
    assert_eq!(
        core.read(c, Some(Timeout::Immediate)),
        Err(EventError::TimedOut)
    );
}

#[test]
fn test_multi_bit_pass_orders_by_bit() {
    let core = core_with_capacity(16);
    let m = core.install_module(ModuleSpec::new("ctr", 16)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    for source in [9, 0, 4] {
        core.connect(c, None, source, SubscriptionMode::Queued).unwrap();
    }

    core.dispatch(m, (1 << 9) | (1 << 4) | 1, EventTime::from_seconds(1), Some(5))
        .unwrap();
    let sources: Vec<u16> = (0..3)
        .map(|_| core.read(c, Some(Timeout::Immediate)).unwrap().event.connection.source)
        .collect();
    assert_eq!(sources, vec![0, 4, 9]);
}

#[test]
fn test_cumulative_counts_triggers_between_reads() {
    let core = core_with_capacity(8);
    let m = core.install_module(ModuleSpec::new("icv", 16)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 7, SubscriptionMode::Cumulative).unwrap();
    core.connect(c, None, 8, SubscriptionMode::Queued).unwrap();

    for t in 0..4 {
        core.dispatch(m, (1 << 7) | (1 << 8), EventTime::from_seconds(t), None)
            .unwrap();
    }

    let cumulative = core.read(c, Some(Timeout::Immediate)).unwrap();
    assert_eq!(cumulative.event.connection.source, 7);
    assert_eq!(cumulative.event.occurrences, 4);

    let queued: Vec<u32> = (0..4)
        .map(|_| core.read(c, Some(Timeout::Immediate)).unwrap().event.occurrences)
        .collect();
    assert_eq!(queued, vec![1, 1, 1, 1]);
}

#[test]
fn test_cumulative_slot_reuse_keeps_counts_apart() {
    let core = core_with_capacity(8);
    let m = core.install_module(ModuleSpec::new("icv", 16)).unwrap();
    let c = core.open(1, Some(m)).unwrap();

    core.connect(c, None, 1, SubscriptionMode::Cumulative).unwrap();
    core.dispatch(m, 1 << 1, EventTime::from_seconds(1), None).unwrap();
    core.disconnect(c, None, 1).unwrap();

    // Source 2 takes over the connection slot source 1 left behind
    core.connect(c, None, 2, SubscriptionMode::Cumulative).unwrap();
    for t in 2..4 {
        core.dispatch(m, 1 << 2, EventTime::from_seconds(t), None).unwrap();
    }

    let reads: Vec<(u16, u32)> = (0..2)
        .map(|_| {
            let event = core.read(c, Some(Timeout::Immediate)).unwrap().event;
            (event.connection.source, event.occurrences)
        })
        .collect();
    assert_eq!(reads, vec![(1, 1), (2, 2)]);
}

#[test]
fn test_queue_off_returns_only_fresh_events() {
    let core = core_with_capacity(8);
    let m = core.install_module(ModuleSpec::new("ctr", 8)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 0, SubscriptionMode::Queued).unwrap();
    core.control(c, ControlRequest::SetQueueFlag { off: true })
        .unwrap();

    core.dispatch(m, 1, EventTime::from_seconds(1), None).unwrap();
    core.dispatch(m, 1, EventTime::from_seconds(2), None).unwrap();

    let reader = core.clone();
    let handle = std::thread::spawn(move || reader.read(c, Some(Timeout::from_millis(2000))));
    let client = core.client(c).unwrap();
    let start = Instant::now();
    while client.endpoint().semaphore().waiters() == 0 {
        assert!(start.elapsed() < Duration::from_secs(5));
        std::thread::sleep(Duration::from_millis(1));
    }
    core.dispatch(m, 1, EventTime::from_seconds(3), None).unwrap();

    let read = handle.join().unwrap().unwrap();
    assert_eq!(read.event.time, EventTime::from_seconds(3));
}

#[test]
fn test_timeout_setting_applies_to_reads() {
    let core = core_with_capacity(4);
    let c = core.open(1, None).unwrap();
    core.control(c, ControlRequest::SetTimeout { deciseconds: 1 })
        .unwrap();

    let start = Instant::now();
    assert_eq!(core.read(c, None), Err(EventError::TimedOut));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
}
