/*!
 * Emulated modules driven through the public API
 */

use irq_event_core::{
    CoreConfig, EmulatedInterrupt, EventCore, EventError, EventTime, ModuleSpec, SubscriptionMode,
    Timeout,
};

fn config() -> CoreConfig {
    CoreConfig {
        emulation_tick_ms: 5,
        ..CoreConfig::default()
    }
}

#[test]
fn test_emulated_interrupt_is_read() {
    let core = EventCore::new(config()).unwrap();
    let m = core
        .install_module(ModuleSpec::new("emu", 8).emulated(0))
        .unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 6, SubscriptionMode::Queued).unwrap();

    core.emulate(
        m,
        EmulatedInterrupt {
            mask: 1 << 6,
            payload: Some(31),
            time: Some(EventTime::from_seconds(8)),
        },
    )
    .unwrap();

    let read = core.read(c, Some(Timeout::from_millis(2000))).unwrap();
    assert_eq!(read.event.connection.source, 6);
    assert_eq!(read.event.payload, Some(31));
    assert_eq!(read.event.time, EventTime::from_seconds(8));
}

#[test]
fn test_tick_drives_subscribers() {
    let core = EventCore::new(config()).unwrap();
    let m = core
        .install_module(ModuleSpec::new("emu", 8).emulated(0b1))
        .unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 0, SubscriptionMode::Queued).unwrap();

    for _ in 0..3 {
        let read = core.read(c, Some(Timeout::from_millis(2000))).unwrap();
        assert_eq!(read.event.connection.source, 0);
    }
}

#[test]
fn test_uninstall_stops_emulation() {
    let core = EventCore::new(config()).unwrap();
    let m = core
        .install_module(ModuleSpec::new("emu", 8).emulated(0b1))
        .unwrap();
    core.uninstall_module(m).unwrap();
    assert_eq!(
        core.emulate(m, EmulatedInterrupt::new(1)),
        Err(EventError::NoSuchModule(m))
    );
}
