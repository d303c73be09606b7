/*!
 * Interrupt service path against a mocked interrupt source
 */

use irq_event_core::{
    BusError, CoreConfig, EventCore, EventTime, InterruptSource, IrqReturn, ModuleSpec, ModuleStatus,
    SourceMask, SubscriptionMode, Timeout,
};
use mockall::mock;

mock! {
    pub Registers {}

    impl InterruptSource for Registers {
        fn read_and_clear(&self) -> Result<SourceMask, BusError>;
        fn timestamp(&self) -> EventTime;
    }
}

#[test]
fn test_interrupt_fans_out_with_hardware_time() {
    let core = EventCore::new(CoreConfig::default()).unwrap();
    let m = core.install_module(ModuleSpec::new("ctr", 16)).unwrap();
    let a = core.open(1, Some(m)).unwrap();
    let b = core.open(2, Some(m)).unwrap();
    core.connect(a, None, 3, SubscriptionMode::Queued).unwrap();
    core.connect(b, None, 3, SubscriptionMode::Queued).unwrap();
    core.connect(b, None, 5, SubscriptionMode::Queued).unwrap();

    let mut regs = MockRegisters::new();
    regs.expect_read_and_clear()
        .times(1)
        .returning(|| Ok((1 << 3) | (1 << 5)));
    regs.expect_timestamp()
        .times(1)
        .returning(|| EventTime::new(100, 500));

    assert_eq!(core.service_interrupt(m, &regs), Ok(IrqReturn::Handled));

    let read_a = core.read(a, Some(Timeout::Immediate)).unwrap();
    assert_eq!(read_a.event.time, EventTime::new(100, 500));
    let sources_b: Vec<u16> = (0..2)
        .map(|_| core.read(b, Some(Timeout::Immediate)).unwrap().event.connection.source)
        .collect();
    assert_eq!(sources_b, vec![3, 5]);
    assert_eq!(core.module(m).unwrap().interrupts(), 1);
}

#[test]
fn test_persistent_bus_error() {
    let core = EventCore::new(CoreConfig::default()).unwrap();
    let m = core.install_module(ModuleSpec::new("ctr", 16)).unwrap();

    let mut regs = MockRegisters::new();
    regs.expect_read_and_clear()
        .times(2)
        .returning(|| Err(BusError { offset: 0x24 }));
    regs.expect_timestamp().never();

    assert_eq!(core.service_interrupt(m, &regs), Ok(IrqReturn::None));
    assert!(core
        .module(m)
        .unwrap()
        .status()
        .contains(ModuleStatus::BUS_ERROR));
    assert_eq!(core.stats().bus_errors, 1);

    // Reset clears the fault
    core.reset_module(m).unwrap();
    assert!(!core
        .module(m)
        .unwrap()
        .status()
        .contains(ModuleStatus::BUS_ERROR));
}

#[test]
fn test_disabled_module_swallows_interrupts() {
    let core = EventCore::new(CoreConfig::default()).unwrap();
    let m = core.install_module(ModuleSpec::new("ctr", 16)).unwrap();
    let c = core.open(1, Some(m)).unwrap();
    core.connect(c, None, 0, SubscriptionMode::Queued).unwrap();
    core.module(m).unwrap().set_status(ModuleStatus::DISABLED);

    let mut regs = MockRegisters::new();
    regs.expect_read_and_clear().returning(|| Ok(1));
    regs.expect_timestamp().returning(|| EventTime::ZERO);

    assert_eq!(core.service_interrupt(m, &regs), Ok(IrqReturn::Handled));
    assert_eq!(core.client(c).unwrap().queue_depth(), 0);
}
