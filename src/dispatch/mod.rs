/*!
 * Dispatch
 * Interrupt fan-out, the hardware adapter and the emulation producer
 */

pub mod dispatcher;
pub mod emulation;
pub mod hardware;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use emulation::{EmulatedInterrupt, EmulationTick, Emulator};
pub use hardware::{BusError, InterruptSource, IrqReturn};

#[cfg(test)]
pub use hardware::MockInterruptSource;
