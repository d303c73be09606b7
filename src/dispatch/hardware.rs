/*!
 * Hardware Interrupt Adapter
 * Bridges a register-level interrupt source onto the dispatcher
 */

use super::dispatcher::Dispatcher;
use crate::core::types::{EventTime, SourceMask};
use crate::module::{ModuleContext, ModuleStatus};
use thiserror::Error;
use tracing::{trace, warn};

/// Register access that faulted on the bus
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("bus error reading interrupt source at offset {offset:#x}")]
pub struct BusError {
    pub offset: u32,
}

/// What the handler tells the host interrupt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// At least one source bit was pending and dispatched
    Handled,
    /// Not ours, or the source register could not be read
    None,
}

/// Hardware side of an interrupt line
///
/// Implementors own register layout, bus type and endianness. Reading the
/// source register must also acknowledge it.
#[cfg_attr(test, mockall::automock)]
pub trait InterruptSource: Send + Sync {
    /// Read the pending source bits and clear them in hardware
    fn read_and_clear(&self) -> Result<SourceMask, BusError>;

    /// Time the interrupt is stamped with
    fn timestamp(&self) -> EventTime {
        EventTime::now()
    }
}

impl Dispatcher {
    /// Interrupt service routine body
    ///
    /// Reads and clears the source register, retrying once on a bus error.
    /// A second failure flags the module with `BUS_ERROR` and the
    /// interrupt is reported as not handled.
    pub fn service_interrupt(
        &self,
        module: &ModuleContext,
        source: &dyn InterruptSource,
    ) -> IrqReturn {
        let mask = match source.read_and_clear() {
            Ok(mask) => mask,
            Err(first) => {
                trace!(module = %module.id(), error = %first, "source read failed, retrying");
                match source.read_and_clear() {
                    Ok(mask) => mask,
                    Err(err) => {
                        module.set_status(ModuleStatus::BUS_ERROR);
                        self.stats().record_bus_error();
                        warn!(module = %module.id(), error = %err, "interrupt source unreadable");
                        return IrqReturn::None;
                    }
                }
            }
        };

        if mask == 0 {
            return IrqReturn::None;
        }

        module.record_interrupt();
        self.dispatch(module, mask, source.timestamp(), None);
        IrqReturn::Handled
    }
}
