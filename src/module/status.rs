/*!
 * Module Status
 * Standard status word shared by every hardware module
 */

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Standard status flags of a module
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModuleStatus: u32 {
        /// No interrupt handler installed
        const NO_ISR = 1 << 0;
        /// Last register access raised a bus error
        const BUS_ERROR = 1 << 1;
        /// Interrupt delivery switched off
        const DISABLED = 1 << 2;
        const HARDWARE_FAIL = 1 << 3;
        const WATCH_DOG = 1 << 4;
        const BUS_FAULT = 1 << 5;
        /// Interrupts are produced by the emulator, not hardware
        const EMULATION = 1 << 6;
        const NO_HARDWARE = 1 << 7;
        /// An interrupt arrived for a source no one was listening to
        const LOST_INTERRUPTS = 1 << 8;
    }
}

impl ModuleStatus {
    /// Flags that describe faults rather than configuration
    pub const FAULTS: Self = Self::BUS_ERROR
        .union(Self::HARDWARE_FAIL)
        .union(Self::WATCH_DOG)
        .union(Self::BUS_FAULT)
        .union(Self::LOST_INTERRUPTS);

    /// True when dispatch should deliver nothing
    #[inline]
    pub fn is_disabled(self) -> bool {
        self.contains(Self::DISABLED)
    }
}
