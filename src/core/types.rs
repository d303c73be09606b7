/*!
 * Core Types
 * Identifiers and time values shared by every layer of the event core
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Process identity of the owner of a client handle
pub type Pid = u32;

/// Index of an interrupt source bit, or of a logical object (counter, task)
pub type SourceId = u16;

/// One bit per interrupt source, bit 0 first
pub type SourceMask = u64;

/// Hardware module identifier: arena slot plus its install generation
///
/// A module reinstalled into the same slot gets a new generation, so an id
/// kept from before the uninstall reports `NoSuchModule` instead of binding
/// to the newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    pub index: u16,
    pub generation: u32,
}

impl ModuleId {
    #[inline]
    pub const fn new(index: u16, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

/// Client handle: arena slot plus the generation that slot had when opened
///
/// A stale handle (slot reused after close) carries an old generation and is
/// rejected with `InvalidHandle` instead of reaching the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId {
    pub index: u16,
    pub generation: u32,
}

impl ClientId {
    #[inline]
    pub const fn new(index: u16, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

/// Arrival time of an event: seconds plus sub-second nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTime {
    pub seconds: u64,
    pub nanos: u32,
}

impl EventTime {
    pub const ZERO: EventTime = EventTime {
        seconds: 0,
        nanos: 0,
    };

    #[inline]
    pub const fn new(seconds: u64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    #[inline]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Wall-clock now, used when the hardware cannot latch a time itself
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Self::new(d.as_secs(), d.subsec_nanos()))
            .unwrap_or(Self::ZERO)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Iterate the set bits of a mask from least to most significant
#[inline]
pub fn mask_bits(mask: SourceMask) -> impl Iterator<Item = SourceId> {
    let mut rest = mask;
    std::iter::from_fn(move || {
        if rest == 0 {
            return None;
        }
        let bit = rest.trailing_zeros();
        rest &= rest - 1;
        Some(bit as SourceId)
    })
}
