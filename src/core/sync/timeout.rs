/*!
 * Wait Timeouts
 */

use crate::core::limits::DECISECOND;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How long a blocking wait may sleep
///
/// `Immediate` and `Infinite` are distinct: the first never sleeps, the
/// second never times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeout {
    /// Try once, never sleep
    Immediate,
    /// Sleep at most this long, measured on the monotonic clock
    After(Duration),
    /// Sleep until signalled, reset or interrupted
    Infinite,
}

impl Timeout {
    /// Legacy driver encoding: 0 means wait forever, otherwise units of 100 ms
    pub fn from_deciseconds(ds: u32) -> Self {
        match ds {
            0 => Timeout::Infinite,
            n => Timeout::After(DECISECOND * n),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Timeout::After(Duration::from_millis(ms))
    }

    /// Absolute monotonic deadline, `None` for infinite waits
    ///
    /// A bound too large for the clock to represent waits forever.
    pub(crate) fn deadline(&self, from: Instant) -> Option<Instant> {
        match self {
            Timeout::Immediate => Some(from),
            Timeout::After(d) => from.checked_add(*d),
            Timeout::Infinite => None,
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::Infinite
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::Immediate
        } else {
            Timeout::After(d)
        }
    }
}
