/*!
 * System Limits and Constants
 *
 * Fixed ceilings for every arena in the event core. Each table is sized once
 * at construction and never grows, so exhaustion is an explicit error.
 */

use std::time::Duration;

// =============================================================================
// ARENAS
// =============================================================================

/// Maximum number of hardware modules one core can host
pub const MODULES_MAX: usize = 16;

/// Maximum number of simultaneously open client handles
pub const CLIENTS_MAX: usize = 16;

/// Default number of client handles
pub const DEFAULT_CLIENTS: usize = 16;

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Interrupt sources per module; the dispatch mask is a `u64`
pub const SOURCES_MAX: usize = 64;

/// Maximum subscriptions one client can hold across all modules
pub const CONNECTIONS_MAX: usize = 512;

/// Default per-client subscription capacity
pub const DEFAULT_CONNECTIONS: usize = 16;

/// Default subscriber slots per source (one per possible client)
pub const DEFAULT_SUBSCRIBERS_PER_SOURCE: usize = CLIENTS_MAX;

// =============================================================================
// QUEUES
// =============================================================================

/// Default per-client event queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Largest queue a client may request
pub const MAX_QUEUE_CAPACITY: usize = 4096;

/// Capacity of the emulation command channel
pub const EMULATION_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Default client read timeout, in deciseconds (20 s)
pub const DEFAULT_TIMEOUT_DS: u32 = 200;

/// Length of one timeout unit
pub const DECISECOND: Duration = Duration::from_millis(100);

/// Default emulation tick period
pub const DEFAULT_EMULATION_TICK: Duration = Duration::from_millis(100);
