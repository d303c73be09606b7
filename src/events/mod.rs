/*!
 * Events Module
 * Typed events and the bounded per-client queue they wait in
 */

pub mod queue;
pub mod types;

// Re-export public API
pub use queue::{EventQueue, PushOutcome};
pub use types::{Connection, Event, ReadEvent, SubscriptionMode};
