/*!
 * Event Types
 * Connections, subscription modes and the immutable queued event
 */

use crate::core::types::{EventTime, ModuleId, SourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One subscription target: a source on a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    pub module: ModuleId,
    pub source: SourceId,
}

impl Connection {
    #[inline]
    pub const fn new(module: ModuleId, source: SourceId) -> Self {
        Self { module, source }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.source)
    }
}

/// How repeated triggers of one connection are queued for a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// Every trigger queues its own event
    #[default]
    Queued,
    /// Triggers arriving while an event for the connection is still queued
    /// fold into that event's occurrence counter
    Cumulative,
}

/// One timestamped occurrence of a source, as delivered to one client
///
/// Built by the dispatcher and never modified afterwards, except for
/// `occurrences` which a cumulative entry learns when it is dequeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub connection: Connection,
    pub time: EventTime,
    /// Source-specific payload, e.g. the triggering equipment id
    pub payload: Option<u32>,
    /// Triggers folded into this event; 1 unless cumulative
    pub occurrences: u32,
}

impl Event {
    #[inline]
    pub const fn new(connection: Connection, time: EventTime, payload: Option<u32>) -> Self {
        Self {
            connection,
            time,
            payload,
            occurrences: 1,
        }
    }
}

/// An event handed to a reader together with the drops it did not see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEvent {
    pub event: Event,
    /// Events dropped on overflow since the previous successful read
    pub missed: u32,
}
