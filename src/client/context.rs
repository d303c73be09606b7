/*!
 * Client Context
 * Per-handle state: owner, connection set, read timeout, queue and semaphore
 */

use super::endpoint::Endpoint;
use crate::core::config::CoreConfig;
use crate::core::errors::{EventError, EventResult};
use crate::core::sync::{SignalPolicy, Timeout, WaitOutcome};
use crate::core::types::{ClientId, ModuleId, Pid};
use crate::events::{Connection, ReadEvent, SubscriptionMode};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Lifecycle of a client handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ClientState {
    Created = 0,
    Active = 1,
    Closing = 2,
    Destroyed = 3,
}

impl ClientState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ClientState::Created,
            1 => ClientState::Active,
            2 => ClientState::Closing,
            _ => ClientState::Destroyed,
        }
    }
}

/// A subscription held by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub connection: Connection,
    pub mode: SubscriptionMode,
}

/// Result of reserving a connection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotReservation {
    pub slot: usize,
    /// False when the client already held this connection
    pub fresh: bool,
    /// Mode the connection had before, when it already existed
    pub previous: Option<SubscriptionMode>,
}

/// Per-open-handle state
///
/// The connection set is a fixed array of slots sized at open; the slot
/// index doubles as the cumulative counter index in the event queue.
pub struct ClientContext {
    id: ClientId,
    pid: Pid,
    state: AtomicU8,
    module: Mutex<Option<ModuleId>>,
    connections: Mutex<Box<[Option<ConnectionEntry>]>>,
    timeout_ds: AtomicU32,
    queue_off: AtomicBool,
    endpoint: Arc<Endpoint>,
    /// Serializes subscribe, unsubscribe and close on this handle
    control: Mutex<()>,
}

impl ClientContext {
    pub fn new(id: ClientId, pid: Pid, module: Option<ModuleId>, config: &CoreConfig) -> Self {
        Self {
            id,
            pid,
            state: AtomicU8::new(ClientState::Created as u8),
            module: Mutex::new(module),
            connections: Mutex::new(vec![None; config.connections_max].into_boxed_slice()),
            timeout_ds: AtomicU32::new(config.default_timeout_ds),
            queue_off: AtomicBool::new(false),
            endpoint: Arc::new(Endpoint::new(
                id,
                config.queue_capacity,
                config.connections_max,
            )),
            control: Mutex::new(()),
        }
    }

    #[inline]
    pub fn id(&self) -> ClientId {
        self.id
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Created -> Active
    pub fn activate(&self) -> EventResult<()> {
        self.transition(ClientState::Created, ClientState::Active)
    }

    /// Active -> Closing; afterwards every operation reports `InvalidHandle`
    pub fn begin_close(&self) -> EventResult<()> {
        self.transition(ClientState::Active, ClientState::Closing)
    }

    /// Closing -> Destroyed: wake a blocked reader with `Reset`, drop queue
    ///
    /// Must only run after every connection left the connection tables.
    pub fn finish_close(&self) -> EventResult<()> {
        self.transition(ClientState::Closing, ClientState::Destroyed)?;
        let woken = self.endpoint.shutdown();
        debug!(client = %self.id, woken, "client destroyed");
        Ok(())
    }

    pub fn ensure_active(&self) -> EventResult<()> {
        match self.state() {
            ClientState::Active => Ok(()),
            _ => Err(EventError::InvalidHandle(self.id)),
        }
    }

    /// Held across a table update so close cannot interleave with it
    pub(crate) fn control_lock(&self) -> MutexGuard<'_, ()> {
        self.control.lock()
    }

    /// Shared endpoint registered in connection tables
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn selected_module(&self) -> Option<ModuleId> {
        *self.module.lock()
    }

    pub fn select_module(&self, module: ModuleId) {
        *self.module.lock() = Some(module);
    }

    /// Forget the selected module if it is `module`
    pub fn deselect_module(&self, module: ModuleId) {
        let mut selected = self.module.lock();
        if *selected == Some(module) {
            *selected = None;
        }
    }

    // =========================================================================
    // Connection set
    // =========================================================================

    /// Find or claim the slot for `connection`
    pub fn reserve_connection(
        &self,
        connection: Connection,
        mode: SubscriptionMode,
    ) -> EventResult<SlotReservation> {
        let mut slots = self.connections.lock();

        if let Some(slot) = find_slot(&slots, connection) {
            let entry = slots[slot].as_mut().ok_or(EventError::InvalidHandle(self.id))?;
            let previous = entry.mode;
            entry.mode = mode;
            return Ok(SlotReservation {
                slot,
                fresh: false,
                previous: Some(previous),
            });
        }

        let slot = slots
            .iter()
            .position(Option::is_none)
            .ok_or(EventError::ConnectionLimit(self.id))?;
        slots[slot] = Some(ConnectionEntry { connection, mode });
        self.endpoint.queue().release_slot(slot);
        Ok(SlotReservation {
            slot,
            fresh: true,
            previous: None,
        })
    }

    /// Give back a slot claimed by a connect that then failed
    pub fn restore_connection(&self, reservation: SlotReservation) {
        let mut slots = self.connections.lock();
        match reservation.previous {
            Some(mode) => {
                if let Some(entry) = slots[reservation.slot].as_mut() {
                    entry.mode = mode;
                }
            }
            None => slots[reservation.slot] = None,
        }
    }

    /// Drop one connection; `None` if the client did not hold it
    pub fn release_connection(&self, connection: Connection) -> Option<usize> {
        let mut slots = self.connections.lock();
        let slot = find_slot(&slots, connection)?;
        slots[slot] = None;
        self.endpoint.queue().release_slot(slot);
        Some(slot)
    }

    /// Drop every connection naming `module`
    pub fn release_module(&self, module: ModuleId) -> Vec<Connection> {
        self.release_where(|c| c.module == module)
    }

    /// Drop every connection
    pub fn release_all(&self) -> Vec<Connection> {
        self.release_where(|_| true)
    }

    fn release_where<F>(&self, pred: F) -> Vec<Connection>
    where
        F: Fn(&Connection) -> bool,
    {
        let mut slots = self.connections.lock();
        let mut released = Vec::new();
        for (slot, entry) in slots.iter_mut().enumerate() {
            if let Some(held) = entry {
                if pred(&held.connection) {
                    released.push(held.connection);
                    *entry = None;
                    self.endpoint.queue().release_slot(slot);
                }
            }
        }
        released
    }

    /// Live connections, ordered by slot
    pub fn connections(&self) -> Vec<ConnectionEntry> {
        self.connections.lock().iter().flatten().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().iter().flatten().count()
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Read timeout in deciseconds; 0 is infinite
    pub fn timeout_ds(&self) -> u32 {
        self.timeout_ds.load(Ordering::Relaxed)
    }

    pub fn set_timeout_ds(&self, ds: u32) {
        self.timeout_ds.store(ds, Ordering::Relaxed);
    }

    pub fn timeout(&self) -> Timeout {
        Timeout::from_deciseconds(self.timeout_ds())
    }

    /// With queueing off each read discards anything already queued
    pub fn queue_off(&self) -> bool {
        self.queue_off.load(Ordering::Relaxed)
    }

    pub fn set_queue_off(&self, off: bool) {
        self.queue_off.store(off, Ordering::Relaxed);
    }

    pub fn queue_depth(&self) -> usize {
        self.endpoint.queue().len()
    }

    /// Missed count since the last query, clearing it
    pub fn take_missed(&self) -> u32 {
        self.endpoint.queue().take_missed()
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Block for the next event
    ///
    /// `timeout` overrides the stored timeout for this call only. A wake
    /// that finds the queue empty (a second reader on the same handle got
    /// there first, or a reset cleared the entry) sleeps again for whatever
    /// is left of the timeout.
    pub fn read(&self, timeout: Option<Timeout>) -> EventResult<ReadEvent> {
        self.ensure_active()?;
        if self.endpoint.take_reset() {
            return Err(EventError::Reset);
        }
        if self.queue_off() {
            let dropped = self.endpoint.flush();
            if dropped > 0 {
                trace!(client = %self.id, dropped, "queue off, discarded stale events");
            }
        }

        let timeout = timeout.unwrap_or_else(|| self.timeout());
        let deadline = timeout.deadline(Instant::now());
        loop {
            let remaining = match deadline {
                None => timeout,
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Timeout::After(left),
                    _ => Timeout::Immediate,
                },
            };
            match self.endpoint.semaphore().wait(remaining, SignalPolicy::Abort)? {
                WaitOutcome::Acquired => {}
                WaitOutcome::TimedOut => return Err(EventError::TimedOut),
                WaitOutcome::Aborted => return Err(EventError::Aborted),
                WaitOutcome::Reset => return Err(EventError::Reset),
            }

            if let Some(read) = self.endpoint.queue().pop() {
                return Ok(read);
            }
            if remaining == Timeout::Immediate {
                return Err(EventError::TimedOut);
            }
            trace!(client = %self.id, "unit without an entry, waiting again");
        }
    }

    /// Non-blocking read
    pub fn try_read(&self) -> EventResult<Option<ReadEvent>> {
        self.ensure_active()?;
        if self.endpoint.take_reset() {
            return Err(EventError::Reset);
        }
        Ok(self.endpoint.try_take())
    }

    /// Read on the blocking pool so async callers do not stall the runtime
    pub async fn read_async(self: Arc<Self>, timeout: Option<Timeout>) -> EventResult<ReadEvent> {
        tokio::task::spawn_blocking(move || self.read(timeout))
            .await
            .map_err(|_| EventError::Aborted)?
    }

    /// Interrupt a reader blocked on this handle; returns waiters reached
    pub fn abort_read(&self) -> usize {
        self.endpoint.semaphore().interrupt()
    }

    fn transition(&self, from: ClientState, to: ClientState) -> EventResult<()> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| EventError::InvalidHandle(self.id))
    }
}

fn find_slot(slots: &[Option<ConnectionEntry>], connection: Connection) -> Option<usize> {
    slots
        .iter()
        .position(|e| matches!(e, Some(held) if held.connection == connection))
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("state", &self.state())
            .field("timeout_ds", &self.timeout_ds())
            .field("connections", &self.connection_count())
            .finish()
    }
}
