/*!
 * Client Endpoint
 * The half of a client that dispatch can reach: its queue and semaphore
 */

use crate::core::sync::Semaphore;
use crate::core::types::ClientId;
use crate::events::{Event, EventQueue, PushOutcome, ReadEvent};
use std::sync::atomic::{AtomicU32, Ordering};

/// Queue plus wake-up semaphore shared between a client and the connection
/// tables it is subscribed in
///
/// Every queued entry is matched by exactly one semaphore unit: dispatch
/// pushes first and signals after, readers take a unit first and pop after.
pub struct Endpoint {
    client: ClientId,
    queue: EventQueue,
    semaphore: Semaphore,
    staged: AtomicU32,
}

impl Endpoint {
    pub fn new(client: ClientId, queue_capacity: usize, connection_slots: usize) -> Self {
        Self {
            client,
            queue: EventQueue::new(queue_capacity, connection_slots),
            semaphore: Semaphore::with_ceiling(0, queue_capacity as u32),
            staged: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Queue one event without signalling it yet
    ///
    /// A newly queued entry is staged; [`Endpoint::publish`] hands every
    /// staged entry to the reader with a single semaphore operation.
    #[inline]
    pub fn deliver(&self, event: Event, cumulative_slot: Option<usize>) -> PushOutcome {
        let outcome = self.queue.push(event, cumulative_slot);
        if outcome == PushOutcome::Queued {
            self.staged.fetch_add(1, Ordering::AcqRel);
        }
        outcome
    }

    /// Signal every staged entry at once; returns the units released
    ///
    /// A second call in the same pass finds nothing staged and is a no-op.
    #[inline]
    pub fn publish(&self) -> u32 {
        let staged = self.staged.swap(0, Ordering::AcqRel);
        if staged > 0 {
            self.semaphore.signal_n(staged);
        }
        staged
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn semaphore(&self) -> &Semaphore {
        &self.semaphore
    }

    /// Take a unit and the entry it stands for
    pub(crate) fn try_take(&self) -> Option<ReadEvent> {
        if self.semaphore.try_wait() {
            self.queue.pop()
        } else {
            None
        }
    }

    /// Discard every signalled entry, keeping units and entries paired
    pub fn flush(&self) -> usize {
        let mut dropped = 0;
        while self.try_take().is_some() {
            dropped += 1;
        }
        dropped
    }

    /// Module reset: drop everything, wake any sleeping reader with `Reset`
    /// and make the next read report the reset if nobody was sleeping
    ///
    /// A pass running concurrently on another module may still publish a
    /// unit for an entry cleared here; readers wait again on such a unit.
    pub fn force_reset(&self) -> usize {
        self.staged.store(0, Ordering::Release);
        let woken = self.semaphore.reset_latched();
        self.queue.clear();
        woken
    }

    /// Handle teardown: same as a reset, the handle is going away
    pub fn shutdown(&self) -> usize {
        self.force_reset()
    }

    pub(crate) fn take_reset(&self) -> bool {
        self.semaphore.take_reset()
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("client", &self.client)
            .field("queue", &self.queue)
            .field("semaphore", &self.semaphore)
            .finish()
    }
}
