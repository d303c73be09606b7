/*!
 * Event Queue
 * Fixed-capacity per-client ring of events with a saturating missed counter
 */

use super::types::{Event, ReadEvent};
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU32, Ordering};

/// Result of offering an event to a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// A new entry was queued; the reader needs one more semaphore unit
    Queued,
    /// Folded into a cumulative entry already waiting in the queue
    Coalesced,
    /// Queue full: the new event was dropped and counted as missed
    QueueFull,
}

struct Entry {
    event: Event,
    /// Coalescing slot and the epoch it had when this entry was queued
    cumulative: Option<(u16, u32)>,
}

/// Occurrence counter of one cumulative connection slot
///
/// `epoch` moves on every time the slot changes hands, so an entry queued
/// for a previous holder never collects the new holder's count.
struct CoalesceSlot {
    pending: AtomicU32,
    epoch: AtomicU32,
}

/// Bounded FIFO of events owned by one client
///
/// # Thread Safety
/// Written by the dispatcher, drained by the owning client's read. The ring
/// itself is lock-free; capacity is fixed at construction and overflow never
/// grows it. Instead the newest event is dropped and both missed counters
/// saturate upward: `missed` is read-and-cleared from the control plane,
/// the unreported count rides along with the next successful pop.
pub struct EventQueue {
    ring: ArrayQueue<Entry>,
    coalesce: Box<[CoalesceSlot]>,
    missed: AtomicU32,
    unreported: AtomicU32,
}

impl EventQueue {
    /// `cumulative_slots` is the number of connections the owner may hold;
    /// each one gets its own occurrence counter.
    pub fn new(capacity: usize, cumulative_slots: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            ring: ArrayQueue::new(capacity),
            coalesce: (0..cumulative_slots)
                .map(|_| CoalesceSlot {
                    pending: AtomicU32::new(0),
                    epoch: AtomicU32::new(0),
                })
                .collect(),
            missed: AtomicU32::new(0),
            unreported: AtomicU32::new(0),
        }
    }

    /// Offer an event; never fails from the caller's point of view
    ///
    /// `cumulative_slot` names the connection's occurrence counter when the
    /// connection is subscribed in cumulative mode.
    ///
    /// # Performance
    /// Hot path - called from dispatch, lock-free and allocation-free
    #[inline]
    pub fn push(&self, event: Event, cumulative_slot: Option<usize>) -> PushOutcome {
        let counter = cumulative_slot.and_then(|slot| self.coalesce.get(slot).map(|c| (slot, c)));

        let Some((slot, counter)) = counter else {
            return match self.ring.push(Entry {
                event,
                cumulative: None,
            }) {
                Ok(()) => PushOutcome::Queued,
                Err(_) => {
                    self.record_miss();
                    PushOutcome::QueueFull
                }
            };
        };

        let pending = counter
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or(0);
        if pending > 0 {
            return PushOutcome::Coalesced;
        }

        let epoch = counter.epoch.load(Ordering::Acquire);
        match self.ring.push(Entry {
            event,
            cumulative: Some((slot as u16, epoch)),
        }) {
            Ok(()) => PushOutcome::Queued,
            Err(_) => {
                counter.pending.store(0, Ordering::Release);
                self.record_miss();
                PushOutcome::QueueFull
            }
        }
    }

    /// Remove the oldest event
    #[inline]
    pub fn pop(&self) -> Option<ReadEvent> {
        let entry = self.ring.pop()?;
        let mut event = entry.event;
        if let Some((slot, epoch)) = entry.cumulative {
            let counter = &self.coalesce[slot as usize];
            // A stale epoch means the slot was released after this entry was
            // queued; the count now belongs to whoever holds the slot
            if counter.epoch.load(Ordering::Acquire) == epoch {
                event.occurrences = counter.pending.swap(0, Ordering::AcqRel).max(1);
            }
        }
        Some(ReadEvent {
            event,
            missed: self.unreported.swap(0, Ordering::AcqRel),
        })
    }

    /// Drop every queued entry and forget pending cumulative counts
    ///
    /// Returns the number of entries discarded.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.ring.pop().is_some() {
            dropped += 1;
        }
        for counter in self.coalesce.iter() {
            counter.pending.store(0, Ordering::Release);
        }
        dropped
    }

    /// Forget the occurrence counter of a connection slot changing hands
    ///
    /// Entries already queued for the previous holder stay in the ring and
    /// are delivered with a single occurrence.
    pub fn release_slot(&self, slot: usize) {
        if let Some(counter) = self.coalesce.get(slot) {
            counter.epoch.fetch_add(1, Ordering::AcqRel);
            counter.pending.store(0, Ordering::Release);
        }
    }

    /// Missed count since the last control-plane query, clearing it
    pub fn take_missed(&self) -> u32 {
        self.missed.swap(0, Ordering::AcqRel)
    }

    pub fn missed(&self) -> u32 {
        self.missed.load(Ordering::Acquire)
    }

    /// Number of queued entries (approximate under concurrent dispatch)
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    fn record_miss(&self) {
        for counter in [&self.missed, &self.unreported] {
            let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(1))
            });
        }
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("missed", &self.missed())
            .finish()
    }
}
