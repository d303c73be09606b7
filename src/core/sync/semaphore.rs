/*!
 * Counting Semaphore
 *
 * Blocking counter with a FIFO wait list. A signal arriving while someone
 * sleeps hands the unit straight to the longest waiter instead of bumping
 * the count, so a late arrival can never steal it.
 *
 * A reset that finds nobody asleep can be latched: the next `wait` then
 * returns `Reset` instead of sleeping, decided under the same lock that
 * queues waiters so no caller slips between the two.
 *
 * `signal`, `signal_n`, `reset` and `interrupt` take only the semaphore's
 * own short mutex: they never sleep and never allocate, which makes them
 * callable from the dispatcher.
 */

use super::timeout::Timeout;
use crate::core::errors::{EventError, EventResult};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What a sleeping waiter does when an external interruption reaches it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Keep its place in the queue and go back to sleep
    Retry,
    /// Leave the queue with `EventError::Interrupted`
    Ignore,
    /// Leave the queue with `WaitOutcome::Aborted`
    Abort,
}

/// Result of a wait that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    Acquired,
    TimedOut,
    Aborted,
    Reset,
}

const WAKE_PENDING: u8 = 0;
const WAKE_GRANTED: u8 = 1;
const WAKE_RESET: u8 = 2;
const WAKE_INTERRUPTED: u8 = 3;

/// One sleeping caller. `wake` is only written with the semaphore lock held.
struct Waiter {
    wake: AtomicU8,
    cvar: Condvar,
}

impl Waiter {
    fn new() -> Self {
        Self {
            wake: AtomicU8::new(WAKE_PENDING),
            cvar: Condvar::new(),
        }
    }

    #[inline]
    fn wake(&self) -> u8 {
        self.wake.load(Ordering::Relaxed)
    }

    #[inline]
    fn set(&self, wake: u8) {
        self.wake.store(wake, Ordering::Relaxed);
    }
}

struct State {
    count: u32,
    waiters: VecDeque<Arc<Waiter>>,
    reset_latched: bool,
}

impl State {
    fn remove(&mut self, waiter: &Arc<Waiter>) {
        self.waiters.retain(|w| !Arc::ptr_eq(w, waiter));
    }

    fn reset(&mut self) -> usize {
        self.count = 0;
        let woken = self.waiters.len();
        for waiter in self.waiters.drain(..) {
            waiter.set(WAKE_RESET);
            waiter.cvar.notify_one();
        }
        woken
    }
}

/// Counting semaphore with FIFO hand-off
pub struct Semaphore {
    state: Mutex<State>,
    ceiling: u32,
    saturated: AtomicU64,
}

impl Semaphore {
    /// Semaphore with `initial` units and no practical ceiling
    pub fn new(initial: u32) -> Self {
        Self::with_ceiling(initial, u32::MAX)
    }

    /// Semaphore whose count never exceeds `ceiling`
    pub fn with_ceiling(initial: u32, ceiling: u32) -> Self {
        Self {
            state: Mutex::new(State {
                count: initial.min(ceiling),
                waiters: VecDeque::with_capacity(4),
                reset_latched: false,
            }),
            ceiling,
            saturated: AtomicU64::new(0),
        }
    }

    /// Take one unit, sleeping up to `timeout` for it
    ///
    /// Interruptions delivered through [`Semaphore::interrupt`] are handled
    /// according to `policy`. A reset wakes the caller with
    /// `WaitOutcome::Reset` whatever the policy, as does a latched reset.
    pub fn wait(&self, timeout: Timeout, policy: SignalPolicy) -> EventResult<WaitOutcome> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.reset_latched) {
            return Ok(WaitOutcome::Reset);
        }
        if state.count > 0 {
            state.count -= 1;
            return Ok(WaitOutcome::Acquired);
        }
        if timeout == Timeout::Immediate {
            return Ok(WaitOutcome::TimedOut);
        }

        let deadline = timeout.deadline(Instant::now());
        let waiter = Arc::new(Waiter::new());
        state.waiters.push_back(Arc::clone(&waiter));

        loop {
            match waiter.wake() {
                // Signaller and reset already unlinked us
                WAKE_GRANTED => return Ok(WaitOutcome::Acquired),
                WAKE_RESET => return Ok(WaitOutcome::Reset),
                WAKE_INTERRUPTED => match policy {
                    SignalPolicy::Retry => waiter.set(WAKE_PENDING),
                    SignalPolicy::Abort => {
                        state.remove(&waiter);
                        return Ok(WaitOutcome::Aborted);
                    }
                    SignalPolicy::Ignore => {
                        state.remove(&waiter);
                        return Err(EventError::Interrupted);
                    }
                },
                _ => {}
            }

            match deadline {
                None => waiter.cvar.wait(&mut state),
                Some(deadline) => {
                    let timed_out = waiter.cvar.wait_until(&mut state, deadline).timed_out();
                    if timed_out && !matches!(waiter.wake(), WAKE_GRANTED | WAKE_RESET) {
                        state.remove(&waiter);
                        return Ok(WaitOutcome::TimedOut);
                    }
                }
            }
        }
    }

    /// Take a unit only if one is available right now
    pub fn try_wait(&self) -> bool {
        let mut state = self.state.lock();
        if state.count > 0 {
            state.count -= 1;
            true
        } else {
            false
        }
    }

    /// Release one unit; returns true if it went straight to a waiter
    pub fn signal(&self) -> bool {
        let mut state = self.state.lock();
        self.up(&mut state)
    }

    /// Release `n` units atomically; returns how many waiters were woken
    pub fn signal_n(&self, n: u32) -> usize {
        if n == 0 {
            return 0;
        }
        let mut state = self.state.lock();
        (0..n).filter(|_| self.up(&mut state)).count()
    }

    /// Zero the count and wake every waiter with `WaitOutcome::Reset`
    ///
    /// Returns the number of waiters woken.
    pub fn reset(&self) -> usize {
        self.state.lock().reset()
    }

    /// `reset`, but when no waiter was asleep the reset is latched for the
    /// next `wait` or `take_reset`
    pub fn reset_latched(&self) -> usize {
        let mut state = self.state.lock();
        let woken = state.reset();
        if woken == 0 {
            state.reset_latched = true;
        }
        woken
    }

    /// Consume a latched reset without waiting
    pub fn take_reset(&self) -> bool {
        std::mem::take(&mut self.state.lock().reset_latched)
    }

    /// Deliver an external interruption to every sleeping waiter
    ///
    /// Returns the number of waiters reached.
    pub fn interrupt(&self) -> usize {
        let state = self.state.lock();
        let mut reached = 0;
        for waiter in state.waiters.iter() {
            if waiter.wake() == WAKE_PENDING {
                waiter.set(WAKE_INTERRUPTED);
                waiter.cvar.notify_one();
                reached += 1;
            }
        }
        reached
    }

    /// Positive: units available. Negative: number of sleeping waiters.
    pub fn count(&self) -> i64 {
        let state = self.state.lock();
        if state.count > 0 {
            state.count as i64
        } else {
            -(state.waiters.len() as i64)
        }
    }

    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Signals that found the count at its ceiling and no waiter
    pub fn saturated(&self) -> u64 {
        self.saturated.load(Ordering::Relaxed)
    }

    #[inline]
    fn up(&self, state: &mut State) -> bool {
        if let Some(waiter) = state.waiters.pop_front() {
            waiter.set(WAKE_GRANTED);
            waiter.cvar.notify_one();
            return true;
        }
        if state.count < self.ceiling {
            state.count += 1;
        } else {
            self.saturated.fetch_add(1, Ordering::Relaxed);
        }
        false
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("count", &self.count())
            .field("ceiling", &self.ceiling)
            .field("saturated", &self.saturated())
            .finish()
    }
}
