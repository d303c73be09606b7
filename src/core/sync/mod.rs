/*!
 * Synchronization Primitives
 *
 * The cross-context hand-off between the dispatcher (never blocks) and
 * client reads (may sleep):
 * - `Semaphore`: counting semaphore with a FIFO wait list and direct hand-off
 * - `Timeout`: immediate / bounded / infinite waits on the monotonic clock
 * - `SignalPolicy`: retry, ignore or abort when a sleeper is interrupted
 */

mod semaphore;
mod timeout;

pub use semaphore::{Semaphore, SignalPolicy, WaitOutcome};
pub use timeout::Timeout;
