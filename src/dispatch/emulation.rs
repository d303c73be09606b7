/*!
 * Interrupt Emulation
 * Producer thread standing in for hardware on modules flagged EMULATION
 */

use super::dispatcher::Dispatcher;
use crate::core::errors::{EventError, EventResult};
use crate::core::limits::EMULATION_CHANNEL_CAPACITY;
use crate::core::types::{EventTime, ModuleId, SourceMask};
use crate::module::{ModuleContext, ModuleStatus};
use flume::{RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// One synthetic interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatedInterrupt {
    pub mask: SourceMask,
    #[serde(default)]
    pub payload: Option<u32>,
    /// Stamp to use instead of the wall clock
    #[serde(default)]
    pub time: Option<EventTime>,
}

impl EmulatedInterrupt {
    pub fn new(mask: SourceMask) -> Self {
        Self {
            mask,
            payload: None,
            time: None,
        }
    }
}

/// Periodic interrupt fired when no command arrives within `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulationTick {
    pub period: Duration,
    pub mask: SourceMask,
}

/// Handle to a running emulation thread
///
/// Commands travel over a bounded channel and `trigger` never blocks.
/// The thread holds only a weak reference to its module and exits once the
/// module is gone or the handle is dropped.
pub struct Emulator {
    module: ModuleId,
    tx: Option<Sender<EmulatedInterrupt>>,
    worker: Option<JoinHandle<()>>,
}

impl Emulator {
    pub fn spawn(
        module: &Arc<ModuleContext>,
        dispatcher: Arc<Dispatcher>,
        tick: Option<EmulationTick>,
    ) -> EventResult<Self> {
        let id = module.id();
        let weak = Arc::downgrade(module);
        let (tx, rx) = flume::bounded(EMULATION_CHANNEL_CAPACITY);

        let worker = thread::Builder::new()
            .name(format!("irq-emu-{}", id))
            .spawn(move || {
                debug!(module = %id, "emulator started");
                loop {
                    let next = match tick {
                        Some(tick) => rx.recv_timeout(tick.period),
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    let irq = match next {
                        Ok(irq) => irq,
                        Err(RecvTimeoutError::Timeout) => match tick {
                            Some(tick) => EmulatedInterrupt::new(tick.mask),
                            None => continue,
                        },
                        Err(RecvTimeoutError::Disconnected) => break,
                    };
                    if !fire(&weak, &dispatcher, irq) {
                        break;
                    }
                }
                debug!(module = %id, "emulator stopped");
            })
            .map_err(|e| EventError::Emulation(format!("spawn failed: {}", e)))?;

        Ok(Self {
            module: id,
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Queue an interrupt for the emulation thread
    pub fn trigger(&self, irq: EmulatedInterrupt) -> EventResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| EventError::Emulation("emulator stopped".into()))?;
        tx.try_send(irq).map_err(|e| match e {
            TrySendError::Full(_) => EventError::Emulation("emulation queue full".into()),
            TrySendError::Disconnected(_) => EventError::Emulation("emulator stopped".into()),
        })
    }

    /// Close the channel and wait for the thread
    pub fn stop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Returns false once the module is gone
fn fire(module: &Weak<ModuleContext>, dispatcher: &Dispatcher, irq: EmulatedInterrupt) -> bool {
    let Some(module) = module.upgrade() else {
        return false;
    };
    if !module.status().contains(ModuleStatus::EMULATION) {
        trace!(module = %module.id(), "emulation flag cleared, interrupt ignored");
        return true;
    }
    module.record_interrupt();
    let time = irq.time.unwrap_or_else(EventTime::now);
    dispatcher.dispatch(&module, irq.mask, time, irq.payload);
    true
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("module", &self.module)
            .field("running", &self.worker.is_some())
            .finish()
    }
}
