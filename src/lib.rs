/*!
 * Interrupt Event Core
 * Fan-out of hardware interrupts to per-client event queues
 *
 * One interrupt source is shared by any number of client handles. Each
 * handle buffers its own bounded queue of timestamped events and blocks on
 * its own counting semaphore until something arrives or its timeout runs
 * out. Modules are driven either by a hardware [`dispatch::InterruptSource`]
 * or by the emulation thread.
 */

pub mod client;
pub mod core;
pub mod dispatch;
pub mod driver;
pub mod events;
pub mod module;
pub mod monitoring;

// Re-exports
pub use crate::core::config::CoreConfig;
pub use crate::core::errors::{EventError, EventResult};
pub use crate::core::sync::{Semaphore, SignalPolicy, Timeout, WaitOutcome};
pub use crate::core::types::{ClientId, EventTime, ModuleId, Pid, SourceId, SourceMask};
pub use client::{ClientContext, ClientState};
pub use dispatch::{
    BusError, DispatchReport, Dispatcher, EmulatedInterrupt, InterruptSource, IrqReturn,
};
pub use driver::{ClientConnections, ControlRequest, ControlResponse, EventCore, ModuleSpec};
pub use events::{Connection, Event, EventQueue, PushOutcome, ReadEvent, SubscriptionMode};
pub use module::{ModuleContext, ModuleReport, ModuleStatus};
pub use monitoring::{init_tracing, CoreStats, StatsSnapshot};
