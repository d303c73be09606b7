/*!
 * Driver Types
 * Module install spec and the serde control-plane vocabulary
 */

use crate::client::ConnectionEntry;
use crate::core::types::{ClientId, ModuleId, Pid, SourceId, SourceMask};
use crate::dispatch::DispatchReport;
use crate::events::SubscriptionMode;
use crate::module::ModuleReport;
use serde::{Deserialize, Serialize};

/// What to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    /// Interrupt bits or object-table entries, at most 64
    pub sources: usize,
    /// Overrides `CoreConfig::subscribers_per_source`
    #[serde(default)]
    pub subscribers_per_source: Option<usize>,
    /// Drive the module from the emulator instead of hardware
    #[serde(default)]
    pub emulation: bool,
    /// Sources fired on every emulation tick; 0 disables the tick
    #[serde(default)]
    pub tick_mask: SourceMask,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>, sources: usize) -> Self {
        Self {
            name: name.into(),
            sources,
            subscribers_per_source: None,
            emulation: false,
            tick_mask: 0,
        }
    }

    pub fn emulated(mut self, tick_mask: SourceMask) -> Self {
        self.emulation = true;
        self.tick_mask = tick_mask;
        self
    }

    pub fn with_subscribers(mut self, per_source: usize) -> Self {
        self.subscribers_per_source = Some(per_source);
        self
    }
}

/// Out-of-band request on a client handle
///
/// Requests that take an optional module fall back to the handle's
/// selected module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ControlRequest {
    SelectModule {
        module: ModuleId,
    },
    Connect {
        #[serde(default)]
        module: Option<ModuleId>,
        source: SourceId,
        #[serde(default)]
        mode: SubscriptionMode,
    },
    Disconnect {
        #[serde(default)]
        module: Option<ModuleId>,
        source: SourceId,
    },
    DisconnectAll,
    SetTimeout {
        deciseconds: u32,
    },
    GetTimeout,
    SetQueueFlag {
        off: bool,
    },
    GetQueueFlag,
    GetQueueDepth,
    /// Missed events since the last query; clears the count
    GetMissedCount,
    ResetModule {
        #[serde(default)]
        module: Option<ModuleId>,
    },
    GetStatus {
        #[serde(default)]
        module: Option<ModuleId>,
    },
    EnableInterrupts {
        #[serde(default)]
        module: Option<ModuleId>,
        mask: SourceMask,
    },
    DisableInterrupts {
        #[serde(default)]
        module: Option<ModuleId>,
        mask: SourceMask,
    },
    /// Connections of every handle owned by `pid`, or of all handles
    ListConnections {
        #[serde(default)]
        pid: Option<Pid>,
    },
    /// Inject one event as if `source` had fired
    Simulate {
        #[serde(default)]
        module: Option<ModuleId>,
        source: SourceId,
        #[serde(default)]
        payload: Option<u32>,
    },
}

impl ControlRequest {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ControlRequest::SelectModule { .. } => "select_module",
            ControlRequest::Connect { .. } => "connect",
            ControlRequest::Disconnect { .. } => "disconnect",
            ControlRequest::DisconnectAll => "disconnect_all",
            ControlRequest::SetTimeout { .. } => "set_timeout",
            ControlRequest::GetTimeout => "get_timeout",
            ControlRequest::SetQueueFlag { .. } => "set_queue_flag",
            ControlRequest::GetQueueFlag => "get_queue_flag",
            ControlRequest::GetQueueDepth => "get_queue_depth",
            ControlRequest::GetMissedCount => "get_missed_count",
            ControlRequest::ResetModule { .. } => "reset_module",
            ControlRequest::GetStatus { .. } => "get_status",
            ControlRequest::EnableInterrupts { .. } => "enable_interrupts",
            ControlRequest::DisableInterrupts { .. } => "disable_interrupts",
            ControlRequest::ListConnections { .. } => "list_connections",
            ControlRequest::Simulate { .. } => "simulate",
        }
    }
}

/// Connections held by one handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConnections {
    pub client: ClientId,
    pub pid: Pid,
    pub connections: Vec<ConnectionEntry>,
}

/// Reply to a [`ControlRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", content = "value", rename_all = "snake_case")]
pub enum ControlResponse {
    Done,
    /// Deciseconds, 0 meaning infinite
    Timeout(u32),
    QueueOff(bool),
    QueueDepth(usize),
    Missed(u32),
    /// Clients whose reads were reset
    Reset(usize),
    Status(ModuleReport),
    EnabledMask(SourceMask),
    Connections(Vec<ClientConnections>),
    Dispatched(DispatchReport),
}
