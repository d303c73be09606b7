/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{ClientId, ModuleId, SourceId};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for every control-plane and data-plane operation
pub type EventResult<T> = Result<T, EventError>;

/// Event core errors
///
/// Queue overflow is deliberately absent: a dropped event is recorded in the
/// client's missed counter and never fails the dispatch.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum EventError {
    #[error("Module {0} not installed")]
    #[diagnostic(
        code(events::no_such_module),
        help("Install the module before opening handles or connecting to it.")
    )]
    NoSuchModule(ModuleId),

    #[error("Client {0} named no module and has none selected")]
    #[diagnostic(
        code(events::no_module_selected),
        help("Pass a module id or select one on the handle first.")
    )]
    NoModuleSelected(ClientId),

    #[error("Module {module} has no source {source_id}")]
    #[diagnostic(
        code(events::no_such_source),
        help("Source ids must be below the module's configured source count.")
    )]
    NoSuchSource { module: ModuleId, source_id: SourceId },

    #[error("Subscriber table full for module {module} source {source_id}")]
    #[diagnostic(
        code(events::table_full),
        help("Every subscriber slot of this source is taken. Disconnect another client first.")
    )]
    TableFull { module: ModuleId, source_id: SourceId },

    #[error("Client {0} holds the maximum number of connections")]
    #[diagnostic(
        code(events::connection_limit),
        help("Disconnect unused sources or raise connections_max in the core configuration.")
    )]
    ConnectionLimit(ClientId),

    #[error("All {0} client handles are open")]
    #[diagnostic(code(events::client_limit), help("Close an idle handle and retry."))]
    ClientLimit(usize),

    #[error("All {0} module slots are installed")]
    #[diagnostic(code(events::module_limit), help("Uninstall a module or raise modules_max."))]
    ModuleLimit(usize),

    #[error("Wait timed out")]
    #[diagnostic(code(events::timed_out))]
    TimedOut,

    #[error("Wait aborted by an external request")]
    #[diagnostic(code(events::aborted), help("Re-issue the read."))]
    Aborted,

    #[error("Wait interrupted")]
    #[diagnostic(code(events::interrupted), help("Re-issue the read."))]
    Interrupted,

    #[error("Module or handle was reset while waiting")]
    #[diagnostic(
        code(events::reset),
        help("Connections to the reset module were cleared. Reconnect and re-issue the read.")
    )]
    Reset,

    #[error("Invalid client handle {0}")]
    #[diagnostic(
        code(events::invalid_handle),
        help("The handle was closed or never opened.")
    )]
    InvalidHandle(ClientId),

    #[error("Emulation unavailable: {0}")]
    #[diagnostic(code(events::emulation))]
    Emulation(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(events::invalid_config))]
    InvalidConfig(String),
}

impl EventError {
    /// Errors a caller is expected to recover from by retrying the call
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EventError::TimedOut | EventError::Aborted | EventError::Interrupted | EventError::Reset
        )
    }
}
