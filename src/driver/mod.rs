/*!
 * Driver
 * The event core: lifecycle, control plane and data plane
 */

mod control;
mod lifecycle;
mod manager;
mod operations;
pub mod types;

pub use manager::EventCore;
pub use types::{ClientConnections, ControlRequest, ControlResponse, ModuleSpec};
