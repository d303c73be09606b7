/*!
 * Module
 * Installed hardware modules and their connection tables
 */

pub mod context;
pub mod status;
pub mod table;

pub use context::{ModuleContext, ModuleReport};
pub use status::ModuleStatus;
pub use table::{Attach, ConnectionTable, Detach, Subscriber};
