/*!
 * Core Module
 * Fundamental types, limits, configuration and error handling
 */

pub mod arena;
pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use arena::HandleArena;
pub use config::CoreConfig;
pub use errors::*;
pub use types::*;
