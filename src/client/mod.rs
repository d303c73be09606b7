/*!
 * Client Module
 * Per-handle contexts and the endpoint dispatch delivers into
 */

pub mod context;
pub mod endpoint;

pub use context::{ClientContext, ClientState, ConnectionEntry, SlotReservation};
pub use endpoint::Endpoint;
