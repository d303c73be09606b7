/*!
 * Monitoring
 * Tracing setup and event-core counters
 */

mod metrics;
mod tracer;

pub use metrics::{CoreStats, StatsSnapshot};
pub use tracer::{init_tracing, span_control};
