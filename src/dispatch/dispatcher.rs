/*!
 * Dispatcher
 * Fans one interrupt occurrence out to every subscribed client queue
 */

use crate::core::types::{mask_bits, EventTime, SourceId, SourceMask};
use crate::events::{Connection, Event, PushOutcome};
use crate::module::{ModuleContext, ModuleStatus};
use crate::monitoring::CoreStats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Source bits serviced in the pass
    pub sources: u32,
    /// Entries newly queued across all clients
    pub delivered: u32,
    /// Triggers folded into pending cumulative entries
    pub coalesced: u32,
    /// Events lost to full queues
    pub dropped: u32,
}

/// Non-blocking producer side of the core
///
/// # Performance
/// A pass holds the module's table read lock, pushes into lock-free rings
/// and then signals each touched client once. It never sleeps or allocates.
#[derive(Debug)]
pub struct Dispatcher {
    stats: Arc<CoreStats>,
}

impl Dispatcher {
    pub fn new(stats: Arc<CoreStats>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &Arc<CoreStats> {
        &self.stats
    }

    /// Deliver every enabled bit of `mask`, least significant first
    ///
    /// Bits that are asserted but not enabled are dropped and flag the
    /// module with `LOST_INTERRUPTS`. A `DISABLED` module delivers nothing.
    pub fn dispatch(
        &self,
        module: &ModuleContext,
        mask: SourceMask,
        time: EventTime,
        payload: Option<u32>,
    ) -> DispatchReport {
        if module.status().is_disabled() {
            trace!(module = %module.id(), mask, "module disabled, pass skipped");
            return DispatchReport::default();
        }

        let enabled = module.enabled_mask();
        let lost = mask & !enabled;
        if lost != 0 {
            module.set_status(ModuleStatus::LOST_INTERRUPTS);
            trace!(module = %module.id(), lost, "interrupt on disabled source");
        }

        self.fan_out(module, mask & enabled, time, payload)
    }

    /// Deliver a single object-table source, regardless of the enabled mask
    pub fn dispatch_source(
        &self,
        module: &ModuleContext,
        source: SourceId,
        time: EventTime,
        payload: Option<u32>,
    ) -> DispatchReport {
        if module.status().is_disabled() || source as usize >= module.sources() {
            return DispatchReport::default();
        }
        self.fan_out(module, 1 << source, time, payload)
    }

    fn fan_out(
        &self,
        module: &ModuleContext,
        mask: SourceMask,
        time: EventTime,
        payload: Option<u32>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if mask == 0 {
            return report;
        }

        let table = module.table().read();
        for source in mask_bits(mask) {
            report.sources += 1;
            let event = Event::new(Connection::new(module.id(), source), time, payload);
            for subscriber in table.subscribers(source) {
                match subscriber
                    .endpoint
                    .deliver(event, subscriber.cumulative_slot())
                {
                    PushOutcome::Queued => report.delivered += 1,
                    PushOutcome::Coalesced => report.coalesced += 1,
                    PushOutcome::QueueFull => report.dropped += 1,
                }
            }
        }

        // One semaphore operation per client, however many bits it matched
        for source in mask_bits(mask) {
            for subscriber in table.subscribers(source) {
                subscriber.endpoint.publish();
            }
        }
        drop(table);

        self.stats.record_dispatch(
            report.delivered as u64,
            report.coalesced as u64,
            report.dropped as u64,
        );
        trace!(
            module = %module.id(),
            mask,
            delivered = report.delivered,
            coalesced = report.coalesced,
            dropped = report.dropped,
            "dispatch pass"
        );
        report
    }
}
