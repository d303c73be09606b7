/*!
 * Module Context
 * Per-hardware-instance state: status word, enabled mask, connection table
 */

use super::status::ModuleStatus;
use super::table::{Attach, ConnectionTable, Detach};
use crate::client::Endpoint;
use crate::core::errors::{EventError, EventResult};
use crate::core::limits::SOURCES_MAX;
use crate::core::types::{ClientId, ModuleId, SourceId, SourceMask};
use crate::events::SubscriptionMode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Control-plane view of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub id: ModuleId,
    pub name: String,
    pub status: ModuleStatus,
    pub enabled_mask: SourceMask,
    pub sources: usize,
    pub subscribers: usize,
    pub interrupts: u64,
}

/// One installed hardware module
///
/// Clients only ever name a module by id; nothing a client holds keeps the
/// context alive.
pub struct ModuleContext {
    id: ModuleId,
    name: String,
    sources: usize,
    status: AtomicU32,
    enabled: AtomicU64,
    interrupts: AtomicU64,
    table: ConnectionTable,
}

impl ModuleContext {
    pub fn new(
        id: ModuleId,
        name: impl Into<String>,
        sources: usize,
        subscribers_per_source: usize,
    ) -> EventResult<Self> {
        if sources == 0 || sources > SOURCES_MAX {
            return Err(EventError::InvalidConfig(format!(
                "module sources must be in 1..={}, got {}",
                SOURCES_MAX, sources
            )));
        }
        if subscribers_per_source == 0 {
            return Err(EventError::InvalidConfig(
                "subscribers_per_source must be non-zero".into(),
            ));
        }
        Ok(Self {
            id,
            name: name.into(),
            sources,
            status: AtomicU32::new(0),
            enabled: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            table: ConnectionTable::new(id, sources, subscribers_per_source),
        })
    }

    #[inline]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> usize {
        self.sources
    }

    /// Every source bit this module can raise
    #[inline]
    pub fn valid_mask(&self) -> SourceMask {
        if self.sources >= SOURCES_MAX {
            SourceMask::MAX
        } else {
            (1 << self.sources) - 1
        }
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    // =========================================================================
    // Status and interrupt mask
    // =========================================================================

    #[inline]
    pub fn status(&self) -> ModuleStatus {
        ModuleStatus::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, flags: ModuleStatus) {
        self.status.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn clear_status(&self, flags: ModuleStatus) {
        self.status.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    #[inline]
    pub fn enabled_mask(&self) -> SourceMask {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable source bits; bits beyond the module's sources are ignored.
    /// Returns the resulting mask.
    pub fn enable_interrupts(&self, mask: SourceMask) -> SourceMask {
        let mask = mask & self.valid_mask();
        self.enabled.fetch_or(mask, Ordering::AcqRel) | mask
    }

    pub fn disable_interrupts(&self, mask: SourceMask) -> SourceMask {
        self.enabled.fetch_and(!mask, Ordering::AcqRel) & !mask
    }

    /// Count one serviced interrupt
    #[inline]
    pub(crate) fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn interrupts(&self) -> u64 {
        self.interrupts.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe an endpoint; the first subscriber enables the source bit
    pub fn connect(
        &self,
        endpoint: &Arc<Endpoint>,
        source: SourceId,
        slot: usize,
        mode: SubscriptionMode,
    ) -> EventResult<Attach> {
        let attach = self.table.connect(endpoint, source, slot, mode)?;
        if attach == Attach::First {
            self.enable_interrupts(1 << source);
            debug!(module = %self.id, source, "source enabled");
        }
        Ok(attach)
    }

    /// Unsubscribe; the last subscriber leaving disables the source bit
    pub fn disconnect(&self, client: ClientId, source: SourceId) -> Detach {
        let detach = self.table.disconnect(client, source);
        if detach == Detach::Last {
            self.disable_interrupts(1 << source);
            debug!(module = %self.id, source, "source disabled");
        }
        detach
    }

    /// Unsubscribe a client from every source
    pub fn remove_client(&self, client: ClientId) {
        let emptied = self.table.remove_client(client);
        if emptied != 0 {
            self.disable_interrupts(emptied);
        }
    }

    /// Drop every subscription and switch off every source bit
    pub fn clear_connections(&self) -> Vec<Arc<Endpoint>> {
        let endpoints = self.table.clear();
        self.disable_interrupts(SourceMask::MAX);
        endpoints
    }

    /// Uninstall: drop every subscription and refuse new ones
    pub(crate) fn retire(&self) -> Vec<Arc<Endpoint>> {
        let endpoints = self.table.retire();
        self.enabled.store(0, Ordering::Release);
        self.set_status(ModuleStatus::DISABLED);
        endpoints
    }

    pub fn subscribers(&self, source: SourceId) -> Vec<ClientId> {
        self.table.subscribers(source)
    }

    pub fn report(&self) -> ModuleReport {
        ModuleReport {
            id: self.id,
            name: self.name.clone(),
            status: self.status(),
            enabled_mask: self.enabled_mask(),
            sources: self.sources,
            subscribers: self.table.subscriber_count(),
            interrupts: self.interrupts(),
        }
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("enabled", &format_args!("{:#x}", self.enabled_mask()))
            .field("table", &self.table)
            .finish()
    }
}
