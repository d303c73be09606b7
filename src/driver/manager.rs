/*!
 * Event Core Manager
 * Owns the module and client arenas and the shared dispatcher
 */

use crate::client::ClientContext;
use crate::core::arena::HandleArena;
use crate::core::config::CoreConfig;
use crate::core::errors::{EventError, EventResult};
use crate::core::types::{ClientId, ModuleId};
use crate::dispatch::{Dispatcher, Emulator};
use crate::module::{ModuleContext, ModuleReport};
use crate::monitoring::{CoreStats, StatsSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// An installed module together with its emulation thread, if any
pub(super) struct InstalledModule {
    pub(super) context: Arc<ModuleContext>,
    pub(super) emulator: Mutex<Option<Emulator>>,
}

/// Interrupt event distribution core
///
/// Cheap to clone; clones share the same arenas.
pub struct EventCore {
    pub(super) config: Arc<CoreConfig>,
    pub(super) modules: Arc<HandleArena<InstalledModule>>,
    pub(super) clients: Arc<HandleArena<ClientContext>>,
    pub(super) dispatcher: Arc<Dispatcher>,
    pub(super) stats: Arc<CoreStats>,
}

impl EventCore {
    pub fn new(config: CoreConfig) -> EventResult<Self> {
        config.validate()?;
        let stats = Arc::new(CoreStats::new());
        info!(
            modules = config.modules_max,
            clients = config.clients_max,
            queue_capacity = config.queue_capacity,
            "event core initialized"
        );
        Ok(Self {
            modules: Arc::new(HandleArena::new(config.modules_max)),
            clients: Arc::new(HandleArena::new(config.clients_max)),
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&stats))),
            stats,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Look up an installed module
    pub fn module(&self, id: ModuleId) -> EventResult<Arc<ModuleContext>> {
        self.installed(id).map(|m| Arc::clone(&m.context))
    }

    pub(super) fn installed(&self, id: ModuleId) -> EventResult<Arc<InstalledModule>> {
        self.modules
            .get(id.index, id.generation)
            .ok_or(EventError::NoSuchModule(id))
    }

    /// Look up an open client handle
    pub fn client(&self, id: ClientId) -> EventResult<Arc<ClientContext>> {
        self.clients
            .get(id.index, id.generation)
            .ok_or(EventError::InvalidHandle(id))
    }

    pub fn modules(&self) -> Vec<ModuleReport> {
        self.modules
            .values()
            .iter()
            .map(|m| m.context.report())
            .collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl Clone for EventCore {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            modules: Arc::clone(&self.modules),
            clients: Arc::clone(&self.clients),
            dispatcher: Arc::clone(&self.dispatcher),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl std::fmt::Debug for EventCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCore")
            .field("modules", &self.modules.len())
            .field("clients", &self.clients.len())
            .finish()
    }
}
