/*!
 * Lifecycle
 * Module install/uninstall/reset and client open/close
 */

use super::manager::{EventCore, InstalledModule};
use super::types::ModuleSpec;
use crate::client::ClientContext;
use crate::core::errors::{EventError, EventResult};
use crate::core::types::{ClientId, ModuleId, Pid};
use crate::dispatch::{EmulationTick, Emulator};
use crate::module::{ModuleContext, ModuleStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl EventCore {
    // =========================================================================
    // Modules
    // =========================================================================

    /// Create a module context; emulated modules also get their producer thread
    pub fn install_module(&self, spec: ModuleSpec) -> EventResult<ModuleId> {
        let per_source = spec
            .subscribers_per_source
            .unwrap_or(self.config.subscribers_per_source);

        let installed = self
            .modules
            .try_insert_with(|index, generation| {
                let id = ModuleId::new(index, generation);
                ModuleContext::new(id, spec.name.clone(), spec.sources, per_source).map(|context| {
                    InstalledModule {
                        context: Arc::new(context),
                        emulator: Mutex::new(None),
                    }
                })
            })
            .ok_or(EventError::ModuleLimit(self.modules.capacity()))??;

        let id = installed.context.id();
        if spec.emulation {
            installed
                .context
                .set_status(ModuleStatus::EMULATION | ModuleStatus::NO_HARDWARE);
            let tick = (spec.tick_mask != 0).then(|| EmulationTick {
                period: self.config.emulation_tick(),
                mask: spec.tick_mask,
            });
            match Emulator::spawn(&installed.context, Arc::clone(&self.dispatcher), tick) {
                Ok(emulator) => *installed.emulator.lock() = Some(emulator),
                Err(err) => {
                    self.modules.remove(id.index, id.generation);
                    return Err(err);
                }
            }
        }

        info!(
            module = %id,
            name = %spec.name,
            sources = spec.sources,
            emulation = spec.emulation,
            "module installed"
        );
        Ok(id)
    }

    /// Remove a module; every client connected to it is reset
    pub fn uninstall_module(&self, id: ModuleId) -> EventResult<usize> {
        let installed = self.installed(id)?;

        if let Some(mut emulator) = installed.emulator.lock().take() {
            emulator.stop();
        }
        installed.context.retire();
        self.modules.remove(id.index, id.generation);

        let reset = self.reset_clients_of(&installed.context, true);
        info!(module = %id, clients_reset = reset, "module uninstalled");
        Ok(reset)
    }

    /// Clear every subscription on a module and its fault flags
    ///
    /// Clients connected to the module lose those connections, their queues
    /// are flushed and any blocked read returns `Reset`. Returns the number
    /// of clients reset.
    pub fn reset_module(&self, id: ModuleId) -> EventResult<usize> {
        let module = self.module(id)?;
        module.clear_connections();
        module.clear_status(ModuleStatus::FAULTS);

        let reset = self.reset_clients_of(&module, false);
        info!(module = %id, clients_reset = reset, "module reset");
        Ok(reset)
    }

    /// Reset every client connected to `module` or having it selected
    ///
    /// Runs under each client's control lock so a connect cannot land a
    /// table entry the client side has already forgotten.
    fn reset_clients_of(&self, module: &ModuleContext, uninstalled: bool) -> usize {
        let id = module.id();
        let mut reset = 0;
        for client in self.clients.values() {
            let _control = client.control_lock();
            if client.ensure_active().is_err() {
                // Closed while we waited; close already left every table
                continue;
            }
            module.remove_client(client.id());
            let released = client.release_module(id);
            let selected = client.selected_module() == Some(id);
            if released.is_empty() && !selected {
                continue;
            }
            if uninstalled && selected {
                client.deselect_module(id);
            }
            let woken = client.endpoint().force_reset();
            self.stats.record_reset();
            debug!(
                client = %client.id(),
                module = %id,
                connections = released.len(),
                woken,
                "client reset"
            );
            reset += 1;
        }
        reset
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Open a handle; `module` becomes the handle's selected module
    pub fn open(&self, pid: Pid, module: Option<ModuleId>) -> EventResult<ClientId> {
        if let Some(module) = module {
            self.installed(module)?;
        }

        let client = self
            .clients
            .insert_with(|index, generation| {
                ClientContext::new(ClientId::new(index, generation), pid, module, &self.config)
            })
            .ok_or(EventError::ClientLimit(self.clients.capacity()))?;
        client.activate()?;

        debug!(client = %client.id(), pid, "client opened");
        Ok(client.id())
    }

    /// Close a handle
    ///
    /// Every subscription leaves its connection table before the queue and
    /// semaphore are torn down; a reader blocked on the handle wakes with
    /// `Reset` and any later call reports `InvalidHandle`.
    pub fn close(&self, id: ClientId) -> EventResult<()> {
        let client = self.client(id)?;
        {
            let _control = client.control_lock();
            client.begin_close()?;
            self.unsubscribe_all(&client);
            client.finish_close()?;
        }
        self.clients.remove(id.index, id.generation);

        debug!(client = %id, "client closed");
        Ok(())
    }

    /// Close every handle and uninstall every module
    pub fn shutdown(&self) {
        for client in self.clients.values() {
            if let Err(err) = self.close(client.id()) {
                warn!(client = %client.id(), error = %err, "close during shutdown failed");
            }
        }
        for module in self.modules.values() {
            let id = module.context.id();
            if let Err(err) = self.uninstall_module(id) {
                warn!(module = %id, error = %err, "uninstall during shutdown failed");
            }
        }
        info!("event core shut down");
    }
}
