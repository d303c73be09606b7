/*!
 * Operations
 * Subscription, read and dispatch entry points of the event core
 */

use super::manager::EventCore;
use super::types::ClientConnections;
use crate::client::ClientContext;
use crate::core::errors::{EventError, EventResult};
use crate::core::sync::Timeout;
use crate::core::types::{ClientId, EventTime, ModuleId, Pid, SourceId, SourceMask};
use crate::dispatch::{DispatchReport, EmulatedInterrupt, InterruptSource, IrqReturn};
use crate::events::{Connection, ReadEvent, SubscriptionMode};
use std::sync::Arc;
use tracing::debug;

impl EventCore {
    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe a client to one source
    ///
    /// Connecting twice is not an error; the second call only changes the
    /// mode.
    pub fn connect(
        &self,
        id: ClientId,
        module: Option<ModuleId>,
        source: SourceId,
        mode: SubscriptionMode,
    ) -> EventResult<()> {
        let client = self.client(id)?;
        let _control = client.control_lock();
        client.ensure_active()?;

        let module_id = resolve_module(&client, module)?;
        let module = self.module(module_id)?;
        if source as usize >= module.sources() {
            return Err(EventError::NoSuchSource {
                module: module_id,
                source_id: source,
            });
        }

        let reservation = client.reserve_connection(Connection::new(module_id, source), mode)?;
        if let Err(err) = module.connect(client.endpoint(), source, reservation.slot, mode) {
            client.restore_connection(reservation);
            return Err(err);
        }

        debug!(client = %id, module = %module_id, source, ?mode, "connected");
        Ok(())
    }

    /// Unsubscribe; a subscription that does not exist is a no-op
    pub fn disconnect(
        &self,
        id: ClientId,
        module: Option<ModuleId>,
        source: SourceId,
    ) -> EventResult<()> {
        let client = self.client(id)?;
        let _control = client.control_lock();
        client.ensure_active()?;

        let module_id = resolve_module(&client, module)?;
        self.module(module_id)?.disconnect(id, source);
        client.release_connection(Connection::new(module_id, source));

        debug!(client = %id, module = %module_id, source, "disconnected");
        Ok(())
    }

    /// Drop every subscription of a client; returns how many were held
    pub fn disconnect_all(&self, id: ClientId) -> EventResult<usize> {
        let client = self.client(id)?;
        let _control = client.control_lock();
        client.ensure_active()?;

        Ok(self.unsubscribe_all(&client))
    }

    /// Leave every connection table, then free the client's slots
    ///
    /// Table entries go first: once a slot is released its coalescing
    /// counter may be handed to a new connection, so no dispatch pass may
    /// still reach it through the old subscription. Caller holds the
    /// client's control lock.
    pub(super) fn unsubscribe_all(&self, client: &ClientContext) -> usize {
        for entry in client.connections() {
            let connection = entry.connection;
            if let Ok(module) = self.module(connection.module) {
                module.disconnect(client.id(), connection.source);
            }
        }
        client.release_all().len()
    }

    /// Connections of every handle owned by `pid`, or of every handle
    pub fn list_connections(&self, pid: Option<Pid>) -> Vec<ClientConnections> {
        self.clients
            .values()
            .iter()
            .filter(|c| pid.map_or(true, |pid| c.pid() == pid))
            .map(|c| ClientConnections {
                client: c.id(),
                pid: c.pid(),
                connections: c.connections(),
            })
            .collect()
    }

    // =========================================================================
    // Data plane
    // =========================================================================

    /// Blocking read; `timeout` overrides the handle's stored timeout
    pub fn read(&self, id: ClientId, timeout: Option<Timeout>) -> EventResult<ReadEvent> {
        let client = self.client(id)?;
        self.account(client.read(timeout))
    }

    /// Non-blocking read
    pub fn try_read(&self, id: ClientId) -> EventResult<Option<ReadEvent>> {
        let client = self.client(id)?;
        let read = client.try_read()?;
        if read.is_some() {
            self.stats.record_read();
        }
        Ok(read)
    }

    /// Read without blocking the async runtime
    pub async fn read_async(
        &self,
        id: ClientId,
        timeout: Option<Timeout>,
    ) -> EventResult<ReadEvent> {
        let client = self.client(id)?;
        self.account(client.read_async(timeout).await)
    }

    /// Interrupt a read blocked on the handle
    pub fn abort_read(&self, id: ClientId) -> EventResult<usize> {
        Ok(self.client(id)?.abort_read())
    }

    fn account(&self, read: EventResult<ReadEvent>) -> EventResult<ReadEvent> {
        match &read {
            Ok(_) => self.stats.record_read(),
            Err(EventError::TimedOut) => self.stats.record_timeout(),
            Err(_) => {}
        }
        read
    }

    // =========================================================================
    // Producers
    // =========================================================================

    /// Fan a source mask out to the module's subscribers
    pub fn dispatch(
        &self,
        module: ModuleId,
        mask: SourceMask,
        time: EventTime,
        payload: Option<u32>,
    ) -> EventResult<DispatchReport> {
        let module = self.module(module)?;
        Ok(self.dispatcher.dispatch(&module, mask, time, payload))
    }

    /// Deliver one object-table source
    pub fn dispatch_source(
        &self,
        module: ModuleId,
        source: SourceId,
        time: EventTime,
        payload: Option<u32>,
    ) -> EventResult<DispatchReport> {
        let module = self.module(module)?;
        if source as usize >= module.sources() {
            return Err(EventError::NoSuchSource {
                module: module.id(),
                source_id: source,
            });
        }
        Ok(self.dispatcher.dispatch_source(&module, source, time, payload))
    }

    /// Interrupt entry point for a hardware module
    pub fn service_interrupt(
        &self,
        module: ModuleId,
        source: &dyn InterruptSource,
    ) -> EventResult<IrqReturn> {
        let module = self.module(module)?;
        Ok(self.dispatcher.service_interrupt(&module, source))
    }

    /// Synthetic event on one source, stamped now
    pub fn simulate(
        &self,
        module: ModuleId,
        source: SourceId,
        payload: Option<u32>,
    ) -> EventResult<DispatchReport> {
        self.dispatch_source(module, source, EventTime::now(), payload)
    }

    /// Hand an interrupt to the module's emulation thread
    pub fn emulate(&self, module: ModuleId, irq: EmulatedInterrupt) -> EventResult<()> {
        let installed = self.installed(module)?;
        let guard = installed.emulator.lock();
        let result = match guard.as_ref() {
            Some(emulator) => emulator.trigger(irq),
            None => Err(EventError::Emulation(format!(
                "module {} is not emulated",
                module
            ))),
        };
        result
    }
}

fn resolve_module(client: &Arc<ClientContext>, module: Option<ModuleId>) -> EventResult<ModuleId> {
    module
        .or_else(|| client.selected_module())
        .ok_or(EventError::NoModuleSelected(client.id()))
}
