/*!
 * Connection Table
 * Per-source subscriber slots of one module
 */

use crate::client::Endpoint;
use crate::core::errors::{EventError, EventResult};
use crate::core::types::{ClientId, ModuleId, SourceId, SourceMask};
use crate::events::SubscriptionMode;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// One client subscribed to one source
///
/// Holds the client's endpoint by `Arc`, so a dispatch pass that already
/// took the read lock can finish delivering even if the client is closing.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub endpoint: Arc<Endpoint>,
    /// Client-side connection slot, used as the cumulative counter index
    pub slot: usize,
    pub mode: SubscriptionMode,
}

impl Subscriber {
    #[inline]
    pub fn client(&self) -> ClientId {
        self.endpoint.client()
    }

    #[inline]
    pub fn cumulative_slot(&self) -> Option<usize> {
        match self.mode {
            SubscriptionMode::Queued => None,
            SubscriptionMode::Cumulative => Some(self.slot),
        }
    }
}

/// What a successful connect changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// First subscriber of the source
    First,
    Added,
    /// Already subscribed; only the mode was refreshed
    Updated,
}

/// What a disconnect changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    NotSubscribed,
    Removed,
    /// Removed the source's last subscriber
    Last,
}

pub(crate) struct TableInner {
    sources: Box<[Box<[Option<Subscriber>]>]>,
    retired: bool,
}

impl TableInner {
    /// Subscribers of `source` in slot order; empty for an unknown source
    #[inline]
    pub(crate) fn subscribers(&self, source: SourceId) -> impl Iterator<Item = &Subscriber> {
        self.sources
            .get(source as usize)
            .into_iter()
            .flat_map(|slots| slots.iter().flatten())
    }
}

/// Fixed array of subscriber sets, one per source id
///
/// # Thread Safety
/// Dispatch iterates under the read lock; connect and disconnect take the
/// write lock for a short, allocation-free edit. Capacity per source is
/// fixed at construction.
pub struct ConnectionTable {
    module: ModuleId,
    inner: RwLock<TableInner>,
}

impl ConnectionTable {
    pub fn new(module: ModuleId, sources: usize, per_source: usize) -> Self {
        let sources = (0..sources)
            .map(|_| vec![None; per_source].into_boxed_slice())
            .collect();
        Self {
            module,
            inner: RwLock::new(TableInner {
                sources,
                retired: false,
            }),
        }
    }

    pub fn sources(&self) -> usize {
        self.inner.read().sources.len()
    }

    pub fn connect(
        &self,
        endpoint: &Arc<Endpoint>,
        source: SourceId,
        slot: usize,
        mode: SubscriptionMode,
    ) -> EventResult<Attach> {
        let mut inner = self.inner.write();
        if inner.retired {
            return Err(EventError::NoSuchModule(self.module));
        }
        let module = self.module;
        let slots = inner
            .sources
            .get_mut(source as usize)
            .ok_or(EventError::NoSuchSource {
                module,
                source_id: source,
            })?;

        let client = endpoint.client();
        if let Some(existing) = slots.iter_mut().flatten().find(|s| s.client() == client) {
            existing.slot = slot;
            existing.mode = mode;
            return Ok(Attach::Updated);
        }

        let first = slots.iter().all(Option::is_none);
        let free = slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(EventError::TableFull {
                module,
                source_id: source,
            })?;
        *free = Some(Subscriber {
            endpoint: Arc::clone(endpoint),
            slot,
            mode,
        });
        Ok(if first { Attach::First } else { Attach::Added })
    }

    pub fn disconnect(&self, client: ClientId, source: SourceId) -> Detach {
        let mut inner = self.inner.write();
        let Some(slots) = inner.sources.get_mut(source as usize) else {
            return Detach::NotSubscribed;
        };
        detach(slots, client)
    }

    /// Remove `client` from every source; returns the sources left empty
    pub fn remove_client(&self, client: ClientId) -> SourceMask {
        let mut inner = self.inner.write();
        let mut emptied = 0;
        for (source, slots) in inner.sources.iter_mut().enumerate() {
            if detach(slots, client) == Detach::Last {
                emptied |= 1 << source;
            }
        }
        emptied
    }

    /// Drop every subscriber; returns each subscribed endpoint once
    pub fn clear(&self) -> Vec<Arc<Endpoint>> {
        let mut inner = self.inner.write();
        drain(&mut inner)
    }

    /// Clear and refuse any further connect
    pub fn retire(&self) -> Vec<Arc<Endpoint>> {
        let mut inner = self.inner.write();
        inner.retired = true;
        drain(&mut inner)
    }

    pub fn subscribers(&self, source: SourceId) -> Vec<ClientId> {
        self.inner
            .read()
            .subscribers(source)
            .map(Subscriber::client)
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.read();
        inner.sources.iter().map(|s| s.iter().flatten().count()).sum()
    }

    /// Read view held for one dispatch pass
    #[inline]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TableInner> {
        self.inner.read()
    }
}

fn detach(slots: &mut [Option<Subscriber>], client: ClientId) -> Detach {
    let Some(held) = slots
        .iter_mut()
        .find(|s| matches!(s, Some(sub) if sub.client() == client))
    else {
        return Detach::NotSubscribed;
    };
    *held = None;
    if slots.iter().all(Option::is_none) {
        Detach::Last
    } else {
        Detach::Removed
    }
}

fn drain(inner: &mut TableInner) -> Vec<Arc<Endpoint>> {
    let mut endpoints: Vec<Arc<Endpoint>> = Vec::new();
    for slots in inner.sources.iter_mut() {
        for sub in slots.iter_mut().filter_map(Option::take) {
            if !endpoints.iter().any(|e| e.client() == sub.client()) {
                endpoints.push(sub.endpoint);
            }
        }
    }
    endpoints
}

impl std::fmt::Debug for ConnectionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTable")
            .field("module", &self.module)
            .field("sources", &self.sources())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
