//! Listener bookkeeping shared by provider implementations.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use log::debug;
use tokio::sync::mpsc::UnboundedSender;

use super::{ListenerId, ProviderEvent, ProviderEventKind};

struct Listener {
    kind: ProviderEventKind,
    sink: UnboundedSender<ProviderEvent>,
}

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: DashMap<ListenerId, Listener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: ProviderEventKind, sink: UnboundedSender<ProviderEvent>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.insert(id, Listener { kind, sink });
        debug!("👂 [PROVIDER] Listener {:?} added for {}", id, kind);
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener of its kind. Listeners whose
    /// receiving side is gone are dropped. Returns the number of deliveries.
    pub fn emit(&self, event: &ProviderEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.listeners.iter() {
            if entry.kind != kind {
                continue;
            }
            if entry.sink.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        for id in dead {
            self.listeners.remove(&id);
        }
        delivered
    }
}
