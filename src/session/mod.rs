//! Wallet session tracking.
//!
//! [`SessionTracker`] owns the wallet connection status, the active account and
//! the network label. It subscribes to the provider's `chainChanged` and
//! `accountsChanged` events and turns them into typed [`SessionChange`]
//! notifications. Every failure here is logged and swallowed: the session
//! simply stays where it was.

pub mod network;

use std::sync::Arc;

use alloy_primitives::Address;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::chain::{rpc, short_address};
use crate::provider::{ListenerId, ProviderEvent, ProviderEventKind, WalletProvider};

pub use network::{network_label, Network, UNKNOWN_NETWORK};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletSession {
    pub connected: bool,
    pub address: Option<Address>,
    pub network_label: String,
}

impl WalletSession {
    pub fn state(&self) -> SessionState {
        if self.connected {
            SessionState::Connected
        } else {
            SessionState::Unconnected
        }
    }

    /// Owner for allowance checks and sender for writes; `None` until connected.
    pub fn owner(&self) -> Option<Address> {
        if self.connected {
            self.address
        } else {
            None
        }
    }

    pub fn button_text(&self) -> &'static str {
        if self.connected {
            "Wallet Connected"
        } else {
            "Connect Wallet"
        }
    }

    pub fn display_address(&self) -> String {
        self.address.as_ref().map(short_address).unwrap_or_default()
    }

    fn connected_as(&self, address: Address) -> Self {
        Self {
            connected: true,
            address: Some(address),
            network_label: self.network_label.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionChange {
    Connected { address: Address, network: String },
    Disconnected,
    NetworkChanged { network: String },
}

/// Classify the transition `old → new`. `None` when nothing observable moved.
fn diff(old: &WalletSession, new: &WalletSession) -> Option<SessionChange> {
    match (old.connected, new.connected) {
        (true, false) => Some(SessionChange::Disconnected),
        (_, true) if !old.connected || old.address != new.address => {
            new.address.map(|address| SessionChange::Connected {
                address,
                network: new.network_label.clone(),
            })
        }
        _ if old.network_label != new.network_label => Some(SessionChange::NetworkChanged {
            network: new.network_label.clone(),
        }),
        _ => None,
    }
}

pub struct SessionTracker {
    provider: Option<Arc<dyn WalletProvider>>,
    session: WalletSession,
    listeners: Vec<ListenerId>,
    events: Option<UnboundedReceiver<ProviderEvent>>,
}

impl SessionTracker {
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            provider,
            session: WalletSession::default(),
            listeners: Vec::new(),
            events: None,
        }
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn is_subscribed(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Pick up an already-authorized account (no prompt) and subscribe to
    /// provider events. Never fails; without a provider the session stays
    /// unconnected.
    pub async fn initialize(&mut self) -> Option<SessionChange> {
        let Some(provider) = self.provider.clone() else {
            warn!("⚠️ [SESSION] Wallet provider not detected");
            return None;
        };

        if self.listeners.is_empty() {
            let (tx, rx) = mpsc::unbounded_channel();
            self.listeners
                .push(provider.on(ProviderEventKind::ChainChanged, tx.clone()));
            self.listeners
                .push(provider.on(ProviderEventKind::AccountsChanged, tx));
            self.events = Some(rx);
        }

        match rpc::accounts(provider.as_ref()).await {
            Ok(accounts) => match accounts.first() {
                Some(&address) => {
                    info!("✅ [SESSION] Your wallet is connected: {}", short_address(&address));
                    let mut next = self.session.connected_as(address);
                    next.network_label = self.resolve_network(&next.network_label).await;
                    self.commit(next)
                }
                None => {
                    info!("🔒 [SESSION] Wallet is not connected");
                    None
                }
            },
            Err(e) => {
                warn!("⚠️ [SESSION] eth_accounts failed: {:#}", e);
                None
            }
        }
    }

    /// User-initiated connect. Rejection or a missing provider leaves the
    /// session untouched.
    pub async fn connect(&mut self) -> Option<SessionChange> {
        let Some(provider) = self.provider.clone() else {
            warn!("⚠️ [SESSION] Wallet provider not detected");
            return None;
        };

        let accounts = match rpc::request_accounts(provider.as_ref()).await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!("❌ [SESSION] Error connecting: {:#}", e);
                return None;
            }
        };

        let Some(&address) = accounts.first() else {
            warn!("❌ [SESSION] Provider authorized no accounts");
            return None;
        };

        info!("✅ [SESSION] Connected {}", short_address(&address));
        let mut next = self.session.connected_as(address);
        next.network_label = self.resolve_network(&next.network_label).await;
        self.commit(next)
    }

    /// Apply one provider event.
    pub async fn handle_event(&mut self, event: ProviderEvent) -> Option<SessionChange> {
        debug!("📨 [SESSION] {:?}", event);
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(&address) => {
                    let mut next = self.session.connected_as(address);
                    next.network_label = self.resolve_network(&next.network_label).await;
                    self.commit(next)
                }
                None => {
                    info!("🔒 [SESSION] Provider reported no accounts");
                    let next = WalletSession {
                        connected: false,
                        address: None,
                        network_label: self.session.network_label.clone(),
                    };
                    self.commit(next)
                }
            },
            ProviderEvent::ChainChanged(raw) => {
                let label = match self.provider.clone() {
                    Some(provider) => match rpc::net_version(provider.as_ref()).await {
                        Ok(id) => network_label(&id),
                        Err(e) => {
                            debug!("[SESSION] net_version failed ({:#}), using event payload", e);
                            network_label(&raw)
                        }
                    },
                    None => network_label(&raw),
                };
                let next = WalletSession {
                    network_label: label,
                    ..self.session.clone()
                };
                self.commit(next)
            }
        }
    }

    /// Wait for the next provider event that actually changes the session.
    /// `None` once unsubscribed or when the provider goes away.
    pub async fn next_change(&mut self) -> Option<SessionChange> {
        loop {
            let event = self.events.as_mut()?.recv().await?;
            if let Some(change) = self.handle_event(event).await {
                return Some(change);
            }
        }
    }

    /// Remove both listeners. Safe to call repeatedly or before `initialize`.
    pub fn teardown(&mut self) {
        if let Some(provider) = &self.provider {
            for id in self.listeners.drain(..) {
                if !provider.remove_listener(id) {
                    debug!("[SESSION] Listener {:?} was already gone", id);
                }
            }
        }
        self.listeners.clear();
        self.events = None;
    }

    async fn resolve_network(&self, current: &str) -> String {
        let Some(provider) = &self.provider else {
            return current.to_string();
        };
        match rpc::net_version(provider.as_ref()).await {
            Ok(id) => network_label(&id),
            Err(e) => {
                warn!("⚠️ [SESSION] net_version failed: {:#}", e);
                current.to_string()
            }
        }
    }

    fn commit(&mut self, next: WalletSession) -> Option<SessionChange> {
        let change = diff(&self.session, &next);
        self.session = next;
        if let Some(c) = &change {
            info!("🔄 [SESSION] {:?}", c);
        }
        change
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.teardown();
    }
}
