//! EIP-1193 style wallet provider seam.
//!
//! Everything the crate does on-chain goes through [`WalletProvider::request`],
//! the same way a browser dapp routes all RPC through the injected provider.

pub mod http;
pub mod listeners;

#[cfg(test)]
pub mod mock;

use std::fmt;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

pub use listeners::ListenerRegistry;

/// Push notifications a provider can deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    ChainChanged,
    AccountsChanged,
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderEventKind::ChainChanged => f.write_str("chainChanged"),
            ProviderEventKind::AccountsChanged => f.write_str("accountsChanged"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New chain id as reported by the provider (hex or decimal string).
    ChainChanged(String),
    AccountsChanged(Vec<Address>),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::ChainChanged(_) => ProviderEventKind::ChainChanged,
            ProviderEvent::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Raw JSON-RPC request. Returns the `result` member on success.
    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value>;

    /// Register `sink` for every event of `kind`.
    fn on(&self, kind: ProviderEventKind, sink: UnboundedSender<ProviderEvent>) -> ListenerId;

    /// Returns `false` when `id` was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Parse the account list returned by `eth_accounts` / `eth_requestAccounts`.
pub fn parse_accounts(value: &Value) -> anyhow::Result<Vec<Address>> {
    let list = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("account list is not an array: {value}"))?;

    list.iter()
        .map(|v| {
            let s = v
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("account entry is not a string: {v}"))?;
            s.parse::<Address>()
                .map_err(|e| anyhow::anyhow!("bad account `{s}`: {e}"))
        })
        .collect()
}
