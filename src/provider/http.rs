//! JSON-RPC over HTTP provider.
//!
//! Talks to a node whose accounts are unlocked (anvil, geth `--dev`, a signing
//! proxy). Nodes cannot push `chainChanged`/`accountsChanged`, so
//! [`HttpProvider::spawn_event_watcher`] polls and emits on change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::{
    parse_accounts, ListenerId, ListenerRegistry, ProviderEvent, ProviderEventKind,
    WalletProvider,
};

const METHOD_NOT_FOUND: i64 = -32601;

pub struct HttpProvider {
    url: String,
    client: Client,
    next_id: AtomicU64,
    listeners: ListenerRegistry,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building reqwest client")?;
        info!("🔌 [RPC] HTTP provider initialized: {}", url);
        Ok(Self {
            url,
            client,
            next_id: AtomicU64::new(1),
            listeners: ListenerRegistry::new(),
        })
    }

    async fn raw_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let start_time = Instant::now();
        let res = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("sending {method}"))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(anyhow!("{method} HTTP {}: {}", status, err_text));
        }

        let resp: Value = res.json().await.with_context(|| format!("decoding {method} response"))?;
        debug!(
            "📡 [RPC] {} answered in {}ms",
            method,
            start_time.elapsed().as_millis()
        );

        if let Some(err) = resp.get("error") {
            return Err(RpcError::from_value(err).into());
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("Missing 'result' in {method} response: {:?}", resp))
    }

    /// Poll `eth_accounts` and `eth_chainId` every `interval` and emit an event
    /// whenever either differs from the previous observation. The first
    /// observation only seeds the baseline.
    pub fn spawn_event_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut last_chain: Option<String> = None;

            loop {
                ticker.tick().await;

                match this.raw_request("eth_accounts", json!([])).await.and_then(|v| parse_accounts(&v)) {
                    Ok(accounts) => {
                        if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                            info!("👛 [RPC] accountsChanged -> {} account(s)", accounts.len());
                            this.listeners.emit(&ProviderEvent::AccountsChanged(accounts.clone()));
                        }
                        last_accounts = Some(accounts);
                    }
                    Err(e) => warn!("⚠️ [RPC] eth_accounts poll failed: {}", e),
                }

                match this.raw_request("eth_chainId", json!([])).await {
                    Ok(Value::String(chain)) => {
                        if last_chain.as_ref().is_some_and(|prev| *prev != chain) {
                            info!("🔗 [RPC] chainChanged -> {}", chain);
                            this.listeners.emit(&ProviderEvent::ChainChanged(chain.clone()));
                        }
                        last_chain = Some(chain);
                    }
                    Ok(other) => warn!("⚠️ [RPC] eth_chainId returned {}", other),
                    Err(e) => warn!("⚠️ [RPC] eth_chainId poll failed: {}", e),
                }
            }
        })
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        match self.raw_request(method, params.clone()).await {
            // Plain nodes have no permission prompt; their unlocked accounts
            // are already "authorized".
            Err(e) if method == "eth_requestAccounts" && RpcError::code_of(&e) == Some(METHOD_NOT_FOUND) => {
                debug!("[RPC] eth_requestAccounts unsupported, using eth_accounts");
                self.raw_request("eth_accounts", params).await
            }
            other => other,
        }
    }

    fn on(&self, kind: ProviderEventKind, sink: UnboundedSender<ProviderEvent>) -> ListenerId {
        self.listeners.add(kind, sink)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

/// JSON-RPC `error` member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn from_value(v: &Value) -> Self {
        Self {
            code: v["code"].as_i64().unwrap_or_default(),
            message: v["message"].as_str().unwrap_or("unknown error").to_string(),
        }
    }

    pub fn code_of(err: &anyhow::Error) -> Option<i64> {
        err.downcast_ref::<RpcError>().map(|e| e.code)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
