//! Scriptable in-memory provider for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

use super::http::RpcError;
use super::{ListenerId, ListenerRegistry, ProviderEvent, ProviderEventKind, WalletProvider};
use crate::chain::contracts::{IERC20, ILinearPool};
use crate::chain::rpc::{decode_hex, encode_hex};

#[derive(Clone, Copy, Debug)]
pub struct MockPool {
    pub main_token: Option<Address>,
    pub wrapped_token: Option<Address>,
    pub pool_id: Option<B256>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    pub to: Option<Address>,
}

pub struct MockProvider {
    wallet_accounts: Mutex<Vec<Address>>,
    authorized: AtomicBool,
    reject_authorization: AtomicBool,
    net_version: Mutex<String>,
    pools: Mutex<HashMap<Address, MockPool>>,
    allowances: Mutex<HashMap<Address, U256>>,
    delays: Mutex<HashMap<Address, Duration>>,
    pending_polls: AtomicU64,
    reverting: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
    sent: Mutex<Vec<Value>>,
    listeners: ListenerRegistry,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            wallet_accounts: Mutex::new(Vec::new()),
            authorized: AtomicBool::new(false),
            reject_authorization: AtomicBool::new(false),
            net_version: Mutex::new("1".to_string()),
            pools: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            pending_polls: AtomicU64::new(0),
            reverting: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Wallet holds `accounts` but has not authorized the dapp yet.
    pub fn with_wallet(self, accounts: Vec<Address>) -> Self {
        *self.wallet_accounts.lock().unwrap() = accounts;
        self
    }

    /// Wallet holds `accounts` and the dapp is already authorized.
    pub fn with_authorized(self, accounts: Vec<Address>) -> Self {
        self.authorized.store(true, Ordering::SeqCst);
        self.with_wallet(accounts)
    }

    pub fn rejecting_authorization(self) -> Self {
        self.reject_authorization.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_net_version(self, id: &str) -> Self {
        self.set_net_version(id);
        self
    }

    pub fn with_pool(self, pool: Address, main: Address, wrapped: Address, id: B256) -> Self {
        self.pools.lock().unwrap().insert(
            pool,
            MockPool {
                main_token: Some(main),
                wrapped_token: Some(wrapped),
                pool_id: Some(id),
            },
        );
        self
    }

    pub fn with_partial_pool(self, pool: Address, reads: MockPool) -> Self {
        self.pools.lock().unwrap().insert(pool, reads);
        self
    }

    pub fn with_allowance(self, token: Address, value: U256) -> Self {
        self.allowances.lock().unwrap().insert(token, value);
        self
    }

    pub fn with_delay(self, contract: Address, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(contract, delay);
        self
    }

    /// Receipt lookups return `null` this many times before the receipt.
    pub fn with_pending_polls(self, n: u64) -> Self {
        self.pending_polls.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_reverting_transactions(self) -> Self {
        self.reverting.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_net_version(&self, id: &str) {
        *self.net_version.lock().unwrap() = id.to_string();
    }

    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.listeners.emit(&event)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.method == method).count()
    }

    pub fn eth_calls_to(&self, to: Address) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == "eth_call" && c.to == Some(to))
            .count()
    }

    pub fn sent_transactions(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn visible_accounts(&self) -> Vec<Address> {
        if self.authorized.load(Ordering::SeqCst) {
            self.wallet_accounts.lock().unwrap().clone()
        } else {
            Vec::new()
        }
    }

    async fn answer_call(&self, to: Address, data: &[u8]) -> Result<Value> {
        let delay = self.delays.lock().unwrap().get(&to).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if data.len() < 4 {
            bail!("execution reverted");
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

        let word = if selector == IERC20::allowanceCall::SELECTOR {
            let value = self.allowances.lock().unwrap().get(&to).copied().unwrap_or(U256::ZERO);
            value.to_be_bytes::<32>().to_vec()
        } else {
            let pool = self
                .pools
                .lock()
                .unwrap()
                .get(&to)
                .copied()
                .ok_or_else(|| anyhow!("execution reverted"))?;
            let missing = || anyhow!("execution reverted");
            if selector == ILinearPool::getMainTokenCall::SELECTOR {
                pool.main_token.ok_or_else(missing)?.into_word().to_vec()
            } else if selector == ILinearPool::getWrappedTokenCall::SELECTOR {
                pool.wrapped_token.ok_or_else(missing)?.into_word().to_vec()
            } else if selector == ILinearPool::getPoolIdCall::SELECTOR {
                pool.pool_id.ok_or_else(missing)?.to_vec()
            } else {
                bail!("execution reverted");
            }
        };
        Ok(json!(encode_hex(&word)))
    }
}

fn target_of(params: &Value) -> Option<Address> {
    params[0]["to"].as_str().and_then(|s| s.parse().ok())
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            to: target_of(&params),
        });

        match method {
            "eth_accounts" => Ok(json!(self.visible_accounts())),
            "eth_requestAccounts" => {
                if self.reject_authorization.load(Ordering::SeqCst) {
                    return Err(RpcError {
                        code: 4001,
                        message: "User rejected the request.".into(),
                    }
                    .into());
                }
                self.authorized.store(true, Ordering::SeqCst);
                Ok(json!(self.visible_accounts()))
            }
            "net_version" => {
                let id = self.net_version.lock().unwrap().clone();
                Ok(json!(id))
            }
            "eth_call" => {
                let to = target_of(&params).ok_or_else(|| anyhow!("eth_call without `to`"))?;
                let data = decode_hex(params[0]["data"].as_str().unwrap_or("0x"))?;
                self.answer_call(to, &data).await
            }
            "eth_sendTransaction" => {
                let mut sent = self.sent.lock().unwrap();
                sent.push(params[0].clone());
                Ok(json!(B256::with_last_byte(sent.len() as u8).to_string()))
            }
            "eth_getTransactionReceipt" => {
                let pending = self.pending_polls.load(Ordering::SeqCst);
                if pending > 0 {
                    self.pending_polls.store(pending - 1, Ordering::SeqCst);
                    return Ok(Value::Null);
                }
                let status = if self.reverting.load(Ordering::SeqCst) { "0x0" } else { "0x1" };
                Ok(json!({
                    "transactionHash": params[0],
                    "blockNumber": "0x10",
                    "status": status,
                }))
            }
            other => Err(RpcError {
                code: -32601,
                message: format!("method {other} not found"),
            }
            .into()),
        }
    }

    fn on(&self, kind: ProviderEventKind, sink: UnboundedSender<ProviderEvent>) -> ListenerId {
        self.listeners.add(kind, sink)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
