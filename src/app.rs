//! Application state container.
//!
//! [`App`] owns the session tracker, the pool synchronizer and the text the
//! user has typed, and exposes one handler per user action.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use anyhow::{anyhow, bail, ensure, Result};
use log::{info, warn};

use crate::chain::rpc::Receipt;
use crate::chain::short_address;
use crate::config::Settings;
use crate::pool::{PoolSynchronizer, PoolView, Resolution, MAIN_TOKEN_SLOT, SLOT_COUNT};
use crate::provider::WalletProvider;
use crate::session::{SessionChange, SessionTracker, WalletSession};
use crate::swap::{SwapIntent, SwapKind};

/// Everything a front end needs to render the form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppView {
    pub session: WalletSession,
    pub pool: PoolView,
    pub contract_input: String,
    pub amounts: [String; SLOT_COUNT],
    pub join_kind: String,
    pub slippage: String,
}

pub struct App {
    settings: Settings,
    session: SessionTracker,
    pool: Option<PoolSynchronizer>,
    contract_input: String,
    amounts: [String; SLOT_COUNT],
    join_kind: String,
    slippage: String,
}

impl App {
    /// `provider` is `None` when no wallet is available; every chain-facing
    /// handler then logs and does nothing (reads) or errors (writes).
    pub fn new(settings: Settings, provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let pool = provider.clone().map(|p| {
            PoolSynchronizer::new(p, settings.vault_address, settings.receipt_poll_interval())
        });
        Self {
            join_kind: (settings.default_join_kind as u8).to_string(),
            slippage: settings.default_slippage.clone(),
            settings,
            session: SessionTracker::new(provider),
            pool,
            contract_input: String::new(),
            amounts: Default::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &WalletSession {
        self.session.session()
    }

    /// One-time start-up: pick up an authorized account and subscribe.
    pub async fn start(&mut self) -> Option<SessionChange> {
        let change = self.session.initialize().await;
        if let Some(change) = &change {
            self.on_session_change(change).await;
        }
        change
    }

    pub async fn on_connect_clicked(&mut self) -> Option<SessionChange> {
        let change = self.session.connect().await;
        if let Some(change) = &change {
            self.on_session_change(change).await;
        }
        change
    }

    /// Wait for the next provider-driven session change and react to it.
    pub async fn next_session_change(&mut self) -> Option<SessionChange> {
        let change = self.session.next_change().await?;
        self.on_session_change(&change).await;
        Some(change)
    }

    /// Approvals depend on the owner, so any account switch re-checks them.
    async fn on_session_change(&self, change: &SessionChange) {
        match change {
            SessionChange::Connected { address, network } => {
                info!("🔗 [SESSION] {} on {}", short_address(address), network);
            }
            SessionChange::Disconnected => info!("🔒 [SESSION] Disconnected"),
            SessionChange::NetworkChanged { network } => {
                info!("🌐 [SESSION] Network is now {}", network);
                return;
            }
        }
        if let Some(pool) = &self.pool {
            let tokens = pool.snapshot().await.tokens;
            pool.recompute_approvals(tokens, self.session.session().owner()).await;
        }
    }

    /// Edit of the contract address field. Resolution failures are logged and
    /// leave the pool state as it was.
    pub async fn on_contract_address_edited(&mut self, raw: &str) -> Option<Resolution> {
        self.contract_input = raw.to_string();

        let Some(pool) = &self.pool else {
            warn!("⚠️ [POOL] Wallet provider not detected, cannot inspect {}", raw);
            return None;
        };

        match pool.resolve_linear_pool(raw, self.session.session().owner()).await {
            Ok(resolution) => Some(resolution),
            Err(e) => {
                warn!("⚠️ [POOL] Could not resolve `{}`: {:#}", raw, e);
                None
            }
        }
    }

    pub fn set_amount(&mut self, slot: usize, text: &str) {
        if let Some(amount) = self.amounts.get_mut(slot) {
            *amount = text.to_string();
        }
    }

    pub fn set_join_kind(&mut self, text: &str) {
        self.join_kind = text.to_string();
    }

    pub fn set_slippage(&mut self, text: &str) {
        self.slippage = text.to_string();
    }

    fn synchronizer(&self) -> Result<&PoolSynchronizer> {
        self.pool
            .as_ref()
            .ok_or_else(|| anyhow!("wallet provider not detected"))
    }

    fn owner(&self) -> Result<Address> {
        self.session
            .session()
            .owner()
            .ok_or_else(|| anyhow!("wallet not connected"))
    }

    /// Unlimited approval of the token in `slot` towards the vault.
    pub async fn on_approve_clicked(&mut self, slot: usize) -> Result<Receipt> {
        ensure!(slot < SLOT_COUNT, "slot {slot} out of range");
        let pool = self.synchronizer()?;
        let owner = self.owner()?;
        let token = pool
            .snapshot()
            .await
            .tokens
            .slot(slot)
            .ok_or_else(|| anyhow!("no token in slot {slot}"))?;
        pool.approve_token(owner, token, pool.vault(), slot).await
    }

    /// Build the join from the current form and submit it.
    pub async fn on_join_clicked(&mut self) -> Result<B256> {
        let pool = self.synchronizer()?;
        let wallet = self.owner()?;
        let view = pool.snapshot().await;

        let (Some(assets), Some(pool_id)) = (view.tokens.assets(), view.pool_id) else {
            bail!("no linear pool resolved yet");
        };

        let intent = SwapIntent {
            pool_id,
            assets,
            amount: self.amounts[MAIN_TOKEN_SLOT].trim().to_string(),
            kind: self.join_kind.parse::<SwapKind>()?,
            slippage: self.slippage.trim().to_string(),
            wallet,
            deadline: self.settings.deadline,
        };
        // reject bad limits before anything reaches the wallet
        intent.limits()?;

        pool.submit_join(&intent, self.settings.swap_submission).await
    }

    pub async fn view(&self) -> AppView {
        let pool = match &self.pool {
            Some(pool) => pool.snapshot().await,
            None => PoolView::default(),
        };
        AppView {
            session: self.session.session().clone(),
            pool,
            contract_input: self.contract_input.clone(),
            amounts: self.amounts.clone(),
            join_kind: self.join_kind.clone(),
            slippage: self.slippage.clone(),
        }
    }

    pub fn teardown(&mut self) {
        self.session.teardown();
    }
}
