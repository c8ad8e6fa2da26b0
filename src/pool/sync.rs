//! Pool/approval synchronizer.
//!
//! Resolves a candidate contract into a [`LinearPool`], keeps the tracked token
//! set and pool id, and re-derives which tokens carry an unlimited allowance
//! towards the vault. Reads never commit partial state: a resolution either
//! replaces the whole token set and pool id or leaves them alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use anyhow::{anyhow, ensure, Context, Result};
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use super::{
    is_unlimited, ApprovalStatus, LinearPool, PoolView, TrackedTokenSet, SLOT_COUNT,
    UNLIMITED_ALLOWANCE,
};
use crate::chain::contracts::{IERC20, ILinearPool};
use crate::chain::rpc::{self, Receipt};
use crate::chain::{parse_address, short_address};
use crate::provider::WalletProvider;
use crate::swap::{SwapIntent, SwapSubmission};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Applied(LinearPool),
    /// A newer resolution started while this one was in flight; its result
    /// was dropped.
    Superseded,
}

/// Read-only contract call.
async fn read<C: SolCall + Send>(
    provider: &dyn WalletProvider,
    to: Address,
    call: C,
) -> Result<C::Return> {
    let data = call.abi_encode();
    let out = rpc::eth_call(provider, to, data).await?;
    C::abi_decode_returns(&out, true).map_err(|e| anyhow!("decoding {} from {to}: {e}", C::SIGNATURE))
}

/// Run the three linear-pool reads against `address`. All three must succeed.
pub async fn fetch_linear_pool(provider: &dyn WalletProvider, address: Address) -> Result<LinearPool> {
    let (main, wrapped, id) = tokio::try_join!(
        read(provider, address, ILinearPool::getMainTokenCall {}),
        read(provider, address, ILinearPool::getWrappedTokenCall {}),
        read(provider, address, ILinearPool::getPoolIdCall {}),
    )?;
    Ok(LinearPool {
        address,
        main_token: main._0,
        wrapped_token: wrapped._0,
        pool_id: id._0,
    })
}

pub async fn fetch_allowance(
    provider: &dyn WalletProvider,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256> {
    let ret = read(provider, token, IERC20::allowanceCall { owner, spender }).await?;
    Ok(ret._0)
}

pub struct PoolSynchronizer {
    provider: Arc<dyn WalletProvider>,
    vault: Address,
    receipt_poll: Duration,
    generation: AtomicU64,
    state: RwLock<PoolView>,
}

impl PoolSynchronizer {
    pub fn new(provider: Arc<dyn WalletProvider>, vault: Address, receipt_poll: Duration) -> Self {
        Self {
            provider,
            vault,
            receipt_poll,
            generation: AtomicU64::new(0),
            state: RwLock::new(PoolView::default()),
        }
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub async fn snapshot(&self) -> PoolView {
        *self.state.read().await
    }

    /// Resolve `candidate` as a linear pool and, on success, replace the token
    /// set and pool id, then recompute approvals for `owner`.
    ///
    /// Errors (bad address format, any of the three reads failing) leave the
    /// previous state untouched.
    pub async fn resolve_linear_pool(&self, candidate: &str, owner: Option<Address>) -> Result<Resolution> {
        // Every input claims a generation, so even a rejected newer input
        // retires older in-flight resolutions.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let address = parse_address(candidate.trim())?;
        let pool = fetch_linear_pool(self.provider.as_ref(), address)
            .await
            .with_context(|| format!("{address} is not a linear pool"))?;

        let tokens = {
            let mut state = self.state.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("[POOL] Dropping stale resolution of {}", short_address(&address));
                return Ok(Resolution::Superseded);
            }
            state.tokens = TrackedTokenSet::from(&pool);
            state.pool_id = Some(pool.pool_id);
            state.tokens
        };

        info!(
            "🏊 [POOL] {} -> main {} wrapped {} id {}",
            short_address(&pool.address),
            short_address(&pool.main_token),
            short_address(&pool.wrapped_token),
            pool.pool_id
        );

        self.recompute_approvals(tokens, owner).await;
        Ok(Resolution::Applied(pool))
    }

    /// Re-check every slot of `addresses` against the vault. Empty slots and a
    /// missing `owner` give `false` without touching the network. A result is
    /// written only if its slot still holds the address that was checked.
    pub async fn recompute_approvals(&self, addresses: TrackedTokenSet, owner: Option<Address>) -> ApprovalStatus {
        let checks = addresses.slots().iter().map(|slot| async move {
            match (slot, owner) {
                (Some(token), Some(owner)) => {
                    fetch_allowance(self.provider.as_ref(), *token, owner, self.vault)
                        .await
                        .map(is_unlimited)
                }
                _ => Ok(false),
            }
        });

        if owner.is_none() {
            debug!("[POOL] No wallet connected, approvals forced to false");
        }

        let results = join_all(checks).await;

        let mut state = self.state.write().await;
        for (index, result) in results.into_iter().enumerate() {
            if state.tokens.slot(index) != addresses.slot(index) {
                debug!("[POOL] Slot {} changed during allowance check, skipping", index);
                continue;
            }
            let approved = match result {
                Ok(approved) => approved,
                Err(e) => {
                    warn!("⚠️ [POOL] Allowance check for slot {} failed: {:#}", index, e);
                    false
                }
            };
            state.approvals.set(index, approved);
        }
        state.approvals
    }

    /// Approve `spender` for an unlimited amount of `token` and wait for the
    /// transaction to be mined. On success the flag for `slot` is set without
    /// re-reading the allowance.
    pub async fn approve_token(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
        slot: usize,
    ) -> Result<Receipt> {
        ensure!(slot < SLOT_COUNT, "slot {slot} out of range");

        let data = IERC20::approveCall {
            spender,
            amount: UNLIMITED_ALLOWANCE,
        }
        .abi_encode();

        info!("📝 [APPROVE] {} for {} (slot {})", short_address(&token), short_address(&spender), slot);
        let hash = rpc::send_transaction(self.provider.as_ref(), owner, token, data).await?;
        let receipt = rpc::wait_for_inclusion(self.provider.as_ref(), hash, self.receipt_poll).await?;

        self.state.write().await.approvals.set(slot, true);
        info!("✅ [APPROVE] Slot {} approved in {}", slot, receipt.transaction_hash);
        Ok(receipt)
    }

    /// Send the join `batchSwap`. Under [`SwapSubmission::FireAndForget`] the
    /// hash is returned as soon as the provider accepts the transaction.
    pub async fn submit_join(&self, intent: &SwapIntent, policy: SwapSubmission) -> Result<B256> {
        let call = intent.to_call()?;
        let hash = rpc::send_transaction(
            self.provider.as_ref(),
            intent.wallet,
            self.vault,
            call.abi_encode(),
        )
        .await?;
        info!("🚀 [SWAP] batchSwap submitted: {}", hash);

        if policy == SwapSubmission::AwaitInclusion {
            rpc::wait_for_inclusion(self.provider.as_ref(), hash, self.receipt_poll).await?;
        }
        Ok(hash)
    }
}
