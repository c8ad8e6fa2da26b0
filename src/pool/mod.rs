//! Linear pool introspection and token approval tracking.

pub mod sync;

use alloy_primitives::{Address, B256, U256};

pub use sync::{PoolSynchronizer, Resolution};

pub const SLOT_COUNT: usize = 3;
pub const CONTRACT_SLOT: usize = 0;
pub const MAIN_TOKEN_SLOT: usize = 1;
pub const WRAPPED_TOKEN_SLOT: usize = 2;

/// Allowance at or above this counts as approved.
pub const UNLIMITED_ALLOWANCE: U256 = U256::MAX;

pub fn is_unlimited(allowance: U256) -> bool {
    allowance >= UNLIMITED_ALLOWANCE
}

/// What a successful `getMainToken`/`getWrappedToken`/`getPoolId` round
/// returned for one contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearPool {
    pub address: Address,
    pub main_token: Address,
    pub wrapped_token: Address,
    pub pool_id: B256,
}

/// `[contract, main token, wrapped token]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackedTokenSet([Option<Address>; SLOT_COUNT]);

impl TrackedTokenSet {
    pub fn new(slots: [Option<Address>; SLOT_COUNT]) -> Self {
        Self(slots)
    }

    pub fn slot(&self, index: usize) -> Option<Address> {
        self.0.get(index).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<Address>; SLOT_COUNT] {
        &self.0
    }

    /// All three addresses, or `None` while any slot is empty.
    pub fn assets(&self) -> Option<[Address; SLOT_COUNT]> {
        Some([self.0[0]?, self.0[1]?, self.0[2]?])
    }
}

impl From<&LinearPool> for TrackedTokenSet {
    fn from(pool: &LinearPool) -> Self {
        Self([Some(pool.address), Some(pool.main_token), Some(pool.wrapped_token)])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApprovalStatus([bool; SLOT_COUNT]);

impl ApprovalStatus {
    pub fn new(flags: [bool; SLOT_COUNT]) -> Self {
        Self(flags)
    }

    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize, approved: bool) {
        if let Some(flag) = self.0.get_mut(index) {
            *flag = approved;
        }
    }

    pub fn flags(&self) -> [bool; SLOT_COUNT] {
        self.0
    }
}

/// Snapshot of everything the synchronizer owns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolView {
    pub tokens: TrackedTokenSet,
    pub approvals: ApprovalStatus,
    pub pool_id: Option<B256>,
}

impl PoolView {
    /// Button text for slot `index` in the approval column.
    pub fn approval_label(&self, index: usize) -> String {
        if self.approvals.get(index) {
            "Token Approved".to_string()
        } else {
            format!("Approve Token {}", index + 1)
        }
    }
}
