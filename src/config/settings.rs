//! Runtime configuration loader.

use std::{fmt, fs, path::Path, time::Duration};

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::chain::parse_address;
use crate::swap::{parse_deadline, SwapKind, SwapSubmission, DEFAULT_DEADLINE, DEFAULT_SLIPPAGE};

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// Balancer V2 vault, same address on every supported network.
pub const DEFAULT_VAULT_ADDRESS: &str = "0xBA12222222228d8Ba445958a75a0704d566BF2C8";

/// On-disk shape of `settings.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableSettings {
    pub rpc_url: String,
    pub vault_address: String,
    pub default_slippage: String,
    pub default_join_kind: u8,
    pub deadline: String,
    pub receipt_poll_interval_ms: u64,
    pub event_poll_interval_ms: u64,
    pub swap_submission: String,
}

#[derive(Clone)]
pub struct Settings {
    /* -------- infrastructure ------------------------ */
    pub rpc_url: String,
    pub receipt_poll_interval_ms: u64,
    pub event_poll_interval_ms: u64,

    /* -------- contracts ----------------------------- */
    pub vault_address: Address,

    /* -------- join defaults ------------------------- */
    pub default_slippage: String,
    pub default_join_kind: SwapKind,
    pub deadline: U256,
    pub swap_submission: SwapSubmission,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            receipt_poll_interval_ms: 1_000,
            event_poll_interval_ms: 2_000,
            vault_address: Address::new([
                0xba, 0x12, 0x22, 0x22, 0x22, 0x22, 0x8d, 0x8b, 0xa4, 0x45, 0x95, 0x8a, 0x75, 0xa0,
                0x70, 0x4d, 0x56, 0x6b, 0xf2, 0xc8,
            ]),
            default_slippage: DEFAULT_SLIPPAGE.to_string(),
            default_join_kind: SwapKind::GivenIn,
            deadline: U256::from(999_999_999_999_999_999u64),
            swap_submission: SwapSubmission::FireAndForget,
        }
    }
}

impl Settings {
    /// --------------------------------------------------------------
    /// Read `settings.json` from disk. Missing keys fall back to
    /// [`Settings::default`]; present but malformed keys are errors.
    /// --------------------------------------------------------------
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading settings file {:?}", path.as_ref()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("parsing settings file {:?}", path.as_ref()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(raw)?;
        let defaults = Self::default();

        /* -------- plain strings ---------------------------------- */
        let rpc_url = json["rpc_url"]
            .as_str()
            .unwrap_or(DEFAULT_RPC_URL)
            .to_string();
        url::Url::parse(&rpc_url).with_context(|| format!("rpc_url `{rpc_url}`"))?;

        let vault_address = match json["vault_address"].as_str() {
            Some(s) => parse_address(s).context("vault_address")?,
            None => defaults.vault_address,
        };

        /* -------- join defaults ---------------------------------- */
        let default_slippage = json["default_slippage"]
            .as_str()
            .unwrap_or(DEFAULT_SLIPPAGE)
            .to_string();
        crate::swap::compute_limits("1", &default_slippage).context("default_slippage")?;

        let default_join_kind = match json["default_join_kind"].as_u64() {
            Some(v) => {
                let v = u8::try_from(v).map_err(|_| anyhow!("default_join_kind {v} out of range"))?;
                SwapKind::try_from(v)?
            }
            None => defaults.default_join_kind,
        };

        let deadline = parse_deadline(json["deadline"].as_str().unwrap_or(DEFAULT_DEADLINE))?;

        let swap_submission = match json["swap_submission"].as_str() {
            Some(s) => s
                .parse::<SwapSubmission>()
                .map_err(|_| anyhow!("swap_submission `{s}` (expected fire_and_forget or await_inclusion)"))?,
            None => defaults.swap_submission,
        };

        /* -------- numeric parameters ----------------------------- */
        let receipt_poll_interval_ms = json["receipt_poll_interval_ms"]
            .as_u64()
            .unwrap_or(defaults.receipt_poll_interval_ms);
        let event_poll_interval_ms = json["event_poll_interval_ms"]
            .as_u64()
            .unwrap_or(defaults.event_poll_interval_ms);

        Ok(Self {
            rpc_url,
            receipt_poll_interval_ms,
            event_poll_interval_ms,
            vault_address,
            default_slippage,
            default_join_kind,
            deadline,
            swap_submission,
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_string = serde_json::to_string_pretty(&self.to_serializable())?;
        fs::write(&path, json_string)
            .with_context(|| format!("writing settings to {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn to_serializable(&self) -> SerializableSettings {
        SerializableSettings {
            rpc_url: self.rpc_url.clone(),
            vault_address: self.vault_address.to_checksum(None),
            default_slippage: self.default_slippage.clone(),
            default_join_kind: self.default_join_kind as u8,
            deadline: self.deadline.to_string(),
            receipt_poll_interval_ms: self.receipt_poll_interval_ms,
            event_poll_interval_ms: self.event_poll_interval_ms,
            swap_submission: self.swap_submission.to_string(),
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms.max(1))
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms.max(1))
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("vault_address", &self.vault_address)
            .field("default_slippage", &self.default_slippage)
            .field("default_join_kind", &self.default_join_kind)
            .field("swap_submission", &self.swap_submission)
            .finish_non_exhaustive()
    }
}
