//! Join-by-batchSwap construction.
//!
//! A join is a single `batchSwap` step that sends the main token (asset 1)
//! into the linear pool and receives pool tokens (asset 0). Limits are derived
//! from the one user-entered amount with exact integer arithmetic, since
//! 18-decimal base-unit amounts overflow the exact range of an `f64`.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, Bytes, B256, I256, U256};
use anyhow::{anyhow, bail, ensure, Context, Result};
use rust_decimal::Decimal;
use strum_macros::{Display, EnumString};

use crate::chain::contracts::IVault;
use crate::pool::SLOT_COUNT;

pub const DEFAULT_SLIPPAGE: &str = "0.01";
/// Far enough out to mean "no practical deadline".
pub const DEFAULT_DEADLINE: &str = "999999999999999999";

pub const ASSET_IN_INDEX: u64 = 1;
pub const ASSET_OUT_INDEX: u64 = 0;

/// Whether `submit_join` waits for the swap to be mined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SwapSubmission {
    #[default]
    FireAndForget,
    AwaitInclusion,
}

/// The vault's `SwapKind`; user-facing as "join kind".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum SwapKind {
    #[default]
    GivenIn = 0,
    GivenOut = 1,
}

impl TryFrom<u8> for SwapKind {
    type Error = anyhow::Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(SwapKind::GivenIn),
            1 => Ok(SwapKind::GivenOut),
            other => Err(anyhow!("join kind must be 0 (given in) or 1 (given out), got {other}")),
        }
    }
}

/// An exact limit, `±(whole + fraction / 10^scale)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    negative: bool,
    whole: U256,
    fraction: U256,
    scale: u32,
}

impl Limit {
    /// Encode as `int256`, dropping the fraction (truncation toward zero).
    pub fn to_int256(&self) -> Result<I256> {
        let whole = I256::try_from(self.whole)
            .map_err(|_| anyhow!("limit {} does not fit in int256", self))?;
        Ok(if self.negative { -whole } else { whole })
    }

    fn is_zero(&self) -> bool {
        self.whole.is_zero() && self.fraction.is_zero()
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative && !self.is_zero() {
            f.write_str("-")?;
        }
        write!(f, "{}", self.whole)?;
        if self.scale > 0 {
            let width = self.scale as usize;
            write!(f, ".{:0>width$}", self.fraction.to_string())?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapLimits {
    /// Limit for asset 0: `-(amount × (1 − slippage))`.
    pub lower: Limit,
    /// Limit for asset 1: `amount × (1 + slippage)`.
    pub upper: Limit,
}

fn parse_slippage(slippage: &str) -> Result<Decimal> {
    let s = Decimal::from_str_exact(slippage.trim())
        .with_context(|| format!("slippage `{slippage}` is not a decimal"))?;
    ensure!(
        s >= Decimal::ZERO && s <= Decimal::ONE,
        "slippage {s} must lie between 0 and 1"
    );
    Ok(s)
}

/// Base-unit amount as typed, e.g. `1000000000000000000` for one 18-decimal token.
fn parse_amount(amount: &str) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        bail!("amount `{amount}` must be a base-unit integer");
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| anyhow!("amount `{amount}`: {e}"))
}

fn pow10(exp: u32) -> Result<U256> {
    (0..exp).try_fold(U256::from(1u8), |acc, _| {
        acc.checked_mul(U256::from(10u8))
            .ok_or_else(|| anyhow!("10^{exp} overflows"))
    })
}

/// Integer arithmetic on `U256`. With slippage `m / 10^k`, `amount × m / 10^k`
/// splits into `q × m + r × m / 10^k` for `amount = q × 10^k + r`, which keeps
/// every intermediate below `2^256` for any amount whose limits fit.
pub fn compute_limits(amount: &str, slippage: &str) -> Result<SwapLimits> {
    let amount = parse_amount(amount)?;
    let slippage = parse_slippage(slippage)?;

    let scale = slippage.scale();
    let mantissa = U256::from(
        u128::try_from(slippage.mantissa()).map_err(|_| anyhow!("negative slippage"))?,
    );
    let denom = pow10(scale)?;

    let overflow = || anyhow!("limit for amount {amount} overflows");
    let (q, r) = (amount / denom, amount % denom);
    let rm = r.checked_mul(mantissa).ok_or_else(overflow)?;
    // floor(amount × slippage) and the leftover numerator over 10^scale
    let shift = q
        .checked_mul(mantissa)
        .and_then(|v| v.checked_add(rm / denom))
        .ok_or_else(overflow)?;
    let rest = rm % denom;

    let upper = Limit {
        negative: false,
        whole: amount.checked_add(shift).ok_or_else(overflow)?,
        fraction: rest,
        scale,
    };

    let (borrow, fraction) = if rest.is_zero() {
        (U256::ZERO, U256::ZERO)
    } else {
        (U256::from(1u8), denom - rest)
    };
    let lower = Limit {
        negative: true,
        whole: amount
            .checked_sub(shift)
            .and_then(|v| v.checked_sub(borrow))
            .ok_or_else(overflow)?,
        fraction,
        scale,
    };

    Ok(SwapLimits { lower, upper })
}

impl SwapLimits {
    /// `[lower, upper, 0]`, positionally matching the three assets.
    pub fn to_int256(&self) -> Result<Vec<I256>> {
        Ok(vec![self.lower.to_int256()?, self.upper.to_int256()?, I256::ZERO])
    }
}

/// Everything needed for one join, assembled at submit time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapIntent {
    pub pool_id: B256,
    pub assets: [Address; SLOT_COUNT],
    pub amount: String,
    pub kind: SwapKind,
    pub slippage: String,
    /// Sender and recipient of the funds.
    pub wallet: Address,
    pub deadline: U256,
}

impl SwapIntent {
    pub fn limits(&self) -> Result<SwapLimits> {
        compute_limits(&self.amount, &self.slippage)
    }

    pub fn to_call(&self) -> Result<IVault::batchSwapCall> {
        let amount = U256::from_str_radix(self.amount.trim(), 10)
            .map_err(|e| anyhow!("amount `{}`: {e}", self.amount))?;
        let limits = self.limits()?.to_int256()?;

        Ok(IVault::batchSwapCall {
            kind: self.kind as u8,
            swaps: vec![IVault::BatchSwapStep {
                poolId: self.pool_id,
                assetInIndex: U256::from(ASSET_IN_INDEX),
                assetOutIndex: U256::from(ASSET_OUT_INDEX),
                amount,
                userData: Bytes::from(vec![0u8; 32]),
            }],
            assets: self.assets.to_vec(),
            funds: IVault::FundManagement {
                sender: self.wallet,
                fromInternalBalance: false,
                recipient: self.wallet,
                toInternalBalance: false,
            },
            limits,
            deadline: self.deadline,
        })
    }
}

pub fn parse_deadline(raw: &str) -> Result<U256> {
    U256::from_str_radix(raw.trim(), 10).map_err(|e| anyhow!("deadline `{raw}`: {e}"))
}

impl FromStr for SwapKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let v: u8 = s
            .trim()
            .parse()
            .with_context(|| format!("join kind `{s}` is not a number"))?;
        SwapKind::try_from(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_E18: &str = "1000000000000000000";

    #[test]
    fn limits_are_exact_at_18_decimals() {
        let limits = compute_limits(ONE_E18, "0.01").unwrap();
        assert_eq!(limits.lower.to_string(), "-990000000000000000.00");
        assert_eq!(limits.upper.to_string(), "1010000000000000000.00");

        let encoded = limits.to_int256().unwrap();
        assert_eq!(encoded[0].to_string(), "-990000000000000000");
        assert_eq!(encoded[1].to_string(), "1010000000000000000");
        assert_eq!(encoded[2], I256::ZERO);
    }

    #[test]
    fn limits_beyond_f64_precision() {
        // 1234567.891234567891234567 tokens in base units; an f64 would round this
        let limits = compute_limits("1234567891234567891234567", "0.003").unwrap();
        assert_eq!(limits.upper.to_string(), "1238271594908271594908270.701");
        assert_eq!(limits.lower.to_string(), "-1230864187560864187560863.299");

        let encoded = limits.to_int256().unwrap();
        assert_eq!(encoded[0].to_string(), "-1230864187560864187560863");
        assert_eq!(encoded[1].to_string(), "1238271594908271594908270");
    }

    #[test]
    fn zero_slippage_is_symmetric() {
        let limits = compute_limits("42", "0").unwrap();
        assert_eq!(limits.lower.to_string(), "-42");
        assert_eq!(limits.upper.to_string(), "42");
        assert_eq!(limits.to_int256().unwrap()[0].to_string(), "-42");
    }

    #[test]
    fn limits_truncate_instead_of_rounding() {
        let limits = compute_limits("69999999999999999999999999999", "0.01").unwrap();
        assert_eq!(limits.upper.to_string(), "70699999999999999999999999998.99");
        assert_eq!(limits.lower.to_string(), "-69299999999999999999999999999.01");

        let encoded = limits.to_int256().unwrap();
        assert_eq!(encoded[0].to_string(), "-69299999999999999999999999999");
        assert_eq!(encoded[1].to_string(), "70699999999999999999999999998");
    }

    #[test]
    fn limits_for_amounts_past_96_bits() {
        // 1e15 tokens at 18 decimals
        let limits = compute_limits("1000000000000000000000000000000000", "0.01").unwrap();
        assert_eq!(limits.upper.to_string(), "1010000000000000000000000000000000.00");
        assert_eq!(limits.lower.to_string(), "-990000000000000000000000000000000.00");

        let encoded = limits.to_int256().unwrap();
        assert_eq!(encoded[0].to_string(), "-990000000000000000000000000000000");
        assert_eq!(encoded[1].to_string(), "1010000000000000000000000000000000");
    }

    #[test]
    fn limits_outside_int256_are_errors() {
        let max = U256::MAX.to_string();
        assert!(compute_limits(&max, "0.01").is_err());

        // 2^255 fits uint256 but not int256
        let half = (U256::from(1u8) << 255usize).to_string();
        let limits = compute_limits(&half, "0").unwrap();
        assert!(limits.to_int256().is_err());
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(compute_limits("", "0.01").is_err());
        assert!(compute_limits("1.5", "0.01").is_err());
        assert!(compute_limits("-5", "0.01").is_err());
        assert!(compute_limits("1e18", "0.01").is_err());
        assert!(compute_limits(ONE_E18, "abc").is_err());
        assert!(compute_limits(ONE_E18, "-0.01").is_err());
        assert!(compute_limits(ONE_E18, "1.5").is_err());
        // one past uint256
        assert!(compute_limits(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936",
            "0"
        )
        .is_err());
    }

    #[test]
    fn join_kind_parsing() {
        assert_eq!("0".parse::<SwapKind>().unwrap(), SwapKind::GivenIn);
        assert_eq!(" 1 ".parse::<SwapKind>().unwrap(), SwapKind::GivenOut);
        assert!("2".parse::<SwapKind>().is_err());
        assert!("x".parse::<SwapKind>().is_err());
        assert_eq!(SwapKind::default() as u8, 0);
    }

    #[test]
    fn submission_policy_names() {
        assert_eq!(SwapSubmission::default(), SwapSubmission::FireAndForget);
        assert_eq!(SwapSubmission::AwaitInclusion.to_string(), "await_inclusion");
        assert_eq!(
            "fire_and_forget".parse::<SwapSubmission>().unwrap(),
            SwapSubmission::FireAndForget
        );
        assert!("sometimes".parse::<SwapSubmission>().is_err());
    }

    #[test]
    fn call_layout() {
        let wallet = Address::with_last_byte(0xa1);
        let assets = [
            Address::with_last_byte(1),
            Address::with_last_byte(2),
            Address::with_last_byte(3),
        ];
        let intent = SwapIntent {
            pool_id: B256::repeat_byte(0x42),
            assets,
            amount: ONE_E18.into(),
            kind: SwapKind::GivenOut,
            slippage: DEFAULT_SLIPPAGE.into(),
            wallet,
            deadline: parse_deadline(DEFAULT_DEADLINE).unwrap(),
        };

        let call = intent.to_call().unwrap();
        assert_eq!(call.kind, 1);
        assert_eq!(call.swaps.len(), 1);

        let step = &call.swaps[0];
        assert_eq!(step.poolId, B256::repeat_byte(0x42));
        assert_eq!(step.assetInIndex, U256::from(1));
        assert_eq!(step.assetOutIndex, U256::ZERO);
        assert_eq!(step.amount, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(step.userData.len(), 32);
        assert!(step.userData.iter().all(|b| *b == 0));

        assert_eq!(call.assets, assets.to_vec());
        assert_eq!(call.funds.sender, wallet);
        assert_eq!(call.funds.recipient, wallet);
        assert!(!call.funds.fromInternalBalance);
        assert!(!call.funds.toInternalBalance);
        assert_eq!(call.limits.len(), 3);
        assert_eq!(call.deadline, U256::from(999_999_999_999_999_999u64));
    }
}
