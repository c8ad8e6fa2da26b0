//! Typed wrappers over the handful of JSON-RPC methods the joiner needs.

use std::time::Duration;

use alloy_primitives::{Address, B256};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use serde_json::{json, Value};

use crate::provider::{parse_accounts, WalletProvider};

/// What we keep from `eth_getTransactionReceipt`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

pub fn encode_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(body).with_context(|| format!("decoding hex `{s}`"))
}

fn parse_quantity(v: &Value) -> Option<u64> {
    let s = v.as_str()?;
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()
}

fn parse_hash(v: &Value) -> Result<B256> {
    let s = v
        .as_str()
        .ok_or_else(|| anyhow!("transaction hash is not a string: {v}"))?;
    let bytes = decode_hex(s)?;
    if bytes.len() != 32 {
        bail!("transaction hash `{s}` is {} bytes", bytes.len());
    }
    Ok(B256::from_slice(&bytes))
}

pub async fn accounts(provider: &dyn WalletProvider) -> Result<Vec<Address>> {
    let v = provider.request("eth_accounts", json!([])).await?;
    parse_accounts(&v)
}

/// Prompts for authorization on wallets that have a prompt.
pub async fn request_accounts(provider: &dyn WalletProvider) -> Result<Vec<Address>> {
    let v = provider.request("eth_requestAccounts", json!([])).await?;
    parse_accounts(&v)
}

pub async fn net_version(provider: &dyn WalletProvider) -> Result<String> {
    let v = provider.request("net_version", json!([])).await?;
    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(anyhow!("unexpected net_version result: {other}")),
    }
}

/// Read-only `eth_call` against `to` at the latest block.
pub async fn eth_call(provider: &dyn WalletProvider, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
    let params = json!([
        { "to": to.to_string(), "data": encode_hex(&data) },
        "latest"
    ]);
    let v = provider
        .request("eth_call", params)
        .await
        .with_context(|| format!("eth_call to {to}"))?;
    let s = v
        .as_str()
        .ok_or_else(|| anyhow!("eth_call result is not a string: {v}"))?;
    decode_hex(s)
}

/// Hand a transaction to the provider's signer. Returns its hash.
pub async fn send_transaction(
    provider: &dyn WalletProvider,
    from: Address,
    to: Address,
    data: Vec<u8>,
) -> Result<B256> {
    let params = json!([{
        "from": from.to_string(),
        "to": to.to_string(),
        "data": encode_hex(&data),
    }]);
    let v = provider
        .request("eth_sendTransaction", params)
        .await
        .with_context(|| format!("eth_sendTransaction to {to}"))?;
    let hash = parse_hash(&v)?;
    info!("📤 [RPC] Submitted {} -> {}", hash, to);
    Ok(hash)
}

pub async fn transaction_receipt(provider: &dyn WalletProvider, hash: B256) -> Result<Option<Receipt>> {
    let v = provider
        .request("eth_getTransactionReceipt", json!([hash.to_string()]))
        .await?;
    if v.is_null() {
        return Ok(None);
    }
    // Pre-Byzantium receipts carry no status; treat them as successful.
    let success = v.get("status").and_then(parse_quantity).map_or(true, |s| s == 1);
    Ok(Some(Receipt {
        transaction_hash: hash,
        block_number: v.get("blockNumber").and_then(parse_quantity),
        success,
    }))
}

/// Poll until the transaction is mined. No timeout, no cancellation: the
/// caller is suspended for as long as inclusion takes. A reverted receipt is
/// an error.
pub async fn wait_for_inclusion(
    provider: &dyn WalletProvider,
    hash: B256,
    poll_interval: Duration,
) -> Result<Receipt> {
    let mut polls = 0u64;
    loop {
        if let Some(receipt) = transaction_receipt(provider, hash).await? {
            if !receipt.success {
                bail!("transaction {hash} reverted in block {:?}", receipt.block_number);
            }
            info!(
                "⛏️ [RPC] {} included in block {:?} after {} poll(s)",
                hash, receipt.block_number, polls
            );
            return Ok(receipt);
        }
        polls += 1;
        debug!("⏳ [RPC] {} not yet mined (poll {})", hash, polls);
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    #[test]
    fn hex_helpers() {
        assert_eq!(encode_hex(&[0xde, 0xad]), "0xdead");
        assert_eq!(decode_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(decode_hex("beef").unwrap(), vec![0xbe, 0xef]);
        assert!(decode_hex("0xzz").is_err());
        assert_eq!(parse_quantity(&json!("0x10")), Some(16));
        assert_eq!(parse_quantity(&json!(16)), None);
    }

    #[tokio::test]
    async fn net_version_accepts_numbers_and_strings() {
        let mock = MockProvider::new().with_net_version("137");
        assert_eq!(net_version(&mock).await.unwrap(), "137");
    }

    #[tokio::test]
    async fn wait_for_inclusion_polls_until_mined() {
        let mock = MockProvider::new().with_pending_polls(2);
        let hash = B256::repeat_byte(0x11);
        let receipt = wait_for_inclusion(&mock, hash, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(receipt.success);
        assert_eq!(mock.count("eth_getTransactionReceipt"), 3);
    }

    #[tokio::test]
    async fn reverted_receipt_is_an_error() {
        let mock = MockProvider::new().with_reverting_transactions();
        let err = wait_for_inclusion(&mock, B256::ZERO, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reverted"));
    }
}
