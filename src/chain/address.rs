//! Account address format checks.

use alloy_primitives::Address;
use anyhow::{anyhow, bail, Result};

/// Parse a user-typed account address.
///
/// Accepts 40 hex characters with an optional `0x` prefix. All-lowercase and
/// all-uppercase inputs are taken as-is; mixed case must be a valid EIP-55
/// checksum. This is a format check only, nothing is asked of the chain.
pub fn parse_address(input: &str) -> Result<Address> {
    let body = input.strip_prefix("0x").unwrap_or(input);

    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("`{input}` is not a 20-byte hex address");
    }

    let bytes = hex::decode(body).map_err(|e| anyhow!("`{input}`: {e}"))?;
    let address = Address::from_slice(&bytes);

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        let checksummed = address.to_checksum(None);
        if checksummed[2..] != *body {
            bail!("`{input}` has an invalid checksum (expected {checksummed})");
        }
    }

    Ok(address)
}

pub fn is_address(input: &str) -> bool {
    parse_address(input).is_ok()
}

/// `0x1234...abcdef` form used in status lines.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 6..])
}
