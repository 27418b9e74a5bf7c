//! Hash commitments for HTLC swaps.
//!
//! The hashlock is SHA-256 over the 32 preimage bytes, as checked by both the
//! EVM HashedTimelock contract and the Tari swap template.

pub mod bytes32;
mod hashlock;

pub use hashlock::{commit, generate, verify, HashCommitment, Hashlock, Preimage};

use crate::types::{Result, SwapError};

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parses 32 bytes of hex, with or without a `0x` prefix.
pub fn parse_hex32(value: &str) -> Result<[u8; 32]> {
    let trimmed = value.trim();
    let normalized = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(normalized)
        .map_err(|err| SwapError::InvalidEncoding(format!("invalid hex: {err}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        SwapError::InvalidEncoding(format!("expected 32-byte hex, got {}", bytes.len()))
    })
}
