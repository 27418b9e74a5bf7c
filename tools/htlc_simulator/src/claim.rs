use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

/// SHA-256 of a 32-byte hex secret, as lowercase hex.
pub fn compute_hashlock_hex(secret_hex: &str) -> Result<String> {
    let secret = decode_32(secret_hex, "secret")?;
    Ok(hex::encode(Sha256::digest(secret)))
}

pub fn verify_hashlock(secret_hex: &str, hashlock_hex: &str) -> Result<bool> {
    let expected = decode_32(hashlock_hex, "hashlock")?;
    let computed = Sha256::digest(decode_32(secret_hex, "secret")?);
    Ok(computed.as_slice() == expected.as_slice())
}

fn decode_32(value: &str, field: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let normalized = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(normalized).with_context(|| format!("invalid hex for {field}"))?;
    if bytes.len() != 32 {
        return Err(anyhow!(
            "invalid {field} length: expected 32 bytes, got {}",
            bytes.len()
        ));
    }
    Ok(bytes)
}
