use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{bytes32, to_hex};
use crate::types::{Result, SwapError};

/// HTLC secret. Revealing it claims the funds locked under its hashlock.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Preimage([u8; 32]);

impl Preimage {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Preimage(<redacted>)")
    }
}

impl Serialize for Preimage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        bytes32::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Preimage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        bytes32::deserialize(deserializer).map(Self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hashlock(#[serde(with = "bytes32")] [u8; 32]);

impl Hashlock {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        super::parse_hex32(value).map(Self)
    }
}

impl fmt::Display for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.0))
    }
}

impl fmt::Debug for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashlock({self})")
    }
}

/// A secret together with the hashlock committing to it.
#[derive(Clone, Debug)]
pub struct HashCommitment {
    preimage: Preimage,
    hashlock: Hashlock,
}

impl HashCommitment {
    pub fn from_preimage(preimage: Preimage) -> Self {
        let hashlock = commit(&preimage);
        Self { preimage, hashlock }
    }

    pub fn preimage(&self) -> &Preimage {
        &self.preimage
    }

    pub fn hashlock(&self) -> &Hashlock {
        &self.hashlock
    }

    pub fn is_consistent(&self) -> bool {
        verify(&self.preimage, &self.hashlock)
    }
}

/// Draws a fresh secret from the OS random source.
pub fn generate() -> Result<HashCommitment> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| SwapError::Randomness(err.to_string()))?;
    let preimage = Preimage::from_bytes(bytes);
    bytes.zeroize();
    Ok(HashCommitment::from_preimage(preimage))
}

pub fn commit(preimage: &Preimage) -> Hashlock {
    Hashlock(Sha256::digest(preimage.as_bytes()).into())
}

pub fn verify(preimage: &Preimage, hashlock: &Hashlock) -> bool {
    commit(preimage) == *hashlock
}
