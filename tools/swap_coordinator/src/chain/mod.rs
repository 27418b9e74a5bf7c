//! Chain adapters: the chain-specific half of the HTLC protocol.
//!
//! A session resolves its source and destination adapters once, from the
//! tokens it trades, and keeps them for its lifetime.

pub mod evm;
pub mod tari;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::{Hashlock, Preimage};
use crate::quote::{TokenAmount, TokenId};
use crate::types::ChainError;

pub use evm::{EvmHtlcAdapter, EvmLog, EvmReceipt, EvmRpc, EvmTransaction};
pub use tari::{
    TariAccount, TariArg, TariHtlcAdapter, TariInstruction, TariTransaction,
    TariTransactionResult, TariWallet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Evm,
    Tari,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => f.write_str("evm"),
            Self::Tari => f.write_str("tari"),
        }
    }
}

/// Receiving address or public key on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex addresses differ only by checksum casing across wallets.
    pub fn matches(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a deployed HTLC (EVM contract id or Tari component address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(String);

impl LockId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub chain: Chain,
    pub tx_id: String,
}

/// On-chain view of an HTLC, used to check the provider's lock independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDetails {
    pub receiver: Address,
    pub amount: u128,
    pub hashlock: Hashlock,
    pub expiry: u64,
    /// False once the lock was withdrawn or refunded.
    pub claimable: bool,
}

/// Answer to a lock query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockLookup<T> {
    Found(T),
    /// The chain was queried and holds no such lock.
    Missing,
    /// The chain cannot be queried for locks.
    Unsupported,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> Chain;

    /// Local wallet's receiving address; `WalletUnavailable` without a session.
    async fn get_client_address(&self) -> Result<crate::chain::Address, ChainError>;

    /// Locks `amount` payable to `counterparty` against the preimage of
    /// `hashlock` until `expiry`, refundable to the locker afterwards.
    async fn lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockId, ChainError>;

    /// Reveals `preimage` on-chain to claim an existing lock.
    async fn withdraw(&self, lock_id: &LockId, preimage: &Preimage) -> Result<Receipt, ChainError>;

    /// Returns an expired lock's funds to the locker.
    async fn refund(&self, lock_id: &LockId) -> Result<Receipt, ChainError>;

    async fn lock_details(&self, lock_id: &LockId) -> Result<LockLookup<LockDetails>, ChainError>;

    /// Looks for a lock the local wallet created with exactly these terms.
    /// Used when a `lock` submission ended without a known outcome.
    async fn find_lock(
        &self,
        _counterparty: &Address,
        _amount: &TokenAmount,
        _hashlock: &Hashlock,
        _expiry: u64,
    ) -> Result<LockLookup<LockId>, ChainError> {
        Ok(LockLookup::Unsupported)
    }

    /// Chain clock, in the unit the chain's timelocks use.
    async fn block_timestamp(&self) -> Result<u64, ChainError>;

    /// Timelock value `duration` from now, in the chain's own unit.
    async fn expiry_after(&self, duration: Duration) -> Result<u64, ChainError> {
        let now = self.block_timestamp().await?;
        Ok(now.saturating_add(duration.as_secs()))
    }

    /// Whether a lock with `expiry` can be refunded at chain time `now`.
    fn refund_available(&self, expiry: u64, now: u64) -> bool {
        now >= expiry
    }
}

/// Adapters keyed by chain.
#[derive(Clone, Default)]
pub struct ChainAdapters {
    adapters: HashMap<Chain, Arc<dyn ChainAdapter>>,
}

impl ChainAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.adapters.insert(adapter.chain(), adapter);
        self
    }

    pub fn get(&self, chain: Chain) -> Result<Arc<dyn ChainAdapter>, ChainError> {
        self.adapters
            .get(&chain)
            .cloned()
            .ok_or(ChainError::UnsupportedChain(chain))
    }

    pub fn resolve(&self, from: &TokenId, to: &TokenId) -> crate::types::Result<SessionAdapters> {
        Ok(SessionAdapters {
            source: self.get(from.chain()?)?,
            destination: self.get(to.chain()?)?,
        })
    }
}

impl fmt::Debug for ChainAdapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}

/// Source side locks the client's funds; destination side pays the client.
#[derive(Clone)]
pub struct SessionAdapters {
    pub source: Arc<dyn ChainAdapter>,
    pub destination: Arc<dyn ChainAdapter>,
}

/// Keeps wallet and transport failures as they are and files anything else
/// under the failing operation.
pub(crate) fn classify(err: ChainError, wrap: fn(String) -> ChainError) -> ChainError {
    match err {
        ChainError::Transport(_) | ChainError::WalletUnavailable(_) => err,
        other => wrap(other.to_string()),
    }
}
