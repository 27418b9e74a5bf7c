//! Tari side of the swap: the HTLC swap template driven through the wallet
//! daemon.
//!
//! Transactions are assembled here as instruction lists with CBOR-encoded
//! literal arguments. Signing and submission belong to the injected
//! [`TariWallet`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{classify, Address, Chain, ChainAdapter, LockDetails, LockId, LockLookup, Receipt};
use crate::crypto::{Hashlock, Preimage};
use crate::quote::TokenAmount;
use crate::types::ChainError;

const BUCKET: &[u8] = b"bucket";

/// Wall-clock length of one epoch, used to express lock durations in epochs.
pub const DEFAULT_EPOCH_DURATION: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TariArg {
    Literal(Vec<u8>),
    Workspace(Vec<u8>),
}

impl TariArg {
    pub fn literal<T: Serialize>(value: &T) -> Result<Self, ChainError> {
        serde_cbor::to_vec(value)
            .map(Self::Literal)
            .map_err(|err| ChainError::Transport(format!("cbor encode: {err}")))
    }

    pub fn workspace(key: &[u8]) -> Self {
        Self::Workspace(key.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TariInstruction {
    CallMethod {
        component_address: String,
        method: String,
        args: Vec<TariArg>,
    },
    CallFunction {
        template_address: String,
        function: String,
        args: Vec<TariArg>,
    },
    PutLastInstructionOutputOnWorkspace {
        key: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariTransaction {
    pub instructions: Vec<TariInstruction>,
    /// Component addresses the transaction reads or writes.
    pub inputs: Vec<String>,
    pub new_outputs: u8,
    pub is_dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariTransactionResult {
    pub transaction_id: String,
    /// One decoded value per instruction.
    #[serde(default)]
    pub execution_results: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariAccount {
    pub public_key: String,
    pub component_address: String,
}

/// Wallet daemon access used by [`TariHtlcAdapter`] and the index registry.
#[async_trait]
pub trait TariWallet: Send + Sync {
    /// `WalletUnavailable` when the daemon has no default account.
    async fn default_account(&self) -> Result<TariAccount, ChainError>;
    /// Account component owned by `public_key`.
    async fn account_address(&self, public_key: &str) -> Result<String, ChainError>;
    /// Submits and waits for the finalized result (dry runs return at once).
    async fn submit(&self, tx: TariTransaction) -> Result<TariTransactionResult, ChainError>;
    async fn current_epoch(&self) -> Result<u64, ChainError>;
}

#[async_trait]
impl<T: TariWallet + ?Sized> TariWallet for Arc<T> {
    async fn default_account(&self) -> Result<TariAccount, ChainError> {
        (**self).default_account().await
    }

    async fn account_address(&self, public_key: &str) -> Result<String, ChainError> {
        (**self).account_address(public_key).await
    }

    async fn submit(&self, tx: TariTransaction) -> Result<TariTransactionResult, ChainError> {
        (**self).submit(tx).await
    }

    async fn current_epoch(&self) -> Result<u64, ChainError> {
        (**self).current_epoch().await
    }
}

pub struct TariHtlcAdapter<W> {
    wallet: W,
    swap_template: String,
    resource: String,
    epoch_duration: Duration,
}

impl<W: TariWallet> TariHtlcAdapter<W> {
    pub fn new(wallet: W, swap_template: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            wallet,
            swap_template: swap_template.into(),
            resource: resource.into(),
            epoch_duration: DEFAULT_EPOCH_DURATION,
        }
    }

    /// Zero durations are ignored.
    pub fn with_epoch_duration(mut self, epoch_duration: Duration) -> Self {
        if !epoch_duration.is_zero() {
            self.epoch_duration = epoch_duration;
        }
        self
    }

    /// Whole epochs covering `duration`, rounded up.
    pub fn epochs_for(&self, duration: Duration) -> u64 {
        let epoch = self.epoch_duration.as_millis().max(1);
        let epochs = duration.as_millis().div_ceil(epoch);
        u64::try_from(epochs).unwrap_or(u64::MAX)
    }

    /// Calls `method` on the lock and deposits the returned bucket into the
    /// wallet account.
    async fn claim_into_account(
        &self,
        lock_id: &LockId,
        method: &str,
        args: Vec<TariArg>,
        wrap: fn(String) -> ChainError,
    ) -> Result<Receipt, ChainError> {
        let account = self.wallet.default_account().await?;
        let tx = TariTransaction {
            instructions: vec![
                TariInstruction::CallMethod {
                    component_address: lock_id.as_str().to_string(),
                    method: method.to_string(),
                    args,
                },
                TariInstruction::PutLastInstructionOutputOnWorkspace {
                    key: BUCKET.to_vec(),
                },
                TariInstruction::CallMethod {
                    component_address: account.component_address.clone(),
                    method: "deposit".to_string(),
                    args: vec![TariArg::workspace(BUCKET)],
                },
            ],
            inputs: vec![lock_id.as_str().to_string(), account.component_address],
            new_outputs: 0,
            is_dry_run: false,
        };
        let result = self
            .wallet
            .submit(tx)
            .await
            .map_err(|err| classify(err, wrap))?;
        info!(%lock_id, method, tx = %result.transaction_id, "tari lock claimed");
        Ok(Receipt {
            chain: Chain::Tari,
            tx_id: result.transaction_id,
        })
    }
}

#[async_trait]
impl<W: TariWallet> ChainAdapter for TariHtlcAdapter<W> {
    fn chain(&self) -> Chain {
        Chain::Tari
    }

    async fn get_client_address(&self) -> Result<Address, ChainError> {
        let account = self.wallet.default_account().await?;
        Ok(Address::new(account.public_key))
    }

    async fn lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockId, ChainError> {
        let value = i64::try_from(amount.amount)
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| {
                ChainError::LockFailed(format!("amount {} out of range", amount.amount))
            })?;
        let account = self.wallet.default_account().await?;
        let receiver_account = self
            .wallet
            .account_address(counterparty.as_str())
            .await
            .map_err(|err| classify(err, ChainError::LockFailed))?;

        let tx = TariTransaction {
            instructions: vec![
                TariInstruction::CallMethod {
                    component_address: account.component_address.clone(),
                    method: "withdraw".to_string(),
                    args: vec![TariArg::literal(&self.resource)?, TariArg::literal(&value)?],
                },
                TariInstruction::PutLastInstructionOutputOnWorkspace {
                    key: BUCKET.to_vec(),
                },
                TariInstruction::CallFunction {
                    template_address: self.swap_template.clone(),
                    function: "create".to_string(),
                    args: vec![
                        TariArg::workspace(BUCKET),
                        TariArg::literal(&account.public_key)?,
                        TariArg::literal(&counterparty.as_str())?,
                        TariArg::literal(hashlock)?,
                        TariArg::literal(&expiry)?,
                    ],
                },
            ],
            inputs: vec![account.component_address, receiver_account],
            // the swap component and its vault
            new_outputs: 2,
            is_dry_run: false,
        };
        debug!(receiver = %counterparty, %hashlock, expiry, "submitting swap template create");

        let result = self
            .wallet
            .submit(tx)
            .await
            .map_err(|err| classify(err, ChainError::LockFailed))?;
        let component = result
            .execution_results
            .get(2)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ChainError::LockFailed(format!(
                    "transaction {} returned no component address",
                    result.transaction_id
                ))
            })?;
        info!(lock_id = component, tx = %result.transaction_id, "tari lock created");
        Ok(LockId::new(component))
    }

    async fn withdraw(&self, lock_id: &LockId, preimage: &Preimage) -> Result<Receipt, ChainError> {
        let args = vec![TariArg::literal(preimage)?];
        self.claim_into_account(lock_id, "withdraw", args, ChainError::WithdrawFailed)
            .await
    }

    async fn refund(&self, lock_id: &LockId) -> Result<Receipt, ChainError> {
        self.claim_into_account(lock_id, "refund", Vec::new(), ChainError::RefundFailed)
            .await
    }

    async fn lock_details(&self, _lock_id: &LockId) -> Result<LockLookup<LockDetails>, ChainError> {
        Ok(LockLookup::Unsupported)
    }

    /// Tari timelocks count epochs, not seconds.
    async fn block_timestamp(&self) -> Result<u64, ChainError> {
        self.wallet.current_epoch().await
    }

    async fn expiry_after(&self, duration: Duration) -> Result<u64, ChainError> {
        let epoch = self.wallet.current_epoch().await?;
        Ok(epoch.saturating_add(self.epochs_for(duration)))
    }

    /// The swap template refunds only once the current epoch is past the
    /// timelock.
    fn refund_available(&self, expiry: u64, now: u64) -> bool {
        now > expiry
    }
}
