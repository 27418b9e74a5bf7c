use std::sync::Arc;

use async_trait::async_trait;
use swap_coordinator::{
    Address, Chain, ChainAdapter, ChainError, Hashlock, LockDetails, LockId, LockLookup, Preimage,
    Receipt, TokenAmount,
};

use crate::ledger::{HtlcStatus, SimulatedLedger};

/// Client wallet on a simulated ledger.
pub struct SimulatedChain {
    ledger: Arc<SimulatedLedger>,
    wallet: Option<Address>,
}

impl SimulatedChain {
    pub fn new(ledger: Arc<SimulatedLedger>, wallet: Address) -> Self {
        Self {
            ledger,
            wallet: Some(wallet),
        }
    }

    /// A chain with no wallet session open.
    pub fn without_wallet(ledger: Arc<SimulatedLedger>) -> Self {
        Self {
            ledger,
            wallet: None,
        }
    }

    pub fn ledger(&self) -> &Arc<SimulatedLedger> {
        &self.ledger
    }

    fn wallet(&self) -> Result<&Address, ChainError> {
        self.wallet
            .as_ref()
            .ok_or(ChainError::WalletUnavailable(self.ledger.chain()))
    }
}

fn transport(err: anyhow::Error) -> ChainError {
    ChainError::Transport(format!("{err:#}"))
}

#[async_trait]
impl ChainAdapter for SimulatedChain {
    fn chain(&self) -> Chain {
        self.ledger.chain()
    }

    async fn get_client_address(&self) -> Result<Address, ChainError> {
        self.wallet().cloned()
    }

    async fn lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockId, ChainError> {
        let sender = self.wallet()?;
        let record = self
            .ledger
            .lock(sender, counterparty, amount.amount, &hashlock.to_string(), expiry)
            .map_err(|err| ChainError::LockFailed(format!("{err:#}")))?;
        Ok(LockId::new(record.lock_id))
    }

    async fn withdraw(&self, lock_id: &LockId, preimage: &Preimage) -> Result<Receipt, ChainError> {
        let caller = self.wallet()?;
        let record = self
            .ledger
            .withdraw(lock_id.as_str(), caller, &preimage.to_hex())
            .map_err(|err| ChainError::WithdrawFailed(format!("{err:#}")))?;
        match record.status {
            HtlcStatus::Withdrawn { tx_id, .. } => Ok(Receipt {
                chain: self.chain(),
                tx_id,
            }),
            other => Err(ChainError::WithdrawFailed(format!(
                "lock {lock_id} left in state {other:?}"
            ))),
        }
    }

    async fn refund(&self, lock_id: &LockId) -> Result<Receipt, ChainError> {
        let caller = self.wallet()?;
        let record = self
            .ledger
            .refund(lock_id.as_str(), caller)
            .map_err(|err| ChainError::RefundFailed(format!("{err:#}")))?;
        match record.status {
            HtlcStatus::Refunded { tx_id } => Ok(Receipt {
                chain: self.chain(),
                tx_id,
            }),
            other => Err(ChainError::RefundFailed(format!(
                "lock {lock_id} left in state {other:?}"
            ))),
        }
    }

    async fn lock_details(&self, lock_id: &LockId) -> Result<LockLookup<LockDetails>, ChainError> {
        let Some(record) = self.ledger.get(lock_id.as_str()).map_err(transport)? else {
            return Ok(LockLookup::Missing);
        };
        let hashlock = Hashlock::from_hex(&record.hashlock)
            .map_err(|err| ChainError::Transport(err.to_string()))?;
        Ok(LockLookup::Found(LockDetails {
            receiver: record.receiver,
            amount: record.amount,
            hashlock,
            expiry: record.expiry,
            claimable: record.status == HtlcStatus::Locked,
        }))
    }

    async fn find_lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockLookup<LockId>, ChainError> {
        let sender = self.wallet()?;
        let found = self
            .ledger
            .find(sender, counterparty, amount.amount, &hashlock.to_string(), expiry)
            .map_err(transport)?;
        Ok(match found {
            Some(record) => LockLookup::Found(LockId::new(record.lock_id)),
            None => LockLookup::Missing,
        })
    }

    async fn block_timestamp(&self) -> Result<u64, ChainError> {
        self.ledger.now().map_err(transport)
    }
}
