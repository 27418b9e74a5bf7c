//! Liquidity provider double that settles against simulated ledgers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::RngCore;
use swap_coordinator::crypto::verify;
use swap_coordinator::{
    Address, Chain, Hashlock, LockId, Position, Preimage, ProviderClient, ProviderError,
    SwapAccepted, SwapRequest,
};
use tracing::{info, warn};

use crate::ledger::{HtlcStatus, SimulatedLedger};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderBehavior {
    #[default]
    Honest,
    /// Refuses every `request_swap`.
    RejectSwaps,
    /// Accepts swaps but refuses to lock its side.
    DeclineLock,
    /// Never answers `request_lock_funds`.
    Stall,
}

#[derive(Debug, Clone)]
struct ProviderSwap {
    client_address: Address,
    hashlock: Hashlock,
    position: Position,
    source: Chain,
    destination: Chain,
    source_lock: Option<LockId>,
    destination_lock: Option<LockId>,
}

#[derive(Clone)]
struct Account {
    ledger: Arc<SimulatedLedger>,
    address: Address,
}

pub struct SimulatedProvider {
    accounts: HashMap<Chain, Account>,
    behavior: ProviderBehavior,
    swaps: Mutex<HashMap<String, ProviderSwap>>,
}

fn rejected(reason: impl Into<String>) -> ProviderError {
    ProviderError::Rejected {
        reason: reason.into(),
    }
}

impl SimulatedProvider {
    pub fn new(behavior: ProviderBehavior) -> Self {
        Self {
            accounts: HashMap::new(),
            behavior,
            swaps: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the provider's account on a ledger.
    pub fn with_account(mut self, ledger: Arc<SimulatedLedger>, address: Address) -> Self {
        self.accounts
            .insert(ledger.chain(), Account { ledger, address });
        self
    }

    fn swaps(&self) -> Result<MutexGuard<'_, HashMap<String, ProviderSwap>>, ProviderError> {
        self.swaps
            .lock()
            .map_err(|_| ProviderError::Transport("provider state poisoned".into()))
    }

    fn swap(&self, swap_id: &str) -> Result<ProviderSwap, ProviderError> {
        self.swaps()?
            .get(swap_id)
            .cloned()
            .ok_or_else(|| rejected(format!("unknown swap {swap_id}")))
    }

    fn account(&self, chain: Chain) -> Result<&Account, ProviderError> {
        self.accounts
            .get(&chain)
            .ok_or_else(|| rejected(format!("no liquidity on {chain}")))
    }

    /// Claims the source lock with a secret read from the destination
    /// ledger. Returns whether anything was claimed.
    pub fn claim_from_chain(&self, swap_id: &str) -> Result<bool> {
        let swap = self.swap(swap_id)?;
        let (Some(source_lock), Some(destination_lock)) = (&swap.source_lock, &swap.destination_lock)
        else {
            return Ok(false);
        };
        let destination = self.account(swap.destination)?;
        let Some(secret) = destination.ledger.revealed_secret(destination_lock.as_str())? else {
            return Ok(false);
        };
        let source = self.account(swap.source)?;
        match source.ledger.get(source_lock.as_str())? {
            Some(record) if record.status == HtlcStatus::Locked => {}
            _ => return Ok(false),
        }
        source
            .ledger
            .withdraw(source_lock.as_str(), &source.address, &secret)
            .map_err(|err| anyhow!("claim {source_lock}: {err:#}"))?;
        info!(swap_id, %source_lock, "provider claimed source lock from chain");
        Ok(true)
    }

    fn mirror_lock(&self, swap: &ProviderSwap, source_lock: &LockId) -> Result<LockId, ProviderError> {
        let source = self.account(swap.source)?;
        let destination = self.account(swap.destination)?;
        let record = source
            .ledger
            .get(source_lock.as_str())
            .map_err(|err| ProviderError::Transport(err.to_string()))?
            .ok_or_else(|| rejected(format!("source lock {source_lock} not found")))?;

        if record.status != HtlcStatus::Locked {
            return Err(rejected(format!("source lock {source_lock} already settled")));
        }
        if !record.receiver.matches(&source.address) {
            return Err(rejected(format!("source lock pays {}", record.receiver)));
        }
        if record.amount < swap.position.provided_token_balance {
            return Err(rejected(format!(
                "source lock holds {}, expected {}",
                record.amount, swap.position.provided_token_balance
            )));
        }
        if record.hashlock != swap.hashlock.to_string() {
            return Err(rejected("source lock hashlock differs from the swap"));
        }

        // The mirrored lock expires halfway through the client's remaining
        // window so the provider can still claim after a late reveal.
        let source_now = source
            .ledger
            .now()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let window = record.expiry.saturating_sub(source_now) / 2;
        if window == 0 {
            return Err(rejected("source lock expires too soon"));
        }
        let destination_now = destination
            .ledger
            .now()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let mirrored = destination
            .ledger
            .lock(
                &destination.address,
                &swap.client_address,
                swap.position.requested_token_balance,
                &record.hashlock,
                destination_now + window,
            )
            .map_err(|err| rejected(format!("{err:#}")))?;
        Ok(LockId::new(mirrored.lock_id))
    }
}

#[async_trait]
impl ProviderClient for SimulatedProvider {
    async fn request_swap(&self, request: &SwapRequest) -> Result<SwapAccepted, ProviderError> {
        if self.behavior == ProviderBehavior::RejectSwaps {
            return Err(rejected("Swap request rejected: provider paused"));
        }
        let position = request.position.clone();
        let source = position
            .provided_token
            .chain()
            .map_err(|err| rejected(err.to_string()))?;
        let destination = position
            .requested_token
            .chain()
            .map_err(|err| rejected(err.to_string()))?;
        let provider_address = self.account(source)?.address.clone();
        self.account(destination)?;

        let mut id = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut id);
        let swap_id = hex::encode(id);
        self.swaps()?.insert(
            swap_id.clone(),
            ProviderSwap {
                client_address: request.client_address.clone(),
                hashlock: request.hashlock,
                position,
                source,
                destination,
                source_lock: None,
                destination_lock: None,
            },
        );
        info!(%swap_id, %source, %destination, "provider accepted swap");
        Ok(SwapAccepted {
            swap_id,
            provider_address,
        })
    }

    async fn request_lock_confirmation(
        &self,
        swap_id: &str,
        source_lock: &LockId,
    ) -> Result<LockId, ProviderError> {
        match self.behavior {
            ProviderBehavior::Stall => {
                warn!(swap_id, "provider stalling on lock request");
                tokio::time::sleep(Duration::from_secs(24 * 3_600)).await;
                return Err(ProviderError::Timeout);
            }
            ProviderBehavior::DeclineLock => {
                return Err(rejected("insufficient liquidity"));
            }
            ProviderBehavior::Honest | ProviderBehavior::RejectSwaps => {}
        }

        let swap = self.swap(swap_id)?;
        if let Some(existing) = &swap.destination_lock {
            return Ok(existing.clone());
        }
        let destination_lock = self.mirror_lock(&swap, source_lock)?;
        if let Some(stored) = self.swaps()?.get_mut(swap_id) {
            stored.source_lock = Some(source_lock.clone());
            stored.destination_lock = Some(destination_lock.clone());
        }
        info!(swap_id, %source_lock, %destination_lock, "provider lock mirrored");
        Ok(destination_lock)
    }

    async fn reveal_preimage(&self, swap_id: &str, preimage: &Preimage) -> Result<(), ProviderError> {
        let swap = self.swap(swap_id)?;
        if !verify(preimage, &swap.hashlock) {
            return Err(rejected("preimage does not match the swap hashlock"));
        }
        let source_lock = swap
            .source_lock
            .ok_or_else(|| rejected(format!("swap {swap_id} has no source lock")))?;
        let source = self.account(swap.source)?;
        source
            .ledger
            .withdraw(source_lock.as_str(), &source.address, &preimage.to_hex())
            .map_err(|err| rejected(format!("{err:#}")))?;
        info!(swap_id, %source_lock, "provider claimed source lock");
        Ok(())
    }
}
