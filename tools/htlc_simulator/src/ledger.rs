//! In-memory HTLC ledger for one simulated chain.
//!
//! Balances are debited on lock and credited on withdraw or refund, so a
//! finished swap can be checked by looking at balances alone.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use swap_coordinator::{Address, Chain};
use tracing::{debug, info};

use crate::claim::verify_hashlock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HtlcStatus {
    Locked,
    Withdrawn { secret: String, tx_id: String },
    Refunded { tx_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtlcRecord {
    pub lock_id: String,
    pub sender: Address,
    pub receiver: Address,
    pub amount: u128,
    pub hashlock: String,
    pub expiry: u64,
    pub locked_at: u64,
    #[serde(flatten)]
    pub status: HtlcStatus,
}

#[derive(Debug, Default)]
struct LedgerState {
    now: u64,
    next_lock: u64,
    balances: HashMap<String, u128>,
    locks: Vec<HtlcRecord>,
}

impl LedgerState {
    fn balance_mut(&mut self, address: &Address) -> &mut u128 {
        self.balances
            .entry(address.as_str().to_ascii_lowercase())
            .or_default()
    }

    fn record_mut(&mut self, lock_id: &str) -> Result<&mut HtlcRecord> {
        self.locks
            .iter_mut()
            .find(|lock| lock.lock_id == lock_id)
            .ok_or_else(|| anyhow!("lock not found: {lock_id}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub chain: Chain,
    pub now: u64,
    pub balances: HashMap<String, u128>,
    pub locks: Vec<HtlcRecord>,
}

pub struct SimulatedLedger {
    chain: Chain,
    state: Mutex<LedgerState>,
}

impl SimulatedLedger {
    pub fn new(chain: Chain, now: u64) -> Self {
        Self {
            chain,
            state: Mutex::new(LedgerState {
                now,
                ..LedgerState::default()
            }),
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("{} ledger state poisoned", self.chain))
    }

    pub fn fund(&self, address: &Address, amount: u128) -> Result<()> {
        let mut state = self.state()?;
        let balance = state.balance_mut(address);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| anyhow!("balance overflow for {address}"))?;
        Ok(())
    }

    pub fn balance(&self, address: &Address) -> Result<u128> {
        let state = self.state()?;
        Ok(state
            .balances
            .get(&address.as_str().to_ascii_lowercase())
            .copied()
            .unwrap_or_default())
    }

    pub fn now(&self) -> Result<u64> {
        Ok(self.state()?.now)
    }

    pub fn advance_clock(&self, seconds: u64) -> Result<u64> {
        let mut state = self.state()?;
        state.now = state.now.saturating_add(seconds);
        debug!(chain = %self.chain, now = state.now, "clock advanced");
        Ok(state.now)
    }

    pub fn lock(
        &self,
        sender: &Address,
        receiver: &Address,
        amount: u128,
        hashlock_hex: &str,
        expiry: u64,
    ) -> Result<HtlcRecord> {
        if amount == 0 {
            bail!("lock amount must be positive");
        }
        let mut state = self.state()?;
        if expiry <= state.now {
            bail!("expiry {expiry} is not after chain time {}", state.now);
        }
        let balance = state.balance_mut(sender);
        *balance = balance
            .checked_sub(amount)
            .ok_or_else(|| anyhow!("insufficient funds: {sender} cannot lock {amount}"))?;

        state.next_lock += 1;
        let record = HtlcRecord {
            lock_id: format!("{}-htlc-{}", self.chain, state.next_lock),
            sender: sender.clone(),
            receiver: receiver.clone(),
            amount,
            hashlock: hashlock_hex.trim().to_ascii_lowercase(),
            expiry,
            locked_at: state.now,
            status: HtlcStatus::Locked,
        };
        state.locks.push(record.clone());
        info!(chain = %self.chain, lock_id = %record.lock_id, amount, expiry, "htlc locked");
        Ok(record)
    }

    /// Receiver claims with the secret before expiry.
    pub fn withdraw(&self, lock_id: &str, caller: &Address, secret_hex: &str) -> Result<HtlcRecord> {
        let mut state = self.state()?;
        let now = state.now;
        let record = state.record_mut(lock_id)?;
        if record.status != HtlcStatus::Locked {
            bail!("lock {lock_id} already settled");
        }
        if !record.receiver.matches(caller) {
            bail!("{caller} is not the receiver of {lock_id}");
        }
        if now >= record.expiry {
            bail!("lock {lock_id} expired at {}", record.expiry);
        }
        if !verify_hashlock(secret_hex, &record.hashlock)? {
            bail!("hashlock mismatch: invalid secret");
        }
        record.status = HtlcStatus::Withdrawn {
            secret: secret_hex.trim().to_ascii_lowercase(),
            tx_id: random_txid(),
        };
        let (receiver, amount, updated) = (record.receiver.clone(), record.amount, record.clone());
        *state.balance_mut(&receiver) += amount;
        info!(chain = %self.chain, lock_id, "htlc withdrawn");
        Ok(updated)
    }

    /// Sender reclaims after expiry.
    pub fn refund(&self, lock_id: &str, caller: &Address) -> Result<HtlcRecord> {
        let mut state = self.state()?;
        let now = state.now;
        let record = state.record_mut(lock_id)?;
        if record.status != HtlcStatus::Locked {
            bail!("lock {lock_id} already settled");
        }
        if !record.sender.matches(caller) {
            bail!("{caller} is not the sender of {lock_id}");
        }
        if now < record.expiry {
            bail!("lock {lock_id} refundable from {}, chain time {now}", record.expiry);
        }
        record.status = HtlcStatus::Refunded {
            tx_id: random_txid(),
        };
        let (sender, amount, updated) = (record.sender.clone(), record.amount, record.clone());
        *state.balance_mut(&sender) += amount;
        info!(chain = %self.chain, lock_id, "htlc refunded");
        Ok(updated)
    }

    pub fn get(&self, lock_id: &str) -> Result<Option<HtlcRecord>> {
        let state = self.state()?;
        Ok(state.locks.iter().find(|lock| lock.lock_id == lock_id).cloned())
    }

    /// Lock created by `sender` with exactly these terms.
    pub fn find(
        &self,
        sender: &Address,
        receiver: &Address,
        amount: u128,
        hashlock: &str,
        expiry: u64,
    ) -> Result<Option<HtlcRecord>> {
        let state = self.state()?;
        Ok(state
            .locks
            .iter()
            .find(|lock| {
                lock.sender.matches(sender)
                    && lock.receiver.matches(receiver)
                    && lock.amount == amount
                    && lock.hashlock.eq_ignore_ascii_case(hashlock)
                    && lock.expiry == expiry
            })
            .cloned())
    }

    /// Secret published by a withdrawal of `lock_id`, if any.
    pub fn revealed_secret(&self, lock_id: &str) -> Result<Option<String>> {
        Ok(self.get(lock_id)?.and_then(|record| match record.status {
            HtlcStatus::Withdrawn { secret, .. } => Some(secret),
            _ => None,
        }))
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        let state = self.state()?;
        Ok(LedgerSnapshot {
            chain: self.chain,
            now: state.now,
            balances: state.balances.clone(),
            locks: state.locks.clone(),
        })
    }
}

fn random_txid() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
