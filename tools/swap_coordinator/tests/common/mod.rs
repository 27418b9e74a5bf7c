#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use swap_coordinator::{
    select_best, Address, Chain, ChainAdapter, ChainAdapters, ChainError, CoordinatorConfig,
    Hashlock, LockDetails, LockId, LockLookup, Position, Preimage, ProviderClient, ProviderError,
    ProviderRecord, Quote, QuoteRequest, Receipt, SwapAccepted, SwapCoordinator, SwapRequest,
    TokenAmount,
};

pub const CLIENT_TARI: &str = "client_tari_pk";
pub const CLIENT_EVM: &str = "0x00000000000000000000000000000000000000c1";
pub const PROVIDER_EVM: &str = "0x00000000000000000000000000000000000000f1";
pub const PROVIDER_LOCK: &str = "component_provider_lock";

#[derive(Debug, Clone, PartialEq)]
pub enum ChainCall {
    ClientAddress,
    Lock {
        counterparty: String,
        amount: u128,
        hashlock: Hashlock,
        expiry: u64,
    },
    Withdraw {
        lock_id: String,
        preimage: [u8; 32],
    },
    Refund {
        lock_id: String,
    },
    LockDetails {
        lock_id: String,
    },
    FindLock {
        expiry: u64,
    },
}

impl ChainCall {
    pub fn is_withdraw(&self) -> bool {
        matches!(self, Self::Withdraw { .. })
    }
}

/// Lock the mock chain holds, keyed by its creation terms.
#[derive(Debug, Clone)]
struct LandedLock {
    lock_id: LockId,
    counterparty: Address,
    amount: u128,
    hashlock: Hashlock,
    expiry: u64,
}

/// Chain adapter that records calls and answers from canned outcomes.
///
/// By default it cannot be queried: unreported locks look up as
/// `Unsupported`. A `searchable` chain answers `Missing` for them and finds
/// the locks it holds by their terms.
pub struct MockChain {
    chain: Chain,
    address: Option<Address>,
    clock: AtomicU64,
    calls: Mutex<Vec<ChainCall>>,
    /// Failure returned by the next `lock`, and whether the lock landed anyway.
    lock_failures: Mutex<Vec<(ChainError, bool)>>,
    withdraw_failures: Mutex<Vec<ChainError>>,
    details: Mutex<HashMap<String, LockDetails>>,
    landed: Mutex<Vec<LandedLock>>,
    searchable: bool,
    /// Clock ticks per epoch of this length; `None` counts seconds.
    epoch_secs: Option<u64>,
    /// Refunds open only after the expiry tick.
    strict_timelock: bool,
}

impl MockChain {
    pub fn new(chain: Chain, address: &str) -> Self {
        Self {
            chain,
            address: Some(Address::new(address)),
            clock: AtomicU64::new(1_000),
            calls: Mutex::new(Vec::new()),
            lock_failures: Mutex::new(Vec::new()),
            withdraw_failures: Mutex::new(Vec::new()),
            details: Mutex::new(HashMap::new()),
            landed: Mutex::new(Vec::new()),
            searchable: false,
            epoch_secs: None,
            strict_timelock: false,
        }
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// A clock counting epochs of `secs` seconds, refundable only once the
    /// epoch is past the timelock.
    pub fn with_epochs(mut self, secs: u64) -> Self {
        self.epoch_secs = Some(secs);
        self.strict_timelock = true;
        self
    }

    pub fn without_wallet(chain: Chain) -> Self {
        Self {
            address: None,
            ..Self::new(chain, "")
        }
    }

    pub fn set_time(&self, now: u64) {
        self.clock.store(now, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    pub fn fail_next_lock(&self, err: ChainError) {
        self.lock_failures.lock().unwrap().push((err, false));
    }

    /// The next `lock` lands on chain but reports `err` to the caller.
    pub fn land_next_lock_with_error(&self, err: ChainError) {
        self.lock_failures.lock().unwrap().push((err, true));
    }

    pub fn landed_locks(&self) -> Vec<LockId> {
        self.landed
            .lock()
            .unwrap()
            .iter()
            .map(|lock| lock.lock_id.clone())
            .collect()
    }

    pub fn fail_next_withdraw(&self, err: ChainError) {
        self.withdraw_failures.lock().unwrap().push(err);
    }

    pub fn report_lock(&self, lock_id: &str, details: LockDetails) {
        self.details
            .lock()
            .unwrap()
            .insert(lock_id.to_string(), details);
    }

    pub fn calls(&self) -> Vec<ChainCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ChainCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChainAdapter for MockChain {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn get_client_address(&self) -> Result<Address, ChainError> {
        self.record(ChainCall::ClientAddress);
        self.address
            .clone()
            .ok_or(ChainError::WalletUnavailable(self.chain))
    }

    async fn lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockId, ChainError> {
        self.record(ChainCall::Lock {
            counterparty: counterparty.to_string(),
            amount: amount.amount,
            hashlock: *hashlock,
            expiry,
        });
        let failure = self.lock_failures.lock().unwrap().pop();
        if let Some((err, false)) = failure {
            return Err(err);
        }
        let mut landed = self.landed.lock().unwrap();
        let lock_id = match landed.len() {
            0 => LockId::new(format!("{}-lock", self.chain)),
            n => LockId::new(format!("{}-lock-{n}", self.chain)),
        };
        landed.push(LandedLock {
            lock_id: lock_id.clone(),
            counterparty: counterparty.clone(),
            amount: amount.amount,
            hashlock: *hashlock,
            expiry,
        });
        match failure {
            Some((err, _)) => Err(err),
            None => Ok(lock_id),
        }
    }

    async fn withdraw(&self, lock_id: &LockId, preimage: &Preimage) -> Result<Receipt, ChainError> {
        self.record(ChainCall::Withdraw {
            lock_id: lock_id.to_string(),
            preimage: *preimage.as_bytes(),
        });
        if let Some(err) = self.withdraw_failures.lock().unwrap().pop() {
            return Err(err);
        }
        Ok(Receipt {
            chain: self.chain,
            tx_id: format!("withdraw-{lock_id}"),
        })
    }

    async fn refund(&self, lock_id: &LockId) -> Result<Receipt, ChainError> {
        self.record(ChainCall::Refund {
            lock_id: lock_id.to_string(),
        });
        Ok(Receipt {
            chain: self.chain,
            tx_id: format!("refund-{lock_id}"),
        })
    }

    async fn lock_details(&self, lock_id: &LockId) -> Result<LockLookup<LockDetails>, ChainError> {
        self.record(ChainCall::LockDetails {
            lock_id: lock_id.to_string(),
        });
        Ok(match self.details.lock().unwrap().get(lock_id.as_str()) {
            Some(details) => LockLookup::Found(details.clone()),
            None if self.searchable => LockLookup::Missing,
            None => LockLookup::Unsupported,
        })
    }

    async fn find_lock(
        &self,
        counterparty: &Address,
        amount: &TokenAmount,
        hashlock: &Hashlock,
        expiry: u64,
    ) -> Result<LockLookup<LockId>, ChainError> {
        self.record(ChainCall::FindLock { expiry });
        if !self.searchable {
            return Ok(LockLookup::Unsupported);
        }
        let landed = self.landed.lock().unwrap();
        Ok(landed
            .iter()
            .find(|lock| {
                lock.counterparty.matches(counterparty)
                    && lock.amount == amount.amount
                    && lock.hashlock == *hashlock
                    && lock.expiry == expiry
            })
            .map(|lock| LockLookup::Found(lock.lock_id.clone()))
            .unwrap_or(LockLookup::Missing))
    }

    async fn block_timestamp(&self) -> Result<u64, ChainError> {
        Ok(self.now())
    }

    async fn expiry_after(&self, duration: Duration) -> Result<u64, ChainError> {
        let ticks = match self.epoch_secs {
            Some(secs) => duration.as_secs().div_ceil(secs),
            None => duration.as_secs(),
        };
        Ok(self.now() + ticks)
    }

    fn refund_available(&self, expiry: u64, now: u64) -> bool {
        if self.strict_timelock {
            now > expiry
        } else {
            now >= expiry
        }
    }
}

#[derive(Debug, Clone)]
pub enum SwapReply {
    Accept,
    Reject(String),
    Transport,
}

#[derive(Debug, Clone)]
pub enum ConfirmReply {
    Confirm,
    Reject(String),
    Stall,
}

/// Provider double that records what it was sent.
pub struct MockProvider {
    swap_replies: Mutex<Vec<SwapReply>>,
    confirm_reply: Mutex<ConfirmReply>,
    reveal_fails: bool,
    pub swap_requests: Mutex<Vec<SwapRequest>>,
    pub confirmations: Mutex<Vec<(String, String)>>,
    pub reveals: Mutex<Vec<(String, [u8; 32])>>,
}

impl MockProvider {
    pub fn accepting() -> Self {
        Self::with_replies(vec![SwapReply::Accept], ConfirmReply::Confirm)
    }

    /// `swap_replies` are served in order; the last one repeats.
    pub fn with_replies(swap_replies: Vec<SwapReply>, confirm: ConfirmReply) -> Self {
        let mut swap_replies = swap_replies;
        swap_replies.reverse();
        Self {
            swap_replies: Mutex::new(swap_replies),
            confirm_reply: Mutex::new(confirm),
            reveal_fails: false,
            swap_requests: Mutex::new(Vec::new()),
            confirmations: Mutex::new(Vec::new()),
            reveals: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_reveal(mut self) -> Self {
        self.reveal_fails = true;
        self
    }

    pub fn set_confirm_reply(&self, reply: ConfirmReply) {
        *self.confirm_reply.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> Vec<SwapRequest> {
        self.swap_requests.lock().unwrap().clone()
    }

    fn next_swap_reply(&self) -> SwapReply {
        let mut replies = self.swap_replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop().unwrap()
        } else {
            replies.last().cloned().unwrap_or(SwapReply::Accept)
        }
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn request_swap(&self, request: &SwapRequest) -> Result<SwapAccepted, ProviderError> {
        self.swap_requests.lock().unwrap().push(request.clone());
        match self.next_swap_reply() {
            SwapReply::Accept => Ok(SwapAccepted {
                swap_id: "swap-1".to_string(),
                provider_address: Address::new(PROVIDER_EVM),
            }),
            SwapReply::Reject(reason) => Err(ProviderError::Rejected { reason }),
            SwapReply::Transport => Err(ProviderError::Transport("connection refused".into())),
        }
    }

    async fn request_lock_confirmation(
        &self,
        swap_id: &str,
        source_lock: &LockId,
    ) -> Result<LockId, ProviderError> {
        self.confirmations
            .lock()
            .unwrap()
            .push((swap_id.to_string(), source_lock.to_string()));
        let reply = self.confirm_reply.lock().unwrap().clone();
        match reply {
            ConfirmReply::Confirm => Ok(LockId::new(PROVIDER_LOCK)),
            ConfirmReply::Reject(reason) => Err(ProviderError::Rejected { reason }),
            ConfirmReply::Stall => {
                tokio::time::sleep(Duration::from_secs(24 * 3_600)).await;
                Err(ProviderError::Timeout)
            }
        }
    }

    async fn reveal_preimage(&self, swap_id: &str, preimage: &Preimage) -> Result<(), ProviderError> {
        self.reveals
            .lock()
            .unwrap()
            .push((swap_id.to_string(), *preimage.as_bytes()));
        if self.reveal_fails {
            Err(ProviderError::Transport("provider offline".into()))
        } else {
            Ok(())
        }
    }
}

/// Client gives 10 wei and receives 100 tari.
pub fn eth_to_tari_quote() -> Quote {
    let providers = vec![ProviderRecord {
        network_address: "http://provider.test".to_string(),
        public_key: "provider_pk".to_string(),
        positions: vec![Position {
            provided_token: "tari".into(),
            provided_token_balance: 1_000,
            requested_token: "eth.wei".into(),
            requested_token_balance: 100,
        }],
    }];
    let request = QuoteRequest {
        provided_token: "eth.wei".into(),
        provided_amount: 10,
        requested_token: "tari".into(),
    };
    select_best(&request, &providers).expect("provider matches")
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        lock_duration: Duration::from_secs(3_600),
        expected_round_trip: Duration::from_secs(900),
        confirmation_timeout: Duration::from_secs(5),
        ..CoordinatorConfig::default()
    }
}

pub struct Harness {
    pub source: Arc<MockChain>,
    pub destination: Arc<MockChain>,
    pub provider: Arc<MockProvider>,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self {
            source: Arc::new(MockChain::new(Chain::Evm, CLIENT_EVM)),
            destination: Arc::new(MockChain::new(Chain::Tari, CLIENT_TARI)),
            provider: Arc::new(provider),
        }
    }

    pub fn with_source(mut self, source: MockChain) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn with_destination(mut self, destination: MockChain) -> Self {
        self.destination = Arc::new(destination);
        self
    }

    pub fn adapters(&self) -> ChainAdapters {
        ChainAdapters::new()
            .with(self.source.clone())
            .with(self.destination.clone())
    }

    pub fn coordinator(&self) -> SwapCoordinator<Arc<MockProvider>> {
        SwapCoordinator::new(
            &eth_to_tari_quote(),
            &self.adapters(),
            self.provider.clone(),
            test_config(),
        )
        .expect("coordinator")
    }

    /// Chain calls that move funds or reveal the secret.
    pub fn chain_effects(&self) -> Vec<ChainCall> {
        self.source
            .calls()
            .into_iter()
            .chain(self.destination.calls())
            .filter(|call| {
                matches!(
                    call,
                    ChainCall::Lock { .. } | ChainCall::Withdraw { .. } | ChainCall::Refund { .. }
                )
            })
            .collect()
    }
}
