//! Swap state machine driver.
//!
//! One [`SwapCoordinator`] owns one [`SwapSession`] and moves it through
//! `Quoted -> Initiated -> SourceLocked -> ProviderLockConfirmed ->
//! DestinationWithdrawn -> Completed`. Every operation checks the current
//! state before touching a chain or the provider.

use std::time::Instant;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::chain::{ChainAdapters, LockDetails, LockId, LockLookup, SessionAdapters};
use crate::config::CoordinatorConfig;
use crate::crypto::{self, HashCommitment};
use crate::metrics::{NoopMetrics, SwapMetrics};
use crate::provider::{ProviderClient, SwapRequest};
use crate::quote::Quote;
use crate::state::{SwapSession, SwapState};
use crate::types::{ChainError, ProviderError, Result, SwapError};

pub struct SwapCoordinator<P, M = NoopMetrics> {
    session: SwapSession,
    adapters: SessionAdapters,
    provider: P,
    config: CoordinatorConfig,
    metrics: M,
}

impl<P: ProviderClient> SwapCoordinator<P> {
    /// Starts a session for `quote`. Chain adapters are resolved here, once.
    pub fn new(
        quote: &Quote,
        chains: &ChainAdapters,
        provider: P,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if quote.provided.amount == 0 {
            return Err(SwapError::ZeroAmount);
        }
        let adapters = chains.resolve(&quote.provided.token, &quote.expected_receive.token)?;
        Ok(Self {
            session: SwapSession::from_quote(quote),
            adapters,
            provider,
            config,
            metrics: NoopMetrics,
        })
    }
}

impl<P: ProviderClient, M: SwapMetrics> SwapCoordinator<P, M> {
    pub fn with_metrics<N: SwapMetrics>(self, metrics: N) -> SwapCoordinator<P, N> {
        SwapCoordinator {
            session: self.session,
            adapters: self.adapters,
            provider: self.provider,
            config: self.config,
            metrics,
        }
    }

    pub fn session(&self) -> &SwapSession {
        &self.session
    }

    pub fn state(&self) -> &SwapState {
        &self.session.state
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Quoted -> Initiated: commits to a secret and asks the provider to
    /// open the swap. A rejection aborts the session.
    ///
    /// Retrying after a transport failure reuses the commitment generated
    /// by the first attempt.
    pub async fn initiate(&mut self) -> Result<()> {
        self.ensure("initiate", matches!(self.session.state, SwapState::Quoted))?;

        if self.session.commitment().is_none() {
            match crypto::generate() {
                Ok(fresh) => self.session.bind_commitment(fresh),
                Err(err) => {
                    self.abort_with(err.to_string());
                    return Err(err);
                }
            }
        }
        let hashlock = self
            .session
            .hashlock()
            .copied()
            .ok_or(SwapError::SessionIncomplete("commitment"))?;

        let client_address = match self.adapters.destination.get_client_address().await {
            Ok(address) => address,
            Err(err @ ChainError::WalletUnavailable(_)) => {
                self.abort_with(err.to_string());
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        self.session.client_address = Some(client_address.clone());

        let request = SwapRequest {
            client_address,
            hashlock,
            position: self.session.proposal(),
        };
        let started = Instant::now();
        let outcome = self.provider.request_swap(&request).await;
        self.metrics.record_latency("request_swap", started.elapsed());

        match outcome {
            Ok(accepted) => {
                info!(
                    swap_id = %accepted.swap_id,
                    provider = %self.session.provider_network_address,
                    "provider accepted swap"
                );
                self.session.swap_id = Some(accepted.swap_id);
                self.session.provider_receiving_address = Some(accepted.provider_address);
                self.transition(SwapState::Initiated);
                Ok(())
            }
            Err(err @ ProviderError::Rejected { .. }) => {
                self.abort_with(err.to_string());
                Err(err.into())
            }
            Err(err) => {
                warn!(error = %err, "request_swap failed; session stays quoted");
                Err(err.into())
            }
        }
    }

    /// Initiated -> SourceLocked: locks the client's funds for the provider
    /// under the session hashlock.
    ///
    /// When an earlier submission ended without a known outcome, the source
    /// chain is searched for that lock first and the same terms are
    /// resubmitted only if the chain reports it missing. Chains that cannot
    /// be searched return [`SwapError::SourceLockUnresolved`] until
    /// [`resolve_pending_lock`](Self::resolve_pending_lock) is called.
    pub async fn lock_source(&mut self) -> Result<()> {
        self.ensure("lock_source", matches!(self.session.state, SwapState::Initiated))?;
        let commitment = self.verified_commitment()?;
        let receiver = self
            .session
            .provider_receiving_address
            .clone()
            .ok_or(SwapError::SessionIncomplete("provider receiving address"))?;

        let expiry = match self.session.pending_lock_expiry {
            Some(expiry) => {
                let lookup = self
                    .adapters
                    .source
                    .find_lock(&receiver, &self.session.from, commitment.hashlock(), expiry)
                    .await?;
                match lookup {
                    LockLookup::Found(lock_id) => {
                        info!(swap_id = self.swap_id_field(), %lock_id, "earlier source lock found on chain");
                        self.source_locked(lock_id, expiry);
                        return Ok(());
                    }
                    LockLookup::Missing => expiry,
                    LockLookup::Unsupported => {
                        return Err(SwapError::SourceLockUnresolved { expiry });
                    }
                }
            }
            None => {
                self.adapters
                    .source
                    .expiry_after(self.config.lock_duration)
                    .await?
            }
        };

        let resubmitting = self.session.pending_lock_expiry.is_some();
        let started = Instant::now();
        let outcome = self
            .adapters
            .source
            .lock(&receiver, &self.session.from, commitment.hashlock(), expiry)
            .await;
        self.metrics.record_latency("lock_source", started.elapsed());

        match outcome {
            Ok(lock_id) => {
                info!(
                    swap_id = self.swap_id_field(),
                    %lock_id,
                    expiry,
                    "source funds locked"
                );
                self.source_locked(lock_id, expiry);
                Ok(())
            }
            // The first submission may have landed since it was looked up.
            Err(err @ ChainError::LockFailed(_)) if resubmitting => {
                warn!(error = %err, expiry, "resubmitted source lock failed; pending lock kept");
                Err(err.into())
            }
            // Nothing left the wallet.
            Err(err @ (ChainError::LockFailed(_) | ChainError::WalletUnavailable(_))) => {
                self.session.pending_lock_expiry = None;
                self.abort_with(format!("source lock failed: {err}"));
                Err(err.into())
            }
            Err(err) => {
                warn!(error = %err, expiry, "source lock outcome unknown; session stays initiated");
                self.session.pending_lock_expiry = Some(expiry);
                Err(err.into())
            }
        }
    }

    /// Settles a source lock submission with an unknown outcome by hand:
    /// `Some` adopts the lock found on chain, `None` records that nothing
    /// was locked so the next `lock_source` starts over.
    pub fn resolve_pending_lock(&mut self, lock_id: Option<LockId>) -> Result<()> {
        self.ensure(
            "resolve_pending_lock",
            matches!(self.session.state, SwapState::Initiated),
        )?;
        let expiry = self
            .session
            .pending_lock_expiry
            .ok_or(SwapError::SessionIncomplete("pending source lock"))?;
        match lock_id {
            Some(lock_id) => {
                info!(swap_id = self.swap_id_field(), %lock_id, expiry, "pending source lock adopted");
                self.source_locked(lock_id, expiry);
            }
            None => {
                info!(swap_id = self.swap_id_field(), expiry, "pending source lock discarded");
                self.session.pending_lock_expiry = None;
            }
        }
        Ok(())
    }

    /// SourceLocked -> ProviderLockConfirmed: waits for the provider's
    /// mirrored lock and checks it on the destination chain when possible.
    ///
    /// A provider rejection aborts the session with the source lock still
    /// in place. Timeouts, transport errors and locks that fail inspection
    /// leave the session `SourceLocked`.
    pub async fn confirm_provider_lock(&mut self) -> Result<()> {
        self.ensure(
            "confirm_provider_lock",
            matches!(self.session.state, SwapState::SourceLocked),
        )?;
        let swap_id = self
            .session
            .swap_id
            .clone()
            .ok_or(SwapError::SessionIncomplete("swap id"))?;
        let source_lock = self
            .session
            .source_lock_id
            .clone()
            .ok_or(SwapError::SessionIncomplete("source lock"))?;
        let expiry = self
            .session
            .expiry
            .ok_or(SwapError::SessionIncomplete("source lock expiry"))?;

        let now = self.adapters.source.block_timestamp().await?;
        if now >= expiry {
            return Err(SwapError::LockExpired { expiry, now });
        }

        let started = Instant::now();
        let confirmation = timeout(
            self.config.confirmation_timeout,
            self.provider.request_lock_confirmation(&swap_id, &source_lock),
        )
        .await;
        self.metrics.record_latency("confirm_provider_lock", started.elapsed());

        let provider_lock = match confirmation {
            Ok(Ok(lock_id)) => lock_id,
            Ok(Err(err @ ProviderError::Rejected { .. })) => {
                warn!(swap_id = %swap_id, %source_lock, "provider declined to lock; refund after expiry");
                self.abort_with(err.to_string());
                return Err(err.into());
            }
            Ok(Err(err)) => {
                warn!(swap_id = %swap_id, error = %err, "provider lock not confirmed");
                return Err(err.into());
            }
            Err(_) => {
                warn!(
                    swap_id = %swap_id,
                    timeout_secs = self.config.confirmation_timeout.as_secs(),
                    "provider lock confirmation timed out"
                );
                return Err(SwapError::ConfirmationTimeout(self.config.confirmation_timeout));
            }
        };

        match self.adapters.destination.lock_details(&provider_lock).await? {
            LockLookup::Found(details) => {
                let destination_now = self.adapters.destination.block_timestamp().await?;
                self.check_provider_lock(&details, destination_now)
                    .map_err(|detail| SwapError::ProviderLockInvalid {
                        lock_id: provider_lock.to_string(),
                        detail,
                    })?;
            }
            LockLookup::Missing => {
                return Err(SwapError::ProviderLockInvalid {
                    lock_id: provider_lock.to_string(),
                    detail: format!("no such lock on {}", self.adapters.destination.chain()),
                });
            }
            LockLookup::Unsupported => warn!(
                swap_id = %swap_id,
                lock_id = %provider_lock,
                "destination chain cannot report lock contents; relying on provider confirmation"
            ),
        }

        info!(swap_id = %swap_id, lock_id = %provider_lock, "provider lock confirmed");
        self.session.destination_lock_id = Some(provider_lock);
        self.transition(SwapState::ProviderLockConfirmed);
        Ok(())
    }

    /// ProviderLockConfirmed -> DestinationWithdrawn: claims the provider's
    /// lock, which publishes the secret.
    pub async fn withdraw_destination(&mut self) -> Result<()> {
        self.ensure(
            "withdraw_destination",
            matches!(self.session.state, SwapState::ProviderLockConfirmed),
        )?;
        let lock_id = self
            .session
            .destination_lock_id
            .clone()
            .ok_or(SwapError::SessionIncomplete("destination lock"))?;
        let commitment = self.verified_commitment()?;

        let started = Instant::now();
        let receipt = self
            .adapters
            .destination
            .withdraw(&lock_id, commitment.preimage())
            .await?;
        self.metrics.record_latency("withdraw_destination", started.elapsed());

        info!(
            swap_id = self.swap_id_field(),
            %lock_id,
            tx = %receipt.tx_id,
            "destination funds withdrawn"
        );
        self.session.destination_receipt = Some(receipt);
        self.transition(SwapState::DestinationWithdrawn);
        Ok(())
    }

    /// DestinationWithdrawn -> Completed. The secret is already public, so a
    /// provider failure here is only logged.
    pub async fn reveal_preimage(&mut self) -> Result<()> {
        self.ensure(
            "reveal_preimage",
            matches!(self.session.state, SwapState::DestinationWithdrawn),
        )?;
        let swap_id = self
            .session
            .swap_id
            .clone()
            .ok_or(SwapError::SessionIncomplete("swap id"))?;
        let commitment = self
            .session
            .commitment()
            .cloned()
            .ok_or(SwapError::SessionIncomplete("commitment"))?;

        let started = Instant::now();
        match self.provider.reveal_preimage(&swap_id, commitment.preimage()).await {
            Ok(()) => self.session.preimage_acknowledged = true,
            Err(err) => warn!(
                swap_id = %swap_id,
                error = %err,
                "provider did not acknowledge preimage; it can read it from the destination chain"
            ),
        }
        self.metrics.record_latency("reveal_preimage", started.elapsed());

        self.transition(SwapState::Completed);
        Ok(())
    }

    /// Reclaims the source lock once the source chain passes its expiry.
    pub async fn refund_source(&mut self) -> Result<()> {
        self.ensure("refund_source", self.refund_pending())?;
        let lock_id = self
            .session
            .source_lock_id
            .clone()
            .ok_or(SwapError::SessionIncomplete("source lock"))?;
        let expiry = self
            .session
            .expiry
            .ok_or(SwapError::SessionIncomplete("source lock expiry"))?;

        let now = self.adapters.source.block_timestamp().await?;
        if !self.adapters.source.refund_available(expiry, now) {
            return Err(SwapError::RefundNotAvailable { expiry, now });
        }

        let started = Instant::now();
        let receipt = self.adapters.source.refund(&lock_id).await?;
        self.metrics.record_latency("refund_source", started.elapsed());

        info!(swap_id = self.swap_id_field(), %lock_id, tx = %receipt.tx_id, "source lock refunded");
        self.transition(SwapState::Refunded { receipt });
        Ok(())
    }

    /// Abandons the session. Not possible once the secret is public.
    pub fn abort(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.session.state.secret_revealed() {
            return Err(SwapError::CannotCancel);
        }
        self.ensure("abort", !self.session.state.is_terminal())?;
        if let Some(lock_id) = &self.session.source_lock_id {
            warn!(
                swap_id = self.swap_id_field(),
                %lock_id,
                expiry = self.session.expiry,
                "aborting with funds locked; refund after expiry"
            );
        } else if let Some(expiry) = self.session.pending_lock_expiry {
            warn!(
                swap_id = self.swap_id_field(),
                expiry,
                "aborting with a source lock of unknown outcome; check the chain before expiry"
            );
        }
        self.abort_with(reason.into());
        Ok(())
    }

    /// Performs the next transition and returns the new state, or `None`
    /// when nothing is left to do. An expired source lock is refunded
    /// before anything else.
    pub async fn step(&mut self) -> Result<Option<SwapState>> {
        if self.refund_pending() {
            if let Some(expiry) = self.session.expiry {
                let now = self.adapters.source.block_timestamp().await?;
                if self.adapters.source.refund_available(expiry, now) {
                    self.refund_source().await?;
                    return Ok(Some(self.session.state.clone()));
                }
            }
        }

        match self.session.state.clone() {
            SwapState::Quoted => self.initiate().await?,
            SwapState::Initiated => self.lock_source().await?,
            SwapState::SourceLocked => self.confirm_provider_lock().await?,
            SwapState::ProviderLockConfirmed => self.withdraw_destination().await?,
            SwapState::DestinationWithdrawn => self.reveal_preimage().await?,
            SwapState::Completed | SwapState::Refunded { .. } | SwapState::Aborted { .. } => {
                return Ok(None)
            }
        }
        Ok(Some(self.session.state.clone()))
    }

    /// Steps until a terminal state or the first error.
    pub async fn run(&mut self) -> Result<SwapState> {
        while !self.session.state.is_terminal() {
            self.step().await?;
        }
        Ok(self.session.state.clone())
    }

    fn ensure(&self, operation: &'static str, allowed: bool) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(SwapError::InvalidTransition {
                operation,
                state: self.session.state.name(),
            })
        }
    }

    /// A source lock exists and has not been settled.
    fn refund_pending(&self) -> bool {
        self.session.source_lock_id.is_some()
            && matches!(
                self.session.state,
                SwapState::SourceLocked
                    | SwapState::ProviderLockConfirmed
                    | SwapState::Aborted { .. }
            )
    }

    fn verified_commitment(&self) -> Result<HashCommitment> {
        let commitment = self
            .session
            .commitment()
            .cloned()
            .ok_or(SwapError::SessionIncomplete("commitment"))?;
        let bound = self.session.hashlock().copied();
        if !commitment.is_consistent() || bound != Some(*commitment.hashlock()) {
            return Err(SwapError::HashlockMismatch);
        }
        Ok(commitment)
    }

    fn check_provider_lock(
        &self,
        details: &LockDetails,
        now: u64,
    ) -> std::result::Result<(), String> {
        if Some(&details.hashlock) != self.session.hashlock() {
            return Err(format!("hashlock {} differs from the session's", details.hashlock));
        }
        match &self.session.client_address {
            Some(client) if details.receiver.matches(client) => {}
            _ => return Err(format!("pays {}, not the client", details.receiver)),
        }
        if details.amount < self.session.to.amount {
            return Err(format!(
                "locks {} but {} was quoted",
                details.amount, self.session.to.amount
            ));
        }
        if !details.claimable {
            return Err("already withdrawn or refunded".into());
        }
        if details.expiry <= now {
            return Err(format!("expired at {} (chain time {now})", details.expiry));
        }
        Ok(())
    }

    fn source_locked(&mut self, lock_id: LockId, expiry: u64) {
        self.session.source_lock_id = Some(lock_id);
        self.session.expiry = Some(expiry);
        self.session.pending_lock_expiry = None;
        self.transition(SwapState::SourceLocked);
    }

    fn swap_id_field(&self) -> &str {
        self.session.swap_id.as_deref().unwrap_or("-")
    }

    fn abort_with(&mut self, reason: String) {
        warn!(swap_id = self.swap_id_field(), %reason, "swap aborted");
        self.transition(SwapState::Aborted { reason });
    }

    fn transition(&mut self, next: SwapState) {
        let previous = std::mem::replace(&mut self.session.state, next);
        info!(
            swap_id = self.swap_id_field(),
            from = previous.name(),
            to = self.session.state.name(),
            "swap transition"
        );
        self.metrics.record_transition(
            self.session.swap_id.as_deref(),
            &previous,
            &self.session.state,
        );
    }
}
