//! Swap session state.

use serde::{Deserialize, Serialize};

use crate::chain::{Address, LockId, Receipt};
use crate::crypto::{HashCommitment, Hashlock};
use crate::quote::{Position, Quote, TokenAmount};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SwapState {
    Quoted,
    Initiated,
    SourceLocked,
    ProviderLockConfirmed,
    DestinationWithdrawn,
    Completed,
    Refunded { receipt: Receipt },
    Aborted { reason: String },
}

impl SwapState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quoted => "quoted",
            Self::Initiated => "initiated",
            Self::SourceLocked => "source_locked",
            Self::ProviderLockConfirmed => "provider_lock_confirmed",
            Self::DestinationWithdrawn => "destination_withdrawn",
            Self::Completed => "completed",
            Self::Refunded { .. } => "refunded",
            Self::Aborted { .. } => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Refunded { .. } | Self::Aborted { .. }
        )
    }

    /// The secret is on a public ledger from here on.
    pub fn secret_revealed(&self) -> bool {
        matches!(self, Self::DestinationWithdrawn | Self::Completed)
    }
}

/// One swap, from quote to settlement.
///
/// `from` is what the client locks on the source chain, `to` what it
/// withdraws from the provider's lock on the destination chain.
#[derive(Debug, Clone, Serialize)]
pub struct SwapSession {
    pub swap_id: Option<String>,
    #[serde(skip)]
    commitment: Option<HashCommitment>,
    hashlock: Option<Hashlock>,
    pub from: TokenAmount,
    pub to: TokenAmount,
    pub provider_network_address: String,
    pub provider_public_key: String,
    pub client_address: Option<Address>,
    pub provider_receiving_address: Option<Address>,
    pub source_lock_id: Option<LockId>,
    pub destination_lock_id: Option<LockId>,
    pub destination_receipt: Option<Receipt>,
    /// Source lock expiry in the source chain's clock.
    pub expiry: Option<u64>,
    /// Expiry of a source lock submission whose outcome is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_lock_expiry: Option<u64>,
    pub preimage_acknowledged: bool,
    pub state: SwapState,
}

impl SwapSession {
    pub fn from_quote(quote: &Quote) -> Self {
        Self {
            swap_id: None,
            commitment: None,
            hashlock: None,
            from: quote.provided.clone(),
            to: quote.expected_receive.clone(),
            provider_network_address: quote.network_address.clone(),
            provider_public_key: quote.public_key.clone(),
            client_address: None,
            provider_receiving_address: None,
            source_lock_id: None,
            destination_lock_id: None,
            destination_receipt: None,
            expiry: None,
            pending_lock_expiry: None,
            preimage_acknowledged: false,
            state: SwapState::Quoted,
        }
    }

    pub fn commitment(&self) -> Option<&HashCommitment> {
        self.commitment.as_ref()
    }

    pub fn hashlock(&self) -> Option<&Hashlock> {
        self.hashlock.as_ref()
    }

    /// Binds the session secret. A session keeps its first commitment.
    pub(crate) fn bind_commitment(&mut self, commitment: HashCommitment) {
        let bound = self.commitment.get_or_insert(commitment);
        self.hashlock = Some(*bound.hashlock());
    }

    /// The trade as the client proposes it to the provider.
    pub fn proposal(&self) -> Position {
        Position {
            provided_token: self.from.token.clone(),
            provided_token_balance: self.from.amount,
            requested_token: self.to.token.clone(),
            requested_token_balance: self.to.amount,
        }
    }
}
