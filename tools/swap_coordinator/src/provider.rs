//! Liquidity provider coordination contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::{Address, LockId};
use crate::crypto::{Hashlock, Preimage};
use crate::quote::Position;
use crate::types::ProviderError;

/// Proposal sent to open a swap. `position` is written from the client's
/// side: it provides `provided_token` and expects `requested_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub client_address: Address,
    pub hashlock: Hashlock,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapAccepted {
    pub swap_id: String,
    pub provider_address: Address,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// `Rejected` when the provider declines, e.g. a stale quote.
    async fn request_swap(&self, request: &SwapRequest) -> Result<SwapAccepted, ProviderError>;

    /// Reports the client's lock and returns the provider's mirrored lock on
    /// the destination chain.
    async fn request_lock_confirmation(
        &self,
        swap_id: &str,
        source_lock: &LockId,
    ) -> Result<LockId, ProviderError>;

    async fn reveal_preimage(&self, swap_id: &str, preimage: &Preimage) -> Result<(), ProviderError>;
}

#[async_trait]
impl<T: ProviderClient + ?Sized> ProviderClient for Arc<T> {
    async fn request_swap(&self, request: &SwapRequest) -> Result<SwapAccepted, ProviderError> {
        (**self).request_swap(request).await
    }

    async fn request_lock_confirmation(
        &self,
        swap_id: &str,
        source_lock: &LockId,
    ) -> Result<LockId, ProviderError> {
        (**self).request_lock_confirmation(swap_id, source_lock).await
    }

    async fn reveal_preimage(&self, swap_id: &str, preimage: &Preimage) -> Result<(), ProviderError> {
        (**self).reveal_preimage(swap_id, preimage).await
    }
}
