//! HTLC atomic swaps between an EVM chain and Tari, brokered by a
//! liquidity provider.
//!
//! [`SwapCoordinator`] drives one swap session against a [`ProviderClient`]
//! and a pair of [`ChainAdapter`]s. Transaction signing and submission are
//! left to the transports the adapters are built with.

pub mod chain;
pub mod config;
pub mod crypto;
pub mod driver;
pub mod metrics;
pub mod provider;
pub mod quote;
pub mod registry;
pub mod rpc;
pub mod state;
pub mod types;

pub use chain::{
    Address, Chain, ChainAdapter, ChainAdapters, LockDetails, LockId, LockLookup, Receipt,
    SessionAdapters,
};
pub use config::{validate_nonzero, validate_rpc_url, CoordinatorConfig};
pub use crypto::{HashCommitment, Hashlock, Preimage};
pub use driver::SwapCoordinator;
pub use metrics::{NoopMetrics, SwapMetrics, TracingMetrics};
pub use provider::{ProviderClient, SwapAccepted, SwapRequest};
pub use quote::{select_best, Position, ProviderRecord, Quote, QuoteRequest, TokenAmount, TokenId};
pub use registry::{find_best_quote, JsonFileRegistry, ProviderRegistry, TariIndexRegistry};
pub use rpc::{JsonRpcProviderClient, RetryConfig};
pub use state::{SwapSession, SwapState};
pub use types::{ChainError, ProviderError, Result, SwapError};
