//! HTTP transport to liquidity providers.

mod provider;
pub mod retry;

pub use provider::JsonRpcProviderClient;
pub use retry::{retry_with_timeout, RetryConfig};
