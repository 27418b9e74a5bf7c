use std::time::Duration;

use thiserror::Error;

use crate::chain::Chain;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("no wallet session available on {0}")]
    WalletUnavailable(Chain),
    #[error("lock failed: {0}")]
    LockFailed(String),
    #[error("withdraw failed: {0}")]
    WithdrawFailed(String),
    #[error("refund failed: {0}")]
    RefundFailed(String),
    #[error("chain transport error: {0}")]
    Transport(String),
    #[error("no adapter registered for {0}")]
    UnsupportedChain(Chain),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected request: {reason}")]
    Rejected { reason: String },
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("provider request timed out")]
    Timeout,
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Transport failures may be retried; the provider may or may not have
    /// processed the request. Rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("requested amount must be greater than zero")]
    ZeroAmount,
    #[error("no provider offers {requested} for {provided}")]
    NoMatchingQuote { provided: String, requested: String },
    #[error("unsupported token: {0}")]
    UnsupportedToken(String),
    #[error("randomness source unavailable: {0}")]
    Randomness(String),
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("cannot {operation} from state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
    #[error("session is missing {0}")]
    SessionIncomplete(&'static str),
    #[error("hashlock does not commit to the session secret")]
    HashlockMismatch,
    #[error("provider lock {lock_id} does not match the swap: {detail}")]
    ProviderLockInvalid { lock_id: String, detail: String },
    #[error("source lock expired at {expiry} (chain time {now})")]
    LockExpired { expiry: u64, now: u64 },
    #[error("refund not available before {expiry} (chain time {now})")]
    RefundNotAvailable { expiry: u64, now: u64 },
    #[error("outcome of the source lock submission with expiry {expiry} is unknown; resolve it before locking again")]
    SourceLockUnresolved { expiry: u64 },
    #[error("provider did not confirm its lock within {0:?}")]
    ConfirmationTimeout(Duration),
    #[error("swap cannot be cancelled once the secret is public")]
    CannotCancel,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("registry error: {0}")]
    Registry(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, SwapError>;
