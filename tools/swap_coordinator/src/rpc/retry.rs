use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::read_env_u64;
use crate::types::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        let timeout_ms = read_env_u64(
            "SWAP_PROVIDER_RPC_TIMEOUT_MS",
            default.timeout.as_millis() as u64,
        );
        let max_retries = read_env_u64("SWAP_PROVIDER_RPC_MAX_RETRIES", default.max_retries as u64);
        let base_delay_ms = read_env_u64(
            "SWAP_PROVIDER_RPC_BASE_DELAY_MS",
            default.base_delay.as_millis() as u64,
        );
        let max_delay_ms = read_env_u64(
            "SWAP_PROVIDER_RPC_MAX_DELAY_MS",
            default.max_delay.as_millis() as u64,
        );
        let jitter_ms = read_env_u64("SWAP_PROVIDER_RPC_JITTER_MS", default.jitter_ms);
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_retries: max_retries as usize,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter_ms,
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent));
        let capped = std::cmp::min(backoff, self.max_delay);
        let jitter = if self.jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
        };
        capped + jitter
    }
}

/// Runs `action` with a per-attempt timeout, retrying transport failures and
/// timeouts with capped exponential backoff. Rejections return at once.
pub async fn retry_with_timeout<T, F, Fut>(
    label: &'static str,
    config: &RetryConfig,
    mut action: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = config.max_retries.saturating_add(1);
    let mut last = ProviderError::Timeout;
    for attempt in 0..attempts {
        let err = match timeout(config.timeout, action()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_retryable() => return Err(err),
            Ok(Err(err)) => err,
            Err(_) => ProviderError::Timeout,
        };
        if attempt + 1 < attempts {
            warn!(attempt = attempt + 1, error = %err, "provider rpc {label} failed; retrying");
            sleep(config.backoff(attempt)).await;
        }
        last = err;
    }
    Err(last)
}
