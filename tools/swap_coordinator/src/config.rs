use std::time::Duration;

use crate::rpc::RetryConfig;
use crate::types::{Result, SwapError};

/// Timing policy for one swap session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Source lock lifetime, measured from the source chain's clock.
    pub lock_duration: Duration,
    /// Worst-case time for the whole protocol to finish.
    pub expected_round_trip: Duration,
    /// How long to wait for the provider's mirrored lock.
    pub confirmation_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_duration: Duration::from_secs(3_600),
            expected_round_trip: Duration::from_secs(900),
            confirmation_timeout: Duration::from_secs(600),
            retry: RetryConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            lock_duration: Duration::from_secs(read_env_u64(
                "SWAP_LOCK_DURATION_SECS",
                default.lock_duration.as_secs(),
            )),
            expected_round_trip: Duration::from_secs(read_env_u64(
                "SWAP_EXPECTED_ROUND_TRIP_SECS",
                default.expected_round_trip.as_secs(),
            )),
            confirmation_timeout: Duration::from_secs(read_env_u64(
                "SWAP_CONFIRMATION_TIMEOUT_SECS",
                default.confirmation_timeout.as_secs(),
            )),
            retry: RetryConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_nonzero("lock_duration", self.lock_duration.as_secs())?;
        validate_nonzero("expected_round_trip", self.expected_round_trip.as_secs())?;
        validate_nonzero("confirmation_timeout", self.confirmation_timeout.as_secs())?;
        if self.lock_duration <= self.expected_round_trip {
            return Err(SwapError::Config(format!(
                "lock_duration ({}s) must exceed expected_round_trip ({}s)",
                self.lock_duration.as_secs(),
                self.expected_round_trip.as_secs()
            )));
        }
        if self.confirmation_timeout >= self.lock_duration {
            return Err(SwapError::Config(format!(
                "confirmation_timeout ({}s) must be shorter than lock_duration ({}s)",
                self.confirmation_timeout.as_secs(),
                self.lock_duration.as_secs()
            )));
        }
        Ok(())
    }
}

pub fn validate_rpc_url(label: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(SwapError::Config(format!(
            "{label} must start with http:// or https://"
        )))
    }
}

pub fn validate_nonzero(label: &str, value: u64) -> Result<()> {
    if value == 0 {
        Err(SwapError::Config(format!("{label} must be greater than zero")))
    } else {
        Ok(())
    }
}

pub(crate) fn read_env_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(fallback)
}
