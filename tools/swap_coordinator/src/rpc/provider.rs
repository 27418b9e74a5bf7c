use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonrpc_core::{Id, MethodCall, Output, Params, Version};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::retry::{retry_with_timeout, RetryConfig};
use crate::chain::LockId;
use crate::config::validate_rpc_url;
use crate::crypto::Preimage;
use crate::provider::{ProviderClient, SwapAccepted, SwapRequest};
use crate::types::ProviderError;

const REQUEST_SWAP: &str = "request_swap";
const REQUEST_LOCK_FUNDS: &str = "request_lock_funds";
const PUSH_PREIMAGE: &str = "push_preimage";

#[derive(Serialize)]
struct LockFundsParams<'a> {
    swap_id: &'a str,
    contract_id: &'a LockId,
}

#[derive(Deserialize)]
struct LockFundsResult {
    contract_id: LockId,
}

#[derive(Serialize)]
struct PushPreimageParams<'a> {
    swap_id: &'a str,
    preimage: &'a Preimage,
}

/// Talks JSON-RPC 2.0 to a provider's `<network_address>/json_rpc`.
pub struct JsonRpcProviderClient {
    http: Client,
    endpoint: String,
    retry: RetryConfig,
    confirmation_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcProviderClient {
    pub fn new(network_address: &str, retry: RetryConfig) -> Result<Self, ProviderError> {
        validate_rpc_url("provider network address", network_address)
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;
        let endpoint = format!("{}/json_rpc", network_address.trim_end_matches('/'));
        Ok(Self {
            http: Client::new(),
            endpoint,
            retry,
            confirmation_timeout: Duration::from_secs(600),
            next_id: AtomicU64::new(1),
        })
    }

    /// The provider answers `request_lock_funds` only after its own lock is
    /// mined, so that call gets a longer per-attempt timeout.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<P, R>(
        &self,
        method: &'static str,
        params: &P,
        retry: &RetryConfig,
    ) -> Result<R, ProviderError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let params = match serde_json::to_value(params) {
            Ok(Value::Object(map)) => Params::Map(map),
            Ok(other) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "{method} params must be an object, got {other}"
                )))
            }
            Err(err) => return Err(ProviderError::InvalidResponse(err.to_string())),
        };
        let result = retry_with_timeout(method, retry, || self.call_once(method, params.clone())).await?;
        serde_json::from_value(result)
            .map_err(|err| ProviderError::InvalidResponse(format!("{method} result: {err}")))
    }

    async fn call_once(&self, method: &'static str, params: Params) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = MethodCall {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params,
            id: Id::Num(id),
        };
        debug!(endpoint = %self.endpoint, method, id, "provider rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Transport(format!("{method}: http status {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::InvalidResponse(format!("{method}: http status {status}")));
        }

        let output: Output = response.json().await.map_err(|err| {
            if err.is_decode() {
                ProviderError::InvalidResponse(format!("{method}: {err}"))
            } else {
                transport_error(err)
            }
        })?;
        match output {
            Output::Success(success) if success.id == Id::Num(id) => Ok(success.result),
            Output::Failure(failure) => Err(ProviderError::Rejected {
                reason: failure.error.message,
            }),
            Output::Success(success) => Err(ProviderError::InvalidResponse(format!(
                "{method}: response id {:?} does not match request {id}",
                success.id
            ))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(err.to_string())
    }
}

#[async_trait]
impl ProviderClient for JsonRpcProviderClient {
    async fn request_swap(&self, request: &SwapRequest) -> Result<SwapAccepted, ProviderError> {
        self.call(REQUEST_SWAP, request, &self.retry).await
    }

    async fn request_lock_confirmation(
        &self,
        swap_id: &str,
        source_lock: &LockId,
    ) -> Result<LockId, ProviderError> {
        let retry = RetryConfig {
            timeout: self.confirmation_timeout,
            ..self.retry.clone()
        };
        let params = LockFundsParams {
            swap_id,
            contract_id: source_lock,
        };
        let result: LockFundsResult = self.call(REQUEST_LOCK_FUNDS, &params, &retry).await?;
        Ok(result.contract_id)
    }

    async fn reveal_preimage(&self, swap_id: &str, preimage: &Preimage) -> Result<(), ProviderError> {
        let params = PushPreimageParams { swap_id, preimage };
        let _: Value = self.call(PUSH_PREIMAGE, &params, &self.retry).await?;
        Ok(())
    }
}
