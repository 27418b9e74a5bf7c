//! Provider registry reads.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::chain::{TariInstruction, TariTransaction, TariWallet};
use crate::quote::{select_best, ProviderRecord, Quote, QuoteRequest};
use crate::types::{Result, SwapError};

#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>>;
}

/// A JSON array of provider records on disk.
#[derive(Debug, Clone)]
pub struct JsonFileRegistry {
    path: PathBuf,
}

impl JsonFileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProviderRegistry for JsonFileRegistry {
    async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|err| SwapError::Registry(format!("read {}: {err}", self.path.display())))?;
        serde_json::from_slice(&raw)
            .map_err(|err| SwapError::Registry(format!("parse {}: {err}", self.path.display())))
    }
}

/// The on-chain provider index, read with a dry-run call.
pub struct TariIndexRegistry<W> {
    wallet: W,
    index_component: String,
}

impl<W: TariWallet> TariIndexRegistry<W> {
    pub fn new(wallet: W, index_component: impl Into<String>) -> Self {
        Self {
            wallet,
            index_component: index_component.into(),
        }
    }
}

#[async_trait]
impl<W: TariWallet> ProviderRegistry for TariIndexRegistry<W> {
    async fn fetch_providers(&self) -> Result<Vec<ProviderRecord>> {
        let tx = TariTransaction {
            instructions: vec![TariInstruction::CallMethod {
                component_address: self.index_component.clone(),
                method: "get_all_provider_positions".to_string(),
                args: Vec::new(),
            }],
            inputs: vec![self.index_component.clone()],
            new_outputs: 0,
            is_dry_run: true,
        };
        let result = self.wallet.submit(tx).await?;
        let value = result
            .execution_results
            .into_iter()
            .next()
            .ok_or_else(|| SwapError::Registry("index call returned no result".into()))?;
        serde_json::from_value(value)
            .map_err(|err| SwapError::Registry(format!("decode provider positions: {err}")))
    }
}

/// Fetches the registry and picks the best offer for `request`.
pub async fn find_best_quote<R>(registry: &R, request: &QuoteRequest) -> Result<Quote>
where
    R: ProviderRegistry + ?Sized,
{
    if request.provided_amount == 0 {
        return Err(SwapError::ZeroAmount);
    }
    let providers = registry.fetch_providers().await?;
    debug!(
        providers = providers.len(),
        provided = %request.provided_token,
        requested = %request.requested_token,
        "selecting quote"
    );
    select_best(request, &providers).ok_or_else(|| SwapError::NoMatchingQuote {
        provided: request.provided_token.to_string(),
        requested: request.requested_token.to_string(),
    })
}
