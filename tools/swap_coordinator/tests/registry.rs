use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::NamedTempFile;

use swap_coordinator::chain::{
    TariAccount, TariInstruction, TariTransaction, TariTransactionResult, TariWallet,
};
use swap_coordinator::{
    find_best_quote, ChainError, JsonFileRegistry, ProviderRecord, ProviderRegistry,
    QuoteRequest, SwapError, TariIndexRegistry,
};

fn registry_json() -> serde_json::Value {
    json!([
        {
            "network_address": "http://slow.test",
            "public_key": "slow_pk",
            "positions": [{
                "provided_token": "tari",
                "provided_token_balance": "80",
                "requested_token": "eth.wei",
                "requested_token_balance": "10"
            }]
        },
        {
            "network_address": "http://fast.test",
            "owner_token": "fast_owner",
            "positions": [{
                "provided_token": "tari",
                "provided_token_balance": 120,
                "requested_token": "eth.wei",
                "requested_token_balance": 10
            }]
        }
    ])
}

fn request(amount: u128) -> QuoteRequest {
    QuoteRequest {
        provided_token: "eth.wei".into(),
        provided_amount: amount,
        requested_token: "tari".into(),
    }
}

#[tokio::test]
async fn file_registry_feeds_quote_selection() {
    let mut file = NamedTempFile::new().expect("tempfile");
    write!(file, "{}", registry_json()).expect("write registry");

    let registry = JsonFileRegistry::new(file.path());
    let providers = registry.fetch_providers().await.expect("read");
    assert_eq!(providers.len(), 2);

    let quote = find_best_quote(&registry, &request(10)).await.expect("quote");
    assert_eq!(quote.network_address, "http://fast.test");
    assert_eq!(quote.public_key, "fast_owner");
    assert_eq!(quote.expected_receive.amount, 120);
}

#[tokio::test]
async fn no_match_and_zero_amount_are_reported() {
    let mut file = NamedTempFile::new().expect("tempfile");
    write!(file, "{}", registry_json()).expect("write registry");
    let registry = JsonFileRegistry::new(file.path());

    let err = find_best_quote(&registry, &request(11)).await.expect_err("too large");
    assert!(matches!(err, SwapError::NoMatchingQuote { .. }));

    let missing = JsonFileRegistry::new(file.path().with_extension("missing"));
    let err = find_best_quote(&missing, &request(0)).await.expect_err("zero");
    assert!(matches!(err, SwapError::ZeroAmount));
}

#[tokio::test]
async fn unreadable_registry_is_a_registry_error() {
    let mut file = NamedTempFile::new().expect("tempfile");
    write!(file, "not json").expect("write");
    let err = JsonFileRegistry::new(file.path())
        .fetch_providers()
        .await
        .expect_err("bad json");
    assert!(matches!(err, SwapError::Registry(_)));
}

struct IndexWallet {
    submitted: Mutex<Vec<TariTransaction>>,
}

#[async_trait]
impl TariWallet for IndexWallet {
    async fn default_account(&self) -> Result<TariAccount, ChainError> {
        Err(ChainError::WalletUnavailable(swap_coordinator::Chain::Tari))
    }

    async fn account_address(&self, public_key: &str) -> Result<String, ChainError> {
        Ok(format!("account_{public_key}"))
    }

    async fn submit(&self, tx: TariTransaction) -> Result<TariTransactionResult, ChainError> {
        self.submitted.lock().unwrap().push(tx);
        Ok(TariTransactionResult {
            transaction_id: "dry-run".to_string(),
            execution_results: vec![registry_json()],
        })
    }

    async fn current_epoch(&self) -> Result<u64, ChainError> {
        Ok(1)
    }
}

#[tokio::test]
async fn index_registry_uses_a_dry_run_call() {
    let registry = TariIndexRegistry::new(
        IndexWallet {
            submitted: Mutex::new(Vec::new()),
        },
        "component_index",
    );
    let providers: Vec<ProviderRecord> = registry.fetch_providers().await.expect("fetch");
    assert_eq!(providers[1].public_key, "fast_owner");
}

#[tokio::test]
async fn index_registry_call_shape() {
    let wallet = Arc::new(IndexWallet {
        submitted: Mutex::new(Vec::new()),
    });
    let registry = TariIndexRegistry::new(wallet.clone(), "component_index");
    registry.fetch_providers().await.expect("fetch");

    let submitted = wallet.submitted.lock().unwrap();
    let tx = &submitted[0];
    assert!(tx.is_dry_run);
    assert_eq!(tx.inputs, vec!["component_index".to_string()]);
    assert_eq!(
        tx.instructions,
        vec![TariInstruction::CallMethod {
            component_address: "component_index".to_string(),
            method: "get_all_provider_positions".to_string(),
            args: Vec::new(),
        }]
    );
}
