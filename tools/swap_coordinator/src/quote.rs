//! Liquidity provider quotes and best-offer selection.

use std::cmp::Ordering;
use std::fmt;

use alloy_primitives::U512;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::debug;

use crate::chain::Chain;
use crate::types::{Result, SwapError};

/// Token identifier as published by providers, e.g. `eth.wei` or `tari`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn chain(&self) -> Result<Chain> {
        let lowered = self.0.to_ascii_lowercase();
        if lowered.starts_with("eth") {
            Ok(Chain::Evm)
        } else if lowered.starts_with("tari") {
            Ok(Chain::Tari)
        } else {
            Err(SwapError::UnsupportedToken(self.0.clone()))
        }
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount in the token's smallest unit.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: TokenId,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub amount: u128,
}

impl TokenAmount {
    pub fn new(token: impl Into<TokenId>, amount: u128) -> Self {
        Self {
            token: token.into(),
            amount,
        }
    }
}

/// A provider's standing offer: gives `provided_token_balance` of
/// `provided_token` for `requested_token_balance` of `requested_token`.
///
/// Balances travel as decimal strings; plain JSON numbers are accepted too.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub provided_token: TokenId,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub provided_token_balance: u128,
    pub requested_token: TokenId,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub requested_token_balance: u128,
}

impl Position {
    fn matches(&self, request: &QuoteRequest) -> bool {
        self.requested_token == request.provided_token
            && self.requested_token_balance >= request.provided_amount
            && self.provided_token == request.requested_token
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub network_address: String,
    #[serde(alias = "owner_token")]
    pub public_key: String,
    #[serde(default)]
    pub positions: Vec<Position>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub provided_token: TokenId,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub provided_amount: u128,
    pub requested_token: TokenId,
}

/// Exact receive amount `provided_amount * provided_balance / requested_balance`.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedReceive {
    numerator: U512,
    denominator: U512,
}

impl ExpectedReceive {
    fn new(provided_amount: u128, position: &Position) -> Self {
        Self {
            numerator: U512::from(provided_amount) * U512::from(position.provided_token_balance),
            denominator: U512::from(position.requested_token_balance),
        }
    }

    /// Whole units the client can count on; the fractional part is dropped.
    pub fn floor(&self) -> u128 {
        if self.denominator.is_zero() {
            return 0;
        }
        u128::try_from(self.numerator / self.denominator).unwrap_or(u128::MAX)
    }
}

impl Ord for ExpectedReceive {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.numerator * other.denominator).cmp(&(other.numerator * self.denominator))
    }
}

impl PartialOrd for ExpectedReceive {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ExpectedReceive {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExpectedReceive {}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub network_address: String,
    pub public_key: String,
    pub position: Position,
    pub provided: TokenAmount,
    pub expected_receive: TokenAmount,
    #[serde(skip)]
    exact: ExpectedReceive,
}

impl Quote {
    pub fn exact_receive(&self) -> &ExpectedReceive {
        &self.exact
    }

    /// The trade from the client's side, as sent in `request_swap`.
    pub fn proposal(&self) -> Position {
        Position {
            provided_token: self.provided.token.clone(),
            provided_token_balance: self.provided.amount,
            requested_token: self.expected_receive.token.clone(),
            requested_token_balance: self.expected_receive.amount,
        }
    }
}

/// Picks the provider offering the most of `requested_token` for the request.
///
/// Ties keep the earliest provider in `providers`. Returns `None` for a zero
/// amount or when no position covers the request.
pub fn select_best(request: &QuoteRequest, providers: &[ProviderRecord]) -> Option<Quote> {
    if request.provided_amount == 0 {
        return None;
    }

    let mut best: Option<Quote> = None;
    for provider in providers {
        let Some(position) = matching_position(request, provider) else {
            continue;
        };

        let exact = ExpectedReceive::new(request.provided_amount, position);
        let improves = best.as_ref().map_or(true, |current| exact > current.exact);
        if improves {
            best = Some(Quote {
                network_address: provider.network_address.clone(),
                public_key: provider.public_key.clone(),
                position: position.clone(),
                provided: TokenAmount::new(
                    request.provided_token.clone(),
                    request.provided_amount,
                ),
                expected_receive: TokenAmount::new(request.requested_token.clone(), exact.floor()),
                exact,
            });
        }
    }
    best
}

fn matching_position<'a>(
    request: &QuoteRequest,
    provider: &'a ProviderRecord,
) -> Option<&'a Position> {
    let mut matches = provider.positions.iter().filter(|p| p.matches(request));
    let first = matches.next()?;
    let ignored = matches.count();
    if ignored > 0 {
        debug!(
            provider = %provider.network_address,
            ignored,
            "provider publishes several positions for one pair; using the first"
        );
    }
    Some(first)
}
