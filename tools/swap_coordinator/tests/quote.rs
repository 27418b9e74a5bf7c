use swap_coordinator::{select_best, Chain, Position, ProviderRecord, QuoteRequest, SwapError, TokenId};

fn position(provided: &str, provided_balance: u128, requested: &str, requested_balance: u128) -> Position {
    Position {
        provided_token: provided.into(),
        provided_token_balance: provided_balance,
        requested_token: requested.into(),
        requested_token_balance: requested_balance,
    }
}

fn provider(name: &str, positions: Vec<Position>) -> ProviderRecord {
    ProviderRecord {
        network_address: format!("http://{name}.test"),
        public_key: format!("{name}_pk"),
        positions,
    }
}

fn eth_for_tari(amount: u128) -> QuoteRequest {
    QuoteRequest {
        provided_token: "eth.wei".into(),
        provided_amount: amount,
        requested_token: "tari".into(),
    }
}

#[test]
fn best_ratio_wins() {
    let providers = vec![
        provider("a", vec![position("tari", 100, "eth.wei", 10)]),
        provider("b", vec![position("tari", 40, "eth.wei", 5)]),
    ];
    let quote = select_best(&eth_for_tari(10), &providers).expect("match");
    assert_eq!(quote.network_address, "http://a.test");
    assert_eq!(quote.public_key, "a_pk");
    assert_eq!(quote.expected_receive.amount, 100);
    assert_eq!(quote.expected_receive.token, TokenId::from("tari"));
    assert_eq!(quote.provided.amount, 10);
}

#[test]
fn zero_amount_finds_nothing() {
    let providers = vec![provider("a", vec![position("tari", 100, "eth.wei", 10)])];
    assert!(select_best(&eth_for_tari(0), &providers).is_none());
}

#[test]
fn positions_below_the_requested_amount_are_skipped() {
    let providers = vec![
        provider("small", vec![position("tari", 10_000, "eth.wei", 9)]),
        provider("large", vec![position("tari", 50, "eth.wei", 10)]),
    ];
    let quote = select_best(&eth_for_tari(10), &providers).expect("match");
    assert_eq!(quote.network_address, "http://large.test");
    assert_eq!(quote.expected_receive.amount, 50);

    let none = select_best(&eth_for_tari(11), &providers);
    assert!(none.is_none());
}

#[test]
fn wrong_direction_does_not_match() {
    let providers = vec![provider("a", vec![position("eth.wei", 100, "tari", 10)])];
    assert!(select_best(&eth_for_tari(10), &providers).is_none());
}

#[test]
fn ties_keep_the_first_provider() {
    let providers = vec![
        provider("first", vec![position("tari", 100, "eth.wei", 10)]),
        provider("second", vec![position("tari", 200, "eth.wei", 20)]),
    ];
    let quote = select_best(&eth_for_tari(10), &providers).expect("match");
    assert_eq!(quote.network_address, "http://first.test");
}

#[test]
fn ratios_compare_exactly_below_one_unit() {
    // 10 * 7/3 = 23.33.. and 10 * 47/20 = 23.5 both floor to 23.
    let providers = vec![
        provider("thirds", vec![position("tari", 700, "eth.wei", 300)]),
        provider("twentieths", vec![position("tari", 470, "eth.wei", 200)]),
    ];
    let quote = select_best(&eth_for_tari(10), &providers).expect("match");
    assert_eq!(quote.network_address, "http://twentieths.test");
    assert_eq!(quote.expected_receive.amount, 23);
    assert!(quote.exact_receive().floor() == 23);
}

#[test]
fn large_balances_do_not_overflow() {
    let providers = vec![
        provider("a", vec![position("tari", u128::MAX, "eth.wei", u128::MAX - 1)]),
        provider("b", vec![position("tari", u128::MAX - 1, "eth.wei", u128::MAX - 2)]),
    ];
    let quote = select_best(&eth_for_tari(u128::MAX - 2), &providers).expect("match");
    // (MAX)/(MAX-1) < (MAX-1)/(MAX-2)
    assert_eq!(quote.network_address, "http://b.test");
    assert_eq!(quote.expected_receive.amount, u128::MAX - 1);
}

#[test]
fn duplicate_positions_use_the_first_listed() {
    let providers = vec![provider(
        "dup",
        vec![
            position("tari", 50, "eth.wei", 10),
            position("tari", 500, "eth.wei", 10),
        ],
    )];
    let quote = select_best(&eth_for_tari(10), &providers).expect("match");
    assert_eq!(quote.position.provided_token_balance, 50);
    assert_eq!(quote.expected_receive.amount, 50);
}

#[test]
fn proposal_is_written_from_the_client_side() {
    let providers = vec![provider("a", vec![position("tari", 100, "eth.wei", 10)])];
    let quote = select_best(&eth_for_tari(4), &providers).expect("match");
    let proposal = quote.proposal();
    assert_eq!(proposal.provided_token, TokenId::from("eth.wei"));
    assert_eq!(proposal.provided_token_balance, 4);
    assert_eq!(proposal.requested_token, TokenId::from("tari"));
    assert_eq!(proposal.requested_token_balance, 40);
}

#[test]
fn registry_json_accepts_numbers_and_strings() {
    let raw = serde_json::json!([
        {
            "network_address": "http://a.test",
            "owner_token": "owner",
            "positions": [{
                "provided_token": "tari",
                "provided_token_balance": 100,
                "requested_token": "eth.wei",
                "requested_token_balance": "340282366920938463463374607431768211455"
            }]
        },
        { "network_address": "http://b.test", "public_key": "pk" }
    ]);
    let providers: Vec<ProviderRecord> = serde_json::from_value(raw).expect("decode");
    assert_eq!(providers[0].public_key, "owner");
    assert_eq!(providers[0].positions[0].provided_token_balance, 100);
    assert_eq!(providers[0].positions[0].requested_token_balance, u128::MAX);
    assert!(providers[1].positions.is_empty());

    let encoded = serde_json::to_value(&providers[0].positions[0]).expect("encode");
    assert_eq!(encoded["provided_token_balance"], "100");
}

#[test]
fn token_ids_map_to_chains() {
    assert_eq!(TokenId::from("eth.wei").chain().expect("evm"), Chain::Evm);
    assert_eq!(TokenId::from("tari").chain().expect("tari"), Chain::Tari);
    assert!(matches!(
        TokenId::from("btc.sat").chain(),
        Err(SwapError::UnsupportedToken(token)) if token == "btc.sat"
    ));
}
