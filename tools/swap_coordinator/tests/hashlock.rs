use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use swap_coordinator::crypto::{commit, generate, parse_hex32, verify, HashCommitment};
use swap_coordinator::{Hashlock, Preimage};

#[test]
fn commit_is_sha256_of_the_secret() {
    // sha256 of 32 zero bytes
    let expected = "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925";
    let hashlock = commit(&Preimage::from_bytes([0u8; 32]));
    assert_eq!(hashlock.to_string(), expected);
    assert_eq!(Hashlock::from_hex(expected).expect("hex"), hashlock);
}

#[test]
fn commit_is_deterministic() {
    let preimage = Preimage::from_bytes([42u8; 32]);
    assert_eq!(commit(&preimage), commit(&preimage.clone()));
    assert!(verify(&preimage, &commit(&preimage)));
    assert!(!verify(&Preimage::from_bytes([43u8; 32]), &commit(&preimage)));
}

#[test]
fn generated_secrets_are_distinct_and_consistent() {
    let mut seen = HashSet::new();
    for _ in 0..64 {
        let commitment = generate().expect("os randomness");
        assert!(commitment.is_consistent());
        assert!(seen.insert(*commitment.preimage().as_bytes()));
    }
}

#[test]
fn preimage_debug_is_redacted() {
    let commitment = HashCommitment::from_preimage(Preimage::from_bytes([9u8; 32]));
    let rendered = format!("{commitment:?}");
    assert!(!rendered.contains(&commitment.preimage().to_hex()));
    assert!(rendered.contains("redacted"));
}

#[test]
fn parse_hex32_accepts_prefix_and_rejects_bad_lengths() {
    let hex = format!("0x{}", "ab".repeat(32));
    assert_eq!(parse_hex32(&hex).expect("prefixed"), [0xab; 32]);
    assert!(parse_hex32(&"ab".repeat(31)).is_err());
    assert!(parse_hex32("zz").is_err());
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    hashlock: Hashlock,
    preimage: Preimage,
}

#[test]
fn wire_fields_serialize_as_byte_arrays() {
    let envelope = Envelope {
        hashlock: Hashlock::from_bytes([1u8; 32]),
        preimage: Preimage::from_bytes([2u8; 32]),
    };
    let value = serde_json::to_value(&envelope).expect("serialize");
    assert_eq!(value["hashlock"], serde_json::json!(vec![1u8; 32]));
    assert_eq!(value["preimage"].as_array().map(Vec::len), Some(32));
}

#[test]
fn wire_fields_accept_hex_or_byte_arrays() {
    let from_hex: Envelope = serde_json::from_value(serde_json::json!({
        "hashlock": format!("0x{}", "01".repeat(32)),
        "preimage": "02".repeat(32),
    }))
    .expect("hex form");
    assert_eq!(from_hex.hashlock, Hashlock::from_bytes([1u8; 32]));
    assert_eq!(from_hex.preimage.as_bytes(), &[2u8; 32]);

    let from_array: Envelope = serde_json::from_value(serde_json::json!({
        "hashlock": vec![1u8; 32],
        "preimage": vec![2u8; 32],
    }))
    .expect("array form");
    assert_eq!(from_array.hashlock, from_hex.hashlock);

    let short = serde_json::from_value::<Envelope>(serde_json::json!({
        "hashlock": vec![1u8; 31],
        "preimage": vec![2u8; 32],
    }));
    assert!(short.is_err());
    let long = serde_json::from_value::<Envelope>(serde_json::json!({
        "hashlock": vec![1u8; 33],
        "preimage": vec![2u8; 32],
    }));
    assert!(long.is_err());
}
