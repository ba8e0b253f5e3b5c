use std::{str::FromStr, sync::Arc};

use alloy::primitives::{Address, U256};
use mural_contest::{
    contest_types::MusicContest,
    deployment::{DEFAULT_CONTRACT_ADDRESS, ancient8_testnet},
    gateway::{ContractGateway, Wei, group_winners},
    provider::ChainAdapter,
    test_helpers::{MockWalletProvider, test_address, winner},
};

fn gateway_over(provider: Arc<MockWalletProvider>) -> ContractGateway {
    let adapter = ChainAdapter::new(provider, ancient8_testnet());
    ContractGateway::new(adapter, Address::from_str(DEFAULT_CONTRACT_ADDRESS).unwrap())
}

#[tokio::test]
async fn winners__decodes_and_groups_by_contest() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_winners(vec![
        winner(test_address(0xaa), "Neon", "late night rain", 5, 700, 100, 30),
        winner(test_address(0xbb), "Neon", "wet asphalt", 3, 300, 100, 30),
        winner(test_address(0xcc), "Rust", "desert dawn", 9, 900, 200, 40),
    ]);
    let gateway = gateway_over(provider);

    let records = gateway.winners().await.unwrap();
    let grouped = group_winners(records);

    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].theme, "Neon");
    assert_eq!(grouped[0].winners.len(), 2);
    assert_eq!(grouped[0].winners[1].prompt, "wet asphalt");
    assert_eq!(grouped[1].theme, "Rust");
    assert_eq!(grouped[1].voter_share.to_string(), "40");
}

#[tokio::test]
async fn winners__empty_history_yields_no_groups() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_winners(Vec::new());
    let gateway = gateway_over(provider);

    let records = gateway.winners().await.unwrap();

    // The screen renders the "No Contests Yet" panel off this state.
    assert!(records.is_empty());
    assert!(group_winners(records).is_empty());
}

#[tokio::test]
async fn winners__normalizes_oversized_payouts_to_decimal_strings() {
    let provider = Arc::new(MockWalletProvider::new());
    let mut record = winner(test_address(0xaa), "Neon", "late night rain", 5, 0, 100, 30);
    // A payout far beyond anything a 64-bit transport could carry.
    record.payout = U256::MAX;
    provider.set_winners(vec![record]);
    let gateway = gateway_over(provider);

    let records = gateway.winners().await.unwrap();

    let rendered = records[0].payout.to_string();
    assert_eq!(rendered, U256::MAX.to_string());
    assert_eq!(rendered.parse::<Wei>().unwrap(), records[0].payout);
}

#[tokio::test]
async fn winners__regrouping_flattened_groups_is_stable() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_winners(vec![
        winner(test_address(0xaa), "Neon", "late night rain", 5, 700, 100, 30),
        winner(test_address(0xbb), "Rust", "desert dawn", 9, 900, 200, 40),
        winner(test_address(0xcc), "Neon", "wet asphalt", 3, 300, 100, 30),
    ]);
    let gateway = gateway_over(provider);

    let grouped = group_winners(gateway.winners().await.unwrap());
    let flattened: Vec<_> = grouped
        .iter()
        .flat_map(|result| result.winners.clone())
        .collect();

    assert_eq!(group_winners(flattened), grouped);
}

#[test]
fn winner_fixture__round_trips_through_abi_types() {
    let fixture = winner(test_address(0xaa), "Neon", "late night rain", 5, 700, 100, 30);
    let MusicContest::Winner { theme, votes, .. } = fixture;
    assert_eq!(theme, "Neon");
    assert_eq!(votes, U256::from(5u64));
}
