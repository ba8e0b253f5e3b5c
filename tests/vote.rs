use std::{str::FromStr, sync::Arc};

use alloy::{primitives::Address, sol_types::SolCall};
use mural_contest::{
    client::ContestView,
    contest_types::MusicContest,
    deployment::{DEFAULT_CONTRACT_ADDRESS, ancient8_testnet},
    gateway::ContractGateway,
    provider::ChainAdapter,
    test_helpers::{MockWalletProvider, TEST_ACCOUNT, test_address},
};

fn gateway_over(provider: Arc<MockWalletProvider>) -> ContractGateway {
    let adapter = ChainAdapter::new(provider, ancient8_testnet());
    ContractGateway::new(adapter, Address::from_str(DEFAULT_CONTRACT_ADDRESS).unwrap())
}

#[tokio::test]
async fn contest_details__empty_contest_has_no_submissions() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_submissions(&[], 0, 0, 1_700_000_000, &[]);
    let gateway = gateway_over(provider);

    let snapshot = gateway.contest_details().await.unwrap();

    // The screen renders the "No Submissions Yet" panel off this state.
    assert!(snapshot.submissions.is_empty());
    assert_eq!(snapshot.total_votes, 0);
}

#[tokio::test]
async fn contest_details__fresh_account_can_vote_on_every_submission() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_submissions(
        &[
            (test_address(0xaa), "https://media.example/a.mp3", "Neon"),
            (test_address(0xbb), "https://media.example/b.mp3", "Neon"),
        ],
        3,
        2_000,
        1_700_000_000,
        &[test_address(0xcc)],
    );
    let gateway = gateway_over(provider);

    let view = ContestView::new(gateway.contest_details().await.unwrap());

    assert_eq!(view.snapshot.submissions.len(), 2);
    assert!(view.can_vote(Some(TEST_ACCOUNT)));
    assert_eq!(view.theme(), Some("Neon"));
}

#[tokio::test]
async fn contest_details__voted_account_is_blocked_for_any_index() {
    let provider = Arc::new(MockWalletProvider::new());
    let me = Address::from_str(TEST_ACCOUNT).unwrap();
    provider.set_submissions(
        &[
            (test_address(0xaa), "https://media.example/a.mp3", "Neon"),
            (test_address(0xbb), "https://media.example/b.mp3", "Neon"),
        ],
        3,
        2_000,
        1_700_000_000,
        &[me],
    );
    let gateway = gateway_over(provider);

    let view = ContestView::new(gateway.contest_details().await.unwrap());

    // The gate is account-level: no submission index is votable.
    assert!(!view.can_vote(Some(TEST_ACCOUNT)));
    assert!(!view.can_vote(Some(&TEST_ACCOUNT.to_lowercase())));
    assert!(!view.can_vote(None));
}

#[tokio::test]
async fn vote_on_submission__sends_the_indexed_vote_call() {
    let provider = Arc::new(MockWalletProvider::new());
    let gateway = gateway_over(provider.clone());

    gateway.vote_on_submission(1).await.unwrap();

    let (_, params) = provider
        .requests()
        .into_iter()
        .find(|(method, _)| method == "eth_sendTransaction")
        .expect("vote transaction was never sent");
    let data = params[0]["data"].as_str().unwrap();
    let data = hex::decode(data.strip_prefix("0x").unwrap()).unwrap();
    let call = MusicContest::voteCall::abi_decode(&data).unwrap();
    assert_eq!(call._submissionIndex.to::<u64>(), 1);
}

#[tokio::test]
async fn vote_on_submission__switches_chain_first_when_mismatched() {
    let provider = Arc::new(MockWalletProvider::new().with_chain_id("0x1"));
    let gateway = gateway_over(provider.clone());

    gateway.vote_on_submission(0).await.unwrap();

    let methods = provider.methods();
    let switch_at = methods
        .iter()
        .position(|m| m == "wallet_addEthereumChain")
        .expect("chain switch was never requested");
    let send_at = methods.iter().position(|m| m == "eth_sendTransaction").unwrap();
    assert!(switch_at < send_at);
}
