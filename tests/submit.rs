use std::{str::FromStr, sync::Arc};

use alloy::primitives::Address;
use mural_contest::{
    deployment::{DEFAULT_CONTRACT_ADDRESS, ancient8_testnet},
    gateway::{ContractGateway, GatewayError},
    provider::ChainAdapter,
    test_helpers::MockWalletProvider,
};

fn gateway_over(provider: Arc<MockWalletProvider>) -> ContractGateway {
    let adapter = ChainAdapter::new(provider, ancient8_testnet());
    ContractGateway::new(adapter, Address::from_str(DEFAULT_CONTRACT_ADDRESS).unwrap())
}

#[tokio::test]
async fn submit_music__switches_chain_before_the_write() {
    // given a wallet reporting mainnet while the target is Ancient8
    let provider = Arc::new(MockWalletProvider::new().with_chain_id("0x1"));
    provider.set_submission_fee(1000);
    let gateway = gateway_over(provider.clone());

    // when
    gateway
        .submit_music("https://media.example/track.mp3", "Neon", "late night rain")
        .await
        .unwrap();

    // then
    let methods = provider.methods();
    let switch_at = methods
        .iter()
        .position(|m| m == "wallet_addEthereumChain")
        .expect("chain switch was never requested");
    let send_at = methods
        .iter()
        .position(|m| m == "eth_sendTransaction")
        .expect("transaction was never sent");
    assert!(
        switch_at < send_at,
        "the chain switch must precede the write call"
    );
}

#[tokio::test]
async fn submit_music__attaches_the_submission_fee_as_value() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_submission_fee(1000);
    let gateway = gateway_over(provider.clone());

    gateway
        .submit_music("https://media.example/track.mp3", "Neon", "late night rain")
        .await
        .unwrap();

    let (_, params) = provider
        .requests()
        .into_iter()
        .find(|(method, _)| method == "eth_sendTransaction")
        .expect("transaction was never sent");
    assert_eq!(params[0]["value"], "0x3e8");
    assert_eq!(
        params[0]["from"],
        mural_contest::test_helpers::TEST_ACCOUNT
    );
}

#[tokio::test]
async fn submit_music__skips_the_switch_when_already_on_target() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_submission_fee(1000);
    let gateway = gateway_over(provider.clone());

    gateway
        .submit_music("https://media.example/track.mp3", "Neon", "late night rain")
        .await
        .unwrap();

    assert!(
        !provider
            .methods()
            .contains(&"wallet_addEthereumChain".to_owned())
    );
}

#[tokio::test]
async fn submit_music__waits_for_the_receipt() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_submission_fee(1000);
    let gateway = gateway_over(provider.clone());

    gateway
        .submit_music("https://media.example/track.mp3", "Neon", "late night rain")
        .await
        .unwrap();

    assert!(
        provider
            .methods()
            .contains(&"eth_getTransactionReceipt".to_owned())
    );
}

#[tokio::test]
async fn submit_music__surfaces_a_reverted_transaction() {
    let provider = Arc::new(MockWalletProvider::new().revert_transactions());
    provider.set_submission_fee(1000);
    let gateway = gateway_over(provider);

    let result = gateway
        .submit_music("https://media.example/track.mp3", "Neon", "late night rain")
        .await;

    assert!(matches!(result, Err(GatewayError::Reverted(_))));
}

#[tokio::test]
async fn submission_fee__reads_the_normalized_fee() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_submission_fee(1000);
    let gateway = gateway_over(provider);

    let fee = gateway.submission_fee().await.unwrap();

    assert_eq!(fee.to_string(), "1000");
}

#[tokio::test]
async fn current_theme__reads_the_theme_string() {
    let provider = Arc::new(MockWalletProvider::new());
    provider.set_current_theme("Neon Nights");
    let gateway = gateway_over(provider);

    assert_eq!(gateway.current_theme().await.unwrap(), "Neon Nights");
}
