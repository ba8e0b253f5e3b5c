use std::{str::FromStr, sync::Arc, time::Duration};

use alloy::primitives::Address;
use mural_contest::{
    deployment::{DEFAULT_CONTRACT_ADDRESS, ancient8_testnet},
    provider::ProviderEvent,
    session::Session,
    test_helpers::{MockWalletProvider, OTHER_ACCOUNT, TEST_ACCOUNT},
};
use tokio::time::timeout;

fn contract_address() -> Address {
    Address::from_str(DEFAULT_CONTRACT_ADDRESS).unwrap()
}

#[tokio::test]
async fn connect__establishes_account_and_forces_target_chain() {
    // given a wallet sitting on mainnet
    let provider = Arc::new(MockWalletProvider::new().with_chain_id("0x1"));
    let session = Session::new(Some(provider.clone()), ancient8_testnet(), contract_address());

    // when
    let connected = session.connect().await;

    // then
    assert!(connected);
    let state = session.snapshot();
    assert_eq!(state.account.as_deref(), Some(TEST_ACCOUNT));
    assert_eq!(state.chain_id.as_deref(), Some("0x1ABDAB8"));
    assert!(session.on_target_chain());
    assert!(
        provider
            .methods()
            .contains(&"wallet_addEthereumChain".to_owned()),
        "connect must push the target chain unconditionally"
    );
}

#[tokio::test]
async fn connect__user_rejection_surfaces_no_account() {
    let provider = Arc::new(MockWalletProvider::new().reject_connect());
    let session = Session::new(Some(provider), ancient8_testnet(), contract_address());

    let connected = session.connect().await;

    assert!(!connected);
    assert_eq!(session.snapshot().account, None);
}

#[tokio::test]
async fn connect__without_provider_is_a_noop() {
    let session = Session::new(None, ancient8_testnet(), contract_address());

    assert!(!session.has_provider());
    assert!(!session.connect().await);
    assert_eq!(session.snapshot().account, None);
    assert!(session.gateway().is_none());
}

#[tokio::test]
async fn accounts_changed_event__updates_session_state() {
    let provider = Arc::new(MockWalletProvider::new());
    let session = Session::new(Some(provider.clone()), ancient8_testnet(), contract_address());
    assert!(session.connect().await);

    let mut state_rx = session.subscribe();
    provider.emit(ProviderEvent::AccountsChanged(vec![OTHER_ACCOUNT.to_owned()]));

    timeout(Duration::from_secs(1), state_rx.changed())
        .await
        .expect("session state change timed out")
        .expect("session state channel closed");
    assert_eq!(session.snapshot().account.as_deref(), Some(OTHER_ACCOUNT));
}

#[tokio::test]
async fn chain_changed_event__leaves_target_chain_check() {
    let provider = Arc::new(MockWalletProvider::new());
    let session = Session::new(Some(provider.clone()), ancient8_testnet(), contract_address());
    assert!(session.connect().await);
    assert!(session.on_target_chain());

    let mut state_rx = session.subscribe();
    provider.emit(ProviderEvent::ChainChanged("0x1".to_owned()));

    timeout(Duration::from_secs(1), state_rx.changed())
        .await
        .expect("session state change timed out")
        .expect("session state channel closed");
    assert_eq!(session.snapshot().chain_id.as_deref(), Some("0x1"));
    assert!(!session.on_target_chain());
}

#[tokio::test]
async fn disconnect__clears_account_and_chain() {
    let provider = Arc::new(MockWalletProvider::new());
    let session = Session::new(Some(provider.clone()), ancient8_testnet(), contract_address());
    assert!(session.connect().await);

    session.disconnect().await;

    let state = session.snapshot();
    assert_eq!(state.account, None);
    assert_eq!(state.chain_id, None);
    assert!(provider.methods().contains(&"wallet_disconnect".to_owned()));
}
