//! Scripted wallet provider for integration tests: canned contract
//! responses keyed by call selector, a request log for asserting call
//! ordering, and manual event injection.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use alloy::{
    primitives::{
        Address,
        U256,
    },
    sol_types::{
        SolCall,
        SolValue,
    },
};
use async_trait::async_trait;
use serde_json::{
    Value,
    json,
};
use tokio::sync::mpsc;

use crate::{
    contest_types::MusicContest,
    provider::{
        EventListeners,
        ProviderError,
        ProviderEvent,
        ProviderEventKind,
        WalletProvider,
    },
};

pub const TEST_ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
pub const OTHER_ACCOUNT: &str = "0x2222222222222222222222222222222222222222";

pub fn test_address(byte: u8) -> Address {
    Address::from([byte; 20])
}

#[derive(Default)]
pub struct MockWalletProvider {
    chain_id: Mutex<String>,
    accounts: Mutex<Vec<String>>,
    call_responses: Mutex<HashMap<[u8; 4], Vec<u8>>>,
    requests: Mutex<Vec<(String, Value)>>,
    listeners: EventListeners,
    reject_accounts: Mutex<bool>,
    revert_transactions: Mutex<bool>,
    tx_counter: Mutex<u64>,
}

impl MockWalletProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        *provider.chain_id.lock().unwrap() = "0x1ABDAB8".to_owned();
        *provider.accounts.lock().unwrap() = vec![TEST_ACCOUNT.to_owned()];
        provider
    }

    pub fn with_chain_id(self, chain_id: &str) -> Self {
        *self.chain_id.lock().unwrap() = chain_id.to_owned();
        self
    }

    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        *self.accounts.lock().unwrap() = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Makes `eth_requestAccounts` fail as a user rejection.
    pub fn reject_connect(self) -> Self {
        *self.reject_accounts.lock().unwrap() = true;
        self
    }

    pub fn revert_transactions(self) -> Self {
        *self.revert_transactions.lock().unwrap() = true;
        self
    }

    pub fn on_call(&self, selector: [u8; 4], response: Vec<u8>) {
        self.call_responses.lock().unwrap().insert(selector, response);
    }

    pub fn set_submission_fee(&self, fee: u64) {
        self.on_call(
            MusicContest::SUBMISSION_FEECall::SELECTOR,
            (U256::from(fee),).abi_encode_params(),
        );
    }

    pub fn set_current_theme(&self, theme: &str) {
        self.on_call(
            MusicContest::currentThemeCall::SELECTOR,
            (theme.to_owned(),).abi_encode_params(),
        );
    }

    #[allow(clippy::type_complexity)]
    pub fn set_submissions(
        &self,
        submissions: &[(Address, &str, &str)],
        total_votes: u64,
        total_funds: u64,
        started_at: u64,
        voters: &[Address],
    ) {
        let entries: Vec<MusicContest::SubmissionOverview> = submissions
            .iter()
            .map(|(submitter, url, theme)| MusicContest::SubmissionOverview {
                submitter: *submitter,
                musicUrl: (*url).to_owned(),
                theme: (*theme).to_owned(),
            })
            .collect();
        let encoded = (
            entries,
            U256::from(total_votes),
            U256::from(total_funds),
            U256::from(started_at),
            voters.to_vec(),
        )
            .abi_encode_params();
        self.on_call(MusicContest::getSubmissionsCall::SELECTOR, encoded);
    }

    pub fn set_winners(&self, winners: Vec<MusicContest::Winner>) {
        self.on_call(
            MusicContest::getWinnersCall::SELECTOR,
            (winners,).abi_encode_params(),
        );
    }

    pub fn emit(&self, event: ProviderEvent) {
        self.listeners.emit(event);
    }

    /// Every request made so far, in order.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|(method, _)| method)
            .collect()
    }

    fn handle_call(&self, params: &Value) -> Result<Value, ProviderError> {
        let data = params
            .as_array()
            .and_then(|list| list.first())
            .and_then(|call| call.get("data"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidParams("eth_call without data".into()))?;
        let data = hex::decode(data.strip_prefix("0x").unwrap_or(data))
            .map_err(|e| ProviderError::InvalidParams(format!("bad call data: {e}")))?;
        if data.len() < 4 {
            return Err(ProviderError::InvalidParams("call data too short".into()));
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        let responses = self.call_responses.lock().unwrap();
        let response = responses
            .get(&selector)
            .ok_or_else(|| ProviderError::Rpc(format!("no scripted response for {selector:02x?}")))?;
        Ok(json!(format!("0x{}", hex::encode(response))))
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_owned(), params.clone()));
        match method {
            "eth_requestAccounts" => {
                if *self.reject_accounts.lock().unwrap() {
                    return Err(ProviderError::Rejected("user denied account access".into()));
                }
                let accounts = self.accounts.lock().unwrap().clone();
                self.listeners
                    .emit(ProviderEvent::AccountsChanged(accounts.clone()));
                Ok(json!(accounts))
            }
            "eth_accounts" => Ok(json!(self.accounts.lock().unwrap().clone())),
            "eth_chainId" => Ok(json!(self.chain_id.lock().unwrap().clone())),
            "eth_call" => self.handle_call(&params),
            "eth_sendTransaction" => {
                let mut counter = self.tx_counter.lock().unwrap();
                *counter += 1;
                Ok(json!(format!("0x{:064x}", *counter)))
            }
            "eth_getTransactionReceipt" => {
                let status = if *self.revert_transactions.lock().unwrap() {
                    "0x0"
                } else {
                    "0x1"
                };
                Ok(json!({ "status": status }))
            }
            "wallet_addEthereumChain" => {
                let chain_id = params
                    .as_array()
                    .and_then(|list| list.first())
                    .and_then(|descriptor| descriptor.get("chainId"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProviderError::InvalidParams("descriptor missing chainId".into())
                    })?
                    .to_owned();
                *self.chain_id.lock().unwrap() = chain_id.clone();
                self.listeners.emit(ProviderEvent::ChainChanged(chain_id));
                Ok(Value::Null)
            }
            "wallet_disconnect" => Ok(Value::Null),
            other => Err(ProviderError::Rpc(format!("unsupported method {other}"))),
        }
    }

    fn subscribe(&self, kind: ProviderEventKind) -> mpsc::UnboundedReceiver<ProviderEvent> {
        self.listeners.subscribe(kind)
    }
}

pub fn winner(
    submitter: Address,
    theme: &str,
    prompt: &str,
    votes: u64,
    payout: u64,
    timestamp: u64,
    voter_share: u64,
) -> MusicContest::Winner {
    MusicContest::Winner {
        submitter,
        musicUrl: format!("https://media.example/{theme}.mp3"),
        theme: theme.to_owned(),
        prompt: prompt.to_owned(),
        votes: U256::from(votes),
        payout: U256::from(payout),
        timestamp: U256::from(timestamp),
        voterShare: U256::from(voter_share),
    }
}
