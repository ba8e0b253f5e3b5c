use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        Arc,
        Mutex,
    },
};

use alloy::{
    network::{
        EthereumWallet,
        TransactionBuilder,
    },
    primitives::{
        Address,
        Bytes,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Value,
    json,
};
use tokio::sync::{
    RwLock,
    mpsc,
};
use tracing::{
    debug,
    warn,
};

/// Network parameters pushed to the wallet on every connect. Serializes to
/// the `wallet_addEthereumChain` parameter object verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: String,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl ChainDescriptor {
    pub fn primary_rpc_url(&self) -> Result<&str, ProviderError> {
        self.rpc_urls
            .first()
            .map(String::as_str)
            .ok_or_else(|| ProviderError::InvalidParams("chain descriptor has no RPC URL".into()))
    }

    /// Numeric chain id, accepting `0x`-prefixed hex or plain decimal.
    pub fn chain_id_u64(&self) -> Result<u64, ProviderError> {
        parse_chain_id(&self.chain_id)
    }
}

pub fn parse_chain_id(raw: &str) -> Result<u64, ProviderError> {
    let trimmed = raw.trim();
    if let Some(hex_digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex_digits, 16)
            .map_err(|e| ProviderError::InvalidParams(format!("invalid hex chain id {raw:?}: {e}")))
    } else {
        trimmed
            .parse()
            .map_err(|e| ProviderError::InvalidParams(format!("invalid chain id {raw:?}: {e}")))
    }
}

pub fn chain_id_hex(id: u64) -> String {
    format!("0x{id:x}")
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum ProviderError {
    /// No wallet is available in this process; callers surface no account.
    #[error("no wallet provider available")]
    Unavailable,
    /// The user declined the request; logged, never retried.
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("provider request failed: {0}")]
    Rpc(String),
    #[error("invalid request parameters: {0}")]
    InvalidParams(String),
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
}

/// Wallet-provider surface consumed by the rest of the system: an
/// Ethereum-style `request(method, params)` plus explicit event
/// subscription. Subscribing again for the same kind replaces the previous
/// receiver; dropping the receiver unsubscribes.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn subscribe(&self, kind: ProviderEventKind) -> mpsc::UnboundedReceiver<ProviderEvent>;
}

pub struct ConnectedAccount {
    pub address: String,
    pub chain_id: String,
}

/// Bridges a wallet provider to the rest of the system: connect flow with
/// the unconditional switch to the target chain, disconnect, and the
/// pre-write chain check.
#[derive(Clone)]
pub struct ChainAdapter {
    provider: Arc<dyn WalletProvider>,
    target: ChainDescriptor,
}

impl ChainAdapter {
    pub fn new(provider: Arc<dyn WalletProvider>, target: ChainDescriptor) -> Self {
        Self { provider, target }
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    pub fn target(&self) -> &ChainDescriptor {
        &self.target
    }

    /// Requests account access and then forces the wallet onto the target
    /// chain, regardless of what it was connected to. Any failure is logged
    /// and surfaces no account.
    pub async fn connect(&self) -> Option<ConnectedAccount> {
        let accounts = match self.provider.request("eth_requestAccounts", json!([])).await {
            Ok(value) => value,
            Err(ProviderError::Rejected(reason)) => {
                warn!(%reason, "wallet connect rejected");
                return None;
            }
            Err(err) => {
                warn!(%err, "wallet connect failed");
                return None;
            }
        };
        let address = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_owned)?;

        let chain_id = match self.provider.request("eth_chainId", json!([])).await {
            Ok(value) => value.as_str().map(str::to_owned),
            Err(err) => {
                warn!(%err, "chain id query failed during connect");
                None
            }
        };
        if let Some(current) = &chain_id {
            debug!(%address, %current, "wallet connected");
        }

        // Always push the target network; no option for any other chain.
        let chain_id = match self.switch_to_target().await {
            Ok(id) => id,
            Err(err) => {
                warn!(%err, "switching to target chain failed");
                chain_id.unwrap_or_default()
            }
        };

        Some(ConnectedAccount { address, chain_id })
    }

    /// Drops the wallet session where the provider supports it; local state
    /// is cleared by the session either way.
    pub async fn disconnect(&self) {
        if let Err(err) = self.provider.request("wallet_disconnect", json!([])).await {
            debug!(%err, "wallet_disconnect unsupported or failed");
        }
    }

    /// Asks the wallet to add/select the target chain and returns the target
    /// chain id on success.
    pub async fn switch_to_target(&self) -> Result<String, ProviderError> {
        self.provider
            .request("wallet_addEthereumChain", json!([self.target]))
            .await?;
        Ok(self.target.chain_id.clone())
    }

    /// Pre-write guard: if the wallet reports a chain other than the target,
    /// issue the switch request before the caller proceeds.
    pub async fn ensure_target_chain(&self) -> Result<(), ProviderError> {
        let reported = self.provider.request("eth_chainId", json!([])).await?;
        let reported = reported
            .as_str()
            .ok_or_else(|| ProviderError::Rpc("eth_chainId did not return a string".into()))?;
        if !chain_ids_equal(reported, &self.target.chain_id) {
            warn!(%reported, target = %self.target.chain_id, "wallet on wrong chain; switching");
            self.switch_to_target().await?;
        }
        Ok(())
    }

    pub fn subscribe(&self, kind: ProviderEventKind) -> mpsc::UnboundedReceiver<ProviderEvent> {
        self.provider.subscribe(kind)
    }
}

pub fn chain_ids_equal(a: &str, b: &str) -> bool {
    match (parse_chain_id(a), parse_chain_id(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.eq_ignore_ascii_case(b),
    }
}

/// Replace-on-resubscribe listener table shared by provider implementations.
#[derive(Default)]
pub struct EventListeners {
    senders: Mutex<HashMap<ProviderEventKind, mpsc::UnboundedSender<ProviderEvent>>>,
}

impl EventListeners {
    pub fn subscribe(&self, kind: ProviderEventKind) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Inserting drops any previous sender, closing the old receiver
        // instead of stacking handlers.
        self.senders
            .lock()
            .expect("listener table poisoned")
            .insert(kind, tx);
        rx
    }

    pub fn emit(&self, event: ProviderEvent) {
        let kind = match event {
            ProviderEvent::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => ProviderEventKind::ChainChanged,
        };
        let senders = self.senders.lock().expect("listener table poisoned");
        if let Some(tx) = senders.get(&kind) {
            let _ = tx.send(event);
        }
    }
}

/// Keystore-backed wallet provider: a locally unlocked signer plus a
/// JSON-RPC node connection, answering the same request surface a browser
/// wallet would. `wallet_addEthereumChain` re-targets the node connection to
/// the descriptor's RPC URL.
pub struct NodeWalletProvider {
    signer_address: Address,
    wallet: EthereumWallet,
    inner: RwLock<DynProvider>,
    listeners: EventListeners,
}

impl NodeWalletProvider {
    pub fn new(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, ProviderError> {
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer);
        let inner = Self::build_provider(rpc_url, &wallet)?;
        Ok(Self {
            signer_address,
            wallet,
            inner: RwLock::new(inner),
            listeners: EventListeners::default(),
        })
    }

    pub fn address(&self) -> Address {
        self.signer_address
    }

    fn build_provider(rpc_url: &str, wallet: &EthereumWallet) -> Result<DynProvider, ProviderError> {
        let url = rpc_url
            .parse()
            .map_err(|e| ProviderError::InvalidParams(format!("invalid RPC URL {rpc_url:?}: {e}")))?;
        Ok(ProviderBuilder::new()
            .wallet(wallet.clone())
            .connect_http(url)
            .erased())
    }

    fn accounts_value(&self) -> Value {
        json!([self.signer_address.to_string()])
    }

    async fn chain_id(&self) -> Result<String, ProviderError> {
        let id = self
            .inner
            .read()
            .await
            .get_chain_id()
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        Ok(chain_id_hex(id))
    }

    async fn eth_call(&self, params: &Value) -> Result<Value, ProviderError> {
        let tx = call_request_from_params(params)?;
        let output = self
            .inner
            .read()
            .await
            .call(tx)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        Ok(json!(format!("0x{}", hex::encode(output))))
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        let tx = call_request_from_params(params)?.with_from(self.signer_address);
        let pending = self
            .inner
            .read()
            .await
            .send_transaction(tx)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        Ok(json!(pending.tx_hash().to_string()))
    }

    async fn transaction_receipt(&self, params: &Value) -> Result<Value, ProviderError> {
        let raw = params
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::InvalidParams("eth_getTransactionReceipt expects a hash".into())
            })?;
        let hash = TxHash::from_str(raw)
            .map_err(|e| ProviderError::InvalidParams(format!("invalid tx hash {raw:?}: {e}")))?;
        let receipt = self
            .inner
            .read()
            .await
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ProviderError::Rpc(e.to_string()))?;
        match receipt {
            Some(receipt) => serde_json::to_value(receipt)
                .map_err(|e| ProviderError::Rpc(format!("receipt serialization failed: {e}"))),
            None => Ok(Value::Null),
        }
    }

    async fn add_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let descriptor = params
            .as_array()
            .and_then(|list| list.first())
            .cloned()
            .ok_or_else(|| {
                ProviderError::InvalidParams("wallet_addEthereumChain expects a descriptor".into())
            })?;
        let descriptor: ChainDescriptor = serde_json::from_value(descriptor)
            .map_err(|e| ProviderError::InvalidParams(format!("bad chain descriptor: {e}")))?;
        let rebuilt = Self::build_provider(descriptor.primary_rpc_url()?, &self.wallet)?;
        *self.inner.write().await = rebuilt;
        self.listeners
            .emit(ProviderEvent::ChainChanged(descriptor.chain_id.clone()));
        Ok(Value::Null)
    }
}

#[async_trait]
impl WalletProvider for NodeWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            "eth_requestAccounts" => {
                self.listeners.emit(ProviderEvent::AccountsChanged(vec![
                    self.signer_address.to_string(),
                ]));
                Ok(self.accounts_value())
            }
            "eth_accounts" => Ok(self.accounts_value()),
            "eth_chainId" => Ok(json!(self.chain_id().await?)),
            "eth_call" => self.eth_call(&params).await,
            "eth_sendTransaction" => self.send_transaction(&params).await,
            "eth_getTransactionReceipt" => self.transaction_receipt(&params).await,
            "wallet_addEthereumChain" => self.add_chain(&params).await,
            "wallet_disconnect" => Ok(Value::Null),
            other => self
                .inner
                .read()
                .await
                .raw_request::<_, Value>(other.to_owned().into(), params)
                .await
                .map_err(|e| ProviderError::Rpc(e.to_string())),
        }
    }

    fn subscribe(&self, kind: ProviderEventKind) -> mpsc::UnboundedReceiver<ProviderEvent> {
        self.listeners.subscribe(kind)
    }
}

fn call_request_from_params(params: &Value) -> Result<TransactionRequest, ProviderError> {
    let call = params
        .as_array()
        .and_then(|list| list.first())
        .and_then(Value::as_object)
        .ok_or_else(|| ProviderError::InvalidParams("expected a call object".into()))?;

    let to = call
        .get("to")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::InvalidParams("call object missing `to`".into()))?;
    let to = Address::from_str(to)
        .map_err(|e| ProviderError::InvalidParams(format!("invalid `to` address {to:?}: {e}")))?;

    let mut tx = TransactionRequest::default().with_to(to);
    if let Some(data) = call.get("data").and_then(Value::as_str) {
        let data = Bytes::from_str(data)
            .map_err(|e| ProviderError::InvalidParams(format!("invalid call data: {e}")))?;
        tx = tx.with_input(data);
    }
    if let Some(value) = call.get("value").and_then(Value::as_str) {
        let digits = value.strip_prefix("0x").unwrap_or(value);
        let value = U256::from_str_radix(digits, 16)
            .map_err(|e| ProviderError::InvalidParams(format!("invalid call value: {e}")))?;
        tx = tx.with_value(value);
    }
    if let Some(from) = call.get("from").and_then(Value::as_str) {
        let from = Address::from_str(from)
            .map_err(|e| ProviderError::InvalidParams(format!("invalid `from` address: {e}")))?;
        tx = tx.with_from(from);
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chain_id__accepts_hex_and_decimal() {
        assert_eq!(parse_chain_id("0x1ABDAB8").unwrap(), 28039864);
        assert_eq!(parse_chain_id("0x1").unwrap(), 1);
        assert_eq!(parse_chain_id("28039864").unwrap(), 28039864);
        assert!(parse_chain_id("not-a-chain").is_err());
    }

    #[test]
    fn chain_ids_equal__ignores_radix_and_case() {
        assert!(chain_ids_equal("0x1abdab8", "0x1ABDAB8"));
        assert!(chain_ids_equal("28039864", "0x1ABDAB8"));
        assert!(!chain_ids_equal("0x1", "0x1ABDAB8"));
    }

    #[test]
    fn chain_descriptor__serializes_to_wallet_params() {
        let descriptor = ChainDescriptor {
            chain_id: "0x1ABDAB8".into(),
            chain_name: "Ancient8 Testnet".into(),
            rpc_urls: vec!["https://rpcv2-testnet.ancient8.gg/".into()],
            native_currency: NativeCurrency {
                name: "ETH".into(),
                symbol: "ETH".into(),
                decimals: 18,
            },
            block_explorer_urls: Vec::new(),
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["chainId"], "0x1ABDAB8");
        assert_eq!(value["rpcUrls"][0], "https://rpcv2-testnet.ancient8.gg/");
        assert_eq!(value["nativeCurrency"]["decimals"], 18);
    }

    #[tokio::test]
    async fn event_listeners__resubscribe_replaces_previous() {
        let listeners = EventListeners::default();
        let mut first = listeners.subscribe(ProviderEventKind::ChainChanged);
        let mut second = listeners.subscribe(ProviderEventKind::ChainChanged);

        listeners.emit(ProviderEvent::ChainChanged("0x1".into()));

        assert_eq!(
            second.recv().await,
            Some(ProviderEvent::ChainChanged("0x1".into()))
        );
        // The first receiver was replaced, so its channel is closed.
        assert_eq!(first.recv().await, None);
    }
}
