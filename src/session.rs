use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::watch;
use tracing::{
    debug,
    info,
};

use crate::{
    gateway::ContractGateway,
    provider::{
        ChainAdapter,
        ChainDescriptor,
        ProviderEvent,
        ProviderEventKind,
        WalletProvider,
        chain_ids_equal,
    },
};

/// Mutable session fields published to subscribers. Account and chain id
/// mirror the wallet; nothing here survives a process restart and no
/// reconnection happens without an explicit user action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub account: Option<String>,
    pub chain_id: Option<String>,
}

/// Owned session object: holds the wallet provider (injectable, may be
/// absent), the chain adapter and the contract gateway, and fans state
/// changes out through a watch channel. Lives for the process lifetime.
pub struct Session {
    adapter: Option<ChainAdapter>,
    gateway: Option<ContractGateway>,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        target: ChainDescriptor,
        contract_address: Address,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let adapter = provider.map(|provider| ChainAdapter::new(provider, target));
        let gateway = adapter
            .clone()
            .map(|adapter| ContractGateway::new(adapter, contract_address));
        Self {
            adapter,
            gateway,
            state,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn gateway(&self) -> Option<&ContractGateway> {
        self.gateway.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn account(&self) -> Option<String> {
        self.state.borrow().account.clone()
    }

    pub fn target_chain(&self) -> Option<&ChainDescriptor> {
        self.adapter.as_ref().map(ChainAdapter::target)
    }

    /// True when an account is connected and the wallet reports the target
    /// chain; the screens fall back to the wallet card otherwise.
    pub fn on_target_chain(&self) -> bool {
        let state = self.state.borrow();
        match (&state.account, &state.chain_id, self.target_chain()) {
            (Some(_), Some(current), Some(target)) => chain_ids_equal(current, &target.chain_id),
            _ => false,
        }
    }

    /// Connect flow: account request, forced target-chain switch, then a
    /// fresh event pump for the wallet's change notifications. Returns
    /// whether an account was established; failures surface no account.
    pub async fn connect(&self) -> bool {
        let Some(adapter) = &self.adapter else {
            debug!("connect requested without a wallet provider");
            return false;
        };
        let Some(connected) = adapter.connect().await else {
            return false;
        };
        info!(account = %connected.address, chain = %connected.chain_id, "session connected");
        self.state.send_replace(SessionState {
            account: Some(connected.address),
            chain_id: Some(connected.chain_id),
        });
        self.spawn_event_pump(adapter.clone());
        true
    }

    pub async fn disconnect(&self) {
        if let Some(adapter) = &self.adapter {
            adapter.disconnect().await;
        }
        self.state.send_replace(SessionState::default());
        info!("session disconnected");
    }

    /// Forwards accountsChanged/chainChanged into the watch state. The
    /// adapter's subscribe replaces previous listeners, so the pump spawned
    /// by an earlier connect sees its receivers close and exits.
    fn spawn_event_pump(&self, adapter: ChainAdapter) {
        let mut accounts = adapter.subscribe(ProviderEventKind::AccountsChanged);
        let mut chains = adapter.subscribe(ProviderEventKind::ChainChanged);
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = accounts.recv() => match event {
                        Some(ProviderEvent::AccountsChanged(list)) => {
                            state.send_modify(|s| s.account = list.first().cloned());
                        }
                        Some(_) => {}
                        None => break,
                    },
                    event = chains.recv() => match event {
                        Some(ProviderEvent::ChainChanged(chain_id)) => {
                            state.send_modify(|s| s.chain_id = Some(chain_id));
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!("session event pump replaced");
        });
    }
}
