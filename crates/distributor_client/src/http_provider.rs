use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use shared::protocol::{methods, parse_quantity, RpcRequest, RpcResponse, WalletEvent};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::provider::{ProviderError, WalletProvider};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on a single JSON-RPC round trip, connect included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC wallet backed by a node that holds unlocked accounts (Hardhat,
/// Anvil). Change notifications are synthesized by polling.
pub struct HttpWalletProvider {
    http: Client,
    rpc_url: Url,
    next_id: AtomicU64,
    events: broadcast::Sender<WalletEvent>,
}

impl HttpWalletProvider {
    pub fn new(rpc_url: Url, request_timeout: Duration) -> Result<Arc<Self>, ProviderError> {
        let http = Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| ProviderError::Transport(format!("failed to build http client: {err}")))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Arc::new(Self {
            http,
            rpc_url,
            next_id: AtomicU64::new(1),
            events,
        }))
    }

    pub fn from_url_str(
        rpc_url: &str,
        request_timeout: Duration,
    ) -> Result<Arc<Self>, ProviderError> {
        let url = Url::parse(rpc_url)
            .map_err(|err| ProviderError::Transport(format!("invalid rpc url '{rpc_url}': {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProviderError::Transport(format!(
                "rpc url must start with http:// or https://, got '{rpc_url}'"
            )));
        }
        Self::new(url, request_timeout)
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Polls `eth_accounts` / `eth_chainId` and publishes differences as
    /// wallet events. The task ends once the provider is dropped.
    pub fn spawn_change_poller(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_seen: Option<(Vec<Address>, u64)> = None;
            let mut reported_disconnect = false;
            loop {
                ticker.tick().await;
                let Some(provider) = Weak::upgrade(&weak) else {
                    break;
                };
                match provider.poll_wallet_state().await {
                    Ok(current) => {
                        if last_seen.is_none() && reported_disconnect {
                            // The network may have switched while the node was away.
                            info!(network_id = current.1, "wallet: node reachable again");
                            provider.publish(WalletEvent::ChainChanged {
                                network_id: current.1,
                            });
                            reported_disconnect = false;
                        }
                        if let Some((accounts, network_id)) = &last_seen {
                            if *accounts != current.0 {
                                provider.publish(WalletEvent::AccountsChanged {
                                    accounts: current.0.clone(),
                                });
                            }
                            if *network_id != current.1 {
                                provider.publish(WalletEvent::ChainChanged {
                                    network_id: current.1,
                                });
                            }
                        }
                        last_seen = Some(current);
                    }
                    Err(err) => {
                        if last_seen.take().is_some() {
                            warn!(error = %err, "wallet: node unreachable, reporting disconnect");
                            provider.publish(WalletEvent::Disconnected);
                            reported_disconnect = true;
                        }
                    }
                }
            }
            debug!("wallet: change poller stopped");
        })
    }

    async fn poll_wallet_state(&self) -> Result<(Vec<Address>, u64), ProviderError> {
        let accounts = self.request(methods::ACCOUNTS, json!([])).await?;
        let accounts: Vec<Address> =
            serde_json::from_value(accounts).map_err(|err| ProviderError::Malformed {
                method: methods::ACCOUNTS.to_string(),
                reason: err.to_string(),
            })?;
        let chain_id = self.request(methods::CHAIN_ID, json!([])).await?;
        let network_id = chain_id
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| ProviderError::Malformed {
                method: methods::CHAIN_ID.to_string(),
                reason: format!("expected hex quantity, got {chain_id}"),
            })?;
        Ok((accounts, network_id))
    }

    fn publish(&self, event: WalletEvent) {
        info!(?event, "wallet: state changed");
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, method, "wallet: rpc request");
        let response: RpcResponse = self
            .http
            .post(self.rpc_url.clone())
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| ProviderError::Transport(err.to_string()))?
            .json()
            .await
            .map_err(|err| ProviderError::Malformed {
                method: method.to_string(),
                reason: err.to_string(),
            })?;

        if let Some(error) = response.error {
            return Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/http_provider_tests.rs"]
mod tests;
