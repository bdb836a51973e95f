use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    error::FacadeError,
    protocol::{
        methods, parse_quantity, TransactionCall, TransactionReceipt, WalletEvent,
        USER_REJECTED_CODE,
    },
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no wallet available")]
    NoWallet,
    #[error("wallet rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("wallet transport failed: {0}")]
    Transport(String),
    #[error("malformed wallet response for {method}: {reason}")]
    Malformed { method: String, reason: String },
}

impl ProviderError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED_CODE)
    }
}

/// Minimal injected-wallet surface: one request method and a change feed.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
    fn subscribe_events(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Typed client over an optional wallet. `None` models an environment with
/// no wallet injected.
#[derive(Clone)]
pub struct ProviderAdapter {
    wallet: Option<Arc<dyn WalletProvider>>,
}

impl ProviderAdapter {
    pub fn new(wallet: Arc<dyn WalletProvider>) -> Self {
        Self {
            wallet: Some(wallet),
        }
    }

    pub fn without_wallet() -> Self {
        Self { wallet: None }
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn subscribe_events(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        self.wallet.as_ref().map(|wallet| wallet.subscribe_events())
    }

    /// Asks the wallet to authorize an account; may prompt the user.
    pub async fn connect(&self) -> Result<Address, FacadeError> {
        let accounts: Vec<Address> = self
            .request_typed(methods::REQUEST_ACCOUNTS, json!([]))
            .await
            .map_err(|err| connect_error(methods::REQUEST_ACCOUNTS, err))?;
        let account = accounts.first().copied().ok_or(FacadeError::UserRejected)?;
        info!(account = %account, "wallet: account authorized");
        Ok(account)
    }

    pub async fn current_account(&self) -> Result<Option<Address>, FacadeError> {
        let accounts: Vec<Address> = self
            .request_typed(methods::ACCOUNTS, json!([]))
            .await
            .map_err(|err| connect_error(methods::ACCOUNTS, err))?;
        Ok(accounts.first().copied())
    }

    pub async fn current_network_id(&self) -> Result<u64, FacadeError> {
        let raw: String = self
            .request_typed(methods::CHAIN_ID, json!([]))
            .await
            .map_err(|err| connect_error(methods::CHAIN_ID, err))?;
        parse_quantity(&raw).ok_or_else(|| {
            warn!(raw = %raw, "wallet: unparseable chain id");
            FacadeError::NoWallet
        })
    }

    pub async fn call(&self, call: &TransactionCall) -> Result<Bytes, ProviderError> {
        self.request_typed(methods::CALL, json!([call, "latest"]))
            .await
    }

    pub async fn send_transaction(&self, call: &TransactionCall) -> Result<B256, ProviderError> {
        self.request_typed(methods::SEND_TRANSACTION, json!([call]))
            .await
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.request_typed(methods::TRANSACTION_RECEIPT, json!([tx_hash]))
            .await
    }

    async fn request_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let wallet = self.wallet.as_ref().ok_or(ProviderError::NoWallet)?;
        let value = wallet.request(method, params).await?;
        serde_json::from_value(value).map_err(|err| ProviderError::Malformed {
            method: method.to_string(),
            reason: err.to_string(),
        })
    }
}

// An unreachable or misbehaving wallet is reported the same way as a missing one.
fn connect_error(method: &str, err: ProviderError) -> FacadeError {
    if err.is_user_rejection() {
        return FacadeError::UserRejected;
    }
    if err != ProviderError::NoWallet {
        warn!(method, error = %err, "wallet: request failed");
    }
    FacadeError::NoWallet
}

#[cfg(test)]
#[path = "tests/provider_tests.rs"]
mod tests;
