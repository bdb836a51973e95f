use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use shared::{error::FacadeError, protocol::TransactionReceipt};
use tracing::{info, warn};

pub mod address_cache;
pub mod binding;
pub mod dispatch;
pub mod http_provider;
pub mod interface;
pub mod provider;
pub mod reads;
pub mod session;
pub mod view_scope;

pub use address_cache::AddressCache;
pub use binding::ContractBinding;
pub use dispatch::{ActionDispatcher, ConfirmationPolicy};
pub use http_provider::HttpWalletProvider;
pub use interface::{ContractInterface, InterfaceError};
pub use provider::{ProviderAdapter, ProviderError, WalletProvider};
pub use reads::{BeneficiaryPage, ReadAggregator, ReadLimits};
pub use session::{SessionState, SessionSubscription};
pub use view_scope::{ViewScope, ViewTicket};

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub limits: ReadLimits,
    pub confirmation: ConfirmationPolicy,
    /// Where the last bound address is remembered; `None` disables caching.
    pub cache: Option<AddressCache>,
}

/// Entry point for views: one session, one interface, and the read/write
/// services that operate on bindings.
pub struct DistributorClient {
    session: Arc<SessionState>,
    interface: ContractInterface,
    reads: ReadAggregator,
    dispatcher: ActionDispatcher,
    cache: Option<AddressCache>,
}

impl DistributorClient {
    pub fn new(adapter: ProviderAdapter, interface: ContractInterface, options: ClientOptions) -> Self {
        Self {
            session: SessionState::new(adapter),
            interface,
            reads: ReadAggregator::new(options.limits),
            dispatcher: ActionDispatcher::new(options.confirmation),
            cache: options.cache,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    pub fn reads(&self) -> &ReadAggregator {
        &self.reads
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Binds `raw_address` and, on success, remembers it in the cache. A
    /// cache write failure does not fail the bind.
    pub fn bind(&self, raw_address: &str) -> Result<ContractBinding, FacadeError> {
        let binding = self.binding_for(raw_address)?;
        info!(contract = %binding.address(), "client: contract bound");

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.store(binding.address()) {
                warn!(path = %cache.path().display(), error = %err, "client: failed to cache contract address");
            }
        }
        Ok(binding)
    }

    /// Binds `raw_address` without touching the cache.
    pub fn binding_for(&self, raw_address: &str) -> Result<ContractBinding, FacadeError> {
        ContractBinding::bind(
            raw_address,
            self.interface.clone(),
            self.session.adapter().clone(),
        )
    }

    /// Binding for the cached address, if one was stored earlier.
    pub fn cached_binding(&self) -> Option<ContractBinding> {
        let address = self.cache.as_ref()?.load()?;
        Some(ContractBinding::with_address(
            address,
            self.interface.clone(),
            self.session.adapter().clone(),
        ))
    }

    pub async fn dispatch(
        &self,
        binding: &ContractBinding,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatcher
            .dispatch(binding, &self.session, function, args)
            .await
    }
}

#[cfg(any(test, feature = "test-support"))]
#[path = "tests/support.rs"]
pub mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
