//! Contract panel: owns the current binding, its view generation and the
//! last applied snapshot / beneficiary page.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use distributor_client::{
    BeneficiaryPage, ContractBinding, DistributorClient, ViewScope, ViewTicket,
};
use shared::{
    domain::{parse_address, BeneficiaryRecord, ContractSnapshot, Session},
    error::FacadeError,
    protocol::TransactionReceipt,
};
use tracing::{debug, info, warn};

use super::events::{PanelContext, PanelError, PanelEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelRole {
    Owner,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    AddBeneficiary { wallet: Address, share: U256 },
    RemoveBeneficiary { wallet: Address },
    UpdateShare { wallet: Address, share: U256 },
    SetInterval { secs: U256 },
    SetPaused(bool),
    Lock { require_full_shares: bool },
    DistributeUsdt,
    DistributeWeth,
    DistributeToUser { user: Address },
}

impl PanelAction {
    pub fn function(&self) -> &'static str {
        use distributor_client::interface::functions;
        match self {
            Self::AddBeneficiary { .. } => functions::ADD_BENEFICIARY,
            Self::RemoveBeneficiary { .. } => functions::REMOVE_BENEFICIARY,
            Self::UpdateShare { .. } => functions::UPDATE_SHARE,
            Self::SetInterval { .. } => functions::SET_DISTRIBUTION_INTERVAL,
            Self::SetPaused(_) => functions::SET_PAUSED,
            Self::Lock { .. } => functions::LOCK_CONTRACT,
            Self::DistributeUsdt => functions::DISTRIBUTE_USDT,
            Self::DistributeWeth => functions::DISTRIBUTE_WETH,
            Self::DistributeToUser { .. } => functions::DISTRIBUTE_TO_USER,
        }
    }

    pub fn is_owner_action(&self) -> bool {
        !matches!(
            self,
            Self::DistributeUsdt | Self::DistributeWeth | Self::DistributeToUser { .. }
        )
    }
}

/// Reads gathered under one view ticket, applied later only if the ticket
/// is still current.
#[derive(Debug)]
pub struct PanelData {
    ticket: ViewTicket,
    snapshot: ContractSnapshot,
    page: BeneficiaryPage,
}

pub struct PanelController {
    client: Arc<DistributorClient>,
    expected_chain_id: u64,
    default_contract: Option<String>,
    binding: Option<ContractBinding>,
    scope: ViewScope,
    snapshot: Option<ContractSnapshot>,
    page: Option<BeneficiaryPage>,
}

impl PanelController {
    pub fn new(client: Arc<DistributorClient>, expected_chain_id: u64) -> Self {
        Self {
            client,
            expected_chain_id,
            default_contract: None,
            binding: None,
            scope: ViewScope::new(),
            snapshot: None,
            page: None,
        }
    }

    /// Address opened by [`Self::restore_cached`] when the cache is empty.
    pub fn with_default_contract(mut self, raw_address: Option<String>) -> Self {
        self.default_contract = raw_address;
        self
    }

    pub fn client(&self) -> &Arc<DistributorClient> {
        &self.client
    }

    pub fn binding(&self) -> Option<&ContractBinding> {
        self.binding.as_ref()
    }

    pub fn snapshot(&self) -> Option<&ContractSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn page(&self) -> Option<&BeneficiaryPage> {
        self.page.as_ref()
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    /// Binds a new address. The previous binding, its data and any read
    /// still in flight for it are dropped only when the new address is valid.
    pub fn bind(&mut self, raw_address: &str) -> Result<(), PanelError> {
        let binding = self
            .client
            .bind(raw_address)
            .map_err(|err| PanelError::from_facade(PanelContext::Load, &err))?;
        self.replace_binding(Some(binding));
        Ok(())
    }

    /// Rebinds the cached address, falling back to the configured default
    /// contract. The default is not written to the cache.
    pub fn restore_cached(&mut self) -> bool {
        if let Some(binding) = self.client.cached_binding() {
            info!(contract = %binding.address(), "panel: restored cached contract");
            self.replace_binding(Some(binding));
            return true;
        }

        let Some(raw) = self.default_contract.as_deref() else {
            return false;
        };
        match self.client.binding_for(raw) {
            Ok(binding) => {
                info!(contract = %binding.address(), "panel: opened default contract");
                self.replace_binding(Some(binding));
                true
            }
            Err(err) => {
                warn!(error = %err, "panel: ignoring invalid default contract");
                false
            }
        }
    }

    pub fn teardown(&mut self) {
        self.replace_binding(None);
    }

    pub async fn fetch(&self) -> Result<PanelData, PanelError> {
        let binding = self.require_binding(PanelContext::Refresh)?;
        let ticket = self.scope.ticket();
        let reads = self.client.reads();
        let (snapshot, page) =
            tokio::try_join!(reads.snapshot(binding), reads.beneficiary_page(binding))
                .map_err(|err| PanelError::from_facade(PanelContext::Refresh, &err))?;
        Ok(PanelData {
            ticket,
            snapshot,
            page,
        })
    }

    pub fn apply(&mut self, data: PanelData) -> PanelEvent {
        if !data.ticket.is_current() {
            warn!("panel: discarding reads for a superseded view");
            return PanelEvent::StaleDiscarded;
        }
        debug!(
            total = %data.page.total,
            shown = data.page.records.len(),
            "panel: applied contract data"
        );
        self.snapshot = Some(data.snapshot);
        self.page = Some(data.page);
        PanelEvent::Refreshed
    }

    pub async fn refresh(&mut self) -> PanelEvent {
        match self.fetch().await {
            Ok(data) => self.apply(data),
            Err(err) => PanelEvent::Failed(err),
        }
    }

    pub async fn lookup(&self, raw_wallet: &str) -> Result<BeneficiaryRecord, PanelError> {
        let to_panel = |err: FacadeError| PanelError::from_facade(PanelContext::Lookup, &err);
        let binding = self.require_binding(PanelContext::Lookup)?;
        let wallet = parse_address(raw_wallet).map_err(to_panel)?;
        self.client
            .reads()
            .lookup_beneficiary(binding, wallet)
            .await
            .map_err(to_panel)
    }

    /// Owner when the connected account owns the loaded contract.
    pub async fn role(&self) -> PanelRole {
        let session = self.client.session().current().await;
        match &self.snapshot {
            Some(snapshot) if snapshot.is_owned_by(session.signer()) => PanelRole::Owner,
            _ => PanelRole::User,
        }
    }

    pub async fn connect(&self) -> Result<Session, PanelError> {
        self.client
            .session()
            .connect()
            .await
            .map_err(|err| PanelError::from_facade(PanelContext::Connect, &err))
    }

    /// Reuses an already authorized account, prompting only when there is none.
    pub async fn ensure_signer(&self) -> Result<Session, PanelError> {
        let session = self.client.session();
        match session.restore().await {
            Ok(current) if current.signer().is_some() => Ok(current),
            Ok(_) => self.connect().await,
            Err(err) => Err(PanelError::from_facade(PanelContext::Connect, &err)),
        }
    }

    /// Whether the session is on the configured network.
    pub async fn on_expected_network(&self) -> bool {
        self.client
            .session()
            .current()
            .await
            .on_expected_network(self.expected_chain_id)
    }

    /// Dispatches `action` and, once it is confirmed, reloads the panel.
    pub async fn run(&mut self, action: PanelAction) -> Result<TransactionReceipt, PanelError> {
        let binding = self.require_binding(PanelContext::Action)?.clone();
        if action.is_owner_action() && self.role().await != PanelRole::Owner {
            debug!(function = action.function(), "panel: owner action from a non-owner account");
        }

        let to_panel = |err: FacadeError| PanelError::from_facade(PanelContext::Action, &err);
        let dispatcher = self.client.dispatcher();
        let session = self.client.session();
        let receipt = match action {
            PanelAction::AddBeneficiary { wallet, share } => {
                dispatcher.add_beneficiary(&binding, session, wallet, share).await
            }
            PanelAction::RemoveBeneficiary { wallet } => {
                dispatcher.remove_beneficiary(&binding, session, wallet).await
            }
            PanelAction::UpdateShare { wallet, share } => {
                dispatcher.update_share(&binding, session, wallet, share).await
            }
            PanelAction::SetInterval { secs } => {
                dispatcher
                    .set_distribution_interval(&binding, session, secs)
                    .await
            }
            PanelAction::SetPaused(paused) => dispatcher.set_paused(&binding, session, paused).await,
            PanelAction::Lock {
                require_full_shares,
            } => {
                dispatcher
                    .lock_contract(&binding, session, require_full_shares)
                    .await
            }
            PanelAction::DistributeUsdt => dispatcher.distribute_usdt(&binding, session).await,
            PanelAction::DistributeWeth => dispatcher.distribute_weth(&binding, session).await,
            PanelAction::DistributeToUser { user } => {
                dispatcher.distribute_to_user(&binding, session, user).await
            }
        }
        .map_err(to_panel)?;

        self.after_dispatch().await;
        Ok(receipt)
    }

    /// Free-form call of any write function in the interface, with text
    /// arguments coerced to the parameter types.
    pub async fn send(
        &mut self,
        function: &str,
        raw_args: &[&str],
    ) -> Result<TransactionReceipt, PanelError> {
        let binding = self.require_binding(PanelContext::Action)?.clone();
        let to_panel = |err: FacadeError| PanelError::from_facade(PanelContext::Action, &err);
        let args = binding.coerce_args(function, raw_args).map_err(to_panel)?;
        let receipt = self
            .client
            .dispatch(&binding, function, &args)
            .await
            .map_err(to_panel)?;
        self.after_dispatch().await;
        Ok(receipt)
    }

    async fn after_dispatch(&mut self) {
        if let PanelEvent::Failed(err) = self.refresh().await {
            warn!(error = %err, "panel: refresh after confirmed transaction failed");
        }
    }

    fn require_binding(&self, context: PanelContext) -> Result<&ContractBinding, PanelError> {
        self.binding
            .as_ref()
            .ok_or_else(|| PanelError::no_contract(context))
    }

    fn replace_binding(&mut self, binding: Option<ContractBinding>) {
        self.scope.invalidate();
        self.binding = binding;
        self.snapshot = None;
        self.page = None;
    }
}

#[cfg(test)]
#[path = "tests/panel_tests.rs"]
mod tests;
