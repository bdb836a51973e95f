use std::time::Duration;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, U256},
};
use shared::{
    error::{ConfirmationFailure, FacadeError, SubmissionFailure},
    protocol::{TransactionCall, TransactionReceipt},
};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::{
    binding::ContractBinding,
    interface::functions,
    provider::{ProviderAdapter, ProviderError},
    session::SessionState,
};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONFIRMATION_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_CONFIRMATION_POLL,
        }
    }
}

/// Submits one write call and waits for it to be mined. Never refreshes
/// state and never retries.
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher {
    policy: ConfirmationPolicy,
}

impl ActionDispatcher {
    pub fn new(policy: ConfirmationPolicy) -> Self {
        Self { policy }
    }

    pub async fn dispatch(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<TransactionReceipt, FacadeError> {
        let from = session.signer().await?;
        let data = binding
            .encode_write(function, args)
            .map_err(FacadeError::Submission)?;

        info!(function, contract = %binding.address(), from = %from, "dispatch: submitting transaction");
        let tx_hash = binding
            .client()
            .send_transaction(&TransactionCall {
                from: Some(from),
                to: binding.address(),
                data,
            })
            .await
            .map_err(submission_error)?;

        let receipt = self.wait_for_receipt(binding.client(), tx_hash).await?;
        if !receipt.succeeded() {
            warn!(function, %tx_hash, "dispatch: transaction reverted");
            return Err(FacadeError::Confirmation(ConfirmationFailure::Reverted { tx_hash }));
        }

        info!(
            function,
            %tx_hash,
            block = ?receipt.block_number,
            "dispatch: transaction confirmed"
        );
        Ok(receipt)
    }

    async fn wait_for_receipt(
        &self,
        client: &ProviderAdapter,
        tx_hash: B256,
    ) -> Result<TransactionReceipt, FacadeError> {
        let started = Instant::now();
        loop {
            match client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(err) => {
                    return Err(FacadeError::Confirmation(ConfirmationFailure::Receipt {
                        tx_hash,
                        reason: err.to_string(),
                    }))
                }
            }
            if started.elapsed() >= self.policy.timeout {
                warn!(%tx_hash, "dispatch: confirmation timed out");
                return Err(FacadeError::Confirmation(ConfirmationFailure::TimedOut {
                    tx_hash,
                    waited_secs: self.policy.timeout.as_secs(),
                }));
            }
            sleep(self.policy.poll_interval).await;
        }
    }

    pub async fn add_beneficiary(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        wallet: Address,
        share: U256,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(
            binding,
            session,
            functions::ADD_BENEFICIARY,
            &[DynSolValue::Address(wallet), uint(share)],
        )
        .await
    }

    pub async fn remove_beneficiary(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        wallet: Address,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(
            binding,
            session,
            functions::REMOVE_BENEFICIARY,
            &[DynSolValue::Address(wallet)],
        )
        .await
    }

    pub async fn update_share(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        wallet: Address,
        share: U256,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(
            binding,
            session,
            functions::UPDATE_SHARE,
            &[DynSolValue::Address(wallet), uint(share)],
        )
        .await
    }

    pub async fn set_distribution_interval(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        interval_secs: U256,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(
            binding,
            session,
            functions::SET_DISTRIBUTION_INTERVAL,
            &[uint(interval_secs)],
        )
        .await
    }

    pub async fn set_paused(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        paused: bool,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(binding, session, functions::SET_PAUSED, &[DynSolValue::Bool(paused)])
            .await
    }

    /// `require_full_shares` asks the contract to refuse locking unless
    /// shares add up to the full denominator.
    pub async fn lock_contract(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        require_full_shares: bool,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(
            binding,
            session,
            functions::LOCK_CONTRACT,
            &[DynSolValue::Bool(require_full_shares)],
        )
        .await
    }

    pub async fn distribute_usdt(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(binding, session, functions::DISTRIBUTE_USDT, &[])
            .await
    }

    pub async fn distribute_weth(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(binding, session, functions::DISTRIBUTE_WETH, &[])
            .await
    }

    pub async fn distribute_to_user(
        &self,
        binding: &ContractBinding,
        session: &SessionState,
        user: Address,
    ) -> Result<TransactionReceipt, FacadeError> {
        self.dispatch(
            binding,
            session,
            functions::DISTRIBUTE_TO_USER,
            &[DynSolValue::Address(user)],
        )
        .await
    }
}

fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

fn submission_error(err: ProviderError) -> FacadeError {
    match err {
        ProviderError::NoWallet => FacadeError::NoWallet,
        err if err.is_user_rejection() => FacadeError::Submission(SubmissionFailure::Rejected),
        err => FacadeError::Submission(SubmissionFailure::Rpc(err.to_string())),
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
