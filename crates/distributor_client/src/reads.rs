use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use futures::{stream, StreamExt, TryStreamExt};
use shared::{
    domain::{BeneficiaryRecord, ContractSnapshot},
    error::FacadeError,
};
use tracing::debug;

use crate::{binding::ContractBinding, interface::functions};

/// Enumeration cap applied when a caller does not pick one.
pub const DEFAULT_MAX_BENEFICIARIES: usize = 200;
pub const DEFAULT_READ_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    pub max_beneficiaries: usize,
    /// Indexed reads kept in flight at once.
    pub concurrency: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_beneficiaries: DEFAULT_MAX_BENEFICIARIES,
            concurrency: DEFAULT_READ_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeneficiaryPage {
    /// Count reported by the contract, possibly larger than `records.len()`.
    pub total: U256,
    pub records: Vec<BeneficiaryRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ReadAggregator {
    limits: ReadLimits,
}

impl ReadAggregator {
    pub fn new(limits: ReadLimits) -> Self {
        Self { limits }
    }

    /// All snapshot fields are read concurrently; the snapshot exists only
    /// if every read succeeded.
    pub async fn snapshot(
        &self,
        binding: &ContractBinding,
    ) -> Result<ContractSnapshot, FacadeError> {
        let (
            owner,
            total_shares,
            distribution_interval_secs,
            paused,
            locked,
            usdt_token,
            weth_token,
        ) = tokio::try_join!(
            read_address(binding, functions::OWNER),
            read_uint(binding, functions::TOTAL_SHARES),
            read_uint(binding, functions::DISTRIBUTION_INTERVAL),
            read_bool(binding, functions::IS_PAUSED),
            read_bool(binding, functions::IS_LOCKED),
            read_address(binding, functions::USDT),
            read_address(binding, functions::WETH),
        )?;

        Ok(ContractSnapshot {
            owner,
            total_shares,
            distribution_interval_secs,
            paused,
            locked,
            usdt_token,
            weth_token,
        })
    }

    pub async fn beneficiary_count(&self, binding: &ContractBinding) -> Result<U256, FacadeError> {
        read_uint(binding, functions::BENEFICIARIES_COUNT).await
    }

    /// Returns at most `min(count, max_count)` records in index order.
    pub async fn list_beneficiaries(
        &self,
        binding: &ContractBinding,
        max_count: usize,
    ) -> Result<Vec<BeneficiaryRecord>, FacadeError> {
        let count = self.beneficiary_count(binding).await?;
        self.enumerate(binding, count, max_count).await
    }

    /// Count plus the records under the configured cap.
    pub async fn beneficiary_page(
        &self,
        binding: &ContractBinding,
    ) -> Result<BeneficiaryPage, FacadeError> {
        let total = self.beneficiary_count(binding).await?;
        let records = self
            .enumerate(binding, total, self.limits.max_beneficiaries)
            .await?;
        Ok(BeneficiaryPage { total, records })
    }

    pub async fn lookup_beneficiary(
        &self,
        binding: &ContractBinding,
        wallet: Address,
    ) -> Result<BeneficiaryRecord, FacadeError> {
        let outputs = binding
            .read(functions::BENEFICIARY, &[DynSolValue::Address(wallet)])
            .await?;
        let field_error = |reason: String| FacadeError::read(functions::BENEFICIARY, reason);

        if !outputs.boolean("exists", 3).map_err(field_error)? {
            return Err(FacadeError::NotFound(wallet));
        }
        Ok(BeneficiaryRecord {
            wallet,
            share: outputs.uint("share", 0).map_err(field_error)?,
            last_claim_usdt: outputs.uint("lastClaimUSDT", 1).map_err(field_error)?,
            last_claim_weth: outputs.uint("lastClaimWETH", 2).map_err(field_error)?,
        })
    }

    async fn enumerate(
        &self,
        binding: &ContractBinding,
        count: U256,
        max_count: usize,
    ) -> Result<Vec<BeneficiaryRecord>, FacadeError> {
        let end = count.saturating_to::<usize>().min(max_count);
        debug!(contract = %binding.address(), %count, end, "reads: enumerating beneficiaries");

        stream::iter(0..end)
            .map(|index| read_beneficiary_at(binding, index))
            .buffered(self.limits.concurrency.max(1))
            .try_collect()
            .await
    }
}

async fn read_beneficiary_at(
    binding: &ContractBinding,
    index: usize,
) -> Result<BeneficiaryRecord, FacadeError> {
    let outputs = binding
        .read(
            functions::BENEFICIARY_BY_INDEX,
            &[DynSolValue::Uint(U256::from(index), 256)],
        )
        .await?;
    let field_error = |reason: String| FacadeError::read(functions::BENEFICIARY_BY_INDEX, reason);
    Ok(BeneficiaryRecord {
        wallet: outputs.address("wallet", 0).map_err(field_error)?,
        share: outputs.uint("share", 1).map_err(field_error)?,
        last_claim_usdt: outputs.uint("lastClaimUSDT", 2).map_err(field_error)?,
        last_claim_weth: outputs.uint("lastClaimWETH", 3).map_err(field_error)?,
    })
}

async fn read_address(binding: &ContractBinding, function: &str) -> Result<Address, FacadeError> {
    binding
        .read(function, &[])
        .await?
        .address("", 0)
        .map_err(|reason| FacadeError::read(function, reason))
}

async fn read_uint(binding: &ContractBinding, function: &str) -> Result<U256, FacadeError> {
    binding
        .read(function, &[])
        .await?
        .uint("", 0)
        .map_err(|reason| FacadeError::read(function, reason))
}

async fn read_bool(binding: &ContractBinding, function: &str) -> Result<bool, FacadeError> {
    binding
        .read(function, &[])
        .await?
        .boolean("", 0)
        .map_err(|reason| FacadeError::read(function, reason))
}

#[cfg(test)]
#[path = "tests/reads_tests.rs"]
mod tests;
