use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    primitives::{Address, Bytes},
};
use shared::{
    domain::parse_address,
    error::{FacadeError, SubmissionFailure},
    protocol::TransactionCall,
};
use tracing::debug;

use crate::{
    interface::{coerce_args, ContractInterface, DecodedOutputs},
    provider::{ProviderAdapter, ProviderError},
};

/// A contract address bound to its interface and a client. Immutable:
/// pointing at another address means building another binding.
#[derive(Clone)]
pub struct ContractBinding {
    address: Address,
    interface: ContractInterface,
    client: ProviderAdapter,
}

impl ContractBinding {
    pub fn bind(
        raw_address: &str,
        interface: ContractInterface,
        client: ProviderAdapter,
    ) -> Result<Self, FacadeError> {
        let address = parse_address(raw_address)?;
        Ok(Self::with_address(address, interface, client))
    }

    pub fn with_address(address: Address, interface: ContractInterface, client: ProviderAdapter) -> Self {
        Self {
            address,
            interface,
            client,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    pub fn client(&self) -> &ProviderAdapter {
        &self.client
    }

    /// Issues an `eth_call` and decodes the return tuple.
    pub async fn read(
        &self,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<DecodedOutputs, FacadeError> {
        let resolved = self
            .interface
            .function(function, args.len())
            .ok_or_else(|| FacadeError::read(function, "not part of the contract interface"))?;
        let data = resolved
            .abi_encode_input(args)
            .map_err(|err| FacadeError::read(function, err))?;

        debug!(function, contract = %self.address, "binding: read call");
        let raw = self
            .client
            .call(&TransactionCall {
                from: None,
                to: self.address,
                data: data.into(),
            })
            .await
            .map_err(|err| match err {
                ProviderError::NoWallet => FacadeError::NoWallet,
                other => FacadeError::read(function, other),
            })?;

        let values = resolved
            .abi_decode_output(&raw, true)
            .map_err(|err| FacadeError::read(function, err))?;
        Ok(DecodedOutputs::new(resolved, values))
    }

    /// Calldata for a state-changing call. Only the argument shape is checked.
    pub fn encode_write(
        &self,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<Bytes, SubmissionFailure> {
        let resolved = self
            .interface
            .function(function, args.len())
            .ok_or_else(|| SubmissionFailure::UnknownFunction(function.to_string()))?;
        resolved
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|err| SubmissionFailure::InvalidArguments {
                function: function.to_string(),
                reason: err.to_string(),
            })
    }

    /// Coerces text arguments for `function` into typed values.
    pub fn coerce_args(&self, function: &str, raw: &[&str]) -> Result<Vec<DynSolValue>, FacadeError> {
        let resolved = self.interface.function(function, raw.len()).ok_or_else(|| {
            if self.interface.has_function(function) {
                FacadeError::Submission(SubmissionFailure::InvalidArguments {
                    function: function.to_string(),
                    reason: format!("no overload takes {} argument(s)", raw.len()),
                })
            } else {
                FacadeError::Submission(SubmissionFailure::UnknownFunction(function.to_string()))
            }
        })?;
        coerce_args(resolved, raw).map_err(|reason| {
            FacadeError::Submission(SubmissionFailure::InvalidArguments {
                function: function.to_string(),
                reason,
            })
        })
    }
}

impl std::fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractBinding")
            .field("address", &self.address)
            .field("has_wallet", &self.client.has_wallet())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/binding_tests.rs"]
mod tests;
