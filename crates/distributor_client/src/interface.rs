//! Contract interface description: a JSON ABI resolved by function name.

use std::{fs, path::Path, sync::Arc};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{Function, JsonAbi},
    primitives::{Address, U256},
};
use serde::Deserialize;
use thiserror::Error;

const BUNDLED_ARTIFACT: &str = include_str!("../abi/GroupTokenDistributionDecentralized.json");

/// Function names the façade relies on.
pub mod functions {
    pub const OWNER: &str = "owner";
    pub const TOTAL_SHARES: &str = "totalShares";
    pub const DISTRIBUTION_INTERVAL: &str = "distributionInterval";
    pub const IS_PAUSED: &str = "isPaused";
    pub const IS_LOCKED: &str = "isLocked";
    pub const USDT: &str = "usdt";
    pub const WETH: &str = "weth";
    pub const BENEFICIARIES_COUNT: &str = "beneficiariesCount";
    pub const BENEFICIARY_BY_INDEX: &str = "getBeneficiaryByIndex";
    pub const BENEFICIARY: &str = "getBeneficiary";

    pub const ADD_BENEFICIARY: &str = "addBeneficiary";
    pub const REMOVE_BENEFICIARY: &str = "removeBeneficiary";
    pub const UPDATE_SHARE: &str = "updateShare";
    pub const SET_DISTRIBUTION_INTERVAL: &str = "setDistributionInterval";
    pub const SET_PAUSED: &str = "setPaused";
    pub const LOCK_CONTRACT: &str = "lockContract";
    pub const DISTRIBUTE_USDT: &str = "distributeUSDT";
    pub const DISTRIBUTE_WETH: &str = "distributeWETH";
    pub const DISTRIBUTE_TO_USER: &str = "distributeToUser";
}

#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("failed to read interface artifact '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid interface description: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Artifact {
    Hardhat { abi: JsonAbi },
    Bare(JsonAbi),
}

/// Immutable, cheaply cloneable interface description.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractInterface {
    abi: Arc<JsonAbi>,
}

impl ContractInterface {
    /// Accepts a bare ABI array or a Hardhat artifact with an `abi` key.
    pub fn from_json(raw: &str) -> Result<Self, InterfaceError> {
        let abi = match serde_json::from_str::<Artifact>(raw)? {
            Artifact::Hardhat { abi } | Artifact::Bare(abi) => abi,
        };
        Ok(Self { abi: Arc::new(abi) })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InterfaceError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| InterfaceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// The interface compiled into this crate.
    pub fn bundled() -> Result<Self, InterfaceError> {
        Self::from_json(BUNDLED_ARTIFACT)
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Resolves `name`, picking the overload whose arity matches.
    pub fn function(&self, name: &str, arity: usize) -> Option<&Function> {
        self.abi
            .function(name)?
            .iter()
            .find(|function| function.inputs.len() == arity)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi.function(name).is_some()
    }
}

/// Converts text arguments into values of the function's parameter types.
pub fn coerce_args(function: &Function, raw: &[&str]) -> Result<Vec<DynSolValue>, String> {
    if raw.len() != function.inputs.len() {
        return Err(format!(
            "expected {} argument(s), got {}",
            function.inputs.len(),
            raw.len()
        ));
    }
    function
        .inputs
        .iter()
        .zip(raw)
        .map(|(param, raw)| {
            let ty: DynSolType = param.resolve().map_err(|err| err.to_string())?;
            ty.coerce_str(raw.trim())
                .map_err(|err| format!("`{}` ({}): {err}", param.name, param.ty))
        })
        .collect()
}

/// Decoded return values, addressable by output name with a positional
/// fallback for unnamed outputs.
#[derive(Debug, Clone)]
pub struct DecodedOutputs {
    function: String,
    names: Vec<String>,
    values: Vec<DynSolValue>,
}

impl DecodedOutputs {
    pub(crate) fn new(function: &Function, values: Vec<DynSolValue>) -> Self {
        Self {
            function: function.name.clone(),
            names: function.outputs.iter().map(|p| p.name.clone()).collect(),
            values,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn values(&self) -> &[DynSolValue] {
        &self.values
    }

    fn field(&self, name: &str, position: usize) -> Result<&DynSolValue, String> {
        let index = self
            .names
            .iter()
            .position(|candidate| candidate == name)
            .unwrap_or(position);
        self.values
            .get(index)
            .ok_or_else(|| format!("missing output `{name}` (#{position})"))
    }

    pub fn address(&self, name: &str, position: usize) -> Result<Address, String> {
        self.field(name, position)?
            .as_address()
            .ok_or_else(|| format!("output `{name}` is not an address"))
    }

    pub fn uint(&self, name: &str, position: usize) -> Result<U256, String> {
        self.field(name, position)?
            .as_uint()
            .map(|(value, _bits)| value)
            .ok_or_else(|| format!("output `{name}` is not an unsigned integer"))
    }

    pub fn boolean(&self, name: &str, position: usize) -> Result<bool, String> {
        self.field(name, position)?
            .as_bool()
            .ok_or_else(|| format!("output `{name}` is not a bool"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_interface_exposes_every_function_the_facade_calls() {
        let interface = ContractInterface::bundled().expect("bundled abi");
        for name in [
            functions::OWNER,
            functions::TOTAL_SHARES,
            functions::DISTRIBUTION_INTERVAL,
            functions::IS_PAUSED,
            functions::IS_LOCKED,
            functions::USDT,
            functions::WETH,
            functions::BENEFICIARIES_COUNT,
            functions::BENEFICIARY_BY_INDEX,
            functions::BENEFICIARY,
            functions::ADD_BENEFICIARY,
            functions::REMOVE_BENEFICIARY,
            functions::UPDATE_SHARE,
            functions::SET_DISTRIBUTION_INTERVAL,
            functions::SET_PAUSED,
            functions::LOCK_CONTRACT,
            functions::DISTRIBUTE_USDT,
            functions::DISTRIBUTE_WETH,
            functions::DISTRIBUTE_TO_USER,
        ] {
            assert!(interface.has_function(name), "missing {name}");
        }
    }

    #[test]
    fn accepts_bare_abi_arrays() {
        let interface = ContractInterface::from_json(
            r#"[{"type":"function","name":"owner","inputs":[],"outputs":[{"name":"","type":"address"}],"stateMutability":"view"}]"#,
        )
        .expect("bare abi");
        assert!(interface.function("owner", 0).is_some());
        assert!(interface.function("owner", 1).is_none());
    }

    #[test]
    fn rejects_non_abi_json() {
        assert!(matches!(
            ContractInterface::from_json(r#"{"bytecode":"0x00"}"#),
            Err(InterfaceError::Parse(_))
        ));
    }

    #[test]
    fn coerces_text_arguments_to_parameter_types() {
        let interface = ContractInterface::bundled().expect("bundled abi");
        let function = interface
            .function(functions::ADD_BENEFICIARY, 2)
            .expect("addBeneficiary");
        let values = coerce_args(
            function,
            &["0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed", "2500"],
        )
        .expect("coerce");
        assert_eq!(values[1].as_uint(), Some((U256::from(2500), 256)));

        let err = coerce_args(function, &["not-an-address", "1"]).expect_err("bad address");
        assert!(err.contains("wallet"), "unexpected error: {err}");
        assert!(coerce_args(function, &["0x00"]).is_err());
    }
}
