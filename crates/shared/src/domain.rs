use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::FacadeError;

/// Shares are expressed out of this many units (basis points).
pub const SHARE_DENOMINATOR: u64 = 10_000;

/// Parses a user-supplied address.
///
/// Accepts `0x` followed by exactly 40 hex digits, with no surrounding
/// whitespace. All-lowercase and all-uppercase digits are taken as-is; mixed
/// case must be a valid EIP-55 checksum. Nothing is looked up on chain.
pub fn parse_address(raw: &str) -> Result<Address, FacadeError> {
    let invalid = || FacadeError::InvalidAddress(raw.to_string());
    let digits = raw.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let address = digits.parse::<Address>().map_err(|_| invalid())?;

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *digits {
        return Err(invalid());
    }

    Ok(address)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub phase: SessionPhase,
    pub account: Option<Address>,
    pub network_id: Option<u64>,
}

impl Session {
    /// The account allowed to sign, present only while connected.
    pub fn signer(&self) -> Option<Address> {
        match self.phase {
            SessionPhase::Connected => self.account,
            _ => None,
        }
    }

    /// `expected == 0` accepts any network.
    pub fn on_expected_network(&self, expected: u64) -> bool {
        expected == 0 || self.network_id == Some(expected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryRecord {
    pub wallet: Address,
    pub share: U256,
    pub last_claim_usdt: U256,
    pub last_claim_weth: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub owner: Address,
    pub total_shares: U256,
    pub distribution_interval_secs: U256,
    pub paused: bool,
    pub locked: bool,
    pub usdt_token: Address,
    pub weth_token: Address,
}

impl ContractSnapshot {
    pub fn is_owned_by(&self, account: Option<Address>) -> bool {
        account == Some(self.owner)
    }
}
