use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use serde_json::Value;
use shared::domain::parse_address;
use tracing::{debug, warn};

pub const CACHE_KEY: &str = "gtd_contract";

/// Remembers the last successfully bound contract address in a small JSON
/// file. Unrelated keys already in the file are preserved on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCache {
    path: PathBuf,
}

impl AddressCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or malformed cache reads as empty.
    pub fn load(&self) -> Option<Address> {
        let entries = self.read_entries()?;
        let raw = match entries.get(CACHE_KEY) {
            Some(Value::String(raw)) => raw,
            Some(other) => {
                warn!(path = %self.path.display(), value = %other, "cache: ignoring non-string address");
                return None;
            }
            None => return None,
        };
        match parse_address(raw) {
            Ok(address) => Some(address),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cache: ignoring malformed address");
                None
            }
        }
    }

    pub fn store(&self, address: Address) -> io::Result<()> {
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(
            CACHE_KEY.to_string(),
            Value::String(address.to_checksum(None)),
        );

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(&entries).map_err(io::Error::other)?;
        fs::write(&self.path, body)?;
        debug!(path = %self.path.display(), %address, "cache: stored contract address");
        Ok(())
    }

    fn read_entries(&self) -> Option<BTreeMap<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cache: unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Some(entries),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cache: malformed, treating as empty");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/address_cache_tests.rs"]
mod tests;
