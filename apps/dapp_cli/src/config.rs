use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use distributor_client::{AddressCache, ClientOptions, ConfirmationPolicy, ReadLimits};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "dapp.toml";
/// Sepolia.
pub const DEFAULT_EXPECTED_CHAIN_ID: u64 = 11_155_111;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// JSON-RPC endpoint of a node holding unlocked accounts. `None` runs
    /// without a wallet.
    pub rpc_url: Option<String>,
    /// Bound on each JSON-RPC round trip.
    pub rpc_timeout_secs: u64,
    /// Contract opened when nothing is cached yet. Never written to the cache.
    pub default_contract: Option<String>,
    pub abi_path: Option<PathBuf>,
    pub cache_path: PathBuf,
    /// `0` accepts any network.
    pub expected_chain_id: u64,
    pub max_beneficiaries: usize,
    pub read_concurrency: usize,
    pub confirmation_timeout_secs: u64,
    pub confirmation_poll_ms: u64,
    pub event_poll_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            rpc_timeout_secs: 30,
            default_contract: None,
            abi_path: None,
            cache_path: PathBuf::from("./data/dapp_cache.json"),
            expected_chain_id: DEFAULT_EXPECTED_CHAIN_ID,
            max_beneficiaries: 200,
            read_concurrency: 8,
            confirmation_timeout_secs: 120,
            confirmation_poll_ms: 1_000,
            event_poll_ms: 2_000,
        }
    }
}

impl Settings {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            limits: ReadLimits {
                max_beneficiaries: self.max_beneficiaries,
                concurrency: self.read_concurrency.max(1),
            },
            confirmation: ConfirmationPolicy {
                timeout: Duration::from_secs(self.confirmation_timeout_secs),
                poll_interval: Duration::from_millis(self.confirmation_poll_ms.max(1)),
            },
            cache: Some(AddressCache::new(self.cache_path.clone())),
        }
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms.max(1))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    rpc_url: Option<String>,
    rpc_timeout_secs: Option<u64>,
    default_contract: Option<String>,
    abi_path: Option<PathBuf>,
    cache_path: Option<PathBuf>,
    expected_chain_id: Option<u64>,
    max_beneficiaries: Option<usize>,
    read_concurrency: Option<usize>,
    confirmation_timeout_secs: Option<u64>,
    confirmation_poll_ms: Option<u64>,
    event_poll_ms: Option<u64>,
}

pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Defaults, then the optional toml file, then environment variables.
/// `DAPP_*` names are read first and `APP__*` names win over them.
pub fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    if let Some(v) = env_value(&env, "RPC_URL") {
        settings.rpc_url = Some(v).filter(|url| !url.trim().is_empty());
    }
    if let Some(v) = env_value(&env, "DEFAULT_CONTRACT") {
        settings.default_contract = Some(v).filter(|raw| !raw.trim().is_empty());
    }
    parse_env(&env, "RPC_TIMEOUT_SECS", &mut settings.rpc_timeout_secs)?;
    if let Some(v) = env_value(&env, "ABI_PATH") {
        settings.abi_path = Some(PathBuf::from(v));
    }
    if let Some(v) = env_value(&env, "CACHE_PATH") {
        settings.cache_path = PathBuf::from(v);
    }
    parse_env(&env, "EXPECTED_CHAIN_ID", &mut settings.expected_chain_id)?;
    parse_env(&env, "MAX_BENEFICIARIES", &mut settings.max_beneficiaries)?;
    parse_env(&env, "READ_CONCURRENCY", &mut settings.read_concurrency)?;
    parse_env(
        &env,
        "CONFIRMATION_TIMEOUT_SECS",
        &mut settings.confirmation_timeout_secs,
    )?;
    parse_env(&env, "CONFIRMATION_POLL_MS", &mut settings.confirmation_poll_ms)?;
    parse_env(&env, "EVENT_POLL_MS", &mut settings.event_poll_ms)?;

    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.rpc_url {
        settings.rpc_url = Some(v);
    }
    if let Some(v) = file_cfg.rpc_timeout_secs {
        settings.rpc_timeout_secs = v;
    }
    if let Some(v) = file_cfg.default_contract {
        settings.default_contract = Some(v);
    }
    if let Some(v) = file_cfg.abi_path {
        settings.abi_path = Some(v);
    }
    if let Some(v) = file_cfg.cache_path {
        settings.cache_path = v;
    }
    if let Some(v) = file_cfg.expected_chain_id {
        settings.expected_chain_id = v;
    }
    if let Some(v) = file_cfg.max_beneficiaries {
        settings.max_beneficiaries = v;
    }
    if let Some(v) = file_cfg.read_concurrency {
        settings.read_concurrency = v;
    }
    if let Some(v) = file_cfg.confirmation_timeout_secs {
        settings.confirmation_timeout_secs = v;
    }
    if let Some(v) = file_cfg.confirmation_poll_ms {
        settings.confirmation_poll_ms = v;
    }
    if let Some(v) = file_cfg.event_poll_ms {
        settings.event_poll_ms = v;
    }
}

fn env_value(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(&format!("APP__{key}")).or_else(|| env(&format!("DAPP_{key}")))
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(v) = env_value(env, key) {
        *target = v
            .trim()
            .parse()
            .with_context(|| format!("invalid value '{v}' for {key}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_and_env_yield_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings_with(&dir.path().join("dapp.toml"), no_env).expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.rpc_url, None);
        assert_eq!(settings.expected_chain_id, 11_155_111);
        assert_eq!(settings.max_beneficiaries, 200);
    }

    #[test]
    fn env_overrides_file_and_app_prefix_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dapp.toml");
        fs::write(
            &path,
            "rpc_url = \"http://127.0.0.1:8545\"\nmax_beneficiaries = 50\nexpected_chain_id = 31337\n",
        )
        .expect("write config");

        let env: HashMap<&str, &str> = HashMap::from([
            ("DAPP_MAX_BENEFICIARIES", "10"),
            ("APP__MAX_BENEFICIARIES", "20"),
            ("DAPP_EVENT_POLL_MS", "250"),
        ]);
        let settings = load_settings_with(&path, |key| env.get(key).map(|v| v.to_string()))
            .expect("settings");

        assert_eq!(settings.rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(settings.expected_chain_id, 31337);
        assert_eq!(settings.max_beneficiaries, 20);
        assert_eq!(settings.event_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn rpc_timeout_and_default_contract_are_configurable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dapp.toml");
        fs::write(
            &path,
            "rpc_timeout_secs = 5\ndefault_contract = \"0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB\"\n",
        )
        .expect("write config");

        let settings = load_settings_with(&path, no_env).expect("settings");
        assert_eq!(settings.rpc_timeout(), Duration::from_secs(5));
        assert_eq!(
            settings.default_contract.as_deref(),
            Some("0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB")
        );

        let settings = load_settings_with(&path, |key| match key {
            "DAPP_RPC_TIMEOUT_SECS" => Some("0".to_string()),
            "APP__DEFAULT_CONTRACT" => Some(String::new()),
            _ => None,
        })
        .expect("settings");
        assert_eq!(settings.rpc_timeout(), Duration::from_secs(1));
        assert_eq!(settings.default_contract, None);
    }

    #[test]
    fn blank_rpc_url_in_env_disables_the_wallet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dapp.toml");
        fs::write(&path, "rpc_url = \"http://127.0.0.1:8545\"\n").expect("write config");
        let settings = load_settings_with(&path, |key| {
            (key == "DAPP_RPC_URL").then(|| " ".to_string())
        })
        .expect("settings");
        assert_eq!(settings.rpc_url, None);
    }

    #[test]
    fn malformed_values_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dapp.toml");
        fs::write(&path, "max_beneficiaries = \"lots\"\n").expect("write config");
        assert!(load_settings_with(&path, no_env).is_err());

        let missing = dir.path().join("absent.toml");
        let err = load_settings_with(&missing, |key| {
            (key == "APP__READ_CONCURRENCY").then(|| "many".to_string())
        })
        .expect_err("bad env value");
        assert!(err.to_string().contains("READ_CONCURRENCY"));
    }

    #[test]
    fn client_options_follow_settings() {
        let settings = Settings {
            max_beneficiaries: 7,
            read_concurrency: 0,
            confirmation_timeout_secs: 30,
            ..Settings::default()
        };
        let options = settings.client_options();
        assert_eq!(options.limits.max_beneficiaries, 7);
        assert_eq!(options.limits.concurrency, 1);
        assert_eq!(options.confirmation.timeout, Duration::from_secs(30));
        assert_eq!(
            options.cache.as_ref().map(|cache| cache.path().to_path_buf()),
            Some(PathBuf::from("./data/dapp_cache.json"))
        );
    }
}
