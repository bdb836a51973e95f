use std::{path::PathBuf, sync::Arc};

use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use distributor_client::{
    ContractInterface, DistributorClient, HttpWalletProvider, ProviderAdapter, WalletProvider,
};
use shared::domain::parse_address;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod render;

use config::{load_settings, Settings, DEFAULT_CONFIG_FILE};
use controller::{
    events::{PanelError, PanelEvent},
    panel::{PanelAction, PanelController},
};

#[derive(Parser, Debug)]
#[command(name = "dapp_cli", about = "Console for a token distribution contract")]
struct Cli {
    #[arg(long, env = "DAPP_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

/// Flags that win over the config file and the environment.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, global = true)]
    rpc_url: Option<String>,
    #[arg(long, global = true)]
    rpc_timeout_secs: Option<u64>,
    /// Contract to open when none is cached.
    #[arg(long, global = true)]
    default_contract: Option<String>,
    #[arg(long, global = true)]
    abi: Option<PathBuf>,
    #[arg(long, global = true)]
    cache: Option<PathBuf>,
    #[arg(long, global = true)]
    expected_chain_id: Option<u64>,
    #[arg(long, global = true)]
    max_beneficiaries: Option<usize>,
}

impl Overrides {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.rpc_url {
            settings.rpc_url = Some(v);
        }
        if let Some(v) = self.rpc_timeout_secs {
            settings.rpc_timeout_secs = v;
        }
        if let Some(v) = self.default_contract {
            settings.default_contract = Some(v);
        }
        if let Some(v) = self.abi {
            settings.abi_path = Some(v);
        }
        if let Some(v) = self.cache {
            settings.cache_path = v;
        }
        if let Some(v) = self.expected_chain_id {
            settings.expected_chain_id = v;
        }
        if let Some(v) = self.max_beneficiaries {
            settings.max_beneficiaries = v;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the wallet to authorize an account.
    Connect,
    /// Show the account and network the wallet reports.
    Status,
    /// Bind a contract address, remember it and show its state.
    Load { address: String },
    /// Show the state of the remembered contract.
    Show,
    /// Look up one beneficiary by wallet.
    Lookup { wallet: String },
    AddBeneficiary {
        wallet: String,
        /// Basis points out of 10000.
        share: u64,
    },
    RemoveBeneficiary { wallet: String },
    UpdateShare { wallet: String, share: u64 },
    SetInterval { secs: u64 },
    SetPaused {
        #[arg(action = ArgAction::Set)]
        paused: bool,
    },
    /// Lock the beneficiary set for good.
    Lock {
        /// Allow locking while shares do not add up to 10000.
        #[arg(long)]
        allow_partial: bool,
    },
    DistributeUsdt,
    DistributeWeth,
    DistributeToUser { user: String },
    /// Call any write function of the interface with text arguments.
    Send { function: String, args: Vec<String> },
    /// Follow wallet changes and refresh the panel on each one.
    Watch,
}

fn wallet_arg(raw: &str) -> Result<Address> {
    parse_address(raw).with_context(|| format!("invalid wallet address '{raw}'"))
}

impl Command {
    fn into_action(self) -> Result<Option<PanelAction>> {
        let action = match self {
            Self::AddBeneficiary { wallet, share } => PanelAction::AddBeneficiary {
                wallet: wallet_arg(&wallet)?,
                share: U256::from(share),
            },
            Self::RemoveBeneficiary { wallet } => PanelAction::RemoveBeneficiary {
                wallet: wallet_arg(&wallet)?,
            },
            Self::UpdateShare { wallet, share } => PanelAction::UpdateShare {
                wallet: wallet_arg(&wallet)?,
                share: U256::from(share),
            },
            Self::SetInterval { secs } => PanelAction::SetInterval {
                secs: U256::from(secs),
            },
            Self::SetPaused { paused } => PanelAction::SetPaused(paused),
            Self::Lock { allow_partial } => PanelAction::Lock {
                require_full_shares: !allow_partial,
            },
            Self::DistributeUsdt => PanelAction::DistributeUsdt,
            Self::DistributeWeth => PanelAction::DistributeWeth,
            Self::DistributeToUser { user } => PanelAction::DistributeToUser {
                user: wallet_arg(&user)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}

fn build_client(settings: &Settings) -> Result<(DistributorClient, Option<Arc<HttpWalletProvider>>)> {
    let interface = match &settings.abi_path {
        Some(path) => ContractInterface::from_path(path)?,
        None => ContractInterface::bundled().context("bundled contract interface is invalid")?,
    };

    let wallet = settings
        .rpc_url
        .as_deref()
        .map(|url| HttpWalletProvider::from_url_str(url, settings.rpc_timeout()))
        .transpose()
        .context("invalid rpc_url")?;
    let adapter = match &wallet {
        Some(wallet) => {
            info!(rpc_url = %wallet.rpc_url(), "using json-rpc wallet");
            ProviderAdapter::new(Arc::clone(wallet) as Arc<dyn WalletProvider>)
        }
        None => {
            warn!("no rpc_url configured; running without a wallet");
            ProviderAdapter::without_wallet()
        }
    };

    Ok((
        DistributorClient::new(adapter, interface, settings.client_options()),
        wallet,
    ))
}

fn require_cached(panel: &mut PanelController) -> Result<()> {
    if panel.binding().is_none() && !panel.restore_cached() {
        bail!("no contract loaded; run `load <address>` first or set default_contract");
    }
    Ok(())
}

async fn show_panel(panel: &mut PanelController) -> Result<()> {
    // Owner detection needs the account, but viewing must work without one.
    if let Err(err) = panel.client().session().restore().await {
        info!(error = %err, "viewing without a connected account");
    }
    if let PanelEvent::Failed(err) = panel.refresh().await {
        return Err(err.into());
    }
    print_panel(panel).await;
    Ok(())
}

async fn print_panel(panel: &PanelController) {
    let role = panel.role().await;
    if let Some(binding) = panel.binding() {
        println!("contract:     {}", binding.address());
    }
    if let Some(snapshot) = panel.snapshot() {
        println!("{}", render::snapshot_block(snapshot, role));
    }
    if let Some(page) = panel.page() {
        println!();
        println!("{}", render::beneficiary_table(page));
    }
}

async fn watch(panel: &mut PanelController, settings: &Settings, wallet: Option<&Arc<HttpWalletProvider>>) -> Result<()> {
    let expected = panel.expected_chain_id();
    let poller = wallet.map(|wallet| wallet.spawn_change_poller(settings.event_poll_interval()));
    let session = Arc::clone(panel.client().session());
    let mut changes = session.subscribe_changes();
    let _subscription = session
        .activate()
        .context("wallet events are already being followed")?;

    if panel.restore_cached() {
        let event = panel.refresh().await;
        println!("{}", render::event_line(&event, expected));
        print_panel(panel).await;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(current) => {
                    let event = PanelEvent::SessionChanged(current);
                    println!("{}", render::event_line(&event, expected));
                    if panel.binding().is_some() {
                        let event = panel.refresh().await;
                        println!("{}", render::event_line(&event, expected));
                        if event == PanelEvent::Refreshed {
                            print_panel(panel).await;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "session changes lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    panel.teardown();
    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}

async fn run(
    command: Command,
    panel: &mut PanelController,
    settings: &Settings,
    wallet: Option<&Arc<HttpWalletProvider>>,
) -> Result<()> {
    let expected = panel.expected_chain_id();
    match command {
        Command::Connect => {
            let session = panel.connect().await?;
            println!("{}", render::session_line(&session, expected));
        }
        Command::Status => {
            let session = panel.client().session().restore().await.map_err(|err| {
                anyhow::anyhow!("{}: {err}", err.user_message())
            })?;
            println!("{}", render::session_line(&session, expected));
            if !panel.on_expected_network().await {
                println!("warning: wallet is not on network {expected}");
            }
        }
        Command::Load { address } => {
            panel.bind(&address)?;
            show_panel(panel).await?;
        }
        Command::Show => {
            require_cached(panel)?;
            show_panel(panel).await?;
        }
        Command::Lookup { wallet } => {
            require_cached(panel)?;
            let record = panel.lookup(&wallet).await?;
            println!("wallet:          {}", record.wallet);
            println!("share:           {}", render::share_percent(record.share));
            println!("last USDT claim: {}", render::claim_time(record.last_claim_usdt));
            println!("last WETH claim: {}", render::claim_time(record.last_claim_weth));
        }
        Command::Send { function, args } => {
            require_cached(panel)?;
            panel.ensure_signer().await?;
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let receipt = panel.send(&function, &args).await?;
            println!("{}", render::receipt_line(&function, &receipt));
            print_panel(panel).await;
        }
        Command::Watch => watch(panel, settings, wallet).await?,
        other => {
            let Some(action) = other.into_action()? else {
                bail!("unsupported command");
            };
            require_cached(panel)?;
            panel.ensure_signer().await?;
            let function = action.function();
            let receipt = panel.run(action).await?;
            println!("{}", render::receipt_line(function, &receipt));
            print_panel(panel).await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    cli.overrides.apply(&mut settings);

    let (client, wallet) = build_client(&settings)?;
    let mut panel = PanelController::new(Arc::new(client), settings.expected_chain_id)
        .with_default_contract(settings.default_contract.clone());
    let result = run(cli.command, &mut panel, &settings, wallet.as_ref()).await;
    if let Err(err) = &result {
        if err
            .downcast_ref::<PanelError>()
            .is_some_and(PanelError::needs_wallet_attention)
        {
            warn!("check the wallet: rpc_url must reach a node with an unlocked account");
        }
    }
    result
}
