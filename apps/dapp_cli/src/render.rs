//! Plain-text rendering of panel state.

use std::fmt::Write as _;

use alloy::primitives::U256;
use chrono::DateTime;
use distributor_client::BeneficiaryPage;
use shared::{
    domain::{ContractSnapshot, Session, SessionPhase, SHARE_DENOMINATOR},
    protocol::TransactionReceipt,
};

use crate::controller::{events::PanelEvent, panel::PanelRole};

pub fn session_line(session: &Session, expected_chain_id: u64) -> String {
    let account = match (session.phase, session.account) {
        (SessionPhase::Connected, Some(account)) => account.to_string(),
        (SessionPhase::Connecting, _) => "connecting…".to_string(),
        _ => "not connected".to_string(),
    };
    let network = match session.network_id {
        Some(id) if session.on_expected_network(expected_chain_id) => format!("{id}"),
        Some(id) => format!("{id} (expected {expected_chain_id})"),
        None => "unknown".to_string(),
    };
    format!("account: {account} | network: {network}")
}

pub fn snapshot_block(snapshot: &ContractSnapshot, role: PanelRole) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "owner:        {}", snapshot.owner);
    let _ = writeln!(
        out,
        "total shares: {} ({})",
        snapshot.total_shares,
        share_percent(snapshot.total_shares)
    );
    let _ = writeln!(
        out,
        "interval:     {}",
        interval(snapshot.distribution_interval_secs)
    );
    let _ = writeln!(out, "paused:       {}", yes_no(snapshot.paused));
    let _ = writeln!(out, "locked:       {}", yes_no(snapshot.locked));
    let _ = writeln!(out, "USDT:         {}", snapshot.usdt_token);
    let _ = writeln!(out, "WETH:         {}", snapshot.weth_token);
    let _ = write!(
        out,
        "panel:        {}",
        match role {
            PanelRole::Owner => "owner",
            PanelRole::User => "user",
        }
    );
    out
}

pub fn beneficiary_table(page: &BeneficiaryPage) -> String {
    let mut out = format!(
        "{:<42}  {:>8}  {:<23}  {:<23}\n",
        "wallet", "share", "last USDT claim", "last WETH claim"
    );
    for record in &page.records {
        let _ = writeln!(
            out,
            "{:<42}  {:>8}  {:<23}  {:<23}",
            record.wallet.to_string(),
            share_percent(record.share),
            claim_time(record.last_claim_usdt),
            claim_time(record.last_claim_weth)
        );
    }
    let _ = write!(
        out,
        "showing {} of {} beneficiaries",
        page.records.len(),
        page.total
    );
    out
}

pub fn receipt_line(function: &str, receipt: &TransactionReceipt) -> String {
    let block = receipt
        .block_number
        .map(|block| block.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{function} confirmed: tx {} in block {block}",
        receipt.transaction_hash
    )
}

pub fn event_line(event: &PanelEvent, expected_chain_id: u64) -> String {
    match event {
        PanelEvent::SessionChanged(session) => session_line(session, expected_chain_id),
        PanelEvent::Refreshed => "contract data refreshed".to_string(),
        PanelEvent::StaleDiscarded => "stale contract data discarded".to_string(),
        PanelEvent::Failed(err) => format!("error: {err}"),
    }
}

/// Basis points as a percentage with two decimals.
pub fn share_percent(share: U256) -> String {
    let per_cent = U256::from(SHARE_DENOMINATOR / 100);
    format!(
        "{}.{:02}%",
        share / per_cent,
        (share % per_cent).to::<u64>()
    )
}

pub fn claim_time(timestamp: U256) -> String {
    if timestamp.is_zero() {
        return "never".to_string();
    }
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn interval(secs: U256) -> String {
    let Ok(total) = u64::try_from(secs) else {
        return format!("{secs}s");
    };
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    format!("{total}s ({days}d {hours:02}:{minutes:02}:{seconds:02})")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
