use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use alloy::primitives::Address;
use shared::{
    domain::{Session, SessionPhase},
    error::FacadeError,
    protocol::WalletEvent,
};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::provider::ProviderAdapter;

const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Owns the connected account / network and is the only writer of it.
pub struct SessionState {
    adapter: ProviderAdapter,
    session: RwLock<Session>,
    changes: broadcast::Sender<Session>,
    subscribed: AtomicBool,
}

impl SessionState {
    pub fn new(adapter: ProviderAdapter) -> Arc<Self> {
        let (changes, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Arc::new(Self {
            adapter,
            session: RwLock::new(Session::default()),
            changes,
            subscribed: AtomicBool::new(false),
        })
    }

    pub fn adapter(&self) -> &ProviderAdapter {
        &self.adapter
    }

    pub async fn current(&self) -> Session {
        self.session.read().await.clone()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<Session> {
        self.changes.subscribe()
    }

    /// The signing account of a live session.
    pub async fn signer(&self) -> Result<Address, FacadeError> {
        self.session
            .read()
            .await
            .signer()
            .ok_or(FacadeError::NoSigner)
    }

    /// Explicit connect: Disconnected -> Connecting -> Connected. On failure
    /// the previous phase and account are restored.
    pub async fn connect(&self) -> Result<Session, FacadeError> {
        if !self.adapter.has_wallet() {
            return Err(FacadeError::NoWallet);
        }

        let previous = self
            .update(|session| session.phase = SessionPhase::Connecting)
            .await;
        let previous_phase = match previous.phase {
            SessionPhase::Connecting => SessionPhase::Disconnected,
            other => other,
        };

        let account = match self.adapter.connect().await {
            Ok(account) => account,
            Err(err) => {
                warn!(error = %err, "session: connect failed");
                // Network changes seen while connecting are kept.
                self.update(|session| {
                    session.phase = previous_phase;
                    session.account = previous.account;
                })
                .await;
                return Err(err);
            }
        };

        let network_id = match self.adapter.current_network_id().await {
            Ok(network_id) => Some(network_id),
            Err(err) => {
                warn!(error = %err, "session: network id unavailable after connect");
                None
            }
        };

        self.update(|session| {
            session.phase = SessionPhase::Connected;
            session.account = Some(account);
            if network_id.is_some() {
                session.network_id = network_id;
            }
        })
        .await;
        let connected = self.current().await;
        info!(account = %account, network_id = ?connected.network_id, "session: connected");
        Ok(connected)
    }

    /// Picks up an account the wallet already authorized, without prompting.
    pub async fn restore(&self) -> Result<Session, FacadeError> {
        let account = self.adapter.current_account().await?;
        let network_id = self.adapter.current_network_id().await.ok();
        self.update(|session| {
            match account {
                Some(account) => {
                    session.phase = SessionPhase::Connected;
                    session.account = Some(account);
                }
                None => {
                    session.phase = SessionPhase::Disconnected;
                    session.account = None;
                }
            }
            if network_id.is_some() {
                session.network_id = network_id;
            }
        })
        .await;
        Ok(self.current().await)
    }

    pub async fn apply_event(&self, event: WalletEvent) {
        debug!(?event, "session: wallet event");
        self.update(|session| match event {
            WalletEvent::AccountsChanged { accounts } => match accounts.first() {
                None => {
                    session.phase = SessionPhase::Disconnected;
                    session.account = None;
                }
                Some(account) if session.phase == SessionPhase::Connected => {
                    session.account = Some(*account);
                }
                Some(_) => {}
            },
            WalletEvent::ChainChanged { network_id } => session.network_id = Some(network_id),
            WalletEvent::Disconnected => {
                session.phase = SessionPhase::Disconnected;
                session.account = None;
            }
        })
        .await;
    }

    /// Subscribes to wallet events for as long as the returned guard lives.
    /// Returns `None` while another subscription is active.
    pub fn activate(self: &Arc<Self>) -> Option<SessionSubscription> {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            warn!("session: already subscribed to wallet events");
            return None;
        }

        let events = self.adapter.subscribe_events();
        let state = Arc::clone(self);
        let task = tokio::spawn(async move {
            if let Err(err) = state.restore().await {
                debug!(error = %err, "session: nothing to restore");
            }
            let Some(mut events) = events else {
                return;
            };
            loop {
                match events.recv().await {
                    Ok(event) => state.apply_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session: wallet events lagged, resyncing");
                        if let Err(err) = state.restore().await {
                            warn!(error = %err, "session: resync failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        info!("session: subscribed to wallet events");
        Some(SessionSubscription {
            state: Arc::clone(self),
            task,
        })
    }

    /// Applies `change` and broadcasts the result if anything moved. Returns
    /// the session as it was before the change.
    async fn update(&self, change: impl FnOnce(&mut Session)) -> Session {
        let (before, after) = {
            let mut guard = self.session.write().await;
            let before = guard.clone();
            change(&mut *guard);
            (before, guard.clone())
        };
        if before != after {
            let _ = self.changes.send(after);
        }
        before
    }
}

/// Live wallet-event subscription; dropping it unsubscribes exactly once.
pub struct SessionSubscription {
    state: Arc<SessionState>,
    task: JoinHandle<()>,
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.state.subscribed.store(false, Ordering::Release);
        info!("session: unsubscribed from wallet events");
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
