//! Panel events and error modeling for the controller.

use std::fmt;

use shared::{
    domain::Session,
    error::{ErrorCode, FacadeError},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    SessionChanged(Session),
    Refreshed,
    /// A read finished after the panel was rebound or torn down.
    StaleDiscarded,
    Failed(PanelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelContext {
    Connect,
    Load,
    Refresh,
    Lookup,
    Action,
}

impl fmt::Display for PanelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Load => "load",
            Self::Refresh => "refresh",
            Self::Lookup => "lookup",
            Self::Action => "action",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{context}: {message} ({detail})")]
pub struct PanelError {
    context: PanelContext,
    code: Option<ErrorCode>,
    message: &'static str,
    detail: String,
}

impl PanelError {
    pub fn from_facade(context: PanelContext, err: &FacadeError) -> Self {
        Self {
            context,
            code: Some(err.code()),
            message: err.user_message(),
            detail: err.to_string(),
        }
    }

    pub fn no_contract(context: PanelContext) -> Self {
        Self {
            context,
            code: None,
            message: "no contract loaded",
            detail: "run `load <address>` first".to_string(),
        }
    }

    pub fn context(&self) -> PanelContext {
        self.context
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Failures the user can fix from the wallet side.
    pub fn needs_wallet_attention(&self) -> bool {
        matches!(
            self.code,
            Some(ErrorCode::NoWallet | ErrorCode::NoSigner | ErrorCode::UserRejected)
        )
    }
}
