//! Update prompt capability
//!
//! The watcher surfaces "a new build is deployed" through this boundary;
//! how the prompt is rendered is the implementation's business.

mod terminal;

pub use terminal::TerminalNotifier;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

/// Content of an update prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePrompt {
    pub title: String,
    pub body: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

/// The user's decision on an open prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Apply the update now.
    Confirmed,
    /// Stay on the current version for now.
    Cancelled,
}

/// Errors surfacing an update prompt.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("prompt input is unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt could not be shown: {0}")]
    Unavailable(String),
}

/// Capability to surface an update prompt to the user.
///
/// `show` returns a handle once the prompt is visible. The user's decision
/// arrives on `outcome_tx` at most once; a prompt dismissed through
/// [`PromptHandle::close`] emits no decision.
#[async_trait]
pub trait UpdateNotifier: Send + Sync {
    async fn show(
        &self,
        prompt: UpdatePrompt,
        outcome_tx: oneshot::Sender<PromptOutcome>,
    ) -> Result<Box<dyn PromptHandle>, NotifyError>;
}

/// Handle to an open prompt.
pub trait PromptHandle: Send {
    /// Dismiss the prompt programmatically. Idempotent.
    fn close(&mut self);
}
