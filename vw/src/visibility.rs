//! Context visibility signal
//!
//! The analog of page visibility for a long-running process: a boolean
//! "the user can currently see this context" flag. The watcher gates
//! polling on it so updates are not checked for while nobody can act on
//! them.

use tokio::sync::watch;
use tracing::debug;

/// Publisher side of the visibility signal.
pub struct VisibilitySignal {
    tx: watch::Sender<bool>,
}

impl VisibilitySignal {
    /// Create a signal with the given initial state.
    pub fn new(visible: bool) -> Self {
        let (tx, _) = watch::channel(visible);
        Self { tx }
    }

    /// Subscribe to visibility transitions. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Publish a visibility state.
    ///
    /// Every call is a transition event for subscribers, even when the
    /// state did not change, mirroring how visibility-change events fire.
    pub fn set(&self, visible: bool) {
        debug!(visible, "visibility changed");
        self.tx.send_replace(visible);
    }

    /// Current state.
    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for VisibilitySignal {
    fn default() -> Self {
        Self::new(true)
    }
}
