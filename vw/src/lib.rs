//! VersionWatch - deployment version watcher
//!
//! VersionWatch keeps a long-lived execution context in sync with its
//! deployment: it periodically fetches an opaque version marker, adopts the
//! first observation as a baseline, and prompts the user exactly once when
//! the deployed marker moves away from the local one. While the prompt is
//! open, polling is suspended; sibling contexts on the same update channel
//! are told about the prompt so they can coordinate.
//!
//! # Core Concepts
//!
//! - **Baseline Adoption**: the first marker ever fetched is the comparison
//!   point, never a change
//! - **One Prompt Per Context**: the open prompt handle is the single source
//!   of truth for "a prompt is shown"
//! - **Messages, Not Flags**: poll ticks, prompt outcomes, visibility
//!   transitions, and teardown all arrive as messages on one run loop
//! - **Failures Stay Local**: a failed fetch is logged and the loop keeps
//!   its schedule
//!
//! # Modules
//!
//! - [`watcher`] - the per-context state machine
//! - [`source`] - version marker sources (HTTP, file)
//! - [`notify`] - update prompt capability
//! - [`channel`] - broadcast transport between sibling contexts
//! - [`visibility`] - the "user can see this context" signal
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod channel;
pub mod cli;
pub mod config;
pub mod notify;
pub mod source;
pub mod visibility;
pub mod watcher;

// Re-export commonly used types
pub use channel::{ChannelHandle, ChannelMessage, UpdateChannel};
pub use config::{Config, PromptConfig, SourceConfig};
pub use notify::{NotifyError, PromptHandle, PromptOutcome, TerminalNotifier, UpdateNotifier, UpdatePrompt};
pub use source::{FileVersionSource, HttpVersionSource, SourceError, VersionSource};
pub use visibility::VisibilitySignal;
pub use watcher::{VersionWatcher, WatchExit, WatchPhase, WatcherConfig, WatcherHandle};
