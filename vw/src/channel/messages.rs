//! Message types shared across execution contexts

use serde::{Deserialize, Serialize};

/// A coordination message advertised to sibling execution contexts.
///
/// Siblings receive it only if they are alive and registered on the same
/// channel; no ordering or delivery guarantee beyond that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChannelMessage {
    /// This context opened (`shown: true`) or dismissed (`shown: false`)
    /// its update prompt.
    Toggle { shown: bool },
}
