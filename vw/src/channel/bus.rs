//! The update channel and per-context endpoints
//!
//! Built on a tokio broadcast channel. Every posted message is wrapped in an
//! envelope carrying the origin context id; endpoints skip envelopes from
//! their own origin on receive, so a context only ever observes siblings.

use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use super::messages::ChannelMessage;

/// Default channel capacity (messages).
///
/// Toggle traffic is rare (one message per prompt transition), so a small
/// buffer covers even slow consumers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Envelope pairing a message with the context that posted it.
#[derive(Debug, Clone)]
struct Envelope {
    origin: Uuid,
    message: ChannelMessage,
}

/// A named broadcast channel shared by sibling execution contexts.
///
/// The channel is an explicit shared instance: embedders create one and
/// register every context on it. The name is a label for logs and has no
/// routing meaning.
pub struct UpdateChannel {
    name: String,
    tx: broadcast::Sender<Envelope>,
}

impl UpdateChannel {
    /// Create a channel with the default capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel with the given capacity.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { name: name.into(), tx }
    }

    /// The channel's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an execution context, yielding its endpoint.
    pub fn register(&self, origin: Uuid) -> ChannelHandle {
        debug!(channel = %self.name, %origin, "registering context on update channel");
        ChannelHandle {
            name: self.name.clone(),
            origin,
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }

    /// Number of currently registered contexts.
    pub fn context_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One context's endpoint on an [`UpdateChannel`].
pub struct ChannelHandle {
    name: String,
    origin: Uuid,
    tx: broadcast::Sender<Envelope>,
    rx: broadcast::Receiver<Envelope>,
}

impl ChannelHandle {
    /// The context id this endpoint posts as.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Post a message to all sibling contexts.
    ///
    /// Fire-and-forget: having no siblings listening is not an error.
    pub fn post(&self, message: ChannelMessage) {
        trace!(channel = %self.name, origin = %self.origin, ?message, "posting coordination message");
        let _ = self.tx.send(Envelope {
            origin: self.origin,
            message,
        });
    }

    /// Receive the next message posted by a sibling.
    ///
    /// Envelopes from this endpoint's own origin are skipped, as are gaps
    /// from lagging behind the channel capacity. Returns `None` once the
    /// channel is closed.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(channel = %self.name, skipped, "lagged behind update channel");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive a pending sibling message without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Close this endpoint. Siblings keep the channel alive.
    pub fn close(self) {
        debug!(channel = %self.name, origin = %self.origin, "closing channel endpoint");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sibling_receives_posted_message() {
        let channel = UpdateChannel::new("version-watch");
        let poster = channel.register(Uuid::now_v7());
        let mut sibling = channel.register(Uuid::now_v7());

        poster.post(ChannelMessage::Toggle { shown: true });

        let received = sibling.recv().await.unwrap();
        assert_eq!(received, ChannelMessage::Toggle { shown: true });
    }

    #[tokio::test]
    async fn test_own_posts_are_skipped() {
        let channel = UpdateChannel::new("version-watch");
        let mut endpoint = channel.register(Uuid::now_v7());

        endpoint.post(ChannelMessage::Toggle { shown: true });

        assert!(endpoint.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_all_siblings_receive() {
        let channel = UpdateChannel::new("version-watch");
        let poster = channel.register(Uuid::now_v7());
        let mut first = channel.register(Uuid::now_v7());
        let mut second = channel.register(Uuid::now_v7());

        poster.post(ChannelMessage::Toggle { shown: false });

        assert_eq!(first.recv().await, Some(ChannelMessage::Toggle { shown: false }));
        assert_eq!(second.recv().await, Some(ChannelMessage::Toggle { shown: false }));
    }

    #[tokio::test]
    async fn test_context_count() {
        let channel = UpdateChannel::new("version-watch");
        assert_eq!(channel.context_count(), 0);

        let first = channel.register(Uuid::now_v7());
        let second = channel.register(Uuid::now_v7());
        assert_eq!(channel.context_count(), 2);

        first.close();
        drop(second);
        assert_eq!(channel.context_count(), 0);
    }
}
