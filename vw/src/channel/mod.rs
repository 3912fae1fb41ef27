//! Broadcast transport between sibling execution contexts
//!
//! Siblings are other live instances of the application sharing one
//! [`UpdateChannel`]. Delivery is best-effort and unordered; a context never
//! receives its own posts, matching how a same-origin browser broadcast
//! channel behaves.

mod bus;
mod messages;

pub use bus::{ChannelHandle, DEFAULT_CHANNEL_CAPACITY, UpdateChannel};
pub use messages::ChannelMessage;
