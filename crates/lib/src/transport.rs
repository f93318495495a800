//! Chat transport capability used by the session driver and dispatcher.
//!
//! The Slack implementation lives in [`crate::slack`]; tests substitute in-memory fakes.

use crate::error::TransportError;
use crate::events::InboundEvent;
use async_trait::async_trait;

/// Reply posted by [`ChatTransport::post_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReply {
    pub channel_id: String,
    pub thread_ts: String,
    /// `ts` of the new message, when the transport reports one.
    pub ts: Option<String>,
}

/// Connect, read batches of events, and post threaded replies.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Authenticate and return the bot's own user id.
    async fn connect(&mut self) -> Result<String, TransportError>;

    /// Pull the next batch of events. An empty batch is normal.
    async fn read_events(&mut self) -> Result<Vec<InboundEvent>, TransportError>;

    /// Post `text` into `channel_id`, threaded under `thread_ts`.
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<PostedReply, TransportError>;
}
