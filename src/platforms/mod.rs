//! Platform integrations.
//!
//! Defines the `MessageSource` trait and provides the Reddit
//! implementation. The equity engine never sees a platform: the responder
//! pulls bodies out of a source and pushes reply text back in.

pub mod reddit;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::InboxItem;

/// Abstraction over a platform inbox the bot answers from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch unread mentions and messages, oldest first.
    async fn fetch_unread(&self, limit: u32) -> Result<Vec<InboxItem>>;

    /// Mark an item as read so it is not fetched again.
    async fn mark_read(&self, item: &InboxItem) -> Result<()>;

    /// Post a reply to an item.
    async fn reply(&self, item: &InboxItem, text: &str) -> Result<()>;

    /// Platform name for logging and identification.
    fn name(&self) -> &str;
}
