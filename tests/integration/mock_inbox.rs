//! Mock inbox for integration testing.
//!
//! Provides a deterministic `MessageSource` that serves queued items,
//! records replies and read marks, and can be told to fail.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use equity_bot::platforms::MessageSource;
use equity_bot::storage::SeenStore;
use equity_bot::types::{InboxItem, PostKind};

/// In-memory inbox. Items stay unread until `mark_read` is called on them.
pub struct MockInbox {
    items: Arc<Mutex<Vec<InboxItem>>>,
    read: Arc<Mutex<HashSet<String>>>,
    replies: Arc<Mutex<Vec<(String, String)>>>,
    /// If set, every operation returns this error.
    force_error: Arc<Mutex<Option<String>>>,
    /// Replies to these ids fail.
    failing_replies: Arc<Mutex<HashSet<String>>>,
    /// Store that a successful reply writes into first, so the
    /// responder's own record of the item collides.
    racing_store: Arc<Mutex<Option<SeenStore>>>,
}

impl MockInbox {
    pub fn new(items: Vec<InboxItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            read: Arc::new(Mutex::new(HashSet::new())),
            replies: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
            failing_replies: Arc::new(Mutex::new(HashSet::new())),
            racing_store: Arc::new(Mutex::new(None)),
        }
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn fail_reply_to(&self, id: &str) {
        self.failing_replies.lock().unwrap().insert(id.to_string());
    }

    /// Make every successful reply record its item in `store` first.
    pub fn record_on_reply(&self, store: SeenStore) {
        *self.racing_store.lock().unwrap() = Some(store);
    }

    /// Put an item back in the inbox as unread.
    pub fn redeliver(&self, item: InboxItem) {
        self.read.lock().unwrap().remove(&item.id);
        self.items.lock().unwrap().push(item);
    }

    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn is_read(&self, id: &str) -> bool {
        self.read.lock().unwrap().contains(id)
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

/// Convenience constructor for a comment mention.
pub fn comment(id: &str, author: &str, body: &str) -> InboxItem {
    InboxItem {
        id: id.to_string(),
        fullname: format!("t1_{id}"),
        author: Some(author.to_string()),
        body: body.to_string(),
        kind: PostKind::Comment,
    }
}

/// Convenience constructor for a private message.
pub fn message(id: &str, author: &str, body: &str) -> InboxItem {
    InboxItem {
        id: id.to_string(),
        fullname: format!("t4_{id}"),
        author: Some(author.to_string()),
        body: body.to_string(),
        kind: PostKind::Message,
    }
}

#[async_trait]
impl MessageSource for MockInbox {
    async fn fetch_unread(&self, limit: u32) -> Result<Vec<InboxItem>> {
        self.check_error()?;
        let read = self.read.lock().unwrap();
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| !read.contains(&i.id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, item: &InboxItem) -> Result<()> {
        self.check_error()?;
        self.read.lock().unwrap().insert(item.id.clone());
        Ok(())
    }

    async fn reply(&self, item: &InboxItem, text: &str) -> Result<()> {
        self.check_error()?;
        if self.failing_replies.lock().unwrap().contains(&item.id) {
            return Err(anyhow!("RATELIMIT: you are doing that too much"));
        }
        self.replies
            .lock()
            .unwrap()
            .push((item.id.clone(), text.to_string()));

        let racing = self.racing_store.lock().unwrap().clone();
        if let Some(store) = racing {
            store.record(&item.id, item.kind, false).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
