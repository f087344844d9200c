//! Inbox responder.
//!
//! One poll cycle: fetch unread items, skip anything already recorded,
//! answer the rest through the equity engine, then record and mark read.
//! A failure on one item is logged and the cycle moves on.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::engine::EquityEngine;
use crate::platforms::MessageSource;
use crate::storage::SeenStore;
use crate::types::{CycleReport, InboxItem};

/// Per-responder settings taken from `[bot]`.
#[derive(Debug, Clone, Default)]
pub struct ResponderConfig {
    pub inbox_limit: u32,
    pub dry_run: bool,
    /// Authors to answer, matched case-insensitively. Empty means everyone.
    pub allowed_authors: Vec<String>,
    /// The bot's own account; its items are never answered.
    pub own_username: Option<String>,
}

impl ResponderConfig {
    pub fn allows(&self, author: Option<&str>) -> bool {
        if let (Some(own), Some(a)) = (self.own_username.as_deref(), author) {
            if own.eq_ignore_ascii_case(a) {
                return false;
            }
        }
        if self.allowed_authors.is_empty() {
            return true;
        }
        match author {
            Some(a) => self.allowed_authors.iter().any(|x| x.eq_ignore_ascii_case(a)),
            None => false,
        }
    }
}

/// What happened to one inbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Replied,
    Skipped,
}

pub struct Responder {
    source: Arc<dyn MessageSource>,
    store: SeenStore,
    engine: EquityEngine,
    config: ResponderConfig,
}

impl Responder {
    pub fn new(
        source: Arc<dyn MessageSource>,
        store: SeenStore,
        engine: EquityEngine,
        config: ResponderConfig,
    ) -> Self {
        Self {
            source,
            store,
            engine,
            config,
        }
    }

    /// Run a single fetch → answer → record cycle.
    ///
    /// Only a failed fetch is an error; per-item problems are counted.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let items = self.source.fetch_unread(self.config.inbox_limit).await?;
        let mut report = CycleReport::empty();
        report.fetched = items.len();

        if items.is_empty() {
            debug!(platform = self.source.name(), "Inbox empty");
            return Ok(report);
        }

        info!(count = items.len(), platform = self.source.name(), "Processing inbox");

        for item in &items {
            match self.process_item(item).await {
                Ok(Disposition::Replied) => report.replied += 1,
                Ok(Disposition::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(id = %item.id, error = %e, "Failed to process inbox item");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn process_item(&self, item: &InboxItem) -> Result<Disposition> {
        if self.store.is_seen(&item.id).await? {
            debug!(id = %item.id, "Already handled, marking read");
            self.source.mark_read(item).await?;
            return Ok(Disposition::Skipped);
        }

        let has_request = EquityEngine::contains_request(&item.body);

        if !self.config.allows(item.author.as_deref()) {
            debug!(id = %item.id, author = ?item.author, "Author not allowed, ignoring");
            self.store.record(&item.id, item.kind, has_request).await?;
            self.source.mark_read(item).await?;
            return Ok(Disposition::Skipped);
        }

        let reply = self.engine.handle(&item.body).await;

        if self.config.dry_run {
            info!(id = %item.id, kind = %item.kind, reply = %reply, "[DRY RUN] Would reply");
        } else {
            self.source.reply(item, &reply).await?;
        }

        // The reply is out; from here on the item must not come back unread.
        let recorded = self.store.record(&item.id, item.kind, has_request).await;
        self.source.mark_read(item).await?;
        if let Err(e) = recorded {
            error!(
                id = %item.id,
                error = %e,
                "Reply posted but not recorded; a redelivery would be answered again"
            );
        }
        Ok(Disposition::Replied)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
