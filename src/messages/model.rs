//! The message list: a filtered, eagerly fetched view of the store with a
//! pending-edit overlay for flag changes.
//!
//! Every flag transition is write-through: the owning service's before-hook
//! may veto it, the store persists it, the overlay records it, and the
//! after-hook's verdict becomes the operation result. A persistence failure
//! surfaces as `Err` and leaves the list untouched; a veto or a rejecting
//! after-hook surfaces as `Ok(false)`.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::config::MessagesConfig;
use crate::service::{ItemHandle, MessageFilter, ServiceHooks};
use crate::storage::{Database, Importance, Message};

use super::cache::PendingEdits;
use super::render::{self, Column, MessageHighlighter, RowStyle};

pub struct MessageListModel {
    db: Database,
    service: Arc<dyn ServiceHooks>,
    filter: MessageFilter,
    rows: Vec<Message>,
    cache: PendingEdits,
    selected: Option<ItemHandle>,
    failure_notice: Option<String>,
    highlighter: MessageHighlighter,
    use_custom_date: bool,
    custom_date_format: String,
}

impl MessageListModel {
    /// Create an empty list. Nothing is shown until an item is loaded.
    pub fn new(db: Database, service: Arc<dyn ServiceHooks>, config: &MessagesConfig) -> Self {
        Self {
            db,
            service,
            filter: MessageFilter::none(),
            rows: Vec::new(),
            cache: PendingEdits::new(),
            selected: None,
            failure_notice: None,
            highlighter: config.highlighter,
            use_custom_date: config.use_custom_date,
            custom_date_format: config.custom_date_format.clone(),
        }
    }

    pub fn selected_item(&self) -> Option<&ItemHandle> {
        self.selected.as_ref()
    }

    /// Human-readable notice from the last load, set when the owning service
    /// refused to serve the item's messages.
    pub fn failure_notice(&self) -> Option<&str> {
        self.failure_notice.as_deref()
    }

    pub fn highlighter(&self) -> MessageHighlighter {
        self.highlighter
    }

    pub fn set_highlighter(&mut self, highlighter: MessageHighlighter) {
        self.highlighter = highlighter;
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Show the messages of `item` (or all non-deleted messages when no item
    /// is given). When the owning service refuses to build a filter for the
    /// item, an always-false filter is installed and the list shows nothing.
    /// The list is repopulated either way.
    pub async fn load_messages(&mut self, item: Option<ItemHandle>) -> Result<()> {
        self.failure_notice = None;
        self.filter = match &item {
            None => MessageFilter::default_filter(),
            Some(item) => match self.service.load_messages_for_item(item) {
                Some(filter) => filter,
                None => {
                    warn!(
                        item = %item.title,
                        "loading of messages from item failed, item does not support loading of messages"
                    );
                    self.failure_notice = Some(format!(
                        "Loading of messages from item '{}' failed.",
                        item.title
                    ));
                    MessageFilter::none()
                }
            },
        };
        self.selected = item;
        self.repopulate().await
    }

    /// Re-run the list query, discarding the pending-edit overlay.
    pub async fn repopulate(&mut self) -> Result<()> {
        self.cache.clear();
        self.rows = self.db.fetch_messages(self.filter.clause()).await?;
        Ok(())
    }

    // ========================================================================
    // Row Access
    // ========================================================================

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Message at `row`, with pending edits taking precedence over the
    /// fetched snapshot.
    pub fn message_at(&self, row: usize) -> Option<&Message> {
        self.cache.get(row).or_else(|| self.rows.get(row))
    }

    pub fn row_of_message(&self, message_id: i64) -> Option<usize> {
        self.rows.iter().position(|m| m.id == message_id)
    }

    pub fn row_style(&self, row: usize) -> RowStyle {
        let in_bin = self.selected.as_ref().is_some_and(ItemHandle::is_bin);
        self.message_at(row)
            .map(|m| render::row_style(m, self.highlighter, in_bin))
            .unwrap_or_default()
    }

    pub fn display_text(&self, row: usize, column: Column) -> String {
        self.message_at(row)
            .map(|m| {
                render::display_text(m, column, self.use_custom_date, &self.custom_date_format)
            })
            .unwrap_or_default()
    }

    fn snapshot(&self, rows: &[usize]) -> Vec<(usize, Message)> {
        rows.iter()
            .filter_map(|&row| self.message_at(row).cloned().map(|m| (row, m)))
            .collect()
    }

    // ========================================================================
    // Read State
    // ========================================================================

    /// Set the read flag of one row. Short-circuits when the flag already
    /// holds. Returns `Ok(false)` when a hook rejected the transition.
    pub async fn set_message_read(&mut self, row: usize, read: bool) -> Result<bool> {
        let Some(message) = self.message_at(row).cloned() else {
            return Ok(false);
        };
        if message.is_read == read {
            return Ok(true);
        }
        let Some(item) = self.selected.clone() else {
            return Ok(false);
        };

        let batch = [message.clone()];
        if !self.service.on_before_set_messages_read(&item, &batch, read) {
            return Ok(false);
        }

        self.db.mark_messages_read(&[message.id], read).await?;
        self.cache.patch(row, &message, |m| m.is_read = read);

        Ok(self.service.on_after_set_messages_read(&item, &batch, read))
    }

    /// Set the read flag on a batch of rows in one store round-trip.
    pub async fn set_batch_messages_read(&mut self, rows: &[usize], read: bool) -> Result<bool> {
        let snapshot = self.snapshot(rows);
        if snapshot.is_empty() {
            return Ok(true);
        }
        let Some(item) = self.selected.clone() else {
            return Ok(false);
        };

        let messages: Vec<Message> = snapshot.iter().map(|(_, m)| m.clone()).collect();
        if !self
            .service
            .on_before_set_messages_read(&item, &messages, read)
        {
            return Ok(false);
        }

        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        self.db.mark_messages_read(&ids, read).await?;
        for (row, base) in &snapshot {
            self.cache.patch(*row, base, |m| m.is_read = read);
        }

        Ok(self
            .service
            .on_after_set_messages_read(&item, &messages, read))
    }

    /// Read-state entry point keyed by store id (external collaborators do
    /// not know row indexes).
    pub async fn set_message_read_by_id(&mut self, message_id: i64, read: bool) -> Result<bool> {
        match self.row_of_message(message_id) {
            Some(row) => self.set_message_read(row, read).await,
            None => Ok(false),
        }
    }

    // ========================================================================
    // Importance
    // ========================================================================

    /// Toggle the importance flag of one row.
    pub async fn switch_message_importance(&mut self, row: usize) -> Result<bool> {
        let Some(message) = self.message_at(row).cloned() else {
            return Ok(false);
        };
        let Some(item) = self.selected.clone() else {
            return Ok(false);
        };
        let target = message.importance.toggled();

        let changes = [(message.clone(), target)];
        if !self
            .service
            .on_before_switch_message_importance(&item, &changes)
        {
            return Ok(false);
        }

        self.db
            .mark_message_important(message.id, target.into())
            .await?;
        self.cache.patch(row, &message, |m| m.importance = target);

        Ok(self
            .service
            .on_after_switch_message_importance(&item, &changes))
    }

    /// Toggle the importance flag on a batch of rows; mixed current states
    /// each flip individually.
    pub async fn switch_batch_message_importance(&mut self, rows: &[usize]) -> Result<bool> {
        let snapshot = self.snapshot(rows);
        if snapshot.is_empty() {
            return Ok(true);
        }
        let Some(item) = self.selected.clone() else {
            return Ok(false);
        };

        let changes: Vec<(Message, Importance)> = snapshot
            .iter()
            .map(|(_, m)| (m.clone(), m.importance.toggled()))
            .collect();
        if !self
            .service
            .on_before_switch_message_importance(&item, &changes)
        {
            return Ok(false);
        }

        let ids: Vec<i64> = snapshot.iter().map(|(_, m)| m.id).collect();
        self.db.switch_messages_importance(&ids).await?;
        for (row, base) in &snapshot {
            self.cache
                .patch(*row, base, |m| m.importance = m.importance.toggled());
        }

        Ok(self
            .service
            .on_after_switch_message_importance(&item, &changes))
    }

    /// Importance entry point keyed by store id.
    pub async fn set_message_important_by_id(
        &mut self,
        message_id: i64,
        important: bool,
    ) -> Result<bool> {
        let Some(row) = self.row_of_message(message_id) else {
            return Ok(false);
        };
        let Some(message) = self.message_at(row).cloned() else {
            return Ok(false);
        };
        if bool::from(message.importance) == important {
            return Ok(true);
        }
        self.switch_message_importance(row).await
    }

    // ========================================================================
    // Delete / Restore
    // ========================================================================

    /// Delete a batch of rows. In a regular view the messages move to the
    /// recycle bin; in the bin view they are purged beyond recovery.
    pub async fn set_batch_messages_deleted(&mut self, rows: &[usize]) -> Result<bool> {
        let snapshot = self.snapshot(rows);
        if snapshot.is_empty() {
            return Ok(true);
        }
        let Some(item) = self.selected.clone() else {
            return Ok(false);
        };

        let messages: Vec<Message> = snapshot.iter().map(|(_, m)| m.clone()).collect();
        if !self.service.on_before_messages_delete(&item, &messages) {
            return Ok(false);
        }

        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        if item.is_bin() {
            self.db.permanently_delete_messages(&ids).await?;
            for (row, base) in &snapshot {
                self.cache.patch(*row, base, |m| m.is_pdeleted = true);
            }
        } else {
            self.db.delete_or_restore_messages(&ids, true).await?;
            for (row, base) in &snapshot {
                self.cache.patch(*row, base, |m| m.is_deleted = true);
            }
        }

        Ok(self.service.on_after_messages_delete(&item, &messages))
    }

    /// Restore a batch of rows from the recycle bin back to their feeds.
    /// Meaningful only in the bin view; a no-op elsewhere.
    pub async fn set_batch_messages_restored(&mut self, rows: &[usize]) -> Result<bool> {
        let Some(item) = self.selected.clone() else {
            return Ok(false);
        };
        if !item.is_bin() {
            return Ok(false);
        }
        let snapshot = self.snapshot(rows);
        if snapshot.is_empty() {
            return Ok(true);
        }

        let messages: Vec<Message> = snapshot.iter().map(|(_, m)| m.clone()).collect();
        if !self
            .service
            .on_before_messages_restored_from_bin(&item, &messages)
        {
            return Ok(false);
        }

        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        self.db.delete_or_restore_messages(&ids, false).await?;
        for (row, base) in &snapshot {
            self.cache.patch(*row, base, |m| {
                m.is_deleted = false;
                m.is_pdeleted = false;
            });
        }

        Ok(self
            .service
            .on_after_messages_restored_from_bin(&item, &messages))
    }

}
