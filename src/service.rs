//! Collaborator contract between the models and the owning service.
//!
//! Every read/important/delete/restore transition in the message list is
//! mediated by the owning service: a "before" hook may veto the operation,
//! an "after" hook finalizes side effects (count refresh, remote sync) and
//! its result is propagated as the overall operation result. Multi-account
//! service plugins implement this trait; [`StandardService`] is the local
//! single-account implementation.

use crate::storage::{Importance, Message};

// ============================================================================
// Message Filter
// ============================================================================

/// SQL predicate selecting the messages of one tree item.
///
/// Built exclusively from constants and numeric feed ids — never from user
/// text — so it can be spliced into the message query verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    clause: String,
}

impl MessageFilter {
    /// Default filter: all non-deleted messages across all feeds.
    pub fn default_filter() -> Self {
        Self {
            clause: "is_deleted = 0 AND is_pdeleted = 0".to_string(),
        }
    }

    /// Always-false filter, installed when a service refuses to build one.
    pub fn none() -> Self {
        Self {
            clause: "1 != 1".to_string(),
        }
    }

    /// Messages residing in the recycle bin.
    pub fn recycle_bin() -> Self {
        Self {
            clause: "is_deleted = 1 AND is_pdeleted = 0".to_string(),
        }
    }

    /// Non-deleted messages of the given feed set.
    pub fn for_feeds(feed_ids: &[i64]) -> Self {
        if feed_ids.is_empty() {
            return Self::none();
        }
        let ids = feed_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            clause: format!("is_deleted = 0 AND is_pdeleted = 0 AND feed_id IN ({ids})"),
        }
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }
}

// ============================================================================
// Item Handle
// ============================================================================

/// Kind tag of a handed-over tree item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Root,
    Category,
    Feed,
    Bin,
}

/// Snapshot of a tree item handed to the message list and the service hooks.
/// Carries everything a filter or hook needs without borrowing the tree.
#[derive(Debug, Clone)]
pub struct ItemHandle {
    pub kind: HandleKind,
    pub title: String,
    /// Store ids of all feeds under the item (the item itself for a feed).
    pub feed_ids: Vec<i64>,
}

impl ItemHandle {
    pub fn is_bin(&self) -> bool {
        self.kind == HandleKind::Bin
    }
}

// ============================================================================
// Service Hooks
// ============================================================================

/// Hook set of the service owning a tree item.
///
/// Before-hooks return `false` to veto the operation (nothing is persisted);
/// after-hooks run only once persistence succeeded and their result becomes
/// the overall operation result. The defaults accept everything.
pub trait ServiceHooks: Send + Sync {
    /// Build the message filter for `item`, or `None` when the item's
    /// messages cannot be served (the model then shows nothing).
    fn load_messages_for_item(&self, item: &ItemHandle) -> Option<MessageFilter>;

    fn on_before_set_messages_read(
        &self,
        _item: &ItemHandle,
        _messages: &[Message],
        _read: bool,
    ) -> bool {
        true
    }

    fn on_after_set_messages_read(
        &self,
        _item: &ItemHandle,
        _messages: &[Message],
        _read: bool,
    ) -> bool {
        true
    }

    fn on_before_switch_message_importance(
        &self,
        _item: &ItemHandle,
        _changes: &[(Message, Importance)],
    ) -> bool {
        true
    }

    fn on_after_switch_message_importance(
        &self,
        _item: &ItemHandle,
        _changes: &[(Message, Importance)],
    ) -> bool {
        true
    }

    fn on_before_messages_delete(&self, _item: &ItemHandle, _messages: &[Message]) -> bool {
        true
    }

    fn on_after_messages_delete(&self, _item: &ItemHandle, _messages: &[Message]) -> bool {
        true
    }

    fn on_before_messages_restored_from_bin(
        &self,
        _item: &ItemHandle,
        _messages: &[Message],
    ) -> bool {
        true
    }

    fn on_after_messages_restored_from_bin(
        &self,
        _item: &ItemHandle,
        _messages: &[Message],
    ) -> bool {
        true
    }
}

/// The local single-account service: filters derive directly from the item
/// kind and its feed set, and every hook accepts.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardService;

impl ServiceHooks for StandardService {
    fn load_messages_for_item(&self, item: &ItemHandle) -> Option<MessageFilter> {
        match item.kind {
            HandleKind::Root => Some(MessageFilter::default_filter()),
            HandleKind::Bin => Some(MessageFilter::recycle_bin()),
            HandleKind::Feed | HandleKind::Category => {
                Some(MessageFilter::for_feeds(&item.feed_ids))
            }
        }
    }
}
