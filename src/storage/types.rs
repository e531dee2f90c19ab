use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Message Flags
// ============================================================================

/// Importance flag of a message. Stored as an integer column so that the
/// batch toggle can be done with `NOT is_important` in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    NotImportant,
    Important,
}

impl Importance {
    pub fn toggled(self) -> Self {
        match self {
            Importance::Important => Importance::NotImportant,
            Importance::NotImportant => Importance::Important,
        }
    }
}

impl From<bool> for Importance {
    fn from(value: bool) -> Self {
        if value {
            Importance::Important
        } else {
            Importance::NotImportant
        }
    }
}

impl From<Importance> for bool {
    fn from(value: Importance) -> Self {
        value == Importance::Important
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// Category row as persisted. `parent_id` of [`crate::tree::NO_PARENT_CATEGORY`]
/// means the category sits directly under the root.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub parent_id: i64,
    pub title: String,
}

/// Feed row as persisted. `kind` is the raw feed-format discriminant; rows
/// with unrecognized discriminants are skipped during tree assembly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedRow {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    pub kind: i64,
    pub update_mode: i64,
    pub update_interval: i64,
}

/// Internal row type for message queries (used by sqlx FromRow).
/// Converts to [`Message`] via `into_message()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub date_created: i64,
    pub contents: String,
    pub is_read: bool,
    pub is_deleted: bool,
    pub is_pdeleted: bool,
    pub is_important: bool,
    pub attachments: Option<String>,
    pub account_id: i64,
    pub custom_id: String,
    pub custom_hash: String,
}

impl MessageDbRow {
    pub(crate) fn into_message(self) -> Message {
        Message {
            id: self.id,
            feed_id: self.feed_id,
            title: self.title,
            url: self.url,
            author: self.author,
            created: self.date_created,
            contents: self.contents,
            is_read: self.is_read,
            is_deleted: self.is_deleted,
            is_pdeleted: self.is_pdeleted,
            importance: Importance::from(self.is_important),
            attachments: self.attachments,
            account_id: self.account_id,
            custom_id: self.custom_id,
            custom_hash: self.custom_hash,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A single syndicated message.
///
/// `created` is a signed epoch-seconds value; conversion to display-local
/// date/time happens only in the rendering layer. `is_pdeleted` is meaningful
/// only for messages already in the recycle bin (`is_deleted = true`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub created: i64,
    pub contents: String,
    pub is_read: bool,
    pub is_deleted: bool,
    pub is_pdeleted: bool,
    pub importance: Importance,
    pub attachments: Option<String>,
    pub account_id: i64,
    pub custom_id: String,
    pub custom_hash: String,
}

/// Per-feed unread/total counts, aggregated in a single grouped query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounts {
    pub unread: i64,
    pub total: i64,
}
