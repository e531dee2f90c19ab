//! Presentation of message rows: column text and row styling.
//!
//! Flag columns render empty text (they are icon-only), dates convert from
//! stored epoch seconds to display-local time only here, and styling derives
//! from the read/deleted flags plus the configured highlighter.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::storage::{Importance, Message};

/// Columns of the message list, in store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Read,
    Deleted,
    Important,
    FeedId,
    Title,
    Url,
    Author,
    Created,
    Contents,
    PDeleted,
    Attachments,
    AccountId,
    CustomId,
    CustomHash,
}

/// Optional emphasis rule applied on top of the base row style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageHighlighter {
    #[default]
    NoHighlighting,
    HighlightUnread,
    HighlightImportant,
}

/// Resolved visual treatment of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowStyle {
    /// Unread messages render bold.
    pub bold: bool,
    /// Soft-deleted messages render struck through.
    pub struck: bool,
    /// Row matches the configured highlighter.
    pub highlighted: bool,
}

/// `in_bin` switches the strike-through source: inside the recycle bin every
/// row is soft-deleted already, so only purged rows strike out there.
pub(crate) fn row_style(
    message: &Message,
    highlighter: MessageHighlighter,
    in_bin: bool,
) -> RowStyle {
    RowStyle {
        bold: !message.is_read,
        struck: if in_bin {
            message.is_pdeleted
        } else {
            message.is_deleted
        },
        highlighted: match highlighter {
            MessageHighlighter::NoHighlighting => false,
            MessageHighlighter::HighlightUnread => !message.is_read,
            MessageHighlighter::HighlightImportant => {
                message.importance == Importance::Important
            }
        },
    }
}

/// Text of one cell. Icon-only flag columns yield the empty string; an
/// absent author renders as a dash.
pub(crate) fn display_text(
    message: &Message,
    column: Column,
    use_custom_date: bool,
    custom_date_format: &str,
) -> String {
    match column {
        Column::Id => message.id.to_string(),
        Column::Read | Column::Important | Column::Deleted | Column::PDeleted => String::new(),
        Column::FeedId => message.feed_id.to_string(),
        Column::Title => message.title.clone(),
        Column::Url => message.url.clone(),
        Column::Author => {
            if message.author.is_empty() {
                "-".to_string()
            } else {
                message.author.clone()
            }
        }
        Column::Created => {
            let Some(local) = Local.timestamp_opt(message.created, 0).single() else {
                return String::new();
            };
            if use_custom_date && !custom_date_format.is_empty() {
                local.format(custom_date_format).to_string()
            } else {
                local.format("%c").to_string()
            }
        }
        Column::Contents => message.contents.clone(),
        Column::Attachments => message.attachments.clone().unwrap_or_default(),
        Column::AccountId => message.account_id.to_string(),
        Column::CustomId => message.custom_id.clone(),
        Column::CustomHash => message.custom_hash.clone(),
    }
}
