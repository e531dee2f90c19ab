//! Message list model, its pending-edit overlay and row presentation.

mod cache;
mod model;
mod render;

pub use model::MessageListModel;
pub use render::{Column, MessageHighlighter, RowStyle};
