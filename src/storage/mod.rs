mod categories;
mod feeds;
mod messages;
mod schema;
mod types;

pub use schema::Database;
pub use types::{CategoryRow, DatabaseError, FeedRow, Importance, Message, MessageCounts};
