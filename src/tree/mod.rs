//! Hierarchical feed tree: data types, the arena-backed model and merge.

mod feed;
mod item;
mod merge;
mod model;

pub use feed::{AutoUpdateMode, FeedData, FeedFormat, FeedStatus};
pub use item::{
    CategoryData, ItemArena, ItemKind, ItemNode, NodeId, NO_PARENT_CATEGORY, RECYCLE_BIN_ID,
};
pub use merge::{ImportItem, ImportSource, MergeOutcome};
pub use model::{FeedTreeModel, TreeEvent};
