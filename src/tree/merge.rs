//! Import of an external feed hierarchy (OPML-style) into the live tree.
//!
//! The import source is a checked tree of categories and feeds. Merging
//! walks source and target in lockstep with one explicit stack of
//! (target, source-children) pairs; every persisted addition goes through
//! the same persist-then-attach path as interactive edits.

use anyhow::Result;
use tracing::warn;

use super::feed::{AutoUpdateMode, FeedFormat};
use super::model::FeedTreeModel;
use super::item::NodeId;

// ============================================================================
// Import Source
// ============================================================================

/// One entry of an import source tree. `checked` mirrors the import dialog's
/// check boxes: unchecked entries are skipped together with their subtree.
#[derive(Debug, Clone)]
pub enum ImportItem {
    Category {
        title: String,
        checked: bool,
        children: Vec<ImportItem>,
    },
    Feed {
        title: String,
        url: String,
        format: FeedFormat,
        checked: bool,
    },
}

/// Root of an import source tree.
#[derive(Debug, Clone, Default)]
pub struct ImportSource {
    pub children: Vec<ImportItem>,
}

/// Result of a merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// True when every checked entry was added (or reused).
    pub complete: bool,
    pub message: String,
}

// ============================================================================
// Merge
// ============================================================================

impl FeedTreeModel {
    /// Merge a checked import source into the tree.
    ///
    /// Categories that fail to persist (typically a same-titled sibling
    /// already exists) fall back to that existing sibling category so their
    /// subtree still lands; without such a sibling the whole branch is
    /// skipped. Feeds that fail to persist (typically a duplicate URL) are
    /// skipped individually. Failures are tallied, never fatal.
    pub async fn merge_model(&mut self, source: &ImportSource) -> Result<MergeOutcome> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;

        let mut failed = 0usize;
        let mut stack: Vec<(NodeId, &[ImportItem])> = vec![(self.root(), &source.children)];

        while let Some((target, items)) = stack.pop() {
            for item in items {
                match item {
                    ImportItem::Category {
                        title,
                        checked,
                        children,
                    } => {
                        if !*checked {
                            continue;
                        }
                        match self.add_category_unlocked(title, target).await {
                            Ok(node) => stack.push((node, children)),
                            Err(error) => {
                                // Reuse an existing same-titled sibling category
                                // so the subtree is not lost.
                                if let Some(existing) =
                                    self.arena().child_category_by_title(target, title)
                                {
                                    stack.push((existing, children));
                                } else {
                                    warn!(title = %title, %error, "skipping category branch on import");
                                    failed += 1;
                                }
                            }
                        }
                    }
                    ImportItem::Feed {
                        title,
                        url,
                        format,
                        checked,
                    } => {
                        if !*checked {
                            continue;
                        }
                        if let Err(error) = self
                            .add_feed_unlocked(
                                title,
                                url,
                                *format,
                                AutoUpdateMode::GlobalInterval,
                                target,
                            )
                            .await
                        {
                            warn!(title = %title, %error, "skipping feed on import");
                            failed += 1;
                        }
                    }
                }
            }
        }

        Ok(if failed == 0 {
            MergeOutcome {
                complete: true,
                message: "Import was completely successful.".to_string(),
            }
        } else {
            MergeOutcome {
                complete: false,
                message: format!(
                    "Some feeds/categories were not imported due to error, {failed} in total."
                ),
            }
        })
    }
}
