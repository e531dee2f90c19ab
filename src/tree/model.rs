use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::scheduler::{FeedUpdateRequest, UpdateLock};
use crate::service::{HandleKind, ItemHandle};
use crate::storage::{CategoryRow, Database, FeedRow, Message, MessageCounts};

use super::feed::{AutoUpdateMode, FeedData, FeedFormat, FeedStatus};
use super::item::{CategoryData, ItemArena, ItemKind, ItemNode, NodeId, NO_PARENT_CATEGORY};

// ============================================================================
// Change Notifications
// ============================================================================

/// Structural change notifications. Insert/remove events come in strictly
/// bracketed about-to/done pairs so observers tracking the index space see
/// consistent before/after states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    RowsAboutToBeInserted { parent: NodeId, row: usize },
    RowsInserted { parent: NodeId, row: usize },
    RowsAboutToBeRemoved { parent: NodeId, row: usize },
    RowsRemoved { parent: NodeId, row: usize },
    /// Counts or other non-structural data changed across the whole tree.
    LayoutChanged,
}

// ============================================================================
// Feed Tree Model
// ============================================================================

/// Owns the feed hierarchy and keeps it mirrored against the store.
///
/// Every structural mutation persists first and touches the in-memory tree
/// only once the store accepted the change; on a storage error the tree is
/// left exactly as it was. Mutation entry points share the process-wide
/// [`UpdateLock`] with the scheduler and fail fast under contention.
pub struct FeedTreeModel {
    db: Database,
    arena: ItemArena,
    bin: NodeId,
    lock: Arc<UpdateLock>,
    subscribers: Vec<mpsc::UnboundedSender<TreeEvent>>,
}

impl FeedTreeModel {
    /// Create an empty model (root + recycle bin only). Call
    /// [`load_from_database`](Self::load_from_database) to populate it.
    pub fn new(db: Database, lock: Arc<UpdateLock>) -> Self {
        let mut arena = ItemArena::new();
        let root = arena.root();
        let bin = arena.insert(ItemNode::new(
            "Recycle bin",
            ItemKind::Bin {
                counts: MessageCounts::default(),
            },
        ));
        arena.append_child(root, bin);

        Self {
            db,
            arena,
            bin,
            lock,
            subscribers: Vec::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn update_lock(&self) -> Arc<UpdateLock> {
        Arc::clone(&self.lock)
    }

    pub fn root(&self) -> NodeId {
        self.arena.root()
    }

    pub fn recycle_bin(&self) -> NodeId {
        self.bin
    }

    pub fn node(&self, id: NodeId) -> Option<&ItemNode> {
        self.arena.get(id)
    }

    pub fn arena(&self) -> &ItemArena {
        &self.arena
    }

    /// Subscribe to structural change notifications. Dropped receivers are
    /// pruned on the next emit.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, event: TreeEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    // ========================================================================
    // Loading / Assembly
    // ========================================================================

    /// Discard the current tree and rebuild it from the store.
    ///
    /// A failing category or feed load query is fatal: the error propagates
    /// and no partial tree is offered. Unresolvable category chains are
    /// dropped; feeds whose parent category does not resolve are logged and
    /// skipped. The recycle bin is re-created as the last child of the root.
    /// All previously handed-out [`NodeId`]s are invalidated.
    pub async fn load_from_database(&mut self) -> Result<()> {
        let categories = self
            .db
            .load_all_categories()
            .await
            .context("query for obtaining categories failed")?;
        let feeds = self
            .db
            .load_all_feeds()
            .await
            .context("query for obtaining feeds failed")?;

        self.arena = ItemArena::new();
        let assignments = self.assemble_categories(categories);
        self.assemble_feeds(feeds, &assignments);

        // The bin instance is recreated and always sits last under the root.
        self.bin = self.arena.insert(ItemNode::new(
            "Recycle bin",
            ItemKind::Bin {
                counts: MessageCounts::default(),
            },
        ));
        let root = self.arena.root();
        self.arena.append_child(root, self.bin);

        self.notify(TreeEvent::LayoutChanged);
        Ok(())
    }

    /// Attach categories with a single breadth-first expansion over a
    /// parent-id multimap. Categories whose parent chain never reaches the
    /// root are dropped.
    fn assemble_categories(&mut self, rows: Vec<CategoryRow>) -> HashMap<i64, NodeId> {
        let mut pending: HashMap<i64, Vec<CategoryRow>> = HashMap::new();
        for row in rows {
            pending.entry(row.parent_id).or_default().push(row);
        }

        let mut assignments = HashMap::new();
        assignments.insert(NO_PARENT_CATEGORY, self.arena.root());
        let mut queue = VecDeque::from([NO_PARENT_CATEGORY]);

        while let Some(parent_store_id) = queue.pop_front() {
            let Some(children) = pending.remove(&parent_store_id) else {
                continue;
            };
            let target = assignments[&parent_store_id];

            for row in children {
                let node = self.arena.insert(ItemNode::new(
                    row.title,
                    ItemKind::Category(CategoryData { id: row.id }),
                ));
                self.arena.append_child(target, node);
                assignments.insert(row.id, node);
                queue.push_back(row.id);
            }
        }

        if !pending.is_empty() {
            let dropped: usize = pending.values().map(Vec::len).sum();
            debug!(dropped, "dropping categories with unresolvable parents");
        }

        assignments
    }

    /// Attach feeds to their resolved category (or the root for top-level
    /// feeds). Unrecognized formats are skipped silently, loose feeds are
    /// logged but do not fail the load.
    fn assemble_feeds(&mut self, rows: Vec<FeedRow>, assignments: &HashMap<i64, NodeId>) {
        for row in rows {
            let Some(format) = FeedFormat::from_db(row.kind) else {
                continue;
            };

            let Some(&target) = assignments.get(&row.category_id) else {
                warn!(title = %row.title, "feed is loose, skipping it");
                continue;
            };

            let mut data = FeedData::new(row.id, format, row.url);
            data.auto_update = AutoUpdateMode::from_db(row.update_mode, row.update_interval);
            let node = self
                .arena
                .insert(ItemNode::new(row.title, ItemKind::Feed(data)));
            self.arena.append_child(target, node);
        }
    }

    // ========================================================================
    // Structural Mutations
    // ========================================================================

    /// Store parent id a node provides for its children.
    fn store_parent_id(&self, parent: NodeId) -> Result<i64> {
        let node = self
            .arena
            .get(parent)
            .context("parent node no longer exists")?;
        match &node.kind {
            ItemKind::Root => Ok(NO_PARENT_CATEGORY),
            ItemKind::Category(category) => Ok(category.id),
            _ => bail!("only the root or a category can hold children"),
        }
    }

    /// Row a new child of `parent` will land on; under the root that is the
    /// slot just before the recycle bin.
    fn insert_position(&self, parent: NodeId) -> usize {
        let children = self
            .arena
            .get(parent)
            .map(|n| n.children())
            .unwrap_or_default();
        if parent == self.arena.root() && children.contains(&self.bin) {
            children.len() - 1
        } else {
            children.len()
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let row = self.insert_position(parent);
        self.notify(TreeEvent::RowsAboutToBeInserted { parent, row });
        self.arena.append_child(parent, child);
        self.ensure_bin_last();
        self.notify(TreeEvent::RowsInserted { parent, row });
    }

    fn ensure_bin_last(&mut self) {
        let root = self.arena.root();
        let children = self
            .arena
            .get(root)
            .map(|n| n.children().to_vec())
            .unwrap_or_default();
        if children.last() != Some(&self.bin) && children.contains(&self.bin) {
            self.arena.remove_child(root, self.bin);
            self.arena.append_child(root, self.bin);
        }
    }

    /// Persist a new category under `parent` and append it on success.
    /// On a storage error the tree is unchanged.
    pub async fn add_category(&mut self, title: &str, parent: NodeId) -> Result<NodeId> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;
        self.add_category_unlocked(title, parent).await
    }

    pub(super) async fn add_category_unlocked(
        &mut self,
        title: &str,
        parent: NodeId,
    ) -> Result<NodeId> {
        let parent_store_id = self.store_parent_id(parent)?;
        let id = self.db.insert_category(title, parent_store_id).await?;

        let node = self
            .arena
            .insert(ItemNode::new(title, ItemKind::Category(CategoryData { id })));
        self.attach(parent, node);
        Ok(node)
    }

    /// Persist a new feed under `parent` and append it on success.
    /// On a storage error the tree is unchanged.
    pub async fn add_feed(
        &mut self,
        title: &str,
        url: &str,
        format: FeedFormat,
        auto_update: AutoUpdateMode,
        parent: NodeId,
    ) -> Result<NodeId> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;
        self.add_feed_unlocked(title, url, format, auto_update, parent)
            .await
    }

    pub(super) async fn add_feed_unlocked(
        &mut self,
        title: &str,
        url: &str,
        format: FeedFormat,
        auto_update: AutoUpdateMode,
        parent: NodeId,
    ) -> Result<NodeId> {
        let parent_store_id = self.store_parent_id(parent)?;
        let (update_mode, update_interval) = auto_update.to_db();
        let id = self
            .db
            .insert_feed(
                title,
                url,
                format.to_db(),
                parent_store_id,
                update_mode,
                update_interval,
            )
            .await?;

        let mut data = FeedData::new(id, format, url);
        data.auto_update = auto_update;
        let node = self
            .arena
            .insert(ItemNode::new(title, ItemKind::Feed(data)));
        self.attach(parent, node);
        Ok(node)
    }

    /// Persistently delete a node and its whole subtree (messages included),
    /// then detach and destroy the in-memory nodes. On a storage error the
    /// tree is unchanged. The root and the recycle bin are not removable.
    pub async fn remove_item(&mut self, node: NodeId) -> Result<()> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;

        let item = self.arena.get(node).context("node no longer exists")?;
        if item.is_root() || item.is_bin() {
            bail!("the root and the recycle bin cannot be removed");
        }
        let parent = item.parent().context("node is detached")?;

        let mut category_ids = Vec::new();
        let mut feed_ids = Vec::new();
        for id in std::iter::once(node).chain(self.arena.recursive_children(node)) {
            match self.arena.get(id).map(|n| &n.kind) {
                Some(ItemKind::Category(category)) => category_ids.push(category.id),
                Some(ItemKind::Feed(feed)) => feed_ids.push(feed.id),
                _ => {}
            }
        }

        // Cascade in the store first; only a committed deletion mutates the tree.
        self.db.delete_subtree(&category_ids, &feed_ids).await?;

        let row = self.arena.row(node).unwrap_or(0);
        self.notify(TreeEvent::RowsAboutToBeRemoved { parent, row });
        self.arena.remove_child(parent, node);
        self.notify(TreeEvent::RowsRemoved { parent, row });
        self.arena.remove_subtree(node);
        Ok(())
    }

    /// Move a node under a new parent in the in-memory tree. No-op when it
    /// already sits there. Does not persist the move — the caller must have
    /// already persisted the new parent assignment.
    pub fn reassign_node_to_new_parent(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        let item = self.arena.get(node).context("node no longer exists")?;
        if item.is_root() || item.is_bin() {
            bail!("the root and the recycle bin cannot be moved");
        }
        let old_parent = item.parent().context("node is detached")?;
        if old_parent == new_parent {
            return Ok(());
        }
        self.store_parent_id(new_parent)?;
        if node == new_parent || self.arena.recursive_children(node).contains(&new_parent) {
            bail!("cannot move a node under its own subtree");
        }

        let row = self.arena.row(node).unwrap_or(0);
        self.notify(TreeEvent::RowsAboutToBeRemoved {
            parent: old_parent,
            row,
        });
        self.arena.remove_child(old_parent, node);
        self.notify(TreeEvent::RowsRemoved {
            parent: old_parent,
            row,
        });

        self.attach(new_parent, node);
        Ok(())
    }

    /// Persist a new parent for a node and move it in the tree. On a storage
    /// error the tree is unchanged.
    pub async fn move_item(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;

        let parent_store_id = self.store_parent_id(new_parent)?;
        let item = self.arena.get(node).context("node no longer exists")?;
        match &item.kind {
            ItemKind::Category(category) => {
                self.db
                    .set_category_parent(category.id, parent_store_id)
                    .await?;
            }
            ItemKind::Feed(feed) => {
                self.db.set_feed_parent(feed.id, parent_store_id).await?;
            }
            _ => bail!("the root and the recycle bin cannot be moved"),
        }

        self.reassign_node_to_new_parent(node, new_parent)
    }

    /// Persist a new title for a category node and apply it in the tree.
    pub async fn rename_category(&mut self, node: NodeId, title: &str) -> Result<()> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;

        let item = self.arena.get(node).context("node no longer exists")?;
        let category = item
            .as_category()
            .context("only categories can be renamed here")?;
        self.db.rename_category(category.id, title).await?;

        if let Some(item) = self.arena.get_mut(node) {
            item.title = title.to_string();
        }
        self.notify(TreeEvent::LayoutChanged);
        Ok(())
    }

    /// Persist a new auto-update policy for a feed node and apply it.
    pub async fn set_feed_auto_update(
        &mut self,
        node: NodeId,
        auto_update: AutoUpdateMode,
    ) -> Result<()> {
        let lock = self.update_lock();
        let _guard = lock.try_acquire()?;

        let feed_id = self
            .arena
            .get(node)
            .and_then(ItemNode::as_feed)
            .context("node is not a feed")?
            .id;
        let (update_mode, update_interval) = auto_update.to_db();
        self.db
            .set_feed_update_policy(feed_id, update_mode, update_interval)
            .await?;

        if let Some(feed) = self.arena.get_mut(node).and_then(ItemNode::as_feed_mut) {
            feed.auto_update = auto_update;
        }
        Ok(())
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Auto-update decision pass, pure over current feed state.
    ///
    /// Disabled feeds are never included; global-interval feeds are included
    /// exactly when `auto_update_now` holds; specific-interval feeds count
    /// down one pass and are included (counter reset) when it lapses.
    /// Returned in traversal order.
    pub fn feeds_for_scheduled_update(&mut self, auto_update_now: bool) -> Vec<NodeId> {
        let mut due = Vec::new();

        for id in self.arena.recursive_children(self.arena.root()) {
            let Some(feed) = self.arena.get_mut(id).and_then(ItemNode::as_feed_mut) else {
                continue;
            };

            match feed.auto_update {
                AutoUpdateMode::Disabled => {}
                AutoUpdateMode::GlobalInterval => {
                    if auto_update_now {
                        due.push(id);
                    }
                }
                AutoUpdateMode::SpecificInterval { initial, remaining } => {
                    let remaining = remaining - 1;
                    if remaining <= 0 {
                        feed.auto_update = AutoUpdateMode::SpecificInterval {
                            initial,
                            remaining: initial,
                        };
                        due.push(id);
                    } else {
                        feed.auto_update =
                            AutoUpdateMode::SpecificInterval { initial, remaining };
                    }
                }
            }
        }

        due
    }

    /// Build the fetch-pipeline request batch for the given feed nodes.
    pub fn update_requests(&self, nodes: &[NodeId]) -> Vec<FeedUpdateRequest> {
        nodes
            .iter()
            .filter_map(|id| {
                let node = self.arena.get(*id)?;
                let feed = node.as_feed()?;
                Some(FeedUpdateRequest {
                    feed_id: feed.id,
                    title: node.title.clone(),
                    url: feed.url.clone(),
                    format: feed.format,
                })
            })
            .collect()
    }

    // ========================================================================
    // Bulk Feed Operations
    // ========================================================================

    /// Set the read flag on every non-deleted message of the given feed
    /// nodes, in one transaction.
    pub async fn mark_feeds_read(&self, nodes: &[NodeId], read: bool) -> Result<()> {
        let feed_ids = self.store_feed_ids(nodes);
        self.db.mark_feeds_read(&feed_ids, read).await
    }

    /// Soft-delete every non-deleted message of the given feed nodes, in one
    /// transaction. `read_only` restricts the pass to already-read messages.
    pub async fn mark_feeds_deleted(
        &self,
        nodes: &[NodeId],
        deleted: bool,
        read_only: bool,
    ) -> Result<()> {
        let feed_ids = self.store_feed_ids(nodes);
        self.db
            .mark_feeds_deleted(&feed_ids, deleted, read_only)
            .await
    }

    /// Collect all non-deleted messages of the given feed nodes (the export
    /// path).
    pub async fn messages_for_feeds(&self, nodes: &[NodeId]) -> Result<Vec<Message>> {
        let feed_ids = self.store_feed_ids(nodes);
        self.db.messages_for_feeds(&feed_ids).await
    }

    fn store_feed_ids(&self, nodes: &[NodeId]) -> Vec<i64> {
        let mut ids: Vec<i64> = nodes
            .iter()
            .filter_map(|id| self.arena.get(*id)?.as_feed().map(|f| f.id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    // ========================================================================
    // Recycle Bin
    // ========================================================================

    /// Permanently purge every message currently in the bin, then refresh
    /// counts tree-wide. Returns the number of messages purged.
    pub async fn empty_bin(&mut self) -> Result<u64> {
        let purged = self.db.empty_bin().await?;
        self.update_counts().await?;
        Ok(purged)
    }

    /// Restore every message currently in the bin back to its feed, then
    /// refresh counts tree-wide. Returns the number of messages restored.
    pub async fn restore_bin(&mut self) -> Result<u64> {
        let restored = self.db.restore_bin().await?;
        self.update_counts().await?;
        Ok(restored)
    }

    // ========================================================================
    // Counts & Status
    // ========================================================================

    /// Refresh every feed's unread/total counts and the bin's counts from
    /// the store in one grouped query, then emit a layout change.
    pub async fn update_counts(&mut self) -> Result<()> {
        let per_feed = self.db.feed_counts().await?;
        let bin_counts = self.db.bin_counts().await?;

        for id in self.arena.recursive_children(self.arena.root()) {
            if let Some(feed) = self.arena.get_mut(id).and_then(ItemNode::as_feed_mut) {
                feed.counts = per_feed.get(&feed.id).copied().unwrap_or_default();
            }
        }
        if let Some(node) = self.arena.get_mut(self.bin) {
            node.kind = ItemKind::Bin { counts: bin_counts };
        }

        self.notify(TreeEvent::LayoutChanged);
        Ok(())
    }

    /// Aggregated counts of a node: its own for a feed or the bin, the sum
    /// over descendant feeds for the root or a category.
    pub fn counts_for_item(&self, node: NodeId) -> MessageCounts {
        match self.arena.get(node).map(|n| &n.kind) {
            Some(ItemKind::Feed(feed)) => feed.counts,
            Some(ItemKind::Bin { counts }) => *counts,
            Some(_) => {
                let mut total = MessageCounts::default();
                for id in self.feeds_for_item(node) {
                    if let Some(feed) = self.arena.get(id).and_then(ItemNode::as_feed) {
                        total.unread += feed.counts.unread;
                        total.total += feed.counts.total;
                    }
                }
                total
            }
            None => MessageCounts::default(),
        }
    }

    pub fn set_feed_status(&mut self, node: NodeId, status: FeedStatus) {
        if let Some(feed) = self.arena.get_mut(node).and_then(ItemNode::as_feed_mut) {
            feed.status = status;
        }
    }

    pub fn has_any_feed_new_messages(&self) -> bool {
        self.all_feeds().iter().any(|id| {
            self.arena
                .get(*id)
                .and_then(ItemNode::as_feed)
                .is_some_and(|f| f.status == FeedStatus::NewMessages)
        })
    }

    // ========================================================================
    // Structural Queries
    // ========================================================================

    /// All feed nodes in the tree, traversal order.
    pub fn all_feeds(&self) -> Vec<NodeId> {
        self.feeds_for_item(self.arena.root())
    }

    /// Feed nodes under `node` (including `node` itself when it is a feed).
    pub fn feeds_for_item(&self, node: NodeId) -> Vec<NodeId> {
        let mut feeds = Vec::new();
        if self
            .arena
            .get(node)
            .is_some_and(|n| n.as_feed().is_some())
        {
            feeds.push(node);
        }
        for id in self.arena.recursive_children(node) {
            if self.arena.get(id).is_some_and(|n| n.as_feed().is_some()) {
                feeds.push(id);
            }
        }
        feeds
    }

    /// Category nodes under `node` (including `node` itself when it is one).
    pub fn categories_for_item(&self, node: NodeId) -> Vec<NodeId> {
        let mut categories = Vec::new();
        if self
            .arena
            .get(node)
            .is_some_and(|n| n.as_category().is_some())
        {
            categories.push(node);
        }
        for id in self.arena.recursive_children(node) {
            if self
                .arena
                .get(id)
                .is_some_and(|n| n.as_category().is_some())
            {
                categories.push(id);
            }
        }
        categories
    }

    /// Positional reference of a node: child rows from the root down.
    /// The root itself maps to the empty path.
    pub fn path_for_node(&self, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(item) = self.arena.get(current) {
            let Some(parent) = item.parent() else { break };
            path.push(self.arena.row(current)?);
            current = parent;
        }
        if current == self.arena.root() {
            path.reverse();
            Some(path)
        } else {
            None
        }
    }

    /// Resolve a positional reference back to a node.
    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        let mut current = self.arena.root();
        for &row in path {
            current = *self.arena.get(current)?.children().get(row)?;
        }
        Some(current)
    }

    /// Find the feed node with the given store id.
    pub fn find_feed(&self, feed_id: i64) -> Option<NodeId> {
        self.all_feeds().into_iter().find(|id| {
            self.arena
                .get(*id)
                .and_then(ItemNode::as_feed)
                .is_some_and(|f| f.id == feed_id)
        })
    }

    /// Snapshot of a node for the message list and the service hooks.
    pub fn item_handle(&self, node: NodeId) -> Option<ItemHandle> {
        let item = self.arena.get(node)?;
        let kind = match &item.kind {
            ItemKind::Root => HandleKind::Root,
            ItemKind::Category(_) => HandleKind::Category,
            ItemKind::Feed(_) => HandleKind::Feed,
            ItemKind::Bin { .. } => HandleKind::Bin,
        };
        let feed_ids = self.store_feed_ids(&self.feeds_for_item(node));
        Some(ItemHandle {
            kind,
            title: item.title.clone(),
            feed_ids,
        })
    }
}
