use std::collections::HashMap;

use crate::storage::MessageCounts;

use super::feed::FeedData;

/// Sentinel parent id meaning "directly under the root".
pub const NO_PARENT_CATEGORY: i64 = -1;

/// Sentinel store id of the recycle bin node.
pub const RECYCLE_BIN_ID: i64 = -2;

/// Handle to a node in the item arena. Stable for the lifetime of the node;
/// never reused after the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// Kind-specific payload of a category node.
#[derive(Debug, Clone)]
pub struct CategoryData {
    /// Store-assigned id (unique within the categories table).
    pub id: i64,
}

/// Closed set of node kinds making up the feed hierarchy. Exhaustive matches
/// on this enum are what replaces class-hierarchy dispatch.
#[derive(Debug, Clone)]
pub enum ItemKind {
    Root,
    Category(CategoryData),
    Feed(FeedData),
    Bin { counts: MessageCounts },
}

/// A single entry in the feed hierarchy.
#[derive(Debug, Clone)]
pub struct ItemNode {
    pub title: String,
    pub kind: ItemKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl ItemNode {
    pub fn new(title: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            title: title.into(),
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_feed(&self) -> Option<&FeedData> {
        match &self.kind {
            ItemKind::Feed(feed) => Some(feed),
            _ => None,
        }
    }

    pub fn as_feed_mut(&mut self) -> Option<&mut FeedData> {
        match &mut self.kind {
            ItemKind::Feed(feed) => Some(feed),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&CategoryData> {
        match &self.kind {
            ItemKind::Category(category) => Some(category),
            _ => None,
        }
    }

    /// Store id of the node: table ids for categories and feeds, the fixed
    /// sentinels for the root and the recycle bin.
    pub fn store_id(&self) -> i64 {
        match &self.kind {
            ItemKind::Root => NO_PARENT_CATEGORY,
            ItemKind::Category(category) => category.id,
            ItemKind::Feed(feed) => feed.id,
            ItemKind::Bin { .. } => RECYCLE_BIN_ID,
        }
    }

    pub fn is_bin(&self) -> bool {
        matches!(self.kind, ItemKind::Bin { .. })
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ItemKind::Root)
    }
}

/// Arena holding the item tree. The arena owns every node; detaching a
/// subtree removes its nodes. Parent/child links are plain ids, so there are
/// no reference cycles to manage.
#[derive(Debug)]
pub struct ItemArena {
    nodes: HashMap<NodeId, ItemNode>,
    next_id: u64,
    root: NodeId,
}

impl ItemArena {
    /// Create an arena containing only the root node.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, ItemNode::new("Root", ItemKind::Root));
        Self {
            nodes,
            next_id: 1,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&ItemNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ItemNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Add a detached node to the arena. It becomes part of the tree only
    /// once appended under a parent.
    pub fn insert(&mut self, node: ItemNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Append `child` as the last child of `parent` and set its
    /// back-reference. Display order is insertion order.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    /// Detach `child` from `parent`'s child sequence without destroying it.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
    }

    /// Remove a detached node and its whole subtree from the arena,
    /// destroying the nodes. The caller must have detached it first.
    pub fn remove_subtree(&mut self, node: NodeId) {
        for id in self.recursive_children(node) {
            self.nodes.remove(&id);
        }
        self.nodes.remove(&node);
    }

    /// Index of `node` among its parent's children; `None` for the root.
    pub fn row(&self, node: NodeId) -> Option<usize> {
        let parent = self.nodes.get(&node)?.parent?;
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .position(|c| *c == node)
    }

    /// Flattened descendant list in pre-order (the node itself excluded).
    pub fn recursive_children(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&node) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return result,
        };

        while let Some(id) = stack.pop() {
            result.push(id);
            if let Some(n) = self.nodes.get(&id) {
                stack.extend(n.children.iter().rev().copied());
            }
        }

        result
    }

    /// Find a direct child category with the given title (the merge
    /// collision fallback).
    pub fn child_category_by_title(&self, parent: NodeId, title: &str) -> Option<NodeId> {
        let parent = self.nodes.get(&parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|c| match self.nodes.get(c) {
                Some(node) => node.as_category().is_some() && node.title == title,
                None => false,
            })
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for ItemArena {
    fn default() -> Self {
        Self::new()
    }
}
