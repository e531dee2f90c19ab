use std::collections::HashMap;

use crate::storage::Message;

/// Pending-edit overlay for the message list.
///
/// Holds fully patched copies of rows whose flags changed since the last
/// repopulation, keyed by row index. Reads consult the overlay first, so a
/// persisted flag flip is visible without re-running the list query. The
/// overlay is discarded wholesale on every repopulation.
#[derive(Debug, Default)]
pub(crate) struct PendingEdits {
    edits: HashMap<usize, Message>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }

    pub fn contains(&self, row: usize) -> bool {
        self.edits.contains_key(&row)
    }

    pub fn get(&self, row: usize) -> Option<&Message> {
        self.edits.get(&row)
    }

    /// Record an edit for `row`: the stored copy (or `base` when the row is
    /// untouched) is cloned, patched and kept. Later edits stack on earlier
    /// ones for the same row.
    pub fn patch(&mut self, row: usize, base: &Message, patch: impl FnOnce(&mut Message)) {
        let mut message = self.edits.get(&row).cloned().unwrap_or_else(|| base.clone());
        patch(&mut message);
        self.edits.insert(row, message);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
