//! Linear undo history over whole-document snapshots.

use tracing::debug;

use crate::timer::Timestamp;

pub const MAX_HISTORY: usize = 100;

/// Serialized markup captured at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    content: String,
    timestamp: Timestamp,
}

impl Snapshot {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Bounded snapshot log with a cursor at the snapshot currently shown.
///
/// `cursor` is `None` only while the log is empty. Pushing after an undo
/// drops everything past the cursor, and once the log exceeds its bound the
/// oldest snapshots are evicted with the cursor re-based onto the same entry.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: Vec<Snapshot>,
    cursor: Option<usize>,
    max_entries: usize,
}

impl HistoryStack {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            max_entries: max_entries.max(1),
        }
    }

    pub fn push(&mut self, content: impl Into<String>, timestamp: Timestamp) {
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        self.entries.push(Snapshot {
            content: content.into(),
            timestamp,
        });
        let mut cursor = self.entries.len() - 1;

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
            cursor -= excess;
        }
        self.cursor = Some(cursor);
        debug!(len = self.entries.len(), cursor, "history snapshot pushed");
    }

    pub fn undo(&mut self) -> Option<&str> {
        let cursor = self.cursor.filter(|&cursor| cursor > 0)? - 1;
        self.cursor = Some(cursor);
        debug!(cursor, "history undo");
        Some(self.entries[cursor].content())
    }

    pub fn redo(&mut self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        let cursor = self.cursor.map_or(0, |cursor| cursor + 1);
        self.cursor = Some(cursor);
        debug!(cursor, "history redo");
        Some(self.entries[cursor].content())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        match self.cursor {
            Some(cursor) => cursor + 1 < self.entries.len(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.map(|cursor| &self.entries[cursor])
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}
