//! Response history: an append-only log of inference requests with a
//! wrapping cursor.
//!
//! New entries always become the visible one. Entries move
//! `Loading → Done` or `Loading → Error` and never change again.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(String);

impl EntryId {
    /// Millisecond timestamp plus a random suffix. Unique within a page
    /// context, not cryptographically.
    fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{millis:x}-{}", &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Loading,
    Done,
    Error,
}

impl EntryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EntryStatus::Loading)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Loading => write!(f, "loading"),
            EntryStatus::Done => write!(f, "done"),
            EntryStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntry {
    pub id: EntryId,
    pub status: EntryStatus,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// What the panel should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Empty,
    Entry {
        /// 1-based
        position: usize,
        total: usize,
        status: EntryStatus,
        text: String,
    },
}

/// Display layer for the response panel.
///
/// Called with the history lock held; implementations must not call back
/// into the history.
pub trait HistoryView: Send + Sync {
    fn render(&self, state: &RenderState);

    /// The user dismissed the panel.
    fn hide(&self) {}
}

/// View that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl HistoryView for NullView {
    fn render(&self, _state: &RenderState) {}
}

pub struct ResponseHistory {
    entries: Vec<ResponseEntry>,
    cursor: Option<usize>,
    visible: bool,
    view: Arc<dyn HistoryView>,
}

impl ResponseHistory {
    pub fn new(view: Arc<dyn HistoryView>) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            visible: false,
            view,
        }
    }

    /// Append a `Loading` entry, point the cursor at it and show the panel.
    pub fn append(&mut self, initial_text: impl Into<String>) -> EntryId {
        let id = EntryId::generate();
        self.entries.push(ResponseEntry {
            id: id.clone(),
            status: EntryStatus::Loading,
            text: initial_text.into(),
        });
        self.cursor = Some(self.entries.len() - 1);
        self.visible = true;
        tracing::debug!(entry = %id, total = self.entries.len(), "history entry appended");
        self.signal();
        id
    }

    /// Update an entry's text and/or status.
    ///
    /// Unknown ids and entries already in a terminal state are left alone.
    /// Returns whether anything changed.
    pub fn update(
        &mut self,
        id: &EntryId,
        text: Option<String>,
        status: Option<EntryStatus>,
    ) -> bool {
        let Some(index) = self.entries.iter().position(|e| &e.id == id) else {
            tracing::debug!(entry = %id, "update for unknown history entry ignored");
            return false;
        };

        let entry = &mut self.entries[index];
        if entry.status.is_terminal() {
            tracing::debug!(entry = %id, status = %entry.status, "entry already settled");
            return false;
        }
        if let Some(text) = text {
            entry.text = text;
        }
        if let Some(status) = status {
            entry.status = status;
        }

        if self.cursor == Some(index) {
            self.signal();
        }
        true
    }

    /// Move the cursor one step, wrapping at either end. No-op when empty.
    pub fn navigate(&mut self, direction: Direction) {
        let len = self.entries.len();
        let Some(cursor) = self.cursor else {
            return;
        };
        self.cursor = Some(match direction {
            Direction::Next => (cursor + 1) % len,
            Direction::Previous => (cursor + len - 1) % len,
        });
        self.signal();
    }

    pub fn render_state(&self) -> RenderState {
        match self.cursor.and_then(|i| self.entries.get(i).map(|e| (i, e))) {
            Some((index, entry)) => RenderState::Entry {
                position: index + 1,
                total: self.entries.len(),
                status: entry.status,
                text: entry.text.clone(),
            },
            None => RenderState::Empty,
        }
    }

    /// Hide the panel. History and cursor are kept; the next append shows
    /// it again. Updates that land while hidden are recorded silently.
    pub fn dismiss(&mut self) {
        if self.visible {
            self.visible = false;
            self.view.hide();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn entries(&self) -> &[ResponseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry (page-context restart).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.dismiss();
    }

    fn signal(&self) {
        if self.visible {
            self.view.render(&self.render_state());
        }
    }
}

impl fmt::Debug for ResponseHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHistory")
            .field("entries", &self.entries)
            .field("cursor", &self.cursor)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}
