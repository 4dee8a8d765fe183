//! Render-ready projection of the conversation log.
//!
//! The list is built two ways: incrementally while a reply is in flight, and
//! from scratch by [`reconstruct`] when a session is reopened. Reconstruction
//! reads only the durable log, never live stream state.

use chatrs_core::{ConversationState, Role, Turn};
use uuid::Uuid;

use crate::stream::StreamReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Assistant,
    /// Static notice such as an error message.
    Notice,
}

/// Either finished text or a reply that may still be streaming.
#[derive(Debug, Clone)]
pub enum DisplayContent {
    Text(String),
    Stream(StreamReader),
}

impl DisplayContent {
    /// Current text, whether finished or still streaming.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Stream(reader) => reader.text(),
        }
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Stream(reader) => reader.is_open(),
        }
    }

    #[must_use]
    pub fn as_stream(&self) -> Option<&StreamReader> {
        match self {
            Self::Text(_) => None,
            Self::Stream(reader) => Some(reader),
        }
    }
}

impl PartialEq for DisplayContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Stream(a), Self::Stream(b)) => a.text() == b.text() && a.status() == b.status(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEntry {
    pub id: String,
    pub kind: EntryKind,
    pub content: DisplayContent,
}

impl DisplayEntry {
    #[must_use]
    pub fn text(id: impl Into<String>, kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            content: DisplayContent::Text(text.into()),
        }
    }

    #[must_use]
    pub fn live(id: impl Into<String>, reader: StreamReader) -> Self {
        Self {
            id: id.into(),
            kind: EntryKind::Assistant,
            content: DisplayContent::Stream(reader),
        }
    }

    #[must_use]
    pub fn notice(text: impl Into<String>) -> Self {
        Self::text(Uuid::now_v7().to_string(), EntryKind::Notice, text)
    }
}

/// Rebuild the display list from the durable log.
///
/// System turns are dropped; the rest map in order to entries with id
/// `<session_id>-<index>`, where `index` counts only the kept turns.
/// Same input, same output.
#[must_use]
pub fn reconstruct(state: &ConversationState) -> Vec<DisplayEntry> {
    state
        .turns()
        .iter()
        .filter(|turn| turn.role != Role::System)
        .enumerate()
        .map(|(index, turn)| {
            let kind = match turn.role {
                Role::User => EntryKind::User,
                Role::Assistant | Role::System => EntryKind::Assistant,
            };
            DisplayEntry::text(
                format!("{}-{index}", state.session_id()),
                kind,
                turn.content.clone(),
            )
        })
        .collect()
}

/// The transient list for one active session.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    entries: Vec<DisplayEntry>,
}

impl DisplayState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rehydrate(state: &ConversationState) -> Self {
        Self {
            entries: reconstruct(state),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Optimistic entry for a just-appended user turn.
    pub fn push_user(&mut self, turn: &Turn) -> DisplayEntry {
        let entry = DisplayEntry::text(turn.id.clone(), EntryKind::User, turn.content.clone());
        self.entries.push(entry.clone());
        entry
    }

    /// Live entry bound to a reply that is still being generated.
    pub fn push_live(&mut self, reader: StreamReader) -> DisplayEntry {
        let entry = DisplayEntry::live(Uuid::now_v7().to_string(), reader);
        self.entries.push(entry.clone());
        entry
    }

    /// Swap the entry with `id` for `replacement`, or append it when no such
    /// entry exists.
    pub fn replace(&mut self, id: &str, replacement: DisplayEntry) {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.id == id) {
            *slot = replacement;
        } else {
            self.entries.push(replacement);
        }
    }
}
