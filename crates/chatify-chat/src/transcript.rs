use chatify_core::message::{Message, Role};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Client-side id of an entry the store has not acknowledged yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId(uuid::Uuid);

impl PlaceholderId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryId {
    Provisional(PlaceholderId),
    Persisted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub role: Role,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl TranscriptEntry {
    pub fn is_provisional(&self) -> bool {
        matches!(self.id, EntryId::Provisional(_))
    }

    pub fn persisted_id(&self) -> Option<&str> {
        match &self.id {
            EntryId::Persisted(id) => Some(id),
            EntryId::Provisional(_) => None,
        }
    }
}

impl From<Message> for TranscriptEntry {
    fn from(msg: Message) -> Self {
        Self {
            id: EntryId::Persisted(msg.id),
            role: msg.role,
            content: msg.content,
            created_at: Some(msg.created_at),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("{pending} pending entries but {persisted} persisted rows")]
    CountMismatch { pending: usize, persisted: usize },

    #[error("row {index} was stored as {stored}, expected {expected}")]
    RoleMismatch {
        index: usize,
        expected: Role,
        stored: Role,
    },
}

/// Ordered, append-only list of the messages shown for a conversation.
///
/// Optimistic entries are appended at the position they will keep once
/// stored; reconciliation swaps their ids in place and never moves them.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            entries: messages.into_iter().map(TranscriptEntry::from).collect(),
        }
    }

    /// Replaces the whole list with store contents.
    pub fn replace_with(&mut self, messages: Vec<Message>) {
        *self = Self::from_messages(messages);
    }

    pub fn push_provisional(&mut self, role: Role, content: String) -> PlaceholderId {
        let id = PlaceholderId::new();
        self.entries.push(TranscriptEntry {
            id: EntryId::Provisional(id),
            role,
            content,
            created_at: None,
        });
        id
    }

    /// Applies store-assigned ids and timestamps to provisional entries.
    ///
    /// `pending[i]` is matched with `persisted[i]`. An entry is located by its
    /// placeholder id and role, never by content. Entries no longer present
    /// (e.g. replaced by a reload) are skipped. Returns how many were updated.
    pub fn reconcile(
        &mut self,
        pending: &[(PlaceholderId, Role)],
        persisted: &[Message],
    ) -> Result<usize, ReconcileError> {
        if pending.len() != persisted.len() {
            return Err(ReconcileError::CountMismatch {
                pending: pending.len(),
                persisted: persisted.len(),
            });
        }
        for (index, ((_, role), row)) in pending.iter().zip(persisted).enumerate() {
            if *role != row.role {
                return Err(ReconcileError::RoleMismatch {
                    index,
                    expected: *role,
                    stored: row.role,
                });
            }
        }

        let mut updated = 0;
        for ((placeholder, role), row) in pending.iter().zip(persisted) {
            let target = EntryId::Provisional(*placeholder);
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.id == target && e.role == *role)
            {
                entry.id = EntryId::Persisted(row.id.clone());
                entry.created_at = Some(row.created_at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn provisional_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_provisional()).count()
    }
}
