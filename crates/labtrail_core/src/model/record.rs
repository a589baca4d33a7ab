//! Shared record metadata and entity contracts.
//!
//! # Responsibility
//! - Define the metadata every synchronized record carries.
//! - Name the closed set of entity kinds and their storage locations.
//!
//! # Invariants
//! - `RecordMeta::id` is assigned by the local store; `0` marks a record that
//!   only exists remotely (display results of a remote fetch).
//! - `updated_at` strictly increases on every local mutation.
//! - An empty `user_id` marks a record created while signed out.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Locally unique identifier assigned by SQLite.
pub type LocalId = i64;

/// Closed set of synchronized entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Hypothesis,
    Experiment,
    LogEntry,
    Note,
    ReminderSetting,
}

impl EntityKind {
    /// Every kind, parents before children.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Project,
        EntityKind::Hypothesis,
        EntityKind::Experiment,
        EntityKind::LogEntry,
        EntityKind::Note,
        EntityKind::ReminderSetting,
    ];

    /// Stable tag used in the mapping table and in remote documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Hypothesis => "hypothesis",
            Self::Experiment => "experiment",
            Self::LogEntry => "log_entry",
            Self::Note => "note",
            Self::ReminderSetting => "reminder_setting",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Remote collection holding documents of this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Hypothesis => "hypotheses",
            Self::Experiment => "experiments",
            Self::LogEntry => "logEntries",
            Self::Note => "notes",
            Self::ReminderSetting => "reminderSettings",
        }
    }

    /// Local SQLite table holding rows of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Hypothesis => "hypotheses",
            Self::Experiment => "experiments",
            Self::LogEntry => "log_entries",
            Self::Note => "notes",
            Self::ReminderSetting => "reminder_settings",
        }
    }

    /// Whether records of this kind have no parent.
    pub fn is_top_level(self) -> bool {
        self == Self::Project
    }

    /// Whether reminder settings may hang off records of this kind.
    pub fn accepts_reminders(self) -> bool {
        matches!(self, Self::Project | Self::Hypothesis | Self::Experiment)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Local reference to a parent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: EntityKind,
    pub id: LocalId,
}

impl ParentRef {
    pub fn new(kind: EntityKind, id: LocalId) -> Self {
        Self { kind, id }
    }

    pub fn project(id: LocalId) -> Self {
        Self::new(EntityKind::Project, id)
    }

    pub fn hypothesis(id: LocalId) -> Self {
        Self::new(EntityKind::Hypothesis, id)
    }

    pub fn experiment(id: LocalId) -> Self {
        Self::new(EntityKind::Experiment, id)
    }
}

/// Metadata shared by every synchronized record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Local id; `0` until the local store assigns one.
    pub id: LocalId,
    /// Remote document id once the record has been mirrored or imported.
    pub remote_id: Option<String>,
    /// Owning user; empty while the record was created signed out.
    pub user_id: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Drives last-writer-wins.
    pub updated_at: i64,
    /// Soft-delete flag.
    pub archived: bool,
}

/// Local validation failures raised before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankField(&'static str),
    OutOfRange { field: &'static str, value: i64 },
    InvalidParentKind(EntityKind),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::OutOfRange { field, value } => {
                write!(f, "`{field}` is out of range: {value}")
            }
            Self::InvalidParentKind(kind) => {
                write!(f, "records of kind `{kind}` cannot own reminders")
            }
        }
    }
}

impl Error for ValidationError {}

/// Contract implemented by the six synchronized record types.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Owning parent, `None` for top-level projects.
    fn parent(&self) -> Option<ParentRef>;

    /// Human-readable key used by name-based display dedup.
    fn dedup_key(&self) -> Cow<'_, str>;

    fn validate(&self) -> Result<(), ValidationError>;
}

/// Current time in Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Returns a timestamp strictly after `previous`, normally the wall clock.
pub fn next_timestamp(previous: i64) -> i64 {
    now_ms().max(previous.saturating_add(1))
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{next_timestamp, now_ms, EntityKind};

    #[test]
    fn kind_tags_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("attachment"), None);
    }

    #[test]
    fn next_timestamp_is_strictly_later() {
        let future = now_ms() + 60_000;
        assert_eq!(next_timestamp(future), future + 1);
        assert!(next_timestamp(0) >= now_ms() - 1_000);
    }
}
