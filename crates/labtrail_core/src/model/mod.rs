//! Domain model for the research hierarchy.
//!
//! # Responsibility
//! - Define the six synchronized record types and their shared metadata.
//! - Keep validation next to the data it guards.
//!
//! # Invariants
//! - Records reference parents by local id only.
//! - `archived` is a soft delete; hard deletes go through the local store.

pub mod note;
pub mod record;
pub mod reminder;
pub mod research;

pub use note::Note;
pub use record::{
    next_timestamp, now_ms, Entity, EntityKind, LocalId, ParentRef, RecordMeta, ValidationError,
};
pub use reminder::{ReminderFrequency, ReminderSetting};
pub use research::{Experiment, Hypothesis, LogEntry, NotificationFrequency, Project};
