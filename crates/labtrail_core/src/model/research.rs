//! Research hierarchy records: project, hypothesis, experiment, log entry.
//!
//! # Invariants
//! - Every child stores its parent's *local* id; remote parent ids only exist
//!   in remote documents and in the mapping table.
//! - `name` (or `response` for log entries) is never blank.

use crate::model::record::{
    require_text, Entity, EntityKind, LocalId, ParentRef, RecordMeta, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Top-level research project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub meta: RecordMeta,
    pub name: String,
    pub description: String,
    pub goal: String,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            name: name.into(),
            description: description.into(),
            goal: String::new(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn parent(&self) -> Option<ParentRef> {
        None
    }

    fn dedup_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }
}

/// Hypothesis under one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub meta: RecordMeta,
    pub project_id: LocalId,
    pub name: String,
    pub description: String,
}

impl Hypothesis {
    pub fn new(
        project_id: LocalId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            meta: RecordMeta::default(),
            project_id,
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Entity for Hypothesis {
    const KIND: EntityKind = EntityKind::Hypothesis;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn parent(&self) -> Option<ParentRef> {
        Some(ParentRef::project(self.project_id))
    }

    fn dedup_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }
}

/// How often an experiment asks for a new log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    Daily,
    Weekly,
    /// Every N hours, N in `1..=168`.
    EveryHours(u32),
}

impl NotificationFrequency {
    /// Text form used in SQLite and remote documents (`daily`, `weekly`, `every_6h`).
    pub fn to_tag(self) -> String {
        match self {
            Self::Daily => "daily".to_string(),
            Self::Weekly => "weekly".to_string(),
            Self::EveryHours(hours) => format!("every_{hours}h"),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            other => other
                .strip_prefix("every_")
                .and_then(|rest| rest.strip_suffix('h'))
                .and_then(|hours| hours.parse().ok())
                .map(Self::EveryHours),
        }
    }
}

/// Experiment testing one hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub meta: RecordMeta,
    pub hypothesis_id: LocalId,
    pub name: String,
    pub description: String,
    /// Prompt shown when the user records a log entry.
    pub question: String,
    pub notifications_enabled: bool,
    pub notification_frequency: NotificationFrequency,
}

impl Experiment {
    pub fn new(
        hypothesis_id: LocalId,
        name: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            meta: RecordMeta::default(),
            hypothesis_id,
            name: name.into(),
            description: String::new(),
            question: question.into(),
            notifications_enabled: false,
            notification_frequency: NotificationFrequency::Daily,
        }
    }
}

impl Entity for Experiment {
    const KIND: EntityKind = EntityKind::Experiment;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn parent(&self) -> Option<ParentRef> {
        Some(ParentRef::hypothesis(self.hypothesis_id))
    }

    fn dedup_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if let NotificationFrequency::EveryHours(hours) = self.notification_frequency {
            if !(1..=168).contains(&hours) {
                return Err(ValidationError::OutOfRange {
                    field: "notification_frequency",
                    value: i64::from(hours),
                });
            }
        }
        Ok(())
    }
}

/// One free-text answer recorded for an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub meta: RecordMeta,
    pub experiment_id: LocalId,
    pub response: String,
}

impl LogEntry {
    pub fn new(experiment_id: LocalId, response: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            experiment_id,
            response: response.into(),
        }
    }
}

impl Entity for LogEntry {
    const KIND: EntityKind = EntityKind::LogEntry;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn parent(&self) -> Option<ParentRef> {
        Some(ParentRef::experiment(self.experiment_id))
    }

    fn dedup_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.response)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("response", &self.response)
    }
}
