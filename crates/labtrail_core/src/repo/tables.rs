//! Row mapping between entity structs and their SQLite tables.
//!
//! Each entity lists its type-specific columns once; the shared metadata
//! columns (`id`, `remote_id`, `user_id`, `created_at`, `updated_at`,
//! `is_archived`) are handled by the local store.

use crate::model::{
    Entity, EntityKind, Experiment, Hypothesis, LogEntry, Note, NotificationFrequency,
    ParentRef, Project, RecordMeta, ReminderFrequency, ReminderSetting,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::Row;

/// Shared metadata columns, in select/bind order.
pub(crate) const META_COLUMNS: &[&str] = &[
    "id",
    "remote_id",
    "user_id",
    "created_at",
    "updated_at",
    "is_archived",
];

/// SQLite mapping for one entity type.
pub trait TableRecord: Entity {
    /// Type-specific columns, in the order `field_values` binds them.
    const FIELDS: &'static [&'static str];

    fn field_values(&self) -> Vec<Value>;

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self>;

    /// `WHERE` fragment selecting the children of `parent`.
    ///
    /// Returns `None` when records of this type cannot live under `parent`.
    fn parent_filter(parent: &ParentRef) -> Option<(String, Vec<Value>)>;
}

impl TableRecord for Project {
    const FIELDS: &'static [&'static str] = &["name", "description", "goal"];

    fn field_values(&self) -> Vec<Value> {
        vec![
            text(&self.name),
            text(&self.description),
            text(&self.goal),
        ]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            meta,
            name: row.get("name")?,
            description: row.get("description")?,
            goal: row.get("goal")?,
        })
    }

    fn parent_filter(_parent: &ParentRef) -> Option<(String, Vec<Value>)> {
        None
    }
}

impl TableRecord for Hypothesis {
    const FIELDS: &'static [&'static str] = &["project_id", "name", "description"];

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.project_id),
            text(&self.name),
            text(&self.description),
        ]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            meta,
            project_id: row.get("project_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
        })
    }

    fn parent_filter(parent: &ParentRef) -> Option<(String, Vec<Value>)> {
        typed_parent(parent, EntityKind::Project, "project_id")
    }
}

impl TableRecord for Experiment {
    const FIELDS: &'static [&'static str] = &[
        "hypothesis_id",
        "name",
        "description",
        "question",
        "notifications_enabled",
        "notification_frequency",
    ];

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.hypothesis_id),
            text(&self.name),
            text(&self.description),
            text(&self.question),
            flag(self.notifications_enabled),
            Value::Text(self.notification_frequency.to_tag()),
        ]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self> {
        let frequency_text: String = row.get("notification_frequency")?;
        let notification_frequency =
            NotificationFrequency::parse(&frequency_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid notification frequency `{frequency_text}` in experiments.notification_frequency"
                ))
            })?;
        Ok(Self {
            meta,
            hypothesis_id: row.get("hypothesis_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            question: row.get("question")?,
            notifications_enabled: read_flag(row, "experiments", "notifications_enabled")?,
            notification_frequency,
        })
    }

    fn parent_filter(parent: &ParentRef) -> Option<(String, Vec<Value>)> {
        typed_parent(parent, EntityKind::Hypothesis, "hypothesis_id")
    }
}

impl TableRecord for LogEntry {
    const FIELDS: &'static [&'static str] = &["experiment_id", "response"];

    fn field_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.experiment_id), text(&self.response)]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            meta,
            experiment_id: row.get("experiment_id")?,
            response: row.get("response")?,
        })
    }

    fn parent_filter(parent: &ParentRef) -> Option<(String, Vec<Value>)> {
        typed_parent(parent, EntityKind::Experiment, "experiment_id")
    }
}

impl TableRecord for Note {
    const FIELDS: &'static [&'static str] = &["hypothesis_id", "content", "attachment_path"];

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.hypothesis_id),
            text(&self.content),
            self.attachment_path
                .as_deref()
                .map_or(Value::Null, text),
        ]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            meta,
            hypothesis_id: row.get("hypothesis_id")?,
            content: row.get("content")?,
            attachment_path: row.get("attachment_path")?,
        })
    }

    fn parent_filter(parent: &ParentRef) -> Option<(String, Vec<Value>)> {
        typed_parent(parent, EntityKind::Hypothesis, "hypothesis_id")
    }
}

impl TableRecord for ReminderSetting {
    const FIELDS: &'static [&'static str] = &[
        "entity_type",
        "entity_id",
        "frequency",
        "hour",
        "minute",
        "days_of_week",
        "enabled",
    ];

    fn field_values(&self) -> Vec<Value> {
        vec![
            text(self.parent.kind.as_str()),
            Value::Integer(self.parent.id),
            text(self.frequency.as_str()),
            Value::Integer(i64::from(self.hour)),
            Value::Integer(i64::from(self.minute)),
            Value::Text(self.days_to_text()),
            flag(self.enabled),
        ]
    }

    fn from_row(meta: RecordMeta, row: &Row<'_>) -> RepoResult<Self> {
        let kind_text: String = row.get("entity_type")?;
        let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid entity type `{kind_text}` in reminder_settings.entity_type"
            ))
        })?;
        let frequency_text: String = row.get("frequency")?;
        let frequency = ReminderFrequency::parse(&frequency_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid frequency `{frequency_text}` in reminder_settings.frequency"
            ))
        })?;
        let days_text: String = row.get("days_of_week")?;
        let days_of_week = ReminderSetting::days_from_text(&days_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid weekday list `{days_text}` in reminder_settings.days_of_week"
            ))
        })?;
        Ok(Self {
            meta,
            parent: ParentRef::new(kind, row.get("entity_id")?),
            frequency,
            hour: row.get("hour")?,
            minute: row.get("minute")?,
            days_of_week,
            enabled: read_flag(row, "reminder_settings", "enabled")?,
        })
    }

    fn parent_filter(parent: &ParentRef) -> Option<(String, Vec<Value>)> {
        if !parent.kind.accepts_reminders() {
            return None;
        }
        Some((
            "entity_type = ? AND entity_id = ?".to_string(),
            vec![text(parent.kind.as_str()), Value::Integer(parent.id)],
        ))
    }
}

/// Reads the shared metadata columns of one row.
pub(crate) fn read_meta(row: &Row<'_>, table: &str) -> RepoResult<RecordMeta> {
    Ok(RecordMeta {
        id: row.get("id")?,
        remote_id: row.get("remote_id")?,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        archived: read_flag(row, table, "is_archived")?,
    })
}

fn typed_parent(
    parent: &ParentRef,
    expected: EntityKind,
    column: &str,
) -> Option<(String, Vec<Value>)> {
    (parent.kind == expected).then(|| (format!("{column} = ?"), vec![Value::Integer(parent.id)]))
}

fn read_flag(row: &Row<'_>, table: &str, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {table}.{column}"
        ))),
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn flag(value: bool) -> Value {
    Value::Integer(if value { 1 } else { 0 })
}
