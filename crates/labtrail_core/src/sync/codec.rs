//! Remote document codec, one implementation per entity type.
//!
//! # Responsibility
//! - Translate records to camelCase documents and back.
//! - Express parent relationships with remote ids on the wire and local ids
//!   in the store.
//!
//! # Invariants
//! - Documents never carry local ids.
//! - Decoding never guesses a parent: the caller supplies the local parent.
//! - Missing optional text fields decode as empty strings; wrong types fail.

use crate::model::{
    Entity, EntityKind, Experiment, Hypothesis, LogEntry, Note, NotificationFrequency, ParentRef,
    Project, RecordMeta, ReminderFrequency, ReminderSetting,
};
use crate::remote::{Document, FieldFilter, RemoteDocument};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// A parent record known on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteParent<'a> {
    pub remote_id: &'a str,
    pub local: ParentRef,
}

impl<'a> RemoteParent<'a> {
    pub fn new(remote_id: &'a str, local: ParentRef) -> Self {
        Self { remote_id, local }
    }
}

/// Remote document that cannot be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub kind: EntityKind,
    pub remote_id: String,
    pub field: &'static str,
    pub reason: String,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot decode {} document `{}`: field `{}` {}",
            self.kind, self.remote_id, self.field, self.reason
        )
    }
}

impl Error for DecodeError {}

/// Typed accessors over one document, producing [`DecodeError`]s.
pub struct DocumentFields<'a> {
    kind: EntityKind,
    doc: &'a RemoteDocument,
}

impl<'a> DocumentFields<'a> {
    fn new(kind: EntityKind, doc: &'a RemoteDocument) -> Self {
        Self { kind, doc }
    }

    fn error(&self, field: &'static str, reason: impl Into<String>) -> DecodeError {
        DecodeError {
            kind: self.kind,
            remote_id: self.doc.id.clone(),
            field,
            reason: reason.into(),
        }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.doc.data.get(field).filter(|value| !value.is_null())
    }

    pub fn text(&self, field: &'static str) -> Result<String, DecodeError> {
        self.optional_text(field)?
            .ok_or_else(|| self.error(field, "is missing"))
    }

    pub fn text_or_empty(&self, field: &'static str) -> Result<String, DecodeError> {
        Ok(self.optional_text(field)?.unwrap_or_default())
    }

    pub fn optional_text(&self, field: &'static str) -> Result<Option<String>, DecodeError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(self.error(field, "is not a string")),
        }
    }

    pub fn integer(&self, field: &'static str) -> Result<i64, DecodeError> {
        self.get(field)
            .ok_or_else(|| self.error(field, "is missing"))?
            .as_i64()
            .ok_or_else(|| self.error(field, "is not an integer"))
    }

    pub fn small_integer(&self, field: &'static str) -> Result<u8, DecodeError> {
        let value = self.integer(field)?;
        u8::try_from(value).map_err(|_| self.error(field, format!("is out of range: {value}")))
    }

    pub fn flag_or(&self, field: &'static str, default: bool) -> Result<bool, DecodeError> {
        match self.get(field) {
            None => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(self.error(field, "is not a boolean")),
        }
    }

    pub fn weekdays(&self, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let Some(value) = self.get(field) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| self.error(field, "is not an array"))?;
        items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|day| u8::try_from(day).ok())
                    .ok_or_else(|| self.error(field, "contains a non-weekday entry"))
            })
            .collect()
    }

    fn meta(&self) -> Result<RecordMeta, DecodeError> {
        Ok(RecordMeta {
            id: 0,
            remote_id: Some(self.doc.id.clone()),
            user_id: self.text("userId")?,
            created_at: self.integer("createdAt")?,
            updated_at: self.integer("updatedAt")?,
            archived: self.flag_or("isArchived", false)?,
        })
    }

    fn require_parent(&self, parent: Option<ParentRef>) -> Result<ParentRef, DecodeError> {
        parent.ok_or_else(|| self.error("parent", "has no local counterpart"))
    }
}

/// Wire format of one entity type.
pub trait RemoteCodec: Entity {
    /// Equality filters selecting the children of `parent`.
    fn parent_filters(parent: &RemoteParent<'_>) -> Vec<FieldFilter>;

    /// Writes the type-specific fields.
    fn encode_fields(&self, doc: &mut Document, parent_remote_id: Option<&str>);

    /// Reads the type-specific fields.
    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError>;

    fn to_document(&self, user_id: &str, parent_remote_id: Option<&str>) -> Document {
        let meta = self.meta();
        let mut doc = Document::new();
        doc.insert("userId".to_string(), json!(user_id));
        doc.insert("createdAt".to_string(), json!(meta.created_at));
        doc.insert("updatedAt".to_string(), json!(meta.updated_at));
        doc.insert("isArchived".to_string(), json!(meta.archived));
        self.encode_fields(&mut doc, parent_remote_id);
        doc
    }

    /// Decodes a remote document as a record living under `parent`.
    ///
    /// The result has local id `0` and carries the document id as remote id.
    fn from_document(doc: &RemoteDocument, parent: Option<ParentRef>) -> Result<Self, DecodeError> {
        let fields = DocumentFields::new(Self::KIND, doc);
        let meta = fields.meta()?;
        Self::decode_fields(&fields, meta, parent)
    }
}

fn remote_ref(parent_remote_id: Option<&str>) -> Value {
    parent_remote_id.map_or(Value::Null, |id| json!(id))
}

impl RemoteCodec for Project {
    fn parent_filters(_parent: &RemoteParent<'_>) -> Vec<FieldFilter> {
        Vec::new()
    }

    fn encode_fields(&self, doc: &mut Document, _parent_remote_id: Option<&str>) {
        doc.insert("name".to_string(), json!(self.name));
        doc.insert("description".to_string(), json!(self.description));
        doc.insert("goal".to_string(), json!(self.goal));
    }

    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        _parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            meta,
            name: fields.text("name")?,
            description: fields.text_or_empty("description")?,
            goal: fields.text_or_empty("goal")?,
        })
    }
}

impl RemoteCodec for Hypothesis {
    fn parent_filters(parent: &RemoteParent<'_>) -> Vec<FieldFilter> {
        vec![FieldFilter::eq("projectId", parent.remote_id)]
    }

    fn encode_fields(&self, doc: &mut Document, parent_remote_id: Option<&str>) {
        doc.insert("projectId".to_string(), remote_ref(parent_remote_id));
        doc.insert("name".to_string(), json!(self.name));
        doc.insert("description".to_string(), json!(self.description));
    }

    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            meta,
            project_id: fields.require_parent(parent)?.id,
            name: fields.text("name")?,
            description: fields.text_or_empty("description")?,
        })
    }
}

impl RemoteCodec for Experiment {
    fn parent_filters(parent: &RemoteParent<'_>) -> Vec<FieldFilter> {
        vec![FieldFilter::eq("hypothesisId", parent.remote_id)]
    }

    fn encode_fields(&self, doc: &mut Document, parent_remote_id: Option<&str>) {
        doc.insert("hypothesisId".to_string(), remote_ref(parent_remote_id));
        doc.insert("name".to_string(), json!(self.name));
        doc.insert("description".to_string(), json!(self.description));
        doc.insert("question".to_string(), json!(self.question));
        doc.insert(
            "notificationsEnabled".to_string(),
            json!(self.notifications_enabled),
        );
        doc.insert(
            "notificationFrequency".to_string(),
            json!(self.notification_frequency.to_tag()),
        );
    }

    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError> {
        let notification_frequency = match fields.optional_text("notificationFrequency")? {
            None => NotificationFrequency::Daily,
            Some(tag) => NotificationFrequency::parse(&tag).ok_or_else(|| {
                fields.error("notificationFrequency", format!("has unknown value `{tag}`"))
            })?,
        };
        Ok(Self {
            meta,
            hypothesis_id: fields.require_parent(parent)?.id,
            name: fields.text("name")?,
            description: fields.text_or_empty("description")?,
            question: fields.text_or_empty("question")?,
            notifications_enabled: fields.flag_or("notificationsEnabled", false)?,
            notification_frequency,
        })
    }
}

impl RemoteCodec for LogEntry {
    fn parent_filters(parent: &RemoteParent<'_>) -> Vec<FieldFilter> {
        vec![FieldFilter::eq("experimentId", parent.remote_id)]
    }

    fn encode_fields(&self, doc: &mut Document, parent_remote_id: Option<&str>) {
        doc.insert("experimentId".to_string(), remote_ref(parent_remote_id));
        doc.insert("response".to_string(), json!(self.response));
    }

    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            meta,
            experiment_id: fields.require_parent(parent)?.id,
            response: fields.text("response")?,
        })
    }
}

impl RemoteCodec for Note {
    fn parent_filters(parent: &RemoteParent<'_>) -> Vec<FieldFilter> {
        vec![FieldFilter::eq("hypothesisId", parent.remote_id)]
    }

    fn encode_fields(&self, doc: &mut Document, parent_remote_id: Option<&str>) {
        doc.insert("hypothesisId".to_string(), remote_ref(parent_remote_id));
        doc.insert("content".to_string(), json!(self.content));
        doc.insert(
            "attachmentPath".to_string(),
            self.attachment_path.as_deref().map_or(Value::Null, |path| json!(path)),
        );
    }

    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            meta,
            hypothesis_id: fields.require_parent(parent)?.id,
            content: fields.text("content")?,
            attachment_path: fields.optional_text("attachmentPath")?,
        })
    }
}

impl RemoteCodec for ReminderSetting {
    fn parent_filters(parent: &RemoteParent<'_>) -> Vec<FieldFilter> {
        vec![
            FieldFilter::eq("entityType", parent.local.kind.as_str()),
            FieldFilter::eq("entityId", parent.remote_id),
        ]
    }

    fn encode_fields(&self, doc: &mut Document, parent_remote_id: Option<&str>) {
        doc.insert("entityType".to_string(), json!(self.parent.kind.as_str()));
        doc.insert("entityId".to_string(), remote_ref(parent_remote_id));
        doc.insert("frequency".to_string(), json!(self.frequency.as_str()));
        doc.insert("hour".to_string(), json!(self.hour));
        doc.insert("minute".to_string(), json!(self.minute));
        doc.insert("daysOfWeek".to_string(), json!(self.days_of_week));
        doc.insert("enabled".to_string(), json!(self.enabled));
    }

    fn decode_fields(
        fields: &DocumentFields<'_>,
        meta: RecordMeta,
        parent: Option<ParentRef>,
    ) -> Result<Self, DecodeError> {
        let parent = fields.require_parent(parent)?;
        let entity_type = fields.text("entityType")?;
        if entity_type != parent.kind.as_str() {
            return Err(fields.error(
                "entityType",
                format!("is `{entity_type}`, expected `{}`", parent.kind),
            ));
        }
        let frequency_text = fields.text("frequency")?;
        let frequency = ReminderFrequency::parse(&frequency_text).ok_or_else(|| {
            fields.error("frequency", format!("has unknown value `{frequency_text}`"))
        })?;
        Ok(Self {
            meta,
            parent,
            frequency,
            hour: fields.small_integer("hour")?,
            minute: fields.small_integer("minute")?,
            days_of_week: fields.weekdays("daysOfWeek")?,
            enabled: fields.flag_or("enabled", true)?,
        })
    }
}
