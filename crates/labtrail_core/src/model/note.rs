//! Free-form note attached to a hypothesis.

use crate::model::record::{
    require_text, Entity, EntityKind, LocalId, ParentRef, RecordMeta, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub meta: RecordMeta,
    pub hypothesis_id: LocalId,
    pub content: String,
    /// Device-local path of an attached image; the file itself is not synced.
    pub attachment_path: Option<String>,
}

impl Note {
    pub fn new(hypothesis_id: LocalId, content: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            hypothesis_id,
            content: content.into(),
            attachment_path: None,
        }
    }
}

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;

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
        Cow::Borrowed(&self.content)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }
}
