//! Identifier Mapping Store: local id <-> remote id per user and entity type.
//!
//! # Responsibility
//! - Persist the association created after a successful remote write.
//! - Answer lookups in both directions for synchronizers.
//!
//! # Invariants
//! - At most one row per `(entity_type, local_id, user_id)` and per
//!   `(entity_type, remote_id, user_id)`: the mapping is a bijection.
//! - `store` is an idempotent upsert; the last call for a key wins.
//! - A missing row means "not yet synced", never "absent remotely".

use crate::db::{DbError, SharedDb};
use crate::model::{now_ms, EntityKind, LocalId};
use log::warn;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MappingResult<T> = Result<T, MappingError>;

/// Storage-layer failure of the mapping table.
#[derive(Debug)]
pub enum MappingError {
    Unavailable(DbError),
    InvalidData(String),
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "mapping unavailable: {err}"),
            Self::InvalidData(message) => write!(f, "invalid mapping row: {message}"),
        }
    }
}

impl Error for MappingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for MappingError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<rusqlite::Error> for MappingError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(DbError::Sqlite(value))
    }
}

/// One persisted identifier association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMapping {
    pub kind: EntityKind,
    pub local_id: LocalId,
    pub remote_id: String,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// SQLite-backed mapping table sharing the local store connection.
#[derive(Clone)]
pub struct MappingStore {
    db: SharedDb,
}

impl MappingStore {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Upserts one mapping, replacing any row that conflicts on either key.
    pub fn store(
        &self,
        kind: EntityKind,
        local_id: LocalId,
        remote_id: &str,
        user_id: &str,
    ) -> MappingResult<()> {
        let now = now_ms();
        self.db.with_conn(|conn| -> MappingResult<()> {
            let tx = conn.transaction()?;
            let created_at: Option<i64> = tx
                .query_row(
                    "SELECT created_at FROM id_mappings
                     WHERE entity_type = ?1 AND local_id = ?2 AND user_id = ?3;",
                    params![kind.as_str(), local_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            let displaced = tx.execute(
                "DELETE FROM id_mappings
                 WHERE entity_type = ?1
                   AND user_id = ?2
                   AND (local_id = ?3 OR remote_id = ?4);",
                params![kind.as_str(), user_id, local_id, remote_id],
            )?;
            tx.execute(
                "INSERT INTO id_mappings (
                    entity_type, local_id, remote_id, user_id, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    kind.as_str(),
                    local_id,
                    remote_id,
                    user_id,
                    created_at.unwrap_or(now),
                    now
                ],
            )?;
            tx.commit()?;

            if displaced > usize::from(created_at.is_some()) {
                warn!(
                    "event=mapping_store module=mapping status=replaced kind={kind} local_id={local_id} displaced={displaced}"
                );
            }
            Ok(())
        })
    }

    pub fn remote_id_for(
        &self,
        kind: EntityKind,
        local_id: LocalId,
        user_id: &str,
    ) -> MappingResult<Option<String>> {
        self.db.with_conn(|conn| -> MappingResult<Option<String>> {
            Ok(conn
                .query_row(
                    "SELECT remote_id FROM id_mappings
                     WHERE entity_type = ?1 AND local_id = ?2 AND user_id = ?3;",
                    params![kind.as_str(), local_id, user_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn local_id_for(
        &self,
        kind: EntityKind,
        remote_id: &str,
        user_id: &str,
    ) -> MappingResult<Option<LocalId>> {
        self.db.with_conn(|conn| -> MappingResult<Option<LocalId>> {
            Ok(conn
                .query_row(
                    "SELECT local_id FROM id_mappings
                     WHERE entity_type = ?1 AND remote_id = ?2 AND user_id = ?3;",
                    params![kind.as_str(), remote_id, user_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    /// Removes the mapping of a local record. Returns whether a row existed.
    pub fn delete_by_local_id(
        &self,
        kind: EntityKind,
        local_id: LocalId,
        user_id: &str,
    ) -> MappingResult<bool> {
        self.db.with_conn(|conn| -> MappingResult<bool> {
            let deleted = conn.execute(
                "DELETE FROM id_mappings
                 WHERE entity_type = ?1 AND local_id = ?2 AND user_id = ?3;",
                params![kind.as_str(), local_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Removes the mapping of a remote document. Returns whether a row existed.
    pub fn delete_by_remote_id(
        &self,
        kind: EntityKind,
        remote_id: &str,
        user_id: &str,
    ) -> MappingResult<bool> {
        self.db.with_conn(|conn| -> MappingResult<bool> {
            let deleted = conn.execute(
                "DELETE FROM id_mappings
                 WHERE entity_type = ?1 AND remote_id = ?2 AND user_id = ?3;",
                params![kind.as_str(), remote_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Lists all mappings of one type for one user, ordered by local id.
    pub fn all_for_type(&self, kind: EntityKind, user_id: &str) -> MappingResult<Vec<IdMapping>> {
        self.db.with_conn(|conn| -> MappingResult<Vec<IdMapping>> {
            let mut stmt = conn.prepare(
                "SELECT entity_type, local_id, remote_id, user_id, created_at, updated_at
                 FROM id_mappings
                 WHERE entity_type = ?1 AND user_id = ?2
                 ORDER BY local_id ASC;",
            )?;
            let mut rows = stmt.query(params![kind.as_str(), user_id])?;
            let mut mappings = Vec::new();
            while let Some(row) = rows.next()? {
                mappings.push(parse_mapping_row(row)?);
            }
            Ok(mappings)
        })
    }

    /// Per-kind mapping counts for one user, for diagnostics.
    pub fn count_for_user(&self, user_id: &str) -> MappingResult<BTreeMap<EntityKind, usize>> {
        let mut counts = BTreeMap::new();
        for kind in EntityKind::ALL {
            counts.insert(kind, self.all_for_type(kind, user_id)?.len());
        }
        Ok(counts)
    }
}

fn parse_mapping_row(row: &Row<'_>) -> MappingResult<IdMapping> {
    let kind_text: String = row.get("entity_type")?;
    let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
        MappingError::InvalidData(format!(
            "invalid entity type `{kind_text}` in id_mappings.entity_type"
        ))
    })?;
    Ok(IdMapping {
        kind,
        local_id: row.get("local_id")?,
        remote_id: row.get("remote_id")?,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::MappingStore;
    use crate::db::SharedDb;
    use crate::model::EntityKind;

    fn mappings() -> MappingStore {
        MappingStore::new(SharedDb::in_memory().expect("in-memory db should open"))
    }

    #[test]
    fn store_is_idempotent_and_last_write_wins() {
        let store = mappings();
        store
            .store(EntityKind::Project, 1, "r1", "alice")
            .expect("first store");
        store
            .store(EntityKind::Project, 1, "r1", "alice")
            .expect("repeat store");
        store
            .store(EntityKind::Project, 1, "r9", "alice")
            .expect("overwrite store");

        assert_eq!(
            store
                .remote_id_for(EntityKind::Project, 1, "alice")
                .expect("lookup")
                .as_deref(),
            Some("r9")
        );
        assert_eq!(
            store
                .local_id_for(EntityKind::Project, "r1", "alice")
                .expect("lookup"),
            None
        );
        assert_eq!(
            store
                .all_for_type(EntityKind::Project, "alice")
                .expect("list")
                .len(),
            1
        );
    }

    #[test]
    fn store_keeps_bijection_when_remote_id_moves() {
        let store = mappings();
        store
            .store(EntityKind::Note, 1, "r1", "alice")
            .expect("first store");
        store
            .store(EntityKind::Note, 2, "r1", "alice")
            .expect("second store");

        assert_eq!(
            store.remote_id_for(EntityKind::Note, 1, "alice").expect("lookup"),
            None
        );
        assert_eq!(
            store.local_id_for(EntityKind::Note, "r1", "alice").expect("lookup"),
            Some(2)
        );
    }

    #[test]
    fn key_space_is_partitioned_by_type_and_user() {
        let store = mappings();
        store
            .store(EntityKind::Project, 1, "r1", "alice")
            .expect("project store");
        store
            .store(EntityKind::Hypothesis, 1, "r1", "alice")
            .expect("hypothesis store");
        store
            .store(EntityKind::Project, 1, "r1", "bob")
            .expect("other user store");

        let counts = store.count_for_user("alice").expect("counts");
        assert_eq!(counts[&EntityKind::Project], 1);
        assert_eq!(counts[&EntityKind::Hypothesis], 1);
        assert!(store
            .delete_by_remote_id(EntityKind::Project, "r1", "bob")
            .expect("delete"));
        assert_eq!(
            store
                .remote_id_for(EntityKind::Project, 1, "alice")
                .expect("lookup")
                .as_deref(),
            Some("r1")
        );
    }
}
