//! Local Store Adapter: durable, always-available record storage.
//!
//! # Responsibility
//! - Provide generic CRUD over every entity table.
//! - Enforce local cascade-on-delete, including polymorphic reminder parents.
//! - Publish change notifications that drive live display streams.
//!
//! # Invariants
//! - `update` never touches `remote_id`, `user_id` or `created_at`; those
//!   change only through `set_remote_id` and `claim_unowned`.
//! - Each call holds the connection lock for one statement or transaction.
//! - A change notification is sent after every successful mutation.

use crate::db::SharedDb;
use crate::model::{EntityKind, LocalId, ParentRef};
use crate::repo::tables::{flag, read_meta, TableRecord, META_COLUMNS};
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tokio::sync::broadcast;

const CHANGE_BUFFER: usize = 256;

/// Typed parent/child links enforced by SQLite foreign keys.
const CHILD_LINKS: &[(EntityKind, EntityKind, &str)] = &[
    (EntityKind::Project, EntityKind::Hypothesis, "project_id"),
    (EntityKind::Hypothesis, EntityKind::Experiment, "hypothesis_id"),
    (EntityKind::Hypothesis, EntityKind::Note, "hypothesis_id"),
    (EntityKind::Experiment, EntityKind::LogEntry, "experiment_id"),
];

/// One committed local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub kind: EntityKind,
    pub id: LocalId,
}

/// SQLite-backed store for all six entity tables.
#[derive(Clone)]
pub struct LocalStore {
    db: SharedDb,
    changes: broadcast::Sender<StoreChange>,
}

impl LocalStore {
    pub fn new(db: SharedDb) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { db, changes }
    }

    pub fn db(&self) -> &SharedDb {
        &self.db
    }

    /// Subscribes to change notifications for all entity kinds.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Number of live change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Inserts one record and returns its newly assigned local id.
    ///
    /// The incoming `meta.id` is ignored.
    pub fn insert<E: TableRecord>(&self, record: &E) -> RepoResult<LocalId> {
        record.validate()?;
        let table = E::KIND.table();
        let columns = META_COLUMNS[1..]
            .iter()
            .chain(E::FIELDS)
            .copied()
            .collect::<Vec<_>>();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders});",
            columns.join(", ")
        );

        let meta = record.meta();
        let mut values = vec![
            meta.remote_id.clone().map_or(Value::Null, Value::Text),
            Value::Text(meta.user_id.clone()),
            Value::Integer(meta.created_at),
            Value::Integer(meta.updated_at),
            flag(meta.archived),
        ];
        values.extend(record.field_values());

        let id = self.db.with_conn(|conn| -> RepoResult<LocalId> {
            conn.execute(&sql, params_from_iter(values))?;
            Ok(conn.last_insert_rowid())
        })?;
        self.notify(E::KIND, id);
        Ok(id)
    }

    /// Replaces the mutable fields of an existing record.
    pub fn update<E: TableRecord>(&self, record: &E) -> RepoResult<()> {
        record.validate()?;
        let table = E::KIND.table();
        let assignments = ["updated_at", "is_archived"]
            .iter()
            .chain(E::FIELDS)
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {table} SET {assignments} WHERE id = ?;");

        let meta = record.meta();
        let mut values = vec![Value::Integer(meta.updated_at), flag(meta.archived)];
        values.extend(record.field_values());
        values.push(Value::Integer(meta.id));

        let changed = self
            .db
            .with_conn(|conn| -> RepoResult<usize> { Ok(conn.execute(&sql, params_from_iter(values))?) })?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: E::KIND,
                id: meta.id,
            });
        }
        self.notify(E::KIND, meta.id);
        Ok(())
    }

    pub fn get_by_id<E: TableRecord>(&self, id: LocalId) -> RepoResult<Option<E>> {
        let sql = format!("{} WHERE id = ?;", select_sql::<E>());
        let mut found = self.query::<E>(&sql, vec![Value::Integer(id)])?;
        Ok(found.pop())
    }

    /// Lists records under `parent`, or every record of the type when `None`.
    ///
    /// Ordered by `created_at DESC, id DESC`.
    pub fn list_for_parent<E: TableRecord>(
        &self,
        parent: Option<&ParentRef>,
        include_archived: bool,
    ) -> RepoResult<Vec<E>> {
        self.list_under::<E>(parent, include_archived, None)
    }

    /// Like [`LocalStore::list_for_parent`], restricted to what `user_id`
    /// may see: its own records plus those created signed out. An empty
    /// `user_id` sees only the signed-out records.
    pub fn list_visible<E: TableRecord>(
        &self,
        parent: Option<&ParentRef>,
        include_archived: bool,
        user_id: &str,
    ) -> RepoResult<Vec<E>> {
        self.list_under::<E>(parent, include_archived, Some(user_id))
    }

    fn list_under<E: TableRecord>(
        &self,
        parent: Option<&ParentRef>,
        include_archived: bool,
        user_id: Option<&str>,
    ) -> RepoResult<Vec<E>> {
        let mut sql = format!("{} WHERE 1 = 1", select_sql::<E>());
        let mut values = Vec::new();
        if let Some(user_id) = user_id {
            sql.push_str(" AND (user_id = ? OR user_id = '')");
            values.push(Value::Text(user_id.to_string()));
        }
        if let Some(parent) = parent {
            let Some((clause, bind)) = E::parent_filter(parent) else {
                return Ok(Vec::new());
            };
            sql.push_str(&format!(" AND {clause}"));
            values.extend(bind);
        }
        if !include_archived {
            sql.push_str(" AND is_archived = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC;");
        self.query::<E>(&sql, values)
    }

    /// Lists every record owned by `user_id`, plus records created signed out.
    pub fn list_for_user<E: TableRecord>(&self, user_id: &str) -> RepoResult<Vec<E>> {
        let sql = format!(
            "{} WHERE user_id = ? OR user_id = '' ORDER BY id ASC;",
            select_sql::<E>()
        );
        self.query::<E>(&sql, vec![Value::Text(user_id.to_string())])
    }

    /// Records the remote document id without bumping `updated_at`.
    pub fn set_remote_id(
        &self,
        kind: EntityKind,
        id: LocalId,
        remote_id: Option<&str>,
    ) -> RepoResult<()> {
        let sql = format!("UPDATE {} SET remote_id = ?1 WHERE id = ?2;", kind.table());
        let changed = self
            .db
            .with_conn(|conn| -> RepoResult<usize> { Ok(conn.execute(&sql, params![remote_id, id])?) })?;
        if changed == 0 {
            return Err(RepoError::NotFound { kind, id });
        }
        self.notify(kind, id);
        Ok(())
    }

    /// Assigns records created while signed out to `user_id`.
    pub fn claim_unowned(&self, kind: EntityKind, user_id: &str) -> RepoResult<usize> {
        let sql = format!("UPDATE {} SET user_id = ?1 WHERE user_id = '';", kind.table());
        let claimed = self
            .db
            .with_conn(|conn| -> RepoResult<usize> { Ok(conn.execute(&sql, [user_id])?) })?;
        if claimed > 0 {
            debug!("event=local_claim module=repo status=ok kind={kind} count={claimed}");
            self.notify(kind, 0);
        }
        Ok(claimed)
    }

    /// Hard-deletes one record together with its local descendants.
    ///
    /// Returns the removed descendants (not including the record itself), or
    /// `None` when the record does not exist.
    pub fn delete<E: TableRecord>(
        &self,
        id: LocalId,
    ) -> RepoResult<Option<Vec<(EntityKind, LocalId)>>> {
        self.delete_kind(E::KIND, id)
    }

    pub fn delete_kind(
        &self,
        kind: EntityKind,
        id: LocalId,
    ) -> RepoResult<Option<Vec<(EntityKind, LocalId)>>> {
        let removed = self.db.with_conn(|conn| -> RepoResult<Option<Vec<_>>> {
            let tx = conn.transaction()?;
            if !row_exists(&tx, kind, id)? {
                return Ok(None);
            }

            let mut descendants = Vec::new();
            collect_descendants(&tx, kind, id, &mut descendants)?;
            // Reminder parents are polymorphic and not covered by foreign keys.
            for (child_kind, child_id) in &descendants {
                if *child_kind == EntityKind::ReminderSetting {
                    tx.execute("DELETE FROM reminder_settings WHERE id = ?1;", [child_id])?;
                }
            }
            tx.execute(&format!("DELETE FROM {} WHERE id = ?1;", kind.table()), [id])?;
            tx.commit()?;
            Ok(Some(descendants))
        })?;

        if let Some(descendants) = removed.as_ref() {
            self.notify(kind, id);
            for (child_kind, child_id) in descendants {
                self.notify(*child_kind, *child_id);
            }
        }
        Ok(removed)
    }

    pub fn exists(&self, kind: EntityKind, id: LocalId) -> RepoResult<bool> {
        self.db
            .with_conn(|conn| -> RepoResult<bool> { row_exists(conn, kind, id) })
    }

    /// Counts local rows of one kind.
    pub fn count(&self, kind: EntityKind) -> RepoResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {};", kind.table());
        self.db
            .with_conn(|conn| -> RepoResult<i64> { Ok(conn.query_row(&sql, [], |row| row.get(0))?) })
    }

    fn query<E: TableRecord>(&self, sql: &str, values: Vec<Value>) -> RepoResult<Vec<E>> {
        let table = E::KIND.table();
        self.db.with_conn(|conn| -> RepoResult<Vec<E>> {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let meta = read_meta(row, table)?;
                records.push(E::from_row(meta, row)?);
            }
            Ok(records)
        })
    }

    fn notify(&self, kind: EntityKind, id: LocalId) {
        // No subscribers is the common case and not an error.
        let _ = self.changes.send(StoreChange { kind, id });
    }
}

fn select_sql<E: TableRecord>() -> String {
    let columns = META_COLUMNS
        .iter()
        .chain(E::FIELDS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {columns} FROM {}", E::KIND.table())
}

fn row_exists(conn: &Connection, kind: EntityKind, id: LocalId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);", kind.table()),
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn collect_descendants(
    conn: &Connection,
    kind: EntityKind,
    id: LocalId,
    out: &mut Vec<(EntityKind, LocalId)>,
) -> RepoResult<()> {
    for (_, child_kind, column) in CHILD_LINKS.iter().filter(|(parent, _, _)| *parent == kind) {
        let child_ids = select_ids(
            conn,
            &format!("SELECT id FROM {} WHERE {column} = ?1;", child_kind.table()),
            params![id],
        )?;
        for child_id in child_ids {
            out.push((*child_kind, child_id));
            collect_descendants(conn, *child_kind, child_id, out)?;
        }
    }

    if kind.accepts_reminders() {
        let reminder_ids = select_ids(
            conn,
            "SELECT id FROM reminder_settings WHERE entity_type = ?1 AND entity_id = ?2;",
            params![kind.as_str(), id],
        )?;
        out.extend(
            reminder_ids
                .into_iter()
                .map(|reminder_id| (EntityKind::ReminderSetting, reminder_id)),
        );
    }
    Ok(())
}

fn select_ids(
    conn: &Connection,
    sql: &str,
    bind: impl rusqlite::Params,
) -> RepoResult<Vec<LocalId>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(bind, |row| row.get::<_, LocalId>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::LocalStore;
    use crate::db::SharedDb;
    use crate::model::{EntityKind, Hypothesis, ParentRef, Project, ReminderSetting};

    fn store() -> LocalStore {
        LocalStore::new(SharedDb::in_memory().expect("in-memory db should open"))
    }

    #[test]
    fn list_for_parent_rejects_foreign_parent_kind() {
        let store = store();
        let project_id = store
            .insert(&Project::new("Sleep study", ""))
            .expect("project insert");
        store
            .insert(&Hypothesis::new(project_id, "H", ""))
            .expect("hypothesis insert");

        let wrong_parent = ParentRef::experiment(project_id);
        let listed = store
            .list_for_parent::<Hypothesis>(Some(&wrong_parent), true)
            .expect("list should succeed");
        assert!(listed.is_empty());
    }

    #[test]
    fn delete_collects_polymorphic_reminders() {
        let store = store();
        let project_id = store
            .insert(&Project::new("Sleep study", ""))
            .expect("project insert");
        let reminder_id = store
            .insert(&ReminderSetting::daily(ParentRef::project(project_id), 9, 0))
            .expect("reminder insert");

        let removed = store
            .delete::<Project>(project_id)
            .expect("delete should succeed")
            .expect("project should exist");
        assert_eq!(removed, vec![(EntityKind::ReminderSetting, reminder_id)]);
        assert_eq!(store.count(EntityKind::ReminderSetting).expect("count"), 0);
    }

    #[test]
    fn delete_missing_record_returns_none() {
        let store = store();
        assert!(store
            .delete::<Project>(42)
            .expect("delete should succeed")
            .is_none());
    }
}
