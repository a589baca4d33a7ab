//! In-process document store with failure injection.
//!
//! Used by tests and by the CLI demo. Behaves like a hosted document store:
//! server-assigned ids, per-document size limit, writes must carry `userId`.

use crate::remote::{
    Document, FieldFilter, OrderBy, RemoteDocument, RemoteError, RemoteResult, RemoteStore,
    SortDirection,
};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdMode {
    Random,
    Sequential,
}

struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    id_mode: IdMode,
    next_seq: u64,
    offline: bool,
    failing_writes: usize,
    write_delays: VecDeque<Duration>,
    read_delay: Option<Duration>,
    max_document_bytes: usize,
    writes_applied: usize,
}

/// Thread-safe in-memory [`RemoteStore`].
pub struct InMemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    /// Store assigning random (UUID) document ids.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                collections: BTreeMap::new(),
                id_mode: IdMode::Random,
                next_seq: 1,
                offline: false,
                failing_writes: 0,
                write_delays: VecDeque::new(),
                read_delay: None,
                max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
                writes_applied: 0,
            }),
        }
    }

    /// Store assigning `r1`, `r2`, ... in write order.
    pub fn with_sequential_ids() -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.id_mode = IdMode::Sequential;
        }
        store
    }

    /// Makes every call fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    /// Makes the next `count` write calls fail with `Unavailable`.
    pub fn fail_next_writes(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_writes = count;
        }
    }

    /// Delays the next write that is not otherwise delayed.
    pub fn delay_next_write(&self, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.write_delays.push_back(delay);
        }
    }

    /// Adds latency to every read until cleared with `None`.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.read_delay = delay;
        }
    }

    pub fn set_max_document_bytes(&self, max_bytes: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.max_document_bytes = max_bytes;
        }
    }

    /// Writes a document directly, as another device would.
    pub fn put_document(&self, collection: &str, id: &str, data: Document) {
        if let Ok(mut state) = self.state.lock() {
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), data);
        }
    }

    /// Removes a document directly, as another device would.
    pub fn remove_document(&self, collection: &str, id: &str) -> bool {
        self.state
            .lock()
            .ok()
            .and_then(|mut state| {
                state
                    .collections
                    .get_mut(collection)
                    .and_then(|docs| docs.remove(id))
            })
            .is_some()
    }

    /// Reads a document without going through the async contract.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.collections.get(collection)?.get(id).cloned())
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.collections.get(collection).map(BTreeMap::len))
            .unwrap_or(0)
    }

    /// Number of successfully applied add/update/delete calls.
    pub fn writes_applied(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.writes_applied)
            .unwrap_or(0)
    }

    fn lock(&self) -> RemoteResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| RemoteError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Admission check for a read; returns the injected latency, if any.
    fn begin_read(&self) -> RemoteResult<Option<Duration>> {
        let state = self.lock()?;
        if state.offline {
            return Err(RemoteError::Unavailable("network is offline".to_string()));
        }
        Ok(state.read_delay)
    }

    /// Admission check for a write; returns the injected latency, if any.
    fn begin_write(&self) -> RemoteResult<Option<Duration>> {
        let mut state = self.lock()?;
        if state.offline {
            return Err(RemoteError::Unavailable("network is offline".to_string()));
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(RemoteError::Unavailable("injected write failure".to_string()));
        }
        Ok(state.write_delays.pop_front())
    }

    fn validate(&self, data: &Document) -> RemoteResult<()> {
        let has_owner = data
            .get("userId")
            .and_then(Value::as_str)
            .is_some_and(|owner| !owner.is_empty());
        if !has_owner {
            return Err(RemoteError::ValidationRejected(
                "document is missing `userId`".to_string(),
            ));
        }
        let size = serde_json::to_vec(data)
            .map_err(|err| RemoteError::ValidationRejected(err.to_string()))?
            .len();
        let max = self.lock()?.max_document_bytes;
        if size > max {
            return Err(RemoteError::ValidationRejected(format!(
                "document is {size} bytes, limit is {max}"
            )));
        }
        Ok(())
    }
}

async fn wait(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn add_document(&self, collection: &str, data: Document) -> RemoteResult<String> {
        self.validate(&data)?;
        let delay = self.begin_write()?;
        wait(delay).await;

        let mut state = self.lock()?;
        let id = match state.id_mode {
            IdMode::Random => Uuid::new_v4().simple().to_string(),
            IdMode::Sequential => {
                let id = format!("r{}", state.next_seq);
                state.next_seq += 1;
                id
            }
        };
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        state.writes_applied += 1;
        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> RemoteResult<()> {
        self.validate(&data)?;
        let delay = self.begin_write()?;
        wait(delay).await;

        let mut state = self.lock()?;
        let slot = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        *slot = data;
        state.writes_applied += 1;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let delay = self.begin_write()?;
        wait(delay).await;

        let mut state = self.lock()?;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.remove(id);
        }
        state.writes_applied += 1;
        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> RemoteResult<Option<RemoteDocument>> {
        let delay = self.begin_read()?;
        wait(delay).await;
        Ok(self.document(collection, id).map(|data| RemoteDocument {
            id: id.to_string(),
            data,
        }))
    }

    async fn query_collection(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        order: Option<&OrderBy>,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let delay = self.begin_read()?;
        wait(delay).await;
        let state = self.lock()?;
        let mut matches = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| {
                        filters
                            .iter()
                            .all(|filter| data.get(&filter.field) == Some(&filter.value))
                    })
                    .map(|(id, data)| RemoteDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        drop(state);

        if let Some(order) = order {
            matches.sort_by(|left, right| {
                let ordering =
                    compare_values(left.data.get(&order.field), right.data.get(&order.field));
                match order.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        Ok(matches)
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRemoteStore;
    use crate::remote::{Document, FieldFilter, OrderBy, RemoteError, RemoteStore};
    use serde_json::json;

    fn doc(user: &str, name: &str, created_at: i64) -> Document {
        let mut data = Document::new();
        data.insert("userId".to_string(), json!(user));
        data.insert("name".to_string(), json!(name));
        data.insert("createdAt".to_string(), json!(created_at));
        data
    }

    #[tokio::test]
    async fn query_filters_by_owner_and_orders_descending() {
        let store = InMemoryRemoteStore::with_sequential_ids();
        store.add_document("projects", doc("alice", "a", 1)).await.unwrap();
        store.add_document("projects", doc("alice", "b", 3)).await.unwrap();
        store.add_document("projects", doc("bob", "c", 2)).await.unwrap();

        let listed = store
            .query_collection(
                "projects",
                &[FieldFilter::eq("userId", "alice")],
                Some(&OrderBy::descending("createdAt")),
            )
            .await
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }

    #[tokio::test]
    async fn rejects_oversized_and_ownerless_documents() {
        let store = InMemoryRemoteStore::new();
        store.set_max_document_bytes(64);
        let mut big = doc("alice", "x", 1);
        big.insert("description".to_string(), json!("y".repeat(200)));
        assert!(matches!(
            store.add_document("projects", big).await,
            Err(RemoteError::ValidationRejected(_))
        ));
        assert!(matches!(
            store.add_document("projects", Document::new()).await,
            Err(RemoteError::ValidationRejected(_))
        ));
        assert_eq!(store.writes_applied(), 0);
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = InMemoryRemoteStore::new();
        let err = store
            .update_document("projects", "nope", doc("alice", "a", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = InMemoryRemoteStore::new();
        store.fail_next_writes(1);
        assert!(store.add_document("projects", doc("alice", "a", 1)).await.is_err());
        assert!(store.add_document("projects", doc("alice", "a", 1)).await.is_ok());

        store.set_offline(true);
        assert!(store
            .query_collection("projects", &[], None)
            .await
            .is_err());
    }
}
