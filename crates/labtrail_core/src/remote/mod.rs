//! Remote Store Adapter contracts.
//!
//! # Responsibility
//! - Define the document-store operations the synchronizers depend on.
//! - Keep transport details behind one async trait.
//!
//! # Invariants
//! - Implementations fail by returning `Err`, never by applying part of a
//!   write.
//! - Document ids are assigned by the remote store on `add_document`.
//! - Deleting a document that does not exist succeeds.

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;

pub use memory::InMemoryRemoteStore;

/// Document payload: a JSON object with camelCase keys.
pub type Document = serde_json::Map<String, Value>;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Document returned by reads, with its server-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub data: Document,
}

/// Equality filter on one document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No signed-in user; every remote operation is blocked.
    NotAuthenticated,
    /// Network or service failure, including timeouts.
    Unavailable(String),
    /// The store refused a malformed or oversized write.
    ValidationRejected(String),
    /// Target document does not exist.
    NotFound { collection: String, id: String },
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::Unavailable(message) => write!(f, "remote store unavailable: {message}"),
            Self::ValidationRejected(message) => {
                write!(f, "remote store rejected write: {message}")
            }
            Self::NotFound { collection, id } => {
                write!(f, "remote document not found: {collection}/{id}")
            }
        }
    }
}

impl Error for RemoteError {}

/// Network-backed document store scoped by `userId` fields.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates a document and returns its server-assigned id.
    async fn add_document(&self, collection: &str, data: Document) -> RemoteResult<String>;

    /// Replaces an existing document. `NotFound` when it does not exist.
    async fn update_document(&self, collection: &str, id: &str, data: Document)
        -> RemoteResult<()>;

    async fn delete_document(&self, collection: &str, id: &str) -> RemoteResult<()>;

    async fn get_document(&self, collection: &str, id: &str)
        -> RemoteResult<Option<RemoteDocument>>;

    /// One-shot snapshot of the documents matching every filter.
    async fn query_collection(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        order: Option<&OrderBy>,
    ) -> RemoteResult<Vec<RemoteDocument>>;
}
