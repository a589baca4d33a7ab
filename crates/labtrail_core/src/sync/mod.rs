//! Dual-store synchronization between the local store and the remote store.
//!
//! # Responsibility
//! - Mirror local writes to the remote store without blocking callers.
//! - Import and export full record sets on request.
//! - Merge local and remote views for display.
//!
//! # Invariants
//! - The local store is always written first and is never rolled back.
//! - Only this module writes to the identifier mapping table.

pub mod codec;
pub mod engine;
pub mod error;
pub mod merge;
pub mod session;
pub mod stream;
pub mod synchronizer;

pub use codec::{DecodeError, RemoteCodec, RemoteParent};
pub use engine::{SyncDirection, SyncEngine, SyncReport};
pub use error::{SyncError, SyncFailure, SyncResult};
pub use merge::{merge, DedupStrategy};
pub use session::Session;
pub use stream::RecordStream;
pub use synchronizer::{EntitySynchronizer, PullReport, PushReport, SyncContext, Syncable};
