//! Offline-first synchronization core for LabTrail research records.
//!
//! The local SQLite store is the source of truth for reads and writes; a
//! remote document store is mirrored in the background and reconciled on
//! explicit pull/push passes.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod sync;

pub use config::{ConfigError, CoreConfig, SyncConfig};
pub use db::{open_db, open_db_in_memory, DbError, SharedDb};
pub use logging::{
    default_log_level, init_from_config, init_logging, logging_status, LogLevel, LogSettings,
    LoggingError,
};
pub use model::{
    Entity, EntityKind, Experiment, Hypothesis, LocalId, LogEntry, Note, NotificationFrequency,
    ParentRef, Project, RecordMeta, ReminderFrequency, ReminderSetting, ValidationError,
};
pub use remote::{InMemoryRemoteStore, RemoteError, RemoteStore};
pub use repo::local_store::{LocalStore, StoreChange};
pub use repo::mapping_repo::{IdMapping, MappingError, MappingStore};
pub use repo::{RepoError, RepoResult};
pub use sync::{
    DedupStrategy, EntitySynchronizer, PullReport, PushReport, RecordStream, RemoteParent,
    Session, SyncEngine, SyncError, SyncReport,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
