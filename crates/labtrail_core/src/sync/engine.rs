//! Sync orchestration over the six entity synchronizers.
//!
//! # Responsibility
//! - Own the shared dependencies and construct every synchronizer once.
//! - Run explicit full pulls and pushes in hierarchy order.
//! - Publish in-flight and last-error state to observers.
//!
//! # Invariants
//! - At most one explicit sync runs at a time; a second one fails fast.
//! - `last_sync_error` keeps its value until dismissed or a later sync
//!   succeeds.
//! - Parents are always processed before their children.

use crate::config::{CoreConfig, SyncConfig};
use crate::db::{open_db, SharedDb};
use crate::model::{
    EntityKind, Experiment, Hypothesis, LocalId, LogEntry, Note, ParentRef, Project,
    ReminderSetting,
};
use crate::remote::RemoteStore;
use crate::repo::local_store::LocalStore;
use crate::repo::mapping_repo::MappingStore;
use crate::repo::RepoError;
use crate::sync::codec::RemoteParent;
use crate::sync::error::{SyncError, SyncFailure, SyncResult};
use crate::sync::session::Session;
use crate::sync::synchronizer::{
    EntitySynchronizer, PullReport, PushReport, SyncContext, Syncable,
};
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    FromCloud,
    ToCloud,
}

impl Display for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromCloud => f.write_str("from_cloud"),
            Self::ToCloud => f.write_str("to_cloud"),
        }
    }
}

/// Aggregated outcome of one explicit sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub pulls: Vec<PullReport>,
    pub pushes: Vec<PushReport>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            pulls: Vec::new(),
            pushes: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn absorb_pull(&mut self, kind: EntityKind, target: &str, outcome: SyncResult<PullReport>) {
        match outcome {
            Ok(report) => {
                self.failures.extend(report.failures.iter().cloned());
                self.pulls.push(report);
            }
            Err(err) => self.failures.push(SyncFailure::new(kind, target, &err)),
        }
    }

    fn absorb_push(&mut self, kind: EntityKind, outcome: SyncResult<PushReport>) {
        match outcome {
            Ok(report) => {
                self.failures.extend(report.failures.iter().cloned());
                self.pushes.push(report);
            }
            Err(err) => self.failures.push(SyncFailure::new(kind, "all", &err)),
        }
    }

    /// Records changed locally by a pull.
    pub fn imported(&self) -> usize {
        self.pulls.iter().map(|report| report.imported).sum()
    }

    pub fn updated_locally(&self) -> usize {
        self.pulls.iter().map(|report| report.updated).sum()
    }

    /// Documents created remotely by a push.
    pub fn created(&self) -> usize {
        self.pushes.iter().map(|report| report.created).sum()
    }

    pub fn updated_remotely(&self) -> usize {
        self.pushes.iter().map(|report| report.updated).sum()
    }

    pub fn skipped(&self) -> usize {
        self.pushes.iter().map(|report| report.skipped).sum()
    }
}

/// Entry point of the synchronization core.
pub struct SyncEngine {
    ctx: SyncContext,
    projects: EntitySynchronizer<Project>,
    hypotheses: EntitySynchronizer<Hypothesis>,
    experiments: EntitySynchronizer<Experiment>,
    log_entries: EntitySynchronizer<LogEntry>,
    notes: EntitySynchronizer<Note>,
    reminders: EntitySynchronizer<ReminderSetting>,
    running: Mutex<()>,
    syncing: watch::Sender<bool>,
    last_error: watch::Sender<Option<String>>,
}

impl SyncEngine {
    pub fn new(
        db: SharedDb,
        remote: Arc<dyn RemoteStore>,
        session: Session,
        config: SyncConfig,
    ) -> Self {
        let ctx = SyncContext::new(
            LocalStore::new(db.clone()),
            MappingStore::new(db),
            remote,
            session,
            config,
        );
        let (syncing, _) = watch::channel(false);
        let (last_error, _) = watch::channel(None);
        Self {
            projects: EntitySynchronizer::new(ctx.clone()),
            hypotheses: EntitySynchronizer::new(ctx.clone()),
            experiments: EntitySynchronizer::new(ctx.clone()),
            log_entries: EntitySynchronizer::new(ctx.clone()),
            notes: EntitySynchronizer::new(ctx.clone()),
            reminders: EntitySynchronizer::new(ctx.clone()),
            ctx,
            running: Mutex::new(()),
            syncing,
            last_error,
        }
    }

    /// Opens the configured database (in-memory when no path is set).
    pub fn open(
        config: &CoreConfig,
        remote: Arc<dyn RemoteStore>,
        session: Session,
    ) -> SyncResult<Self> {
        let db = match config.db_path.as_deref() {
            Some(path) => SharedDb::new(open_db(path).map_err(RepoError::from)?),
            None => SharedDb::in_memory().map_err(RepoError::from)?,
        };
        Ok(Self::new(db, remote, session, config.sync.clone()))
    }

    pub fn projects(&self) -> &EntitySynchronizer<Project> {
        &self.projects
    }

    pub fn hypotheses(&self) -> &EntitySynchronizer<Hypothesis> {
        &self.hypotheses
    }

    pub fn experiments(&self) -> &EntitySynchronizer<Experiment> {
        &self.experiments
    }

    pub fn log_entries(&self) -> &EntitySynchronizer<LogEntry> {
        &self.log_entries
    }

    pub fn notes(&self) -> &EntitySynchronizer<Note> {
        &self.notes
    }

    pub fn reminders(&self) -> &EntitySynchronizer<ReminderSetting> {
        &self.reminders
    }

    pub fn session(&self) -> &Session {
        &self.ctx.session
    }

    pub fn local(&self) -> &LocalStore {
        &self.ctx.local
    }

    pub fn mappings(&self) -> &MappingStore {
        &self.ctx.mappings
    }

    /// Imports the signed-in user's remote data, parents before children.
    pub async fn sync_from_cloud(&self) -> SyncResult<SyncReport> {
        self.run(SyncDirection::FromCloud, self.pull_all()).await
    }

    /// Exports local data, parents before children. Never deletes remotely.
    pub async fn sync_to_cloud(&self) -> SyncResult<SyncReport> {
        self.run(SyncDirection::ToCloud, self.push_all()).await
    }

    pub fn is_syncing(&self) -> watch::Receiver<bool> {
        self.syncing.subscribe()
    }

    pub fn last_sync_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    pub fn dismiss_sync_error(&self) {
        self.last_error.send_replace(None);
    }

    /// Enabled, non-archived reminders of every parent, for the scheduler.
    ///
    /// Limited to the current user and reminders created signed out.
    pub fn all_active_reminders(&self) -> SyncResult<Vec<ReminderSetting>> {
        let viewer = self.ctx.session.current_user().unwrap_or_default();
        let reminders = self
            .ctx
            .local
            .list_visible::<ReminderSetting>(None, false, &viewer)?;
        Ok(reminders
            .into_iter()
            .filter(|reminder| reminder.enabled)
            .collect())
    }

    /// Waits for background mirrors of every synchronizer.
    pub async fn flush(&self) {
        self.projects.flush().await;
        self.hypotheses.flush().await;
        self.experiments.flush().await;
        self.log_entries.flush().await;
        self.notes.flush().await;
        self.reminders.flush().await;
    }

    async fn run(
        &self,
        direction: SyncDirection,
        job: impl Future<Output = SyncResult<SyncReport>>,
    ) -> SyncResult<SyncReport> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;
        self.syncing.send_replace(true);
        info!("event=sync_run module=sync status=start direction={direction}");

        let result = match job.await {
            Ok(report) if report.failures.is_empty() => Ok(report),
            Ok(report) => Err(SyncError::Partial(report.failures)),
            Err(err) => Err(err),
        };
        self.syncing.send_replace(false);

        match &result {
            Ok(report) => {
                self.last_error.send_replace(None);
                info!(
                    "event=sync_run module=sync status=ok direction={direction} imported={} updated_locally={} created={} updated_remotely={} skipped={}",
                    report.imported(),
                    report.updated_locally(),
                    report.created(),
                    report.updated_remotely(),
                    report.skipped()
                );
            }
            Err(err) => {
                self.last_error.send_replace(Some(err.to_string()));
                warn!("event=sync_run module=sync status=error direction={direction} error={err}");
            }
        }
        result
    }

    async fn pull_all(&self) -> SyncResult<SyncReport> {
        let user = self.ctx.require_user()?;
        let mut report = SyncReport::new(SyncDirection::FromCloud);

        report.absorb_pull(
            EntityKind::Project,
            "root",
            self.projects.pull_from_cloud(None).await,
        );

        for (local_id, remote_id) in self.mapped_parents(EntityKind::Project, &user)? {
            let parent = RemoteParent::new(&remote_id, ParentRef::project(local_id));
            self.pull_children(&mut report, &self.hypotheses, parent).await;
            self.pull_children(&mut report, &self.reminders, parent).await;
        }
        for (local_id, remote_id) in self.mapped_parents(EntityKind::Hypothesis, &user)? {
            let parent = RemoteParent::new(&remote_id, ParentRef::hypothesis(local_id));
            self.pull_children(&mut report, &self.experiments, parent).await;
            self.pull_children(&mut report, &self.notes, parent).await;
            self.pull_children(&mut report, &self.reminders, parent).await;
        }
        for (local_id, remote_id) in self.mapped_parents(EntityKind::Experiment, &user)? {
            let parent = RemoteParent::new(&remote_id, ParentRef::experiment(local_id));
            self.pull_children(&mut report, &self.log_entries, parent).await;
            self.pull_children(&mut report, &self.reminders, parent).await;
        }
        Ok(report)
    }

    async fn push_all(&self) -> SyncResult<SyncReport> {
        self.ctx.require_user()?;
        let mut report = SyncReport::new(SyncDirection::ToCloud);
        report.absorb_push(EntityKind::Project, self.projects.push_to_cloud().await);
        report.absorb_push(EntityKind::Hypothesis, self.hypotheses.push_to_cloud().await);
        report.absorb_push(EntityKind::Experiment, self.experiments.push_to_cloud().await);
        report.absorb_push(EntityKind::LogEntry, self.log_entries.push_to_cloud().await);
        report.absorb_push(EntityKind::Note, self.notes.push_to_cloud().await);
        report.absorb_push(
            EntityKind::ReminderSetting,
            self.reminders.push_to_cloud().await,
        );
        Ok(report)
    }

    async fn pull_children<E: Syncable>(
        &self,
        report: &mut SyncReport,
        synchronizer: &EntitySynchronizer<E>,
        parent: RemoteParent<'_>,
    ) {
        let target = format!("{} {}", parent.local.kind, parent.local.id);
        report.absorb_pull(E::KIND, &target, synchronizer.pull_from_cloud(Some(parent)).await);
    }

    /// Mapped records of `kind` that still exist locally.
    fn mapped_parents(&self, kind: EntityKind, user: &str) -> SyncResult<Vec<(LocalId, String)>> {
        let mut parents = Vec::new();
        for mapping in self.ctx.mappings.all_for_type(kind, user)? {
            if self.ctx.local.exists(kind, mapping.local_id)? {
                parents.push((mapping.local_id, mapping.remote_id));
            }
        }
        Ok(parents)
    }
}
