//! Entity Synchronizer: write-through and explicit pull/push for one type.
//!
//! # Responsibility
//! - Commit user writes locally and mirror them to the remote store in the
//!   background.
//! - Import remote records (pull) and export local records (push).
//! - Serve live display streams merging local and remote views.
//!
//! # Invariants
//! - A local mutation never fails because of the remote store.
//! - Mappings are written only after a successful remote write or import.
//! - Pull overwrites a local copy only when the remote `updated_at` is
//!   strictly later.
//! - Push never deletes remote documents.

use crate::config::SyncConfig;
use crate::model::{next_timestamp, now_ms, EntityKind, LocalId, ParentRef};
use crate::remote::{FieldFilter, OrderBy, RemoteDocument, RemoteError, RemoteResult, RemoteStore};
use crate::repo::local_store::LocalStore;
use crate::repo::mapping_repo::MappingStore;
use crate::repo::tables::TableRecord;
use crate::repo::RepoError;
use crate::sync::codec::{RemoteCodec, RemoteParent};
use crate::sync::error::{SyncError, SyncFailure, SyncResult};
use crate::sync::merge::{merge, DedupStrategy};
use crate::sync::session::Session;
use crate::sync::stream::{FanIn, RecordStream};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

/// Record type that can be stored locally and encoded remotely.
pub trait Syncable: TableRecord + RemoteCodec {}

impl<T: TableRecord + RemoteCodec> Syncable for T {}

/// Dependencies shared by every synchronizer.
#[derive(Clone)]
pub struct SyncContext {
    pub local: LocalStore,
    pub mappings: MappingStore,
    pub remote: Arc<dyn RemoteStore>,
    pub session: Session,
    pub config: SyncConfig,
}

impl SyncContext {
    pub fn new(
        local: LocalStore,
        mappings: MappingStore,
        remote: Arc<dyn RemoteStore>,
        session: Session,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            mappings,
            remote,
            session,
            config,
        }
    }

    pub(crate) fn require_user(&self) -> SyncResult<String> {
        self.session
            .current_user()
            .ok_or(SyncError::NotAuthenticated)
    }

    /// Runs one remote call under the configured timeout.
    pub(crate) async fn call<T>(
        &self,
        op: impl Future<Output = RemoteResult<T>>,
    ) -> RemoteResult<T> {
        tokio::time::timeout(self.config.remote_timeout(), op)
            .await
            .unwrap_or_else(|_| {
                Err(RemoteError::Unavailable(format!(
                    "timed out after {} ms",
                    self.config.remote_timeout_ms
                )))
            })
    }
}

/// Outcome counters of one `pull_from_cloud` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub kind: EntityKind,
    pub fetched: usize,
    pub imported: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Mappings dropped because their remote document disappeared.
    pub unlinked: usize,
    pub failures: Vec<SyncFailure>,
}

impl PullReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            fetched: 0,
            imported: 0,
            updated: 0,
            unchanged: 0,
            unlinked: 0,
            failures: Vec::new(),
        }
    }
}

/// Outcome counters of one `push_to_cloud` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub kind: EntityKind,
    /// Signed-out records assigned to the current user.
    pub claimed: usize,
    pub created: usize,
    pub updated: usize,
    /// Records left for a later pass because their parent is not mapped.
    pub skipped: usize,
    pub failures: Vec<SyncFailure>,
}

impl PushReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            claimed: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }
}

enum PullOutcome {
    Imported,
    Updated,
    Unchanged,
}

enum PushOutcome {
    Created,
    Updated,
}

/// Dual-store coordinator for one entity type.
pub struct EntitySynchronizer<E> {
    ctx: SyncContext,
    tasks: Arc<Mutex<JoinSet<()>>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntitySynchronizer<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            tasks: Arc::clone(&self.tasks),
            _entity: PhantomData,
        }
    }
}

impl<E: Syncable> EntitySynchronizer<E> {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            ctx,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            _entity: PhantomData,
        }
    }

    /// Writes `record` locally and mirrors it in the background.
    ///
    /// Stamps both timestamps and the current user; returns the local id as
    /// soon as the local write commits.
    pub async fn insert(&self, record: E) -> SyncResult<LocalId> {
        let user = self.ctx.session.current_user();
        let mut record = record;
        let now = now_ms();
        {
            let meta = record.meta_mut();
            meta.created_at = now;
            meta.updated_at = now;
            meta.remote_id = None;
            meta.user_id = user.clone().unwrap_or_default();
        }
        let id = self.ctx.local.insert(&record)?;
        record.meta_mut().id = id;
        debug!(
            "event=sync_insert module=sync status=local_ok kind={} id={id}",
            E::KIND
        );

        match user {
            Some(user) => {
                let this = self.clone();
                self.spawn_mirror(async move {
                    match this.create_remote(&record, &user, None).await {
                        Ok(remote_id) => debug!(
                            "event=sync_mirror module=sync status=ok op=insert kind={} id={id} remote_id={remote_id}",
                            E::KIND
                        ),
                        Err(err) => log_abandoned::<E>("insert", id, &err),
                    }
                });
            }
            None => debug!(
                "event=sync_mirror module=sync status=skipped op=insert kind={} id={id} reason=signed_out",
                E::KIND
            ),
        }
        Ok(id)
    }

    /// Replaces the mutable fields of an existing record.
    ///
    /// Ownership, creation time and remote id are kept from the stored row;
    /// `updated_at` moves strictly forward.
    pub async fn update(&self, record: E) -> SyncResult<()> {
        let id = record.meta().id;
        let existing = self
            .ctx
            .local
            .get_by_id::<E>(id)?
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        let mut record = record;
        {
            let previous = existing.meta();
            let meta = record.meta_mut();
            meta.updated_at = next_timestamp(previous.updated_at);
            meta.created_at = previous.created_at;
            meta.user_id = previous.user_id.clone();
            meta.remote_id = previous.remote_id.clone();
        }
        self.ctx.local.update(&record)?;

        if let Some(user) = self.ctx.session.current_user() {
            let this = self.clone();
            self.spawn_mirror(async move {
                if let Err(err) = this.mirror_update(&record, &user).await {
                    log_abandoned::<E>("update", id, &err);
                }
            });
        }
        Ok(())
    }

    /// Deletes a record and its local descendants.
    ///
    /// Returns `false` when the record does not exist. Remote cleanup of every
    /// mapped record runs in the background.
    pub async fn delete(&self, id: LocalId) -> SyncResult<bool> {
        let Some(descendants) = self.ctx.local.delete::<E>(id)? else {
            return Ok(false);
        };
        info!(
            "event=sync_delete module=sync status=local_ok kind={} id={id} cascaded={}",
            E::KIND,
            descendants.len()
        );

        match self.ctx.session.current_user() {
            Some(user) => {
                let mut targets = Vec::with_capacity(descendants.len() + 1);
                targets.push((E::KIND, id));
                targets.extend(descendants);
                let this = self.clone();
                self.spawn_mirror(async move { this.remote_cleanup(targets, &user).await });
            }
            None => debug!(
                "event=sync_delete module=sync status=skipped kind={} id={id} reason=signed_out",
                E::KIND
            ),
        }
        Ok(true)
    }

    pub async fn archive(&self, id: LocalId) -> SyncResult<()> {
        self.set_archived(id, true).await
    }

    pub async fn unarchive(&self, id: LocalId) -> SyncResult<()> {
        self.set_archived(id, false).await
    }

    pub fn get_by_id(&self, id: LocalId) -> SyncResult<Option<E>> {
        Ok(self.ctx.local.get_by_id::<E>(id)?)
    }

    /// Live merged view of the non-archived records under `parent`.
    ///
    /// `None` lists top-level records. Local records are limited to the
    /// current user and those created signed out. Must be called inside a Tokio runtime.
    pub fn active_for_parent(&self, parent: Option<ParentRef>) -> RecordStream<E> {
        let changes = self.ctx.local.subscribe();
        let local = self.ctx.local.clone();
        let user = self.ctx.session.current_user();
        let remote_fetch = user.clone().map(|user| {
            let this = self.clone();
            tokio::spawn(async move { this.fetch_for_display(parent, &user).await })
        });
        let strategy = self.ctx.config.dedup;
        let mappings = self.ctx.mappings.clone();
        let viewer = user.clone().unwrap_or_default();

        FanIn {
            kind: E::KIND,
            buffer: self.ctx.config.live_buffer,
            changes,
            load_local: move || local.list_visible::<E>(parent.as_ref(), false, &viewer),
            remote_fetch,
            compose: move |local: Vec<E>, remote: &[E]| {
                let linked = match (strategy, user.as_deref()) {
                    (DedupStrategy::ByIdentifier, Some(user)) => {
                        linked_remote_ids(&mappings, E::KIND, user)
                    }
                    _ => HashSet::new(),
                };
                merge(local, remote.to_vec(), strategy, &linked)
            },
        }
        .spawn()
    }

    /// Live local-only view of every record under `parent`, archived included.
    pub fn all_for_parent(&self, parent: Option<ParentRef>) -> RecordStream<E> {
        let local = self.ctx.local.clone();
        let viewer = self.ctx.session.current_user().unwrap_or_default();
        FanIn {
            kind: E::KIND,
            buffer: self.ctx.config.live_buffer,
            changes: self.ctx.local.subscribe(),
            load_local: move || local.list_visible::<E>(parent.as_ref(), true, &viewer),
            remote_fetch: None,
            compose: |local: Vec<E>, _remote: &[E]| local,
        }
        .spawn()
    }

    /// Imports the current user's remote children of `parent`.
    ///
    /// `None` pulls top-level records. Query failures fail the call;
    /// per-record failures are collected in the report.
    pub async fn pull_from_cloud(&self, parent: Option<RemoteParent<'_>>) -> SyncResult<PullReport> {
        let user = self.ctx.require_user()?;
        let mut report = PullReport::new(E::KIND);
        if parent.is_none() && !E::KIND.is_top_level() {
            debug!(
                "event=sync_pull module=sync status=skipped kind={} reason=no_parent",
                E::KIND
            );
            return Ok(report);
        }

        let started_at = now_ms();
        let local_parent = parent.map(|parent| parent.local);
        let mut filters = vec![FieldFilter::eq("userId", user.as_str())];
        if let Some(parent) = parent.as_ref() {
            filters.extend(E::parent_filters(parent));
        }
        let docs = self
            .ctx
            .call(
                self.ctx
                    .remote
                    .query_collection(E::KIND.collection(), &filters, None),
            )
            .await?;

        report.fetched = docs.len();
        let mut seen = HashSet::with_capacity(docs.len());
        for doc in &docs {
            seen.insert(doc.id.as_str());
            match self.import_one(doc, local_parent, &user) {
                Ok(PullOutcome::Imported) => report.imported += 1,
                Ok(PullOutcome::Updated) => report.updated += 1,
                Ok(PullOutcome::Unchanged) => report.unchanged += 1,
                Err(err) => {
                    warn!(
                        "event=sync_pull module=sync status=record_error kind={} remote_id={} error={err}",
                        E::KIND,
                        doc.id
                    );
                    report
                        .failures
                        .push(SyncFailure::new(E::KIND, doc.id.clone(), &err));
                }
            }
        }
        report.unlinked = self.unlink_missing(local_parent, &seen, &user, started_at)?;

        info!(
            "event=sync_pull module=sync status=ok kind={} fetched={} imported={} updated={} unchanged={} unlinked={} failed={}",
            E::KIND,
            report.fetched,
            report.imported,
            report.updated,
            report.unchanged,
            report.unlinked,
            report.failures.len()
        );
        Ok(report)
    }

    /// Exports every local record of the current user.
    ///
    /// Waits for pending mirrors of this type first, so a record whose create
    /// is still in flight is updated rather than created twice. Records
    /// created signed out are claimed first. Unmapped records are created
    /// remotely, mapped ones overwrite their document.
    pub async fn push_to_cloud(&self) -> SyncResult<PushReport> {
        let user = self.ctx.require_user()?;
        self.flush().await;
        let mut report = PushReport::new(E::KIND);
        report.claimed = self.ctx.local.claim_unowned(E::KIND, &user)?;

        for record in self.ctx.local.list_for_user::<E>(&user)? {
            let id = record.meta().id;
            match self.push_one(&record, &user).await {
                Ok(PushOutcome::Created) => report.created += 1,
                Ok(PushOutcome::Updated) => report.updated += 1,
                Err(SyncError::ParentNotSynced { .. }) => report.skipped += 1,
                Err(err) => {
                    warn!(
                        "event=sync_push module=sync status=record_error kind={} id={id} error={err}",
                        E::KIND
                    );
                    report
                        .failures
                        .push(SyncFailure::new(E::KIND, id.to_string(), &err));
                }
            }
        }

        info!(
            "event=sync_push module=sync status=ok kind={} claimed={} created={} updated={} skipped={} failed={}",
            E::KIND,
            report.claimed,
            report.created,
            report.updated,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    /// Waits for every background mirror started so far.
    pub async fn flush(&self) {
        loop {
            let mut pending = match self.tasks.lock() {
                Ok(mut tasks) => std::mem::replace(&mut *tasks, JoinSet::new()),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }
            while let Some(joined) = pending.join_next().await {
                if let Err(err) = joined {
                    if err.is_panic() {
                        warn!(
                            "event=sync_mirror module=sync status=panicked kind={} error={err}",
                            E::KIND
                        );
                    }
                }
            }
        }
    }

    async fn set_archived(&self, id: LocalId, archived: bool) -> SyncResult<()> {
        let mut record = self
            .ctx
            .local
            .get_by_id::<E>(id)?
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        record.meta_mut().archived = archived;
        self.update(record).await
    }

    fn spawn_mirror<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                while tasks.try_join_next().is_some() {}
                tasks.spawn(task);
            }
            Err(_) => {
                warn!(
                    "event=sync_mirror module=sync status=untracked kind={}",
                    E::KIND
                );
                tokio::spawn(task);
            }
        }
    }

    /// Remote id of the record's parent for `user`.
    fn parent_remote_id(&self, record: &E, user: &str) -> SyncResult<Option<String>> {
        let Some(parent) = record.parent() else {
            return Ok(None);
        };
        match self.ctx.mappings.remote_id_for(parent.kind, parent.id, user)? {
            Some(remote_id) => Ok(Some(remote_id)),
            None => Err(SyncError::ParentNotSynced {
                kind: E::KIND,
                parent,
            }),
        }
    }

    /// Creates a document for `record` and links it.
    ///
    /// `stale_remote_id` names a mapped document already known to be gone.
    async fn create_remote(
        &self,
        record: &E,
        user: &str,
        stale_remote_id: Option<&str>,
    ) -> SyncResult<String> {
        let parent_remote_id = self.parent_remote_id(record, user)?;
        let doc = record.to_document(user, parent_remote_id.as_deref());
        let remote_id = self
            .ctx
            .call(self.ctx.remote.add_document(E::KIND.collection(), doc))
            .await?;
        self.link(record.meta().id, &remote_id, user, stale_remote_id).await?;
        Ok(remote_id)
    }

    async fn update_remote(
        &self,
        record: &E,
        remote_id: &str,
        user: &str,
    ) -> SyncResult<PushOutcome> {
        let parent_remote_id = self.parent_remote_id(record, user)?;
        let doc = record.to_document(user, parent_remote_id.as_deref());
        match self
            .ctx
            .call(
                self.ctx
                    .remote
                    .update_document(E::KIND.collection(), remote_id, doc),
            )
            .await
        {
            Ok(()) => Ok(PushOutcome::Updated),
            Err(RemoteError::NotFound { .. }) => {
                info!(
                    "event=sync_mirror module=sync status=recreate kind={} id={} stale_remote_id={remote_id}",
                    E::KIND,
                    record.meta().id
                );
                self.create_remote(record, user, Some(remote_id)).await?;
                Ok(PushOutcome::Created)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn mirror_update(&self, record: &E, user: &str) -> SyncResult<()> {
        let id = record.meta().id;
        let Some(remote_id) = self.ctx.mappings.remote_id_for(E::KIND, id, user)? else {
            debug!(
                "event=sync_mirror module=sync status=skipped op=update kind={} id={id} reason=unmapped",
                E::KIND
            );
            return Ok(());
        };
        self.update_remote(record, &remote_id, user).await?;
        Ok(())
    }

    async fn push_one(&self, record: &E, user: &str) -> SyncResult<PushOutcome> {
        match self
            .ctx
            .mappings
            .remote_id_for(E::KIND, record.meta().id, user)?
        {
            Some(remote_id) => self.update_remote(record, &remote_id, user).await,
            None => {
                self.create_remote(record, user, None).await?;
                Ok(PushOutcome::Created)
            }
        }
    }

    /// Records a fresh remote id on both the mapping table and the local row.
    ///
    /// A different document previously mapped to the same record loses its
    /// mapping here and is deleted, unless it is `stale_remote_id`.
    async fn link(
        &self,
        local_id: LocalId,
        remote_id: &str,
        user: &str,
        stale_remote_id: Option<&str>,
    ) -> SyncResult<()> {
        let superseded = self
            .ctx
            .mappings
            .remote_id_for(E::KIND, local_id, user)?
            .filter(|previous| {
                previous != remote_id && Some(previous.as_str()) != stale_remote_id
            });
        self.ctx.mappings.store(E::KIND, local_id, remote_id, user)?;
        match self.ctx.local.set_remote_id(E::KIND, local_id, Some(remote_id)) {
            Ok(()) => {}
            Err(RepoError::NotFound { .. }) => {
                // Deleted locally while the remote write was in flight.
                self.ctx
                    .mappings
                    .delete_by_local_id(E::KIND, local_id, user)?;
                self.discard_remote(local_id, remote_id, "orphan").await;
            }
            Err(err) => return Err(err.into()),
        }
        if let Some(previous) = superseded {
            self.discard_remote(local_id, &previous, "superseded").await;
        }
        Ok(())
    }

    /// Best-effort delete of a document no mapping points at any more.
    async fn discard_remote(&self, local_id: LocalId, remote_id: &str, reason: &str) {
        let removed = self
            .ctx
            .call(self.ctx.remote.delete_document(E::KIND.collection(), remote_id))
            .await;
        match removed {
            Ok(()) => debug!(
                "event=sync_mirror module=sync status={reason}_removed kind={} id={local_id} remote_id={remote_id}",
                E::KIND
            ),
            Err(err) => warn!(
                "event=sync_mirror module=sync status={reason}_left kind={} id={local_id} remote_id={remote_id} error={err}",
                E::KIND
            ),
        }
    }

    async fn remote_cleanup(&self, targets: Vec<(EntityKind, LocalId)>, user: &str) {
        for (kind, local_id) in targets {
            let remote_id = match self.ctx.mappings.remote_id_for(kind, local_id, user) {
                Ok(Some(remote_id)) => remote_id,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "event=sync_delete module=sync status=abandoned kind={kind} id={local_id} error={err}"
                    );
                    continue;
                }
            };
            let deleted = self
                .ctx
                .call(self.ctx.remote.delete_document(kind.collection(), &remote_id))
                .await;
            match deleted {
                Ok(()) | Err(RemoteError::NotFound { .. }) => {
                    if let Err(err) = self.ctx.mappings.delete_by_local_id(kind, local_id, user) {
                        warn!(
                            "event=sync_delete module=sync status=mapping_left kind={kind} id={local_id} error={err}"
                        );
                    }
                }
                Err(err) => warn!(
                    "event=sync_delete module=sync status=abandoned kind={kind} id={local_id} remote_id={remote_id} error={err}"
                ),
            }
        }
    }

    async fn fetch_for_display(&self, parent: Option<ParentRef>, user: &str) -> SyncResult<Vec<E>> {
        let mut filters = vec![FieldFilter::eq("userId", user)];
        match parent {
            Some(parent) => {
                let Some(remote_parent_id) =
                    self.ctx.mappings.remote_id_for(parent.kind, parent.id, user)?
                else {
                    return Ok(Vec::new());
                };
                filters.extend(E::parent_filters(&RemoteParent::new(
                    &remote_parent_id,
                    parent,
                )));
            }
            None if !E::KIND.is_top_level() => return Ok(Vec::new()),
            None => {}
        }

        let docs = self
            .ctx
            .call(self.ctx.remote.query_collection(
                E::KIND.collection(),
                &filters,
                Some(&OrderBy::descending("createdAt")),
            ))
            .await?;
        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            match E::from_document(doc, parent) {
                Ok(record) if !record.meta().archived => records.push(record),
                Ok(_) => {}
                Err(err) => warn!(
                    "event=stream_remote module=sync status=decode_error kind={} error={err}",
                    E::KIND
                ),
            }
        }
        Ok(records)
    }

    fn import_one(
        &self,
        doc: &RemoteDocument,
        local_parent: Option<ParentRef>,
        user: &str,
    ) -> SyncResult<PullOutcome> {
        let mut incoming = E::from_document(doc, local_parent)?;
        incoming.meta_mut().user_id = user.to_string();

        if let Some(local_id) = self.ctx.mappings.local_id_for(E::KIND, &doc.id, user)? {
            if let Some(existing) = self.ctx.local.get_by_id::<E>(local_id)? {
                if incoming.meta().updated_at <= existing.meta().updated_at {
                    return Ok(PullOutcome::Unchanged);
                }
                incoming.meta_mut().id = local_id;
                self.ctx.local.update(&incoming)?;
                return Ok(PullOutcome::Updated);
            }
            debug!(
                "event=sync_pull module=sync status=stale_mapping kind={} id={local_id} remote_id={}",
                E::KIND,
                doc.id
            );
            self.ctx.mappings.delete_by_remote_id(E::KIND, &doc.id, user)?;
        }

        let local_id = self.ctx.local.insert(&incoming)?;
        self.ctx.mappings.store(E::KIND, local_id, &doc.id, user)?;
        Ok(PullOutcome::Imported)
    }

    /// Drops mappings under `parent` whose document was not returned.
    ///
    /// Mappings written after `started_at` belong to in-flight mirrors and
    /// are kept. The local record stays, unsynced.
    fn unlink_missing(
        &self,
        parent: Option<ParentRef>,
        seen: &HashSet<&str>,
        user: &str,
        started_at: i64,
    ) -> SyncResult<usize> {
        let local_ids: HashSet<LocalId> = self
            .ctx
            .local
            .list_for_parent::<E>(parent.as_ref(), true)?
            .iter()
            .map(|record| record.meta().id)
            .collect();

        let mut unlinked = 0;
        for mapping in self.ctx.mappings.all_for_type(E::KIND, user)? {
            if !local_ids.contains(&mapping.local_id)
                || seen.contains(mapping.remote_id.as_str())
                || mapping.updated_at >= started_at
            {
                continue;
            }
            self.ctx
                .mappings
                .delete_by_remote_id(E::KIND, &mapping.remote_id, user)?;
            self.ctx.local.set_remote_id(E::KIND, mapping.local_id, None)?;
            info!(
                "event=sync_pull module=sync status=unlinked kind={} id={} remote_id={}",
                E::KIND,
                mapping.local_id,
                mapping.remote_id
            );
            unlinked += 1;
        }
        Ok(unlinked)
    }
}

fn linked_remote_ids(mappings: &MappingStore, kind: EntityKind, user: &str) -> HashSet<String> {
    match mappings.all_for_type(kind, user) {
        Ok(rows) => rows.into_iter().map(|row| row.remote_id).collect(),
        Err(err) => {
            warn!("event=stream_merge module=sync status=mapping_error kind={kind} error={err}");
            HashSet::new()
        }
    }
}

fn log_abandoned<E: Syncable>(op: &str, id: LocalId, err: &SyncError) {
    match err {
        SyncError::ParentNotSynced { .. } => info!(
            "event=sync_mirror module=sync status=deferred op={op} kind={} id={id} reason=parent_not_synced",
            E::KIND
        ),
        other => warn!(
            "event=sync_mirror module=sync status=abandoned op={op} kind={} id={id} error={other}",
            E::KIND
        ),
    }
}
