//! Live display streams: local change notifications fanned in with a
//! one-shot remote fetch.
//!
//! # Invariants
//! - The first snapshot is emitted before any change is awaited.
//! - Dropping the [`RecordStream`] ends the producer task and aborts a
//!   pending remote fetch; this is logged as cancellation, never as failure.
//! - A lagging notification receiver re-emits instead of erroring.
//! - Snapshots are built on the blocking pool; SQLite is never queried on an
//!   async worker.

use crate::model::EntityKind;
use crate::repo::local_store::StoreChange;
use crate::repo::RepoResult;
use crate::sync::error::SyncResult;
use log::{debug, warn};
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};

/// Live sequence of record snapshots.
pub struct RecordStream<E> {
    rx: mpsc::Receiver<Vec<E>>,
}

impl<E> RecordStream<E> {
    /// Waits for the next snapshot; `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<Vec<E>> {
        self.rx.recv().await
    }
}

/// Inputs of one fan-in producer.
pub(crate) struct FanIn<E, L, C> {
    pub kind: EntityKind,
    pub buffer: usize,
    pub changes: broadcast::Receiver<StoreChange>,
    pub load_local: L,
    pub remote_fetch: Option<JoinHandle<SyncResult<Vec<E>>>>,
    pub compose: C,
}

impl<E, L, C> FanIn<E, L, C>
where
    E: Clone + Send + Sync + 'static,
    L: Fn() -> RepoResult<Vec<E>> + Send + Sync + 'static,
    C: Fn(Vec<E>, &[E]) -> Vec<E> + Send + Sync + 'static,
{
    pub fn spawn(self) -> RecordStream<E> {
        let (tx, rx) = mpsc::channel(self.buffer.max(1));
        tokio::spawn(self.run(tx));
        RecordStream { rx }
    }

    async fn run(self, tx: mpsc::Sender<Vec<E>>) {
        let FanIn {
            kind,
            mut changes,
            load_local,
            mut remote_fetch,
            compose,
            ..
        } = self;
        let snapshot = Snapshot {
            kind,
            load_local: Arc::new(load_local),
            compose: Arc::new(compose),
        };
        let mut remote_snapshot: Vec<E> = Vec::new();
        let mut open = snapshot.emit(&tx, &remote_snapshot).await;

        while open {
            tokio::select! {
                _ = tx.closed() => {
                    open = false;
                }
                joined = join_remote(&mut remote_fetch), if remote_fetch.is_some() => {
                    remote_fetch = None;
                    match joined {
                        Ok(Ok(records)) => {
                            debug!(
                                "event=stream_remote module=sync status=ok kind={kind} count={}",
                                records.len()
                            );
                            remote_snapshot = records;
                            open = snapshot.emit(&tx, &remote_snapshot).await;
                        }
                        Ok(Err(err)) => {
                            warn!("event=stream_remote module=sync status=error kind={kind} error={err}");
                        }
                        Err(err) => log_join_error(kind, &err),
                    }
                }
                change = changes.recv() => match change {
                    Ok(change) if change.kind == kind => {
                        open = snapshot.emit(&tx, &remote_snapshot).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("event=stream_lagged module=sync status=recovered kind={kind} skipped={skipped}");
                        open = snapshot.emit(&tx, &remote_snapshot).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        open = false;
                    }
                },
            }
        }

        if let Some(handle) = remote_fetch.take() {
            handle.abort();
            debug!("event=stream_close module=sync status=cancelled kind={kind} remote_fetch=aborted");
        } else {
            debug!("event=stream_close module=sync status=ok kind={kind}");
        }
    }
}

struct Snapshot<L, C> {
    kind: EntityKind,
    load_local: Arc<L>,
    compose: Arc<C>,
}

impl<L, C> Snapshot<L, C> {
    /// Sends a fresh snapshot. Returns `false` once the receiver is gone.
    async fn emit<E>(&self, tx: &mpsc::Sender<Vec<E>>, remote: &[E]) -> bool
    where
        E: Clone + Send + 'static,
        L: Fn() -> RepoResult<Vec<E>> + Send + Sync + 'static,
        C: Fn(Vec<E>, &[E]) -> Vec<E> + Send + Sync + 'static,
    {
        let load_local = Arc::clone(&self.load_local);
        let compose = Arc::clone(&self.compose);
        let remote = remote.to_vec();
        let built =
            tokio::task::spawn_blocking(move || load_local().map(|local| compose(local, &remote)))
                .await;
        match built {
            Ok(Ok(records)) => tx.send(records).await.is_ok(),
            Ok(Err(err)) => {
                warn!(
                    "event=stream_local module=sync status=error kind={} error={err}",
                    self.kind
                );
                !tx.is_closed()
            }
            Err(err) => {
                warn!(
                    "event=stream_local module=sync status=join_error kind={} error={err}",
                    self.kind
                );
                !tx.is_closed()
            }
        }
    }
}

async fn join_remote<T>(handle: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

fn log_join_error(kind: EntityKind, err: &JoinError) {
    if err.is_cancelled() {
        debug!("event=stream_remote module=sync status=cancelled kind={kind}");
    } else {
        warn!("event=stream_remote module=sync status=error kind={kind} error={err}");
    }
}
