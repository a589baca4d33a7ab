use labtrail_core::remote::Document;
use labtrail_core::sync::RemoteCodec;
use labtrail_core::{
    Entity, EntityKind, Experiment, Hypothesis, InMemoryRemoteStore, LogEntry, Note, ParentRef,
    Project, ReminderSetting, Session, SharedDb, SyncConfig, SyncEngine, SyncError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn signed_in() -> (SyncEngine, Arc<InMemoryRemoteStore>) {
    let remote = Arc::new(InMemoryRemoteStore::with_sequential_ids());
    let engine = SyncEngine::new(
        SharedDb::in_memory().unwrap(),
        remote.clone(),
        Session::signed_in("alice"),
        SyncConfig::default(),
    );
    (engine, remote)
}

fn stamped<E: Entity>(mut record: E, updated_at: i64) -> E {
    record.meta_mut().created_at = 1_000;
    record.meta_mut().updated_at = updated_at;
    record
}

fn project_doc(name: &str, updated_at: i64) -> Document {
    stamped(Project::new(name, ""), updated_at).to_document("alice", None)
}

fn local_name(engine: &SyncEngine, id: i64) -> String {
    engine.projects().get_by_id(id).unwrap().unwrap().name
}

#[tokio::test]
async fn pull_imports_once_and_is_idempotent() {
    let (engine, remote) = signed_in();
    remote.put_document("projects", "p1", project_doc("Running log", 1_000));
    remote.put_document("projects", "p2", project_doc("Diet study", 1_000));

    let first = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(first.imported, 2);
    assert!(first.failures.is_empty());

    let second = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(engine.local().count(EntityKind::Project).unwrap(), 2);

    let local_id = engine
        .mappings()
        .local_id_for(EntityKind::Project, "p1", "alice")
        .unwrap()
        .unwrap();
    let imported = engine.projects().get_by_id(local_id).unwrap().unwrap();
    assert_eq!(imported.name, "Running log");
    assert_eq!(imported.meta.remote_id.as_deref(), Some("p1"));
    assert_eq!(imported.meta.user_id, "alice");
    assert_eq!(imported.meta.updated_at, 1_000);
}

#[tokio::test]
async fn pull_never_touches_the_remote_store() {
    let (engine, remote) = signed_in();
    remote.put_document("projects", "p1", project_doc("Running log", 1_000));

    engine.sync_from_cloud().await.unwrap();
    engine.flush().await;
    assert_eq!(remote.writes_applied(), 0);
}

#[tokio::test]
async fn only_strictly_newer_remote_copies_overwrite() {
    let (engine, remote) = signed_in();
    remote.put_document("projects", "p1", project_doc("Original", 1_000));
    engine.projects().pull_from_cloud(None).await.unwrap();
    let id = engine
        .mappings()
        .local_id_for(EntityKind::Project, "p1", "alice")
        .unwrap()
        .unwrap();

    remote.put_document("projects", "p1", project_doc("Renamed", 2_000));
    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(local_name(&engine, id), "Renamed");

    remote.put_document("projects", "p1", project_doc("Tied", 2_000));
    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.unchanged, 1);
    assert_eq!(local_name(&engine, id), "Renamed");

    remote.put_document("projects", "p1", project_doc("Older", 1_500));
    engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(local_name(&engine, id), "Renamed");
}

#[tokio::test]
async fn local_archive_survives_a_pull_of_the_older_remote_copy() {
    let (engine, remote) = signed_in();
    let id = engine
        .projects()
        .insert(Project::new("Sleep study", ""))
        .await
        .unwrap();
    engine.flush().await;

    remote.set_offline(true);
    engine.projects().archive(id).await.unwrap();
    engine.flush().await;
    remote.set_offline(false);
    assert_eq!(
        remote.document("projects", "r1").unwrap()["isArchived"],
        json!(false)
    );

    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.unchanged, 1);
    let local = engine.projects().get_by_id(id).unwrap().unwrap();
    assert!(local.meta.archived);

    let mut newer = local.clone();
    newer.meta.archived = false;
    newer.meta.updated_at = local.meta.updated_at + 10_000;
    remote.put_document("projects", "r1", newer.to_document("alice", None));
    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.updated, 1);
    assert!(!engine.projects().get_by_id(id).unwrap().unwrap().meta.archived);
}

#[tokio::test]
async fn vanished_documents_are_unlinked_and_recreated_by_push() {
    let (engine, remote) = signed_in();
    let id = engine
        .projects()
        .insert(Project::new("Sleep study", ""))
        .await
        .unwrap();
    engine.flush().await;
    assert!(remote.remove_document("projects", "r1"));
    tokio::time::sleep(Duration::from_millis(5)).await;

    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.unlinked, 1);
    assert_eq!(
        engine
            .mappings()
            .remote_id_for(EntityKind::Project, id, "alice")
            .unwrap(),
        None
    );
    let local = engine.projects().get_by_id(id).unwrap().unwrap();
    assert_eq!(local.meta.remote_id, None);

    let pushed = engine.sync_to_cloud().await.unwrap();
    assert_eq!(pushed.created(), 1);
    assert_eq!(remote.document_count("projects"), 1);
}

#[tokio::test]
async fn mapping_to_a_deleted_local_row_is_reimported() {
    let (engine, remote) = signed_in();
    remote.put_document("projects", "p1", project_doc("Running log", 1_000));
    engine.projects().pull_from_cloud(None).await.unwrap();
    let first_id = engine
        .mappings()
        .local_id_for(EntityKind::Project, "p1", "alice")
        .unwrap()
        .unwrap();

    engine.local().delete::<Project>(first_id).unwrap();
    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.imported, 1);

    let second_id = engine
        .mappings()
        .local_id_for(EntityKind::Project, "p1", "alice")
        .unwrap()
        .unwrap();
    assert_ne!(second_id, first_id);
    assert_eq!(local_name(&engine, second_id), "Running log");
}

#[tokio::test]
async fn documents_of_other_users_are_not_imported() {
    let (engine, remote) = signed_in();
    remote.put_document(
        "projects",
        "b1",
        stamped(Project::new("Bob's", ""), 1_000).to_document("bob", None),
    );

    let report = engine.projects().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(engine.local().count(EntityKind::Project).unwrap(), 0);
}

#[tokio::test]
async fn child_pull_without_parent_is_a_no_op() {
    let (engine, remote) = signed_in();
    remote.put_document(
        "hypotheses",
        "h1",
        stamped(Hypothesis::new(0, "H", ""), 1_000).to_document("alice", Some("p1")),
    );

    let report = engine.hypotheses().pull_from_cloud(None).await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(engine.local().count(EntityKind::Hypothesis).unwrap(), 0);
}

#[tokio::test]
async fn pull_requires_a_signed_in_user() {
    let (engine, _remote) = signed_in();
    engine.session().sign_out();
    assert!(matches!(
        engine.projects().pull_from_cloud(None).await,
        Err(SyncError::NotAuthenticated)
    ));
    assert!(matches!(
        engine.sync_from_cloud().await,
        Err(SyncError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn undecodable_documents_are_reported_without_stopping_the_pull() {
    let (engine, remote) = signed_in();
    remote.put_document("projects", "p1", project_doc("Good", 1_000));
    let mut broken = Document::new();
    broken.insert("userId".to_string(), json!("alice"));
    broken.insert("createdAt".to_string(), json!(1_000));
    broken.insert("updatedAt".to_string(), json!(1_000));
    remote.put_document("projects", "p2", broken);

    let failures = match engine.sync_from_cloud().await {
        Err(SyncError::Partial(failures)) => failures,
        other => panic!("expected a partial failure, got {other:?}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, EntityKind::Project);
    assert_eq!(failures[0].target, "p2");
    assert_eq!(engine.local().count(EntityKind::Project).unwrap(), 1);
    assert!(engine.last_sync_error().borrow().is_some());
}

#[tokio::test]
async fn full_pull_rebuilds_the_hierarchy_with_local_parent_ids() {
    let (engine, remote) = signed_in();
    remote.put_document("projects", "p1", project_doc("Sleep study", 1_000));
    remote.put_document(
        "hypotheses",
        "h1",
        stamped(Hypothesis::new(0, "Coffee hurts", ""), 1_000).to_document("alice", Some("p1")),
    );
    remote.put_document(
        "experiments",
        "e1",
        stamped(Experiment::new(0, "No coffee week", "How rested?"), 1_000)
            .to_document("alice", Some("h1")),
    );
    remote.put_document(
        "logEntries",
        "l1",
        stamped(LogEntry::new(0, "Rested"), 1_000).to_document("alice", Some("e1")),
    );
    remote.put_document(
        "notes",
        "n1",
        stamped(Note::new(0, "Tea counts too"), 1_000).to_document("alice", Some("h1")),
    );
    remote.put_document(
        "reminderSettings",
        "m1",
        stamped(ReminderSetting::daily(ParentRef::experiment(0), 21, 0), 1_000)
            .to_document("alice", Some("e1")),
    );

    let report = engine.sync_from_cloud().await.unwrap();
    assert_eq!(report.imported(), 6);

    let local_id = |kind: EntityKind, remote_id: &str| {
        engine
            .mappings()
            .local_id_for(kind, remote_id, "alice")
            .unwrap()
            .unwrap()
    };
    let project = local_id(EntityKind::Project, "p1");
    let hypothesis = local_id(EntityKind::Hypothesis, "h1");
    let experiment = local_id(EntityKind::Experiment, "e1");

    let h = engine.hypotheses().get_by_id(hypothesis).unwrap().unwrap();
    assert_eq!(h.project_id, project);
    let e = engine.experiments().get_by_id(experiment).unwrap().unwrap();
    assert_eq!(e.hypothesis_id, hypothesis);
    let l = engine
        .log_entries()
        .get_by_id(local_id(EntityKind::LogEntry, "l1"))
        .unwrap()
        .unwrap();
    assert_eq!(l.experiment_id, experiment);
    let n = engine
        .notes()
        .get_by_id(local_id(EntityKind::Note, "n1"))
        .unwrap()
        .unwrap();
    assert_eq!(n.hypothesis_id, hypothesis);
    let m = engine
        .reminders()
        .get_by_id(local_id(EntityKind::ReminderSetting, "m1"))
        .unwrap()
        .unwrap();
    assert_eq!(m.parent, ParentRef::experiment(experiment));

    let again = engine.sync_from_cloud().await.unwrap();
    assert_eq!(again.imported(), 0);
    assert_eq!(again.updated_locally(), 0);
    for kind in EntityKind::ALL {
        assert_eq!(engine.local().count(kind).unwrap(), 1, "{kind} duplicated");
    }
}
