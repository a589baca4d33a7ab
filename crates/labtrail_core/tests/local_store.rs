use labtrail_core::{
    EntityKind, Experiment, Hypothesis, LocalStore, LogEntry, Note, NotificationFrequency,
    ParentRef, Project, RecordMeta, ReminderSetting, RepoError, SharedDb,
};

fn store() -> LocalStore {
    LocalStore::new(SharedDb::in_memory().unwrap())
}

fn meta(user_id: &str, at: i64) -> RecordMeta {
    RecordMeta {
        user_id: user_id.to_string(),
        created_at: at,
        updated_at: at,
        ..RecordMeta::default()
    }
}

#[test]
fn every_entity_reads_back_what_was_written() {
    let store = store();

    let mut project = Project::new("Sleep study", "Does caffeine matter?").with_goal("8h");
    project.meta = meta("alice", 100);
    let project_id = store.insert(&project).unwrap();
    project.meta.id = project_id;
    assert_eq!(store.get_by_id::<Project>(project_id).unwrap(), Some(project));

    let mut hypothesis = Hypothesis::new(project_id, "Coffee after 2pm hurts", "");
    hypothesis.meta = meta("alice", 101);
    let hypothesis_id = store.insert(&hypothesis).unwrap();
    hypothesis.meta.id = hypothesis_id;
    assert_eq!(
        store.get_by_id::<Hypothesis>(hypothesis_id).unwrap(),
        Some(hypothesis)
    );

    let mut experiment = Experiment::new(hypothesis_id, "No coffee week", "How rested?");
    experiment.meta = meta("alice", 102);
    experiment.notifications_enabled = true;
    experiment.notification_frequency = NotificationFrequency::EveryHours(6);
    let experiment_id = store.insert(&experiment).unwrap();
    experiment.meta.id = experiment_id;
    assert_eq!(
        store.get_by_id::<Experiment>(experiment_id).unwrap(),
        Some(experiment)
    );

    let mut entry = LogEntry::new(experiment_id, "Slept well");
    entry.meta = meta("alice", 103);
    let entry_id = store.insert(&entry).unwrap();
    entry.meta.id = entry_id;
    assert_eq!(store.get_by_id::<LogEntry>(entry_id).unwrap(), Some(entry));

    let mut note = Note::new(hypothesis_id, "Check the tea too");
    note.meta = meta("alice", 104);
    note.attachment_path = Some("/photos/tea.jpg".to_string());
    let note_id = store.insert(&note).unwrap();
    note.meta.id = note_id;
    assert_eq!(store.get_by_id::<Note>(note_id).unwrap(), Some(note));

    let mut reminder =
        ReminderSetting::weekly(ParentRef::experiment(experiment_id), 21, 30, vec![1, 3, 5]);
    reminder.meta = meta("alice", 105);
    let reminder_id = store.insert(&reminder).unwrap();
    reminder.meta.id = reminder_id;
    assert_eq!(
        store.get_by_id::<ReminderSetting>(reminder_id).unwrap(),
        Some(reminder)
    );
}

#[test]
fn update_keeps_identity_columns() {
    let store = store();
    let mut project = Project::new("Sleep study", "");
    project.meta = meta("alice", 100);
    let id = store.insert(&project).unwrap();
    store
        .set_remote_id(EntityKind::Project, id, Some("r1"))
        .unwrap();

    let mut edited = store.get_by_id::<Project>(id).unwrap().unwrap();
    edited.name = "Sleep study v2".to_string();
    edited.meta.updated_at = 200;
    edited.meta.created_at = 999;
    edited.meta.user_id = "mallory".to_string();
    edited.meta.remote_id = None;
    store.update(&edited).unwrap();

    let loaded = store.get_by_id::<Project>(id).unwrap().unwrap();
    assert_eq!(loaded.name, "Sleep study v2");
    assert_eq!(loaded.meta.updated_at, 200);
    assert_eq!(loaded.meta.created_at, 100);
    assert_eq!(loaded.meta.user_id, "alice");
    assert_eq!(loaded.meta.remote_id.as_deref(), Some("r1"));
}

#[test]
fn update_missing_record_is_not_found() {
    let store = store();
    let mut ghost = Project::new("Ghost", "");
    ghost.meta.id = 7;
    let err = store.update(&ghost).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::Project,
            id: 7
        }
    ));
}

#[test]
fn blank_names_are_rejected_before_writing() {
    let store = store();
    let err = store.insert(&Project::new("   ", "")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(store.count(EntityKind::Project).unwrap(), 0);
}

#[test]
fn list_for_parent_orders_newest_first_and_hides_archived() {
    let store = store();
    let project_id = store.insert(&Project::new("Sleep study", "")).unwrap();
    for (name, at, archived) in [("old", 10, false), ("new", 30, false), ("gone", 20, true)] {
        let mut hypothesis = Hypothesis::new(project_id, name, "");
        hypothesis.meta = meta("alice", at);
        hypothesis.meta.archived = archived;
        store.insert(&hypothesis).unwrap();
    }

    let parent = ParentRef::project(project_id);
    let active = store
        .list_for_parent::<Hypothesis>(Some(&parent), false)
        .unwrap();
    let names = active.iter().map(|h| h.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["new", "old"]);

    let all = store
        .list_for_parent::<Hypothesis>(Some(&parent), true)
        .unwrap();
    let names = all.iter().map(|h| h.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["new", "gone", "old"]);
}

#[test]
fn list_visible_hides_other_users_records() {
    let store = store();
    for (name, owner, at) in [("Alice's", "alice", 10), ("Unowned", "", 20), ("Bob's", "bob", 30)] {
        let mut project = Project::new(name, "");
        project.meta = meta(owner, at);
        store.insert(&project).unwrap();
    }

    let names = |user: &str| {
        store
            .list_visible::<Project>(None, false, user)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect::<Vec<_>>()
    };
    assert_eq!(names("bob"), vec!["Bob's", "Unowned"]);
    assert_eq!(names("alice"), vec!["Unowned", "Alice's"]);
    assert_eq!(names(""), vec!["Unowned"]);
    assert_eq!(store.list_for_parent::<Project>(None, false).unwrap().len(), 3);
}

#[test]
fn claim_unowned_assigns_signed_out_records() {
    let store = store();
    let mut offline = Project::new("Offline", "");
    offline.meta = meta("", 1);
    let offline_id = store.insert(&offline).unwrap();
    let mut bobs = Project::new("Bob's", "");
    bobs.meta = meta("bob", 2);
    store.insert(&bobs).unwrap();

    assert_eq!(store.list_for_user::<Project>("alice").unwrap().len(), 1);
    assert_eq!(store.claim_unowned(EntityKind::Project, "alice").unwrap(), 1);

    let claimed = store.get_by_id::<Project>(offline_id).unwrap().unwrap();
    assert_eq!(claimed.meta.user_id, "alice");
    assert_eq!(store.claim_unowned(EntityKind::Project, "alice").unwrap(), 0);
}

#[test]
fn deleting_a_project_removes_the_whole_subtree() {
    let store = store();
    let project_id = store.insert(&Project::new("Sleep study", "")).unwrap();
    let hypothesis_id = store
        .insert(&Hypothesis::new(project_id, "H", ""))
        .unwrap();
    let experiment_id = store
        .insert(&Experiment::new(hypothesis_id, "E", "Q"))
        .unwrap();
    store.insert(&LogEntry::new(experiment_id, "ok")).unwrap();
    store.insert(&Note::new(hypothesis_id, "n")).unwrap();
    store
        .insert(&ReminderSetting::daily(ParentRef::experiment(experiment_id), 9, 0))
        .unwrap();
    store
        .insert(&ReminderSetting::daily(ParentRef::hypothesis(hypothesis_id), 9, 0))
        .unwrap();
    let other_project = store.insert(&Project::new("Other", "")).unwrap();
    store
        .insert(&ReminderSetting::daily(ParentRef::project(other_project), 9, 0))
        .unwrap();

    let removed = store.delete::<Project>(project_id).unwrap().unwrap();
    assert_eq!(removed.len(), 6);

    for kind in [
        EntityKind::Hypothesis,
        EntityKind::Experiment,
        EntityKind::LogEntry,
        EntityKind::Note,
    ] {
        assert_eq!(store.count(kind).unwrap(), 0, "{kind} rows left behind");
    }
    assert_eq!(store.count(EntityKind::ReminderSetting).unwrap(), 1);
    assert_eq!(store.count(EntityKind::Project).unwrap(), 1);
}

#[test]
fn reminders_cannot_hang_off_log_entries() {
    let store = store();
    let reminder = ReminderSetting::daily(ParentRef::new(EntityKind::LogEntry, 1), 9, 0);
    assert!(matches!(
        store.insert(&reminder).unwrap_err(),
        RepoError::Validation(_)
    ));
}
