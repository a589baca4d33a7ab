use labtrail_core::{EntityKind, MappingStore, SharedDb};

fn mappings() -> MappingStore {
    MappingStore::new(SharedDb::in_memory().unwrap())
}

#[test]
fn store_then_lookup_both_directions() {
    let store = mappings();
    store.store(EntityKind::Project, 1, "r1", "alice").unwrap();

    assert_eq!(
        store
            .remote_id_for(EntityKind::Project, 1, "alice")
            .unwrap()
            .as_deref(),
        Some("r1")
    );
    assert_eq!(
        store.local_id_for(EntityKind::Project, "r1", "alice").unwrap(),
        Some(1)
    );
    assert_eq!(
        store.remote_id_for(EntityKind::Hypothesis, 1, "alice").unwrap(),
        None
    );
    assert_eq!(store.remote_id_for(EntityKind::Project, 1, "bob").unwrap(), None);
}

#[test]
fn storing_again_replaces_both_sides() {
    let store = mappings();
    store.store(EntityKind::Project, 1, "r1", "alice").unwrap();
    store.store(EntityKind::Project, 2, "r2", "alice").unwrap();

    // Local 1 now points at r2; the old r1 and the old 2 -> r2 rows must go.
    store.store(EntityKind::Project, 1, "r2", "alice").unwrap();

    assert_eq!(
        store.local_id_for(EntityKind::Project, "r1", "alice").unwrap(),
        None
    );
    assert_eq!(
        store.remote_id_for(EntityKind::Project, 2, "alice").unwrap(),
        None
    );
    assert_eq!(
        store.local_id_for(EntityKind::Project, "r2", "alice").unwrap(),
        Some(1)
    );
    assert_eq!(store.all_for_type(EntityKind::Project, "alice").unwrap().len(), 1);
}

#[test]
fn restoring_same_pair_keeps_created_at() {
    let store = mappings();
    store.store(EntityKind::Note, 5, "n5", "alice").unwrap();
    let first = store.all_for_type(EntityKind::Note, "alice").unwrap()[0].clone();

    std::thread::sleep(std::time::Duration::from_millis(5));
    store.store(EntityKind::Note, 5, "n5", "alice").unwrap();
    let second = store.all_for_type(EntityKind::Note, "alice").unwrap()[0].clone();

    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[test]
fn deletes_report_whether_a_row_existed() {
    let store = mappings();
    store.store(EntityKind::Experiment, 3, "e3", "alice").unwrap();
    store.store(EntityKind::Experiment, 4, "e4", "alice").unwrap();

    assert!(store
        .delete_by_local_id(EntityKind::Experiment, 3, "alice")
        .unwrap());
    assert!(!store
        .delete_by_local_id(EntityKind::Experiment, 3, "alice")
        .unwrap());
    assert!(store
        .delete_by_remote_id(EntityKind::Experiment, "e4", "alice")
        .unwrap());
    assert!(store
        .all_for_type(EntityKind::Experiment, "alice")
        .unwrap()
        .is_empty());
}

#[test]
fn mapping_stays_bijective_under_mixed_operations() {
    let store = mappings();
    let kinds = [EntityKind::Project, EntityKind::Hypothesis];
    let users = ["alice", "bob"];
    let mut seed: u64 = 0x5eed;
    let mut next = move |bound: u64| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) % bound
    };

    for _ in 0..400 {
        let kind = kinds[next(2) as usize];
        let user = users[next(2) as usize];
        let local_id = next(8) as i64 + 1;
        let remote_id = format!("r{}", next(8));
        match next(4) {
            0 => {
                store
                    .delete_by_local_id(kind, local_id, user)
                    .unwrap();
            }
            1 => {
                store
                    .delete_by_remote_id(kind, &remote_id, user)
                    .unwrap();
            }
            _ => store.store(kind, local_id, &remote_id, user).unwrap(),
        }

        for kind in kinds {
            for user in users {
                for mapping in store.all_for_type(kind, user).unwrap() {
                    assert_eq!(
                        store.local_id_for(kind, &mapping.remote_id, user).unwrap(),
                        Some(mapping.local_id)
                    );
                    assert_eq!(
                        store
                            .remote_id_for(kind, mapping.local_id, user)
                            .unwrap()
                            .as_deref(),
                        Some(mapping.remote_id.as_str())
                    );
                }
            }
        }
    }
}

#[test]
fn count_for_user_covers_every_kind() {
    let store = mappings();
    store.store(EntityKind::Project, 1, "p1", "alice").unwrap();
    store.store(EntityKind::Project, 2, "p2", "alice").unwrap();
    store
        .store(EntityKind::ReminderSetting, 1, "m1", "alice")
        .unwrap();

    let counts = store.count_for_user("alice").unwrap();
    assert_eq!(counts.len(), EntityKind::ALL.len());
    assert_eq!(counts[&EntityKind::Project], 2);
    assert_eq!(counts[&EntityKind::ReminderSetting], 1);
    assert_eq!(counts[&EntityKind::Note], 0);
}
