//! Display-time merge of local and remote result sets.
//!
//! # Invariants
//! - Pure: never reads or writes either store.
//! - Local records always survive; remote records only fill gaps.
//! - Output is ordered by `created_at` descending, local first on ties.

use crate::model::Entity;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

/// How a remote record is recognised as already present locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Same display name (or main text). Distinct records sharing a name
    /// collapse into the local one.
    #[default]
    ByName,
    /// Remote id linked to a local record.
    ByIdentifier,
}

/// Combines a local and a remote snapshot into one display set.
///
/// `linked_remote_ids` holds the remote ids present in the mapping store;
/// it is only consulted by [`DedupStrategy::ByIdentifier`].
pub fn merge<E: Entity>(
    local: Vec<E>,
    remote: Vec<E>,
    strategy: DedupStrategy,
    linked_remote_ids: &HashSet<String>,
) -> Vec<E> {
    let kept_remote: Vec<E> = match strategy {
        DedupStrategy::ByName => {
            let local_keys: HashSet<String> = local
                .iter()
                .map(|record| record.dedup_key().into_owned())
                .collect();
            remote
                .into_iter()
                .filter(|record| !local_keys.contains(record.dedup_key().as_ref()))
                .collect()
        }
        DedupStrategy::ByIdentifier => {
            let local_remote_ids: HashSet<&str> = local
                .iter()
                .filter_map(|record| record.meta().remote_id.as_deref())
                .collect();
            remote
                .into_iter()
                .filter(|record| match record.meta().remote_id.as_deref() {
                    Some(id) => !linked_remote_ids.contains(id) && !local_remote_ids.contains(id),
                    None => true,
                })
                .collect()
        }
    };

    let mut merged = local;
    merged.extend(kept_remote);
    merged.sort_by_key(|record| Reverse(record.meta().created_at));
    merged
}
