//! Synchronizer: diff today's snapshot against persisted state
//!
//! [`plan`] is pure and computes everything: staged inserts, staged updates
//! and the transition set. [`synchronize`] persists that plan as one batch.
//! Nothing is written until the plan is complete.

use crate::catalog::{DayTag, TitleId, WorkStatus};
use crate::classifier::{ClassifiedRecord, Snapshot};
use crate::store::{CatalogStore, PriorState, StoredWork};
use tracing::{debug, info, warn};

/// Staged changes for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub inserts: Vec<StoredWork>,
    pub updates: Vec<StoredWork>,
    /// IDs that moved from ongoing/hiatus to finished, ascending
    pub transitions: Vec<TitleId>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Result of a committed synchronization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub inserted_count: usize,
    pub updated: Vec<StoredWork>,
    pub transition_ids: Vec<TitleId>,
}

fn to_stored(
    status: WorkStatus,
    classified: &ClassifiedRecord,
    prior: Option<&StoredWork>,
) -> StoredWork {
    // Candidate-only items carry no day tag; keep whatever we last knew
    let day_tag = classified
        .day_tag
        .or_else(|| prior.map(|p| p.day_tag))
        .unwrap_or(DayTag::Unassigned);

    StoredWork {
        id: classified.record.id,
        title: classified.record.title.clone(),
        author: classified.record.author.clone(),
        day_tag,
        status,
    }
}

/// Compute inserts, updates and transitions without touching the store
///
/// IDs present in `prior` but absent from the snapshot are left alone.
pub fn plan(snapshot: &Snapshot, prior: &PriorState) -> SyncPlan {
    let mut staged = SyncPlan::default();

    for (status, classified) in snapshot.iter() {
        let id = classified.record.id;
        let previous = prior.get(&id);
        let today = to_stored(status, classified, previous);

        let Some(previous) = previous else {
            staged.inserts.push(today);
            continue;
        };

        if previous.status.is_finished() && !status.is_finished() {
            warn!(
                title_id = id,
                title = %today.title,
                now = %status,
                "Finished work item reappeared as not finished"
            );
        }

        if !previous.status.is_finished() && status.is_finished() {
            staged.transitions.push(id);
        }

        if *previous != today {
            staged.updates.push(today);
        }
    }

    staged.transitions.sort_unstable();

    debug!(
        inserts = staged.inserts.len(),
        updates = staged.updates.len(),
        transitions = staged.transitions.len(),
        untouched = prior.keys().filter(|id| snapshot.status_of(**id).is_none()).count(),
        "Synchronization planned"
    );

    staged
}

/// Plan, then persist the plan as a single batch
///
/// A store failure commits nothing and is returned to the caller.
pub async fn synchronize(
    store: &dyn CatalogStore,
    snapshot: &Snapshot,
    prior: &PriorState,
) -> wtn_common::Result<SyncOutcome> {
    let staged = plan(snapshot, prior);

    store.apply_batch(&staged.inserts, &staged.updates).await?;

    info!(
        inserted = staged.inserts.len(),
        updated = staged.updates.len(),
        transitions = staged.transitions.len(),
        "Synchronization committed"
    );

    Ok(SyncOutcome {
        inserted_count: staged.inserts.len(),
        updated: staged.updates,
        transition_ids: staged.transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawRecord;

    fn classified(id: TitleId, day_tag: Option<DayTag>) -> ClassifiedRecord {
        ClassifiedRecord {
            record: RawRecord::new(id, format!("Title {}", id), None, false),
            day_tag,
        }
    }

    fn stored(id: TitleId, day_tag: DayTag, status: WorkStatus) -> StoredWork {
        StoredWork {
            id,
            title: format!("Title {}", id),
            author: None,
            day_tag,
            status,
        }
    }

    fn prior(rows: Vec<StoredWork>) -> PriorState {
        rows.into_iter().map(|w| (w.id, w)).collect()
    }

    #[test]
    fn test_new_items_are_inserted() {
        let mut snapshot = Snapshot::default();
        snapshot.ongoing.insert(1, classified(1, Some(DayTag::Mon)));
        snapshot.finished.insert(2, classified(2, None));

        let staged = plan(&snapshot, &PriorState::new());

        assert_eq!(
            staged.inserts,
            vec![
                stored(1, DayTag::Mon, WorkStatus::Ongoing),
                stored(2, DayTag::Unassigned, WorkStatus::Finished),
            ]
        );
        assert!(staged.updates.is_empty());
        assert!(staged.transitions.is_empty());
    }

    #[test]
    fn test_unchanged_item_stages_nothing() {
        let mut snapshot = Snapshot::default();
        snapshot.ongoing.insert(1, classified(1, Some(DayTag::Mon)));

        let staged = plan(&snapshot, &prior(vec![stored(1, DayTag::Mon, WorkStatus::Ongoing)]));

        assert!(staged.is_empty());
        assert!(staged.transitions.is_empty());
    }

    #[test]
    fn test_attribute_change_is_update() {
        let mut snapshot = Snapshot::default();
        snapshot.ongoing.insert(1, classified(1, Some(DayTag::Thu)));

        let staged = plan(&snapshot, &prior(vec![stored(1, DayTag::Mon, WorkStatus::Ongoing)]));

        assert_eq!(staged.updates, vec![stored(1, DayTag::Thu, WorkStatus::Ongoing)]);
        assert!(staged.transitions.is_empty());
    }

    #[test]
    fn test_transition_from_ongoing_and_hiatus() {
        let mut snapshot = Snapshot::default();
        snapshot.finished.insert(1, classified(1, None));
        snapshot.finished.insert(2, classified(2, None));
        snapshot.finished.insert(3, classified(3, None));

        let staged = plan(
            &snapshot,
            &prior(vec![
                stored(1, DayTag::Sun, WorkStatus::Ongoing),
                stored(2, DayTag::Wed, WorkStatus::Hiatus),
                stored(3, DayTag::Fri, WorkStatus::Finished),
            ]),
        );

        assert_eq!(staged.transitions, vec![1, 2]);
        // Day tag survives the move to finished
        assert_eq!(
            staged.updates,
            vec![
                stored(1, DayTag::Sun, WorkStatus::Finished),
                stored(2, DayTag::Wed, WorkStatus::Finished),
            ]
        );
    }

    #[test]
    fn test_finished_reappearing_is_plain_update() {
        let mut snapshot = Snapshot::default();
        snapshot.hiatus.insert(4, classified(4, Some(DayTag::Tue)));

        let staged = plan(&snapshot, &prior(vec![stored(4, DayTag::Tue, WorkStatus::Finished)]));

        assert_eq!(staged.updates, vec![stored(4, DayTag::Tue, WorkStatus::Hiatus)]);
        assert!(staged.transitions.is_empty());
    }

    #[test]
    fn test_absent_ids_untouched() {
        let staged = plan(
            &Snapshot::default(),
            &prior(vec![stored(9, DayTag::Mon, WorkStatus::Ongoing)]),
        );

        assert!(staged.is_empty());
        assert!(staged.transitions.is_empty());
    }
}
