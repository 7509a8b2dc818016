//! Classifier: one authoritative status per observed work item
//!
//! # Priority rule
//!
//! 1. **Category listings are authoritative.** An item listed under any
//!    weekday category is `hiatus` if its resting flag is set, otherwise
//!    `ongoing`. The candidate listing never overrides it.
//! 2. **Candidate-only items** are `hiatus` if resting, otherwise `finished`.
//!
//! Category data carries no "finished" signal of its own; finished is only
//! ever inferred from the candidate listing. A category whose fetch failed
//! contributes nothing, so its items fall through to rule 2.
//!
//! # Output invariant
//!
//! Every ID lands in at most one of `ongoing`, `hiatus`, `finished`. IDs in
//! none of them were not observed this run.

use crate::catalog::{DayTag, RawRecord, TitleId, WorkStatus};
use crate::fetcher::{CategoryOutcome, CategoryResult};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Upstream category keys
///
/// Both `daily` variants normalize to [`DayTag::Daily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKey {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
    Daily,
    DailyPlus,
}

/// key ↔ normalized tag ↔ display label, in fetch order
static CATEGORY_TABLE: [(CategoryKey, &str, DayTag, &str); 9] = [
    (CategoryKey::Mon, "mon", DayTag::Mon, "월"),
    (CategoryKey::Tue, "tue", DayTag::Tue, "화"),
    (CategoryKey::Wed, "wed", DayTag::Wed, "수"),
    (CategoryKey::Thu, "thu", DayTag::Thu, "목"),
    (CategoryKey::Fri, "fri", DayTag::Fri, "금"),
    (CategoryKey::Sat, "sat", DayTag::Sat, "토"),
    (CategoryKey::Sun, "sun", DayTag::Sun, "일"),
    (CategoryKey::Daily, "daily", DayTag::Daily, "매일+"),
    (CategoryKey::DailyPlus, "dailyPlus", DayTag::Daily, "매일+"),
];

impl CategoryKey {
    pub const ALL: [CategoryKey; 9] = [
        CategoryKey::Mon,
        CategoryKey::Tue,
        CategoryKey::Wed,
        CategoryKey::Thu,
        CategoryKey::Fri,
        CategoryKey::Sat,
        CategoryKey::Sun,
        CategoryKey::Daily,
        CategoryKey::DailyPlus,
    ];

    fn entry(&self) -> &'static (CategoryKey, &'static str, DayTag, &'static str) {
        &CATEGORY_TABLE[*self as usize]
    }

    /// Value of the `week=` query parameter
    pub fn api_key(&self) -> &'static str {
        self.entry().1
    }

    pub fn day_tag(&self) -> DayTag {
        self.entry().2
    }

    /// Label shown to readers of the catalog
    pub fn display_label(&self) -> &'static str {
        self.entry().3
    }
}

/// A record placed in one of the snapshot sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: RawRecord,
    /// Set only for items seen in a category listing
    pub day_tag: Option<DayTag>,
}

/// Run-scoped catalog snapshot: three disjoint sets
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub ongoing: BTreeMap<TitleId, ClassifiedRecord>,
    pub hiatus: BTreeMap<TitleId, ClassifiedRecord>,
    pub finished: BTreeMap<TitleId, ClassifiedRecord>,
}

impl Snapshot {
    /// Status by set membership, `None` if not observed this run
    pub fn status_of(&self, id: TitleId) -> Option<WorkStatus> {
        if self.ongoing.contains_key(&id) {
            Some(WorkStatus::Ongoing)
        } else if self.hiatus.contains_key(&id) {
            Some(WorkStatus::Hiatus)
        } else if self.finished.contains_key(&id) {
            Some(WorkStatus::Finished)
        } else {
            None
        }
    }

    /// The union (all-today), tagged with each item's status
    pub fn iter(&self) -> impl Iterator<Item = (WorkStatus, &ClassifiedRecord)> {
        self.ongoing
            .values()
            .map(|r| (WorkStatus::Ongoing, r))
            .chain(self.hiatus.values().map(|r| (WorkStatus::Hiatus, r)))
            .chain(self.finished.values().map(|r| (WorkStatus::Finished, r)))
    }

    pub fn get(&self, id: TitleId) -> Option<&ClassifiedRecord> {
        self.ongoing
            .get(&id)
            .or_else(|| self.hiatus.get(&id))
            .or_else(|| self.finished.get(&id))
    }

    pub fn len(&self) -> usize {
        self.ongoing.len() + self.hiatus.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merge both sources under the priority rule
///
/// `category_results` are consumed in order; when an item is listed under
/// several categories the first one supplies its day tag, and it counts as
/// resting if any listing marks it resting.
pub fn classify(
    category_results: &[CategoryResult],
    candidates: &BTreeMap<TitleId, RawRecord>,
) -> Snapshot {
    let mut from_categories: BTreeMap<TitleId, ClassifiedRecord> = BTreeMap::new();

    for result in category_results {
        let CategoryOutcome::Fetched(records) = &result.outcome else {
            continue;
        };
        let tag = result.key.day_tag();

        for record in records {
            from_categories
                .entry(record.id)
                .and_modify(|existing| existing.record.resting |= record.resting)
                .or_insert_with(|| ClassifiedRecord {
                    record: record.clone(),
                    day_tag: Some(tag),
                });
        }
    }

    let mut snapshot = Snapshot::default();

    for (id, classified) in from_categories {
        if classified.record.resting {
            snapshot.hiatus.insert(id, classified);
        } else {
            snapshot.ongoing.insert(id, classified);
        }
    }

    let mut overridden = 0usize;
    for (id, record) in candidates {
        if snapshot.ongoing.contains_key(id) || snapshot.hiatus.contains_key(id) {
            overridden += 1;
            continue;
        }
        let classified = ClassifiedRecord {
            record: record.clone(),
            day_tag: None,
        };
        if record.resting {
            snapshot.hiatus.insert(*id, classified);
        } else {
            snapshot.finished.insert(*id, classified);
        }
    }

    if overridden > 0 {
        debug!(overridden, "Candidate records superseded by category listings");
    }

    info!(
        ongoing = snapshot.ongoing.len(),
        hiatus = snapshot.hiatus.len(),
        finished = snapshot.finished.len(),
        "Classification complete"
    );

    snapshot
}
