//! Run orchestrator
//!
//! Sequences one reconciliation run:
//!
//! 1. Read prior state (once)
//! 2. Fetch category listings (concurrent fan-out) and the candidate listing
//!    (sequential pages), the two running alongside each other. A listing
//!    that fails is reported and the run carries on with what arrived
//! 3. Classify
//! 4. Synchronize (plan, then one batch write)
//! 5. Dispatch completion notices
//!
//! and always ends by handing exactly one [`RunReport`] to the sink, whether
//! the run succeeded or not.

use crate::catalog::TitleId;
use crate::classifier::classify;
use crate::error::RunError;
use crate::fetcher::{CategoryOutcome, Fetcher};
use crate::notifier::{dispatch, DispatchResult, NotificationTransport};
use crate::report::{CategoryFailure, ReportSink, RunReport, RunStatus};
use crate::store::CatalogStore;
use crate::synchronizer::synchronize;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What a successful run produced
#[derive(Debug, Default)]
struct RunSummary {
    new_item_count: usize,
    updated_item_count: usize,
    transition_details: Vec<DispatchResult>,
}

/// Listings that came back short this run; reported, never fatal
#[derive(Debug, Default)]
struct FetchFailures {
    categories: Vec<CategoryFailure>,
    candidates: Option<String>,
}

pub struct RunOrchestrator {
    store: Arc<dyn CatalogStore>,
    fetcher: Fetcher,
    transport: Arc<dyn NotificationTransport>,
    sink: Arc<dyn ReportSink>,
}

impl RunOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fetcher: Fetcher,
        transport: Arc<dyn NotificationTransport>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            store,
            fetcher,
            transport,
            sink,
        }
    }

    /// Execute one run and deliver its report
    ///
    /// Never returns an error: failures are captured in the report.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(run_id = %run_id, "Reconciliation run starting");

        let mut fetch_failures = FetchFailures::default();
        let outcome = self.execute(&mut fetch_failures).await;

        let report = match outcome {
            Ok(summary) => RunReport {
                run_id,
                status: RunStatus::Success,
                started_at,
                duration: clock.elapsed(),
                new_item_count: summary.new_item_count,
                updated_item_count: summary.updated_item_count,
                notified_count: summary.transition_details.iter().map(|d| d.delivered).sum(),
                transition_details: summary.transition_details,
                category_failures: fetch_failures.categories,
                candidate_failure: fetch_failures.candidates,
                error: None,
            },
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Reconciliation run failed");
                RunReport {
                    run_id,
                    status: RunStatus::Failure,
                    started_at,
                    duration: clock.elapsed(),
                    new_item_count: 0,
                    updated_item_count: 0,
                    transition_details: Vec::new(),
                    notified_count: 0,
                    category_failures: fetch_failures.categories,
                    candidate_failure: fetch_failures.candidates,
                    error: Some(e.to_string()),
                }
            }
        };

        self.sink.deliver(&report).await;
        report
    }

    async fn execute(&self, failures: &mut FetchFailures) -> Result<RunSummary, RunError> {
        let prior = self.store.load_prior_state().await?;
        info!(prior_items = prior.len(), "Prior state loaded");

        let (category_results, candidates) = tokio::join!(
            self.fetcher.fetch_categories(),
            self.fetcher.fetch_candidates()
        );

        failures.categories.extend(category_results.iter().filter_map(|result| match &result.outcome {
            CategoryOutcome::Failed(e) => Some(CategoryFailure {
                category: result.key,
                error: e.to_string(),
            }),
            CategoryOutcome::Fetched(_) => None,
        }));
        if failures.categories.len() == category_results.len() {
            warn!("Every category listing failed; only the candidate listing informs this run");
        }

        if let Some(e) = &candidates.failure {
            warn!(
                error = %e,
                kept = candidates.records.len(),
                "Candidate listing incomplete; classifying with the pages fetched"
            );
            failures.candidates = Some(e.to_string());
        }

        let snapshot = classify(&category_results, &candidates.records);
        let outcome = synchronize(self.store.as_ref(), &snapshot, &prior).await?;

        let titles: HashMap<TitleId, String> = outcome
            .transition_ids
            .iter()
            .filter_map(|id| snapshot.get(*id).map(|c| (*id, c.record.title.clone())))
            .collect();

        let transition_details = dispatch(
            &outcome.transition_ids,
            &titles,
            self.store.as_ref(),
            self.transport.as_ref(),
        )
        .await;

        Ok(RunSummary {
            new_item_count: outcome.inserted_count,
            updated_item_count: outcome.updated.len(),
            transition_details,
        })
    }
}
