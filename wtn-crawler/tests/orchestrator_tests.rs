//! Full-run tests through `RunOrchestrator`
//!
//! Every run, successful or not, must hand exactly one report to the sink.

mod helpers;

use helpers::*;
use std::sync::Arc;
use wtn_crawler::classifier::CategoryKey;
use wtn_crawler::report::RunStatus;
use wtn_crawler::store::{CatalogStore, SqliteCatalogStore};
use wtn_crawler::RunOrchestrator;

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<SqliteCatalogStore>,
    transport: Arc<RecordingTransport>,
    sink: Arc<CollectingReportSink>,
}

impl Harness {
    async fn new(transport: RecordingTransport) -> Self {
        let (dir, store) = create_test_store().await.unwrap();
        Self {
            _dir: dir,
            store: Arc::new(store),
            transport: Arc::new(transport),
            sink: Arc::new(CollectingReportSink::default()),
        }
    }

    fn orchestrator(&self, source: Arc<FakeCatalogSource>) -> RunOrchestrator {
        RunOrchestrator::new(
            self.store.clone(),
            test_fetcher(source, 10),
            self.transport.clone(),
            self.sink.clone(),
        )
    }
}

#[tokio::test]
async fn test_completed_item_notifies_every_subscriber() {
    let harness = Harness::new(RecordingTransport::new()).await;
    seed_work(&harness.store, 2001, "Friday Feature", "fri", "ongoing").await.unwrap();
    seed_work(&harness.store, 2002, "Still Running", "fri", "ongoing").await.unwrap();
    harness.store.add_subscription("a@example.com", 2001).await.unwrap();
    harness.store.add_subscription("b@example.com", 2001).await.unwrap();
    harness.store.add_subscription("c@example.com", 2002).await.unwrap();

    let source = Arc::new(
        FakeCatalogSource::new()
            .with_category(CategoryKey::Fri, vec![element(2002, "Still Running", false)])
            .with_candidate_page(1, vec![element(2001, "Friday Feature", false), element(3000, "Old Classic", false)]),
    );

    let report = harness.orchestrator(source).run().await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.error, None);
    assert_eq!(report.new_item_count, 1);
    assert_eq!(report.updated_item_count, 1);
    assert_eq!(report.transition_details.len(), 1);
    assert_eq!(report.transition_details[0].title_id, 2001);
    assert_eq!(report.transition_details[0].title, "Friday Feature");
    assert_eq!(report.transition_details[0].recipient_count, 2);
    assert_eq!(report.notified_count, 2);

    let mut recipients: Vec<String> = harness.transport.sent().into_iter().map(|m| m.recipient).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);
    assert!(harness
        .transport
        .sent()
        .iter()
        .all(|m| m.subject == "Completed: 'Friday Feature' has finished"));

    assert_eq!(harness.sink.reports().len(), 1);
    assert_eq!(harness.sink.reports()[0].run_id, report.run_id);
}

#[tokio::test]
async fn test_second_run_does_not_notify_again() {
    let harness = Harness::new(RecordingTransport::new()).await;
    seed_work(&harness.store, 70, "Ending Soon", "mon", "ongoing").await.unwrap();
    harness.store.add_subscription("a@example.com", 70).await.unwrap();

    let source = Arc::new(FakeCatalogSource::new().with_candidate_page(1, vec![element(70, "Ending Soon", false)]));
    let orchestrator = harness.orchestrator(source);

    let first = orchestrator.run().await;
    let second = orchestrator.run().await;

    assert_eq!(first.notified_count, 1);
    assert!(second.is_success());
    assert!(second.transition_details.is_empty());
    assert_eq!(harness.transport.sent().len(), 1);
    assert_eq!(harness.sink.reports().len(), 2);
}

#[tokio::test]
async fn test_completion_without_subscribers_is_reported() {
    let harness = Harness::new(RecordingTransport::new()).await;
    seed_work(&harness.store, 80, "Nobody Watching", "tue", "hiatus").await.unwrap();

    let source = Arc::new(FakeCatalogSource::new().with_candidate_page(1, vec![element(80, "Nobody Watching", false)]));

    let report = harness.orchestrator(source).run().await;

    assert_eq!(report.transition_details.len(), 1);
    assert_eq!(report.transition_details[0].recipient_count, 0);
    assert_eq!(report.notified_count, 0);
}

#[tokio::test]
async fn test_bounced_recipient_counted_not_fatal() {
    let harness = Harness::new(RecordingTransport::bouncing(&["gone@example.com"])).await;
    seed_work(&harness.store, 90, "Finale", "wed", "ongoing").await.unwrap();
    harness.store.add_subscription("gone@example.com", 90).await.unwrap();
    harness.store.add_subscription("here@example.com", 90).await.unwrap();

    let source = Arc::new(FakeCatalogSource::new().with_candidate_page(1, vec![element(90, "Finale", false)]));

    let report = harness.orchestrator(source).run().await;

    assert!(report.is_success());
    let detail = &report.transition_details[0];
    assert_eq!((detail.recipient_count, detail.delivered, detail.failed), (2, 1, 1));
    assert_eq!(report.notified_count, 1);
}

#[tokio::test]
async fn test_category_failures_listed_in_successful_report() {
    let harness = Harness::new(RecordingTransport::new()).await;

    let source = Arc::new(
        FakeCatalogSource::new()
            .failing_category(CategoryKey::Mon)
            .failing_category(CategoryKey::DailyPlus)
            .with_category(CategoryKey::Tue, vec![element(100, "Tuesday", false)]),
    );

    let report = harness.orchestrator(source).run().await;

    assert!(report.is_success());
    let failed: Vec<CategoryKey> = report.category_failures.iter().map(|f| f.category).collect();
    assert_eq!(failed, vec![CategoryKey::Mon, CategoryKey::DailyPlus]);
    assert_eq!(report.new_item_count, 1);
}

#[tokio::test]
async fn test_candidate_fetch_failure_is_reported_and_run_continues() {
    let harness = Harness::new(RecordingTransport::new()).await;
    seed_work(&harness.store, 110, "Pending", "sun", "ongoing").await.unwrap();
    harness.store.add_subscription("a@example.com", 110).await.unwrap();

    let source = Arc::new(
        FakeCatalogSource::new()
            .with_category(CategoryKey::Sun, vec![element(111, "New Sunday", false)])
            .failing_candidate_page(1),
    );

    let report = harness.orchestrator(source).run().await;

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.error.is_none());
    assert!(report.candidate_failure.as_deref().unwrap().contains("503"));
    assert!(report.category_failures.is_empty());
    assert_eq!(report.new_item_count, 1);
    assert!(report.transition_details.is_empty());
    assert!(harness.transport.sent().is_empty());
    assert_eq!(stored_status(&harness.store, 111).await.unwrap().as_deref(), Some("ongoing"));
    assert_eq!(stored_status(&harness.store, 110).await.unwrap().as_deref(), Some("ongoing"));

    let delivered = harness.sink.reports();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].candidate_failure.is_some());
}

#[tokio::test]
async fn test_unreadable_store_fails_run_with_report() {
    let harness = Harness::new(RecordingTransport::new()).await;
    seed_work(&harness.store, 120, "Broken Row", "mon", "paused").await.unwrap();

    let source = Arc::new(FakeCatalogSource::new());

    let report = harness.orchestrator(source.clone()).run().await;

    assert_eq!(report.status, RunStatus::Failure);
    assert!(report.error.as_deref().unwrap().contains("Persistence"));
    assert_eq!(source.total_calls(), 0, "nothing fetched after prior state failed");
    assert_eq!(harness.sink.reports().len(), 1);
}
