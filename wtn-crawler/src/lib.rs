//! wtn-crawler: webtoon publication-status reconciliation
//!
//! Pulls the catalog's weekday and finished listings, decides one status per
//! work item, diffs that against the stored catalog, and notifies subscribers
//! of every item that has just finished.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod notifier;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod subscriptions;
pub mod synchronizer;

pub use catalog::{DayTag, RawRecord, TitleId, WorkStatus};
pub use classifier::{classify, CategoryKey, Snapshot};
pub use orchestrator::RunOrchestrator;
pub use report::{RunReport, RunStatus};
