//! Run reports
//!
//! The orchestrator builds exactly one [`RunReport`] per run and hands it to a
//! [`ReportSink`]. Sinks never fail the run: delivery problems are logged.

use crate::classifier::CategoryKey;
use crate::notifier::{DispatchResult, NotificationTransport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }
}

/// One completed item and how many subscribers heard about it
pub type TransitionDetail = DispatchResult;

/// A category listing that produced no data this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFailure {
    pub category: CategoryKey,
    pub error: String,
}

/// Summary of one reconciliation run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub new_item_count: usize,
    pub updated_item_count: usize,
    /// Empty for failed runs
    pub transition_details: Vec<TransitionDetail>,
    /// Sum of successful deliveries across all transitions
    pub notified_count: usize,
    pub category_failures: Vec<CategoryFailure>,
    /// Candidate listing stopped early; classification used the pages before it
    pub candidate_failure: Option<String>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Receives the report at the end of every run
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &RunReport);
}

/// Logs the report as structured fields
#[derive(Debug, Default, Clone)]
pub struct TracingReportSink;

#[async_trait]
impl ReportSink for TracingReportSink {
    async fn deliver(&self, report: &RunReport) {
        let completed: Vec<String> = report
            .transition_details
            .iter()
            .map(|d| format!("{}({})", d.title_id, d.recipient_count))
            .collect();

        match report.status {
            RunStatus::Success => tracing::info!(
                run_id = %report.run_id,
                duration_ms = report.duration.as_millis() as u64,
                new_items = report.new_item_count,
                updated_items = report.updated_item_count,
                completed = ?completed,
                notified = report.notified_count,
                category_failures = report.category_failures.len(),
                candidate_failure = report.candidate_failure.as_deref(),
                "Run succeeded"
            ),
            RunStatus::Failure => tracing::error!(
                run_id = %report.run_id,
                duration_ms = report.duration.as_millis() as u64,
                error = report.error.as_deref().unwrap_or("unknown"),
                "Run failed"
            ),
        }
    }
}

/// Mails a formatted report to the administrator
pub struct AdminMailReportSink {
    transport: Arc<dyn NotificationTransport>,
    admin_email: Option<String>,
}

impl AdminMailReportSink {
    pub fn new(transport: Arc<dyn NotificationTransport>, admin_email: Option<String>) -> Self {
        Self {
            transport,
            admin_email,
        }
    }

    /// Subject and body for a report
    pub fn render(report: &RunReport) -> (String, String) {
        let date = report.started_at.format("%Y-%m-%d");
        let subject = format!(
            "[wtn] {} run report {}",
            date,
            report.status.as_str().to_uppercase()
        );

        let mut lines = vec![
            format!("Run {}", report.run_id),
            format!("Started: {}", report.started_at.to_rfc3339()),
            format!("Duration: {:.1}s", report.duration.as_secs_f64()),
        ];

        match report.status {
            RunStatus::Success => {
                lines.push(format!("New items: {}", report.new_item_count));
                lines.push(format!("Updated items: {}", report.updated_item_count));
                lines.push(String::new());
                lines.push("Completed items:".to_string());
                if report.transition_details.is_empty() {
                    lines.push("  none".to_string());
                }
                lines.extend(report.transition_details.iter().map(|detail| {
                    format!(
                        "  {} (#{}): {} recipient(s), {} delivered, {} failed",
                        detail.title, detail.title_id, detail.recipient_count, detail.delivered, detail.failed
                    )
                }));
                lines.push(format!("Notices delivered: {}", report.notified_count));
            }
            RunStatus::Failure => {
                lines.push(format!("Error: {}", report.error.as_deref().unwrap_or("unknown")));
            }
        }

        if !report.category_failures.is_empty() {
            lines.push(String::new());
            lines.push("Categories without data:".to_string());
            lines.extend(report.category_failures.iter().map(|failure| {
                format!(
                    "  {} ({}): {}",
                    failure.category.api_key(),
                    failure.category.display_label(),
                    failure.error
                )
            }));
        }

        if let Some(error) = &report.candidate_failure {
            lines.push(String::new());
            lines.push(format!("Candidate listing incomplete: {}", error));
        }

        lines.push(String::new());
        let body = lines.join("\n");

        (subject, body)
    }
}

#[async_trait]
impl ReportSink for AdminMailReportSink {
    async fn deliver(&self, report: &RunReport) {
        let Some(admin) = self.admin_email.as_deref() else {
            tracing::warn!(run_id = %report.run_id, "No admin address configured; report not mailed");
            return;
        };

        let (subject, body) = Self::render(report);
        match self.transport.send(admin, &subject, &body).await {
            Ok(()) => tracing::info!(run_id = %report.run_id, admin, "Run report sent"),
            Err(e) => tracing::error!(run_id = %report.run_id, error = %e, "Failed to send run report"),
        }
    }
}
