//! Notifier dispatcher
//!
//! For every transition: look up subscribers, build one completion notice,
//! send it to each subscriber. Items are dispatched concurrently; recipients
//! of one item are sent to in turn. A failed send or lookup only affects the
//! counts of its own item.

pub mod transport;

pub use transport::{HttpMailTransport, LogTransport, NotificationTransport};

use crate::catalog::TitleId;
use crate::store::SubscriberLookup;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Subject and body of one completion notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub subject: String,
    pub body: String,
}

impl CompletionNotice {
    pub fn for_title(title: &str) -> Self {
        Self {
            subject: format!("Completed: '{}' has finished", title),
            body: format!(
                "'{}', a webtoon you subscribed to, has finished its run.\n\n\
                 It is now listed among completed titles and you will receive no \
                 further notices for it.",
                title
            ),
        }
    }

    /// Clearly marked notice for checking transport setup
    pub fn test_notice(title: &str) -> Self {
        let notice = Self::for_title(title);
        Self {
            subject: format!("[TEST] {}", notice.subject),
            body: format!(
                "This is a test message; '{}' has not necessarily finished.\n\n{}",
                title, notice.body
            ),
        }
    }
}

/// Per-item dispatch outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub title_id: TitleId,
    pub title: String,
    pub recipient_count: usize,
    pub delivered: usize,
    pub failed: usize,
}

async fn dispatch_one<L, T>(id: TitleId, title: String, lookup: &L, transport: &T) -> DispatchResult
where
    L: SubscriberLookup + ?Sized,
    T: NotificationTransport + ?Sized,
{
    let recipients = match lookup.subscribers_for(id).await {
        Ok(recipients) => recipients,
        Err(e) => {
            warn!(title_id = id, error = %e, "Subscriber lookup failed; no notices sent");
            Vec::new()
        }
    };

    let notice = CompletionNotice::for_title(&title);
    let mut delivered = 0;
    let mut failed = 0;

    for recipient in &recipients {
        match transport.send(recipient, &notice.subject, &notice.body).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                failed += 1;
                warn!(
                    title_id = id,
                    recipient = %recipient,
                    transport = transport.name(),
                    error = %e,
                    "Completion notice not delivered"
                );
            }
        }
    }

    debug!(title_id = id, recipients = recipients.len(), delivered, failed, "Item dispatched");

    DispatchResult {
        title_id: id,
        title,
        recipient_count: recipients.len(),
        delivered,
        failed,
    }
}

/// Send completion notices for every transition
///
/// Every transition yields one result, including those with no subscribers.
/// `titles` supplies display titles; a missing entry falls back to the ID.
pub async fn dispatch<L, T>(
    transitions: &[TitleId],
    titles: &HashMap<TitleId, String>,
    lookup: &L,
    transport: &T,
) -> Vec<DispatchResult>
where
    L: SubscriberLookup + ?Sized,
    T: NotificationTransport + ?Sized,
{
    if transitions.is_empty() {
        return Vec::new();
    }

    let jobs = transitions.iter().map(|&id| {
        let title = titles
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", id));
        dispatch_one(id, title, lookup, transport)
    });

    let results = join_all(jobs).await;

    info!(
        items = results.len(),
        delivered = results.iter().map(|r| r.delivered).sum::<usize>(),
        failed = results.iter().map(|r| r.failed).sum::<usize>(),
        "Notification dispatch complete"
    );

    results
}
