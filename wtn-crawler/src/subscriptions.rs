//! Subscription intake
//!
//! One operation: record that an address wants to hear when a work item
//! finishes. Re-subscribing is a no-op.

use crate::catalog::TitleId;
use crate::store::CatalogStore;
use once_cell::sync::Lazy;
use regex::Regex;
use wtn_common::{Error, Result};

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email))
}

/// Subscribe `email` to completion notices for `title_id`
///
/// Returns `true` when a new subscription was recorded, `false` when it
/// already existed.
pub async fn subscribe(store: &dyn CatalogStore, email: &str, title_id: TitleId) -> Result<bool> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::InvalidInput("email is required".to_string()));
    }
    if !is_valid_email(email) {
        return Err(Error::InvalidInput(format!("not a valid email address: {}", email)));
    }

    let created = store.add_subscription(email, title_id).await?;
    if created {
        tracing::info!(email, title_id, "Subscription added");
    } else {
        tracing::debug!(email, title_id, "Already subscribed");
    }
    Ok(created)
}
