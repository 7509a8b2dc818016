//! Catalog API access
//!
//! [`CatalogSource`] is the seam between the reconciliation engine and the
//! network: one call, one URL, one listing. Retries live in the fetcher, not here.

use crate::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fetches one listing (the raw JSON elements) from a catalog URL
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<Value>, FetchError>;
}

/// reqwest-backed catalog source
pub struct HttpCatalogSource {
    http_client: reqwest::Client,
}

impl HttpCatalogSource {
    /// Build a client with a per-request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        tracing::debug!(url = %url, "Querying catalog API");

        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        extract_listing(body)
    }
}

/// Pull the element list out of a listing response
///
/// The weekday endpoint wraps elements in `titleList`, some others in `list`.
pub fn extract_listing(body: Value) -> Result<Vec<Value>, FetchError> {
    let Value::Object(mut object) = body else {
        return Err(FetchError::Parse("listing body is not a JSON object".to_string()));
    };

    let list = object
        .remove("titleList")
        .or_else(|| object.remove("list"))
        .ok_or_else(|| FetchError::Parse("listing body has neither titleList nor list".to_string()))?;

    match list {
        Value::Array(elements) => Ok(elements),
        Value::Null => Ok(Vec::new()),
        other => Err(FetchError::Parse(format!(
            "listing field is not an array: {}",
            other
        ))),
    }
}
