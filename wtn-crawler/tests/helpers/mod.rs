//! Shared fakes for wtn-crawler integration tests
//!
//! - `FakeCatalogSource`: canned listings keyed by URL, with failure injection
//! - `RecordingTransport`: captures every notice, optionally bouncing addresses
//! - `CollectingReportSink`: keeps every delivered report
//! - `create_test_store`: on-disk SQLite in a temp dir, schema applied
//! - `HttpStub`: loopback HTTP server answering every request with one canned response

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wtn_common::db::init_database;
use wtn_crawler::catalog::TitleId;
use wtn_crawler::classifier::CategoryKey;
use wtn_crawler::error::{FetchError, TransportError};
use wtn_crawler::fetcher::{CatalogSource, Endpoints, Fetcher, RetryPolicy};
use wtn_crawler::notifier::NotificationTransport;
use wtn_crawler::report::{ReportSink, RunReport};
use wtn_crawler::store::SqliteCatalogStore;

pub const CATEGORY_URL: &str = "https://catalog.test/weekday";
pub const FINISHED_URL: &str = "https://catalog.test/finished";

pub fn test_endpoints(max_pages: u32) -> Endpoints {
    Endpoints {
        category_url: CATEGORY_URL.to_string(),
        finished_url: FINISHED_URL.to_string(),
        page_size: 2,
        max_pages,
    }
}

/// One listing element as the catalog API sends it
pub fn element(id: TitleId, title: &str, resting: bool) -> Value {
    json!({"titleId": id, "titleName": title, "author": "author", "rest": resting})
}

/// Catalog API stand-in
///
/// Unknown URLs answer with an empty listing, so an unconfigured category or
/// a page past the last configured one reads as "no data".
#[derive(Default)]
pub struct FakeCatalogSource {
    listings: Mutex<HashMap<String, Vec<Value>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, u32>>,
    total_calls: AtomicU32,
}

impl FakeCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(self, key: CategoryKey, elements: Vec<Value>) -> Self {
        let url = test_endpoints(1).category(key);
        self.listings.lock().unwrap().insert(url, elements);
        self
    }

    /// Pages are numbered from 1
    pub fn with_candidate_page(self, page: u32, elements: Vec<Value>) -> Self {
        let url = test_endpoints(1).candidate_page(page);
        self.listings.lock().unwrap().insert(url, elements);
        self
    }

    /// Every request to this category fails with a transient error
    pub fn failing_category(self, key: CategoryKey) -> Self {
        self.failing.lock().unwrap().insert(test_endpoints(1).category(key));
        self
    }

    pub fn failing_candidate_page(self, page: u32) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert(test_endpoints(1).candidate_page(page));
        self
    }

    pub fn calls_to(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeCatalogSource {
    async fn fetch(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        if self.failing.lock().unwrap().contains(url) {
            return Err(FetchError::Upstream {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default())
    }
}

/// Fetcher over a fake source with zero-delay retries
pub fn test_fetcher(source: Arc<FakeCatalogSource>, max_pages: u32) -> Fetcher {
    Fetcher::new(source, RetryPolicy::immediate(3), test_endpoints(max_pages))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    bounce: HashSet<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to these addresses fail
    pub fn bouncing(addresses: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            bounce: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        if self.bounce.contains(recipient) {
            return Err(TransportError::Rejected {
                status: 550,
                message: format!("mailbox unavailable: {}", recipient),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingReportSink {
    reports: Mutex<Vec<RunReport>>,
}

impl CollectingReportSink {
    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for CollectingReportSink {
    async fn deliver(&self, report: &RunReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// Temporary on-disk store with schema applied
///
/// Returns (TempDir, store) - TempDir must be kept alive for duration of test
pub async fn create_test_store() -> Result<(TempDir, SqliteCatalogStore)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("webtoons.db")).await?;
    Ok((temp_dir, SqliteCatalogStore::new(pool)))
}

/// Seed the `webtoons` table directly
pub async fn seed_work(
    store: &SqliteCatalogStore,
    id: TitleId,
    title: &str,
    weekday: &str,
    status: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO webtoons (title_id, title_text, author, weekday, status) VALUES (?, ?, 'author', ?, ?)",
    )
    .bind(id)
    .bind(title)
    .bind(weekday)
    .bind(status)
    .execute(store.pool())
    .await?;
    Ok(())
}

pub async fn stored_status(store: &SqliteCatalogStore, id: TitleId) -> Result<Option<String>> {
    let status = sqlx::query_scalar("SELECT status FROM webtoons WHERE title_id = ?")
        .bind(id)
        .fetch_optional(store.pool())
        .await?;
    Ok(status)
}

/// Loopback HTTP/1.1 server with a fixed response
///
/// Every connection gets the same status and body, then is closed, so a
/// retrying client shows up as one hit per attempt.
pub struct HttpStub {
    pub url: String,
    hits: Arc<AtomicU32>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl HttpStub {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let hits = Arc::new(AtomicU32::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let (server_hits, server_requests) = (hits.clone(), requests.clone());

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                server_hits.fetch_add(1, Ordering::SeqCst);
                let request = read_request(&mut socket).await;
                server_requests.lock().unwrap().push(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { url, hits, requests }
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    /// Raw requests received so far (head and body)
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Read one request: headers, then `Content-Length` bytes of body
async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let Some(head_end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&data[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if data.len() >= head_end + 4 + body_len {
            break;
        }
    }

    String::from_utf8_lossy(&data).into_owned()
}

/// An address nothing is listening on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
