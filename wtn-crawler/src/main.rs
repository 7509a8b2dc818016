//! wtn-crawler - daily webtoon completion check
//!
//! `run` (the default) performs one reconciliation run and mails the report
//! (`--dry-run` only logs notices and the report);
//! `subscribe` and `test-notify` are small maintenance commands against the
//! same database and transport.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use wtn_common::config::{config_file_path, load_toml_config, CompiledDefaults};
use wtn_common::db::init_database;
use wtn_crawler::config::CrawlerConfig;
use wtn_crawler::fetcher::{Fetcher, HttpCatalogSource};
use wtn_crawler::notifier::{CompletionNotice, HttpMailTransport, LogTransport, NotificationTransport};
use wtn_crawler::report::{AdminMailReportSink, ReportSink, TracingReportSink};
use wtn_crawler::store::{CatalogStore, SqliteCatalogStore};
use wtn_crawler::subscriptions::subscribe;
use wtn_crawler::RunOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "wtn-crawler", version, about = "Webtoon completion notifier")]
struct Cli {
    /// Bootstrap TOML file
    #[arg(long, global = true, env = "WTN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding webtoons.db
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,

    /// Log level; RUST_LOG overrides
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the catalog and notify subscribers (default)
    Run {
        /// Log notices instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Subscribe an address to completion notices for one title
    Subscribe {
        #[arg(long)]
        email: String,
        #[arg(long)]
        title_id: i64,
    },
    /// Send a test notice for a stored title
    TestNotify {
        #[arg(long)]
        title_id: i64,
        #[arg(long)]
        to: String,
    },
}

fn build_transport(config: &CrawlerConfig, dry_run: bool) -> Result<Arc<dyn NotificationTransport>> {
    if dry_run {
        info!("Dry run: notices will be logged, not sent");
        return Ok(Arc::new(LogTransport));
    }

    match config.credentials.mail_relay() {
        Some((endpoint, sender, token)) => {
            let transport =
                HttpMailTransport::new(endpoint, sender, token, config.request_timeout)?;
            info!(endpoint, sender, "Mail relay configured");
            Ok(Arc::new(transport))
        }
        None => {
            warn!("Mail relay endpoint/sender/token incomplete; notices will only be logged");
            Ok(Arc::new(LogTransport))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is read before logging is up so its level can apply; the outcome
    // is logged right after.
    let config_path = config_file_path(cli.config.as_deref());
    let toml_result = load_toml_config(config_path.as_deref());

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| toml_result.as_ref().ok().map(|t| t.logging.level.clone()))
        .unwrap_or_else(|| CompiledDefaults::for_current_platform().log_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    info!(
        "Starting wtn-crawler v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml = toml_result.with_context(|| {
        format!(
            "Failed to load config file {}",
            config_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;
    match &config_path {
        Some(path) if path.exists() => info!(path = %path.display(), "Using config file"),
        _ => info!("No config file; compiled defaults in effect"),
    }

    let config = CrawlerConfig::resolve(cli.data_folder.as_deref(), &toml);
    info!(database = %config.database_path.display(), "Database path");
    config.ensure_data_folder()?;

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(pool));

    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => {
            let source = HttpCatalogSource::new(&config.user_agent, config.request_timeout)?;
            let fetcher = Fetcher::new(Arc::new(source), config.retry.clone(), config.endpoints.clone());
            let transport = build_transport(&config, dry_run)?;
            let sink: Arc<dyn ReportSink> = if dry_run {
                Arc::new(TracingReportSink)
            } else {
                Arc::new(AdminMailReportSink::new(
                    transport.clone(),
                    config.credentials.admin_email.clone(),
                ))
            };

            let report = RunOrchestrator::new(store, fetcher, transport, sink).run().await;
            if !report.is_success() {
                bail!(
                    "Run {} failed: {}",
                    report.run_id,
                    report.error.unwrap_or_default()
                );
            }
            info!(
                run_id = %report.run_id,
                new_items = report.new_item_count,
                completed = report.transition_details.len(),
                notified = report.notified_count,
                "Run complete"
            );
        }
        Command::Subscribe { email, title_id } => {
            if store.title_of(title_id).await?.is_none() {
                warn!(title_id, "Title not in catalog yet; subscribing anyway");
            }
            let created = subscribe(store.as_ref(), &email, title_id).await?;
            println!(
                "{}",
                if created {
                    "Subscription added"
                } else {
                    "Already subscribed"
                }
            );
        }
        Command::TestNotify { title_id, to } => {
            let title = store
                .title_of(title_id)
                .await?
                .ok_or_else(|| wtn_common::Error::NotFound(format!("title id {}", title_id)))?;
            let transport = build_transport(&config, false)?;
            let notice = CompletionNotice::test_notice(&title);
            transport.send(&to, &notice.subject, &notice.body).await?;
            println!("Test notice for '{}' sent to {} via {}", title, to, transport.name());
        }
    }

    Ok(())
}
