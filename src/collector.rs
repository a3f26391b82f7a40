use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::db::Database;
use crate::fetcher::FeedClient;
use crate::parser;

/// Counters reported at the end of a completed run. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Collection is switched off; nothing was fetched.
    Disabled,
    /// The feed could not be retrieved; nothing was stored.
    FetchFailed,
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> RunSummary {
        match self {
            RunOutcome::Completed(summary) => *summary,
            RunOutcome::Disabled | RunOutcome::FetchFailed => RunSummary::default(),
        }
    }
}

pub struct Collector {
    client: FeedClient,
    db: Arc<Database>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(db: Arc<Database>, config: CollectorConfig) -> anyhow::Result<Self> {
        let client = FeedClient::new(config.request_timeout())?;
        Ok(Self { client, db, config })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// One pass of fetch → parse → dedupe → insert.
    ///
    /// Articles are handled one at a time in feed order. A failing insert is
    /// logged and counted; it never stops the rest of the batch.
    pub async fn run_once(&self) -> RunOutcome {
        if !self.config.enabled {
            debug!("Headline collector is disabled, skipping run");
            return RunOutcome::Disabled;
        }

        let url = self.config.resolved_rss_url();
        info!("Collecting headlines from {}", url);

        let Some(body) = self.client.fetch(url).await else {
            warn!("Headline feed fetch failed, nothing collected this run");
            return RunOutcome::FetchFailed;
        };

        let articles = parser::parse_feed(&body, self.config.pub_date_fallback);
        let mut summary = RunSummary {
            total: articles.len(),
            ..Default::default()
        };

        for article in &articles {
            match self.db.exists_by_article_url(&article.article_url).await {
                Ok(true) => {
                    summary.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Duplicate check failed for {}: {}", article.article_url, e);
                    summary.failed += 1;
                    continue;
                }
            }

            match self.db.insert_article(article).await {
                Ok(true) => summary.inserted += 1,
                // Lost a race to the unique constraint; the stored row wins
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!("Failed to store article {}: {}", article.article_url, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            total = summary.total,
            inserted = summary.inserted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Headline collection complete"
        );

        RunOutcome::Completed(summary)
    }
}

/// Run the collector forever with a fixed delay between runs.
///
/// The delay starts when a run finishes, so a slow run pushes the next one
/// back instead of overlapping it.
pub async fn start_collector(collector: Arc<Collector>, delay: Duration) {
    info!("Starting headline collector (fixed delay {:?})", delay);

    loop {
        collector.run_once().await;
        tokio::time::sleep(delay).await;
    }
}
