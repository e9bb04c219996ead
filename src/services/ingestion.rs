use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;

use crate::clients::gnews::NewsSource;
use crate::common::errors::ServiceError;
use crate::common::model::{Article, Topic};
use crate::services::enrichment::Enricher;
use crate::services::events::{Event, EventHub};
use crate::store::{SharedStore, Store};

/// Outcome of an ingestion cycle
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IngestionReport {
    /// Topics whose search call succeeded
    pub topics: usize,
    pub fetched: usize,
    /// Already known, or duplicated in the batch
    pub skipped: usize,
    pub inserted: usize,
    pub enriched: usize,
    /// Failed search calls, inserts and enrichments
    pub failed: usize,
}

/// Fetch, deduplicate, persist and enrich articles
#[derive(Clone)]
pub struct IngestionService {
    store: SharedStore,
    source: Option<Arc<dyn NewsSource>>,
    enricher: Enricher,
    events: EventHub,
    topics: Vec<Topic>,
    categorize: bool,
}

impl IngestionService {
    pub fn new(
        store: SharedStore,
        source: Option<Arc<dyn NewsSource>>,
        enricher: Enricher,
        events: EventHub,
        topics: Vec<Topic>,
        categorize: bool,
    ) -> Self {
        Self {
            store,
            source,
            enricher,
            events,
            topics,
            categorize,
        }
    }

    /// Configured topics
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Run a cycle over the requested topics, or every configured topic when none is given.
    /// Only configured topics may be requested.
    pub async fn refresh(&self, topics: Option<Vec<String>>) -> Result<IngestionReport, ServiceError> {
        let topics: Vec<Topic> = topics
            .unwrap_or_default()
            .iter()
            .map(|topic| topic.trim().to_lowercase())
            .filter(|topic| !topic.is_empty())
            .collect();

        if let Some(unknown) = topics.iter().find(|topic| !self.topics.contains(topic)) {
            return Err(ServiceError::validation(format!(
                "Unknown topic {unknown}, expected one of {}",
                self.topics.join(", ")
            )));
        }

        if topics.is_empty() {
            self.run_cycle(&self.topics).await
        } else {
            self.run_cycle(&topics).await
        }
    }

    /// One search call per topic, then insertion of the unknown articles and their enrichment.
    /// Failures are logged and counted, they never stop the cycle.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self, topics: &[Topic]) -> Result<IngestionReport, ServiceError> {
        let source = self
            .source
            .as_ref()
            .ok_or(ServiceError::Unavailable("News API"))?;

        let mut report = IngestionReport::default();
        let mut seen = HashSet::new();

        for topic in topics {
            let fetched = match source.top_headlines(topic).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::error!("Could not fetch topic {}: {}", topic, e);
                    report.failed += 1;
                    continue;
                }
            };
            report.topics += 1;
            report.fetched += fetched.len();

            let mut inserted = vec![];
            for item in fetched {
                let external_id = item.external_id();
                if !seen.insert(external_id.clone()) {
                    report.skipped += 1;
                    continue;
                }

                match self.store.article_exists(&external_id).await {
                    Ok(false) => {}
                    Ok(true) => {
                        report.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::error!("Could not check article {}: {}", external_id, e);
                        report.failed += 1;
                        continue;
                    }
                }

                let mut article = item.into_new_article(topic);
                if self.categorize {
                    article.topic = self.enricher.categorize(&article, &self.topics).await;
                }

                match self.store.insert_article(&article).await {
                    Ok(Some(article)) => inserted.push(article),
                    // Inserted in the meantime by a concurrent cycle
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        tracing::error!("Could not insert article {}: {}", external_id, e);
                        report.failed += 1;
                    }
                }
            }

            report.inserted += inserted.len();
            let (enriched, failed) = self.enrich_all(&inserted).await;
            report.enriched += enriched;
            report.failed += failed;
        }

        tracing::info!("Ingestion cycle done: {:?}", report);
        if report.inserted > 0 {
            self.events.publish(Event::NewsRefreshed {
                report: report.clone(),
            });
        }

        Ok(report)
    }

    /// Enrich the articles concurrently. Returns the number of successes and failures.
    async fn enrich_all(&self, articles: &[Article]) -> (usize, usize) {
        let results = join_all(articles.iter().map(|article| self.enricher.enrich(article))).await;

        let mut enriched = 0;
        let mut failed = 0;
        for (article, result) in articles.iter().zip(results) {
            match result {
                Ok(_) => enriched += 1,
                Err(e) => {
                    tracing::error!("Could not enrich article {}: {}", article.id, e);
                    failed += 1;
                }
            }
        }

        (enriched, failed)
    }
}
