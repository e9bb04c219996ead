use crate::common::errors::ServiceError;
use crate::common::model::{Article, ArticleDetail, ArticleFilter, PagedResult, Summary, SummaryKind};
use crate::services::enrichment::{is_paywalled, Enricher};
use crate::store::{SharedStore, Store};

const DEFAULT_TRENDING: u64 = 10;
const MAX_TRENDING: u64 = 50;

#[derive(Clone)]
pub struct NewsService {
    store: SharedStore,
    enricher: Enricher,
}

impl NewsService {
    pub fn new(store: SharedStore, enricher: Enricher) -> Self {
        Self { store, enricher }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ArticleFilter,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Article>, ServiceError> {
        Ok(self
            .store
            .list_articles(filter, page_number, page_size)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn trending(&self, limit: Option<u64>) -> Result<Vec<Article>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_TRENDING).clamp(1, MAX_TRENDING);
        Ok(self.store.trending_articles(limit).await?)
    }

    async fn article(&self, id: i32) -> Result<Article, ServiceError> {
        self.store
            .get_article(id)
            .await?
            .ok_or(ServiceError::NotFound("Article", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn detail(&self, id: i32) -> Result<ArticleDetail, ServiceError> {
        let article = self.article(id).await?;
        let summaries = self.store.summaries_of_article(id).await?;

        Ok(ArticleDetail { article, summaries })
    }

    /// Returns the new click count
    #[tracing::instrument(skip(self))]
    pub async fn click(&self, id: i32) -> Result<i64, ServiceError> {
        self.store
            .increment_clicks(id)
            .await?
            .ok_or(ServiceError::NotFound("Article", id))
    }

    /// Summaries of the article, generated when there is none yet
    #[tracing::instrument(skip(self))]
    pub async fn summarize(&self, id: i32) -> Result<Vec<Summary>, ServiceError> {
        let article = self.article(id).await?;

        let existing: Vec<Summary> = self
            .store
            .summaries_of_article(id)
            .await?
            .into_iter()
            .filter(|summary| summary.kind != SummaryKind::Translation)
            .collect();
        if !existing.is_empty() {
            return Ok(existing);
        }

        if is_paywalled(article.text()) {
            return Err(ServiceError::Paywalled(id));
        }
        if !self.enricher.can_summarize() {
            return Err(ServiceError::Unavailable("Summarizer"));
        }

        self.enricher.enrich(&article).await
    }

    /// Stored translation for the language, or a fresh one
    #[tracing::instrument(skip(self))]
    pub async fn translate(&self, id: i32, language: &str) -> Result<Summary, ServiceError> {
        let language = language.trim();
        if language.is_empty() || language.chars().count() > 32 {
            return Err(ServiceError::validation(
                "Language must be between 1 and 32 characters",
            ));
        }

        let article = self.article(id).await?;
        if is_paywalled(article.text()) {
            return Err(ServiceError::Paywalled(id));
        }

        let existing = self
            .store
            .summaries_of_article(id)
            .await?
            .into_iter()
            .find(|summary| {
                summary.kind == SummaryKind::Translation
                    && summary
                        .language
                        .as_deref()
                        .map(|l| l.eq_ignore_ascii_case(language))
                        .unwrap_or(false)
            });
        if let Some(translation) = existing {
            return Ok(translation);
        }

        self.enricher.translate(&article, language).await
    }
}
