use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{check_status, Result};
use crate::common::errors::ClientError;
use crate::common::model::NewArticle;

/// Source of fresh articles, one topic at a time
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn top_headlines(&self, topic: &str) -> Result<Vec<FetchedArticle>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchedSource {
    pub name: Option<String>,
    pub url: Option<String>,
}

/// Article as returned by the news search API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedArticle {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<FetchedSource>,
}

impl FetchedArticle {
    /// Identifier used for deduplication: the API id, or the SHA-256 of the url
    pub fn external_id(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => {
                let mut hasher = Sha256::new();
                hasher.update(self.url.as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }

    pub fn into_new_article(self, topic: &str) -> NewArticle {
        let external_id = self.external_id();
        let (source_name, source_url) = self
            .source
            .map(|source| (source.name, source.url))
            .unwrap_or_default();

        NewArticle {
            external_id,
            title: self.title,
            description: self.description,
            url: self.url,
            image_url: self.image,
            source_name,
            source_url,
            content: self.content,
            topic: topic.to_owned(),
            published_at: self.published_at,
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlinesResponse {
    #[allow(dead_code)]
    total_articles: Option<u64>,
    #[serde(default)]
    articles: Vec<FetchedArticle>,
}

/// Client of the GNews v4 API
pub struct GNewsClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Secret<String>,
    language: String,
    max_results: u32,
}

impl GNewsClient {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: &str,
        api_key: Secret<String>,
        language: &str,
        max_results: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            language: language.to_owned(),
            max_results,
        }
    }
}

#[async_trait]
impl NewsSource for GNewsClient {
    #[tracing::instrument(skip(self))]
    async fn top_headlines(&self, topic: &str) -> Result<Vec<FetchedArticle>> {
        let max = self.max_results.to_string();
        let url = Url::parse_with_params(
            &format!("{}/top-headlines", self.base_url),
            &[
                ("category", topic),
                ("lang", self.language.as_str()),
                ("max", max.as_str()),
                ("apikey", self.api_key.expose_secret().as_str()),
            ],
        )
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let response = check_status(self.client.get(url).send().await?)?;
        let headlines = response.json::<HeadlinesResponse>().await?;

        tracing::debug!("{} articles fetched for {}", headlines.articles.len(), topic);
        Ok(headlines.articles)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use speculoos::prelude::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::clients::build_http_client;

    fn fetched(id: Option<&str>, url: &str) -> FetchedArticle {
        FetchedArticle {
            id: id.map(String::from),
            title: "Title".into(),
            description: None,
            content: None,
            url: url.into(),
            image: None,
            published_at: None,
            source: None,
        }
    }

    #[test]
    fn external_id_prefers_the_api_id() {
        assert_that(&fetched(Some("abc"), "https://a.b/c").external_id()).is_equal_to("abc".to_string());
    }

    #[test]
    fn external_id_falls_back_to_url_hash() {
        let first = fetched(None, "https://a.b/c").external_id();
        let blank = fetched(Some("  "), "https://a.b/c").external_id();
        let other = fetched(None, "https://a.b/d").external_id();

        assert_that(&first.len()).is_equal_to(64);
        assert_that(&first).is_equal_to(blank);
        assert_that(&first).is_not_equal_to(other);
    }

    #[tokio::test]
    async fn headlines_are_fetched_by_category() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .and(query_param("category", "science"))
            .and(query_param("lang", "en"))
            .and(query_param("max", "5"))
            .and(query_param("apikey", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalArticles": 1,
                "articles": [{
                    "title": "Comet spotted",
                    "description": "A comet",
                    "content": "A comet was spotted",
                    "url": "https://news.example/comet",
                    "image": "https://news.example/comet.png",
                    "publishedAt": "2024-03-01T10:00:00Z",
                    "source": {"name": "Example", "url": "https://news.example"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GNewsClient::new(
            build_http_client(5).unwrap(),
            &server.uri(),
            Secret::new("key".into()),
            "en",
            5,
        );
        let articles = client.top_headlines("science").await.unwrap();

        assert_that(&articles).has_length(1);
        let article = articles[0].clone().into_new_article("science");
        assert_that(&article.title.as_str()).is_equal_to("Comet spotted");
        assert_that(&article.source_name).is_equal_to(Some("Example".to_string()));
        assert_that(&article.topic.as_str()).is_equal_to("science");
        assert!(article.published_at.is_some());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = GNewsClient::new(
            build_http_client(5).unwrap(),
            &server.uri(),
            Secret::new("key".into()),
            "en",
            5,
        );

        let result = client.top_headlines("world").await;
        assert!(matches!(result, Err(ClientError::NonOkStatus(403))));
    }
}
