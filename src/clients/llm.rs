use std::fmt;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use super::{check_status, Result};
use crate::common::errors::ClientError;

/// A text completion API
#[async_trait]
pub trait LanguageModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Send the prompt, return the answer text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiAnswer>,
}

#[derive(Deserialize)]
struct GeminiAnswer {
    #[serde(default)]
    parts: Vec<GeminiAnswerPart>,
}

#[derive(Deserialize)]
struct GeminiAnswerPart {
    text: Option<String>,
}

/// Google Gemini, through the `generateContent` API
pub struct GeminiModel {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Secret<String>,
    model: String,
}

impl GeminiModel {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: &str,
        api_key: Secret<String>,
        model: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: model.to_owned(),
        }
    }
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
            &[("key", self.api_key.expose_secret().as_str())],
        )
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;
        let answer = check_status(response)?.json::<GeminiResponse>().await?;

        answer
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or(ClientError::EmptyAnswer(self.name()))
    }
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct CohereResponse {
    text: Option<String>,
}

/// Cohere, through the `chat` API
pub struct CohereModel {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Secret<String>,
    model: String,
}

impl CohereModel {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: &str,
        api_key: Secret<String>,
        model: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: model.to_owned(),
        }
    }
}

impl fmt::Debug for CohereModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereModel")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl LanguageModel for CohereModel {
    fn name(&self) -> &'static str {
        "Cohere"
    }

    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CohereRequest {
            model: &self.model,
            message: prompt,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat", self.base_url))
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;
        let answer = check_status(response)?.json::<CohereResponse>().await?;

        answer
            .text
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or(ClientError::EmptyAnswer(self.name()))
    }
}
