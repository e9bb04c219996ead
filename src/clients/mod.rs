//! Clients of the third-party HTTP APIs: the news search API and the language models.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

use crate::common::errors::ClientError;

pub mod gnews;
pub mod llm;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Build the HTTP client shared by every API client. Outgoing calls are traced.
pub fn build_http_client(timeout_seconds: u64) -> anyhow::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent("newsroom (+https://github.com/fistons/newsroom)")
        .build()?;

    Ok(ClientBuilder::new(client)
        .with(TracingMiddleware::default())
        .build())
}

/// Fail on any non 2xx status
fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::NonOkStatus(status.as_u16()));
    }
    Ok(response)
}
