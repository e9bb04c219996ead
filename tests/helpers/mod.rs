#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use chrono::Utc;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use newsroom::common::model::{Article, NewArticle};
use newsroom::configuration::ApplicationConfiguration;
use newsroom::startup::{build_services, startup, ApplicationServices};
use newsroom::store::{MemoryStore, SharedStore, Store};

pub const GEMINI_PATH: &str = "/v1beta/models/gemini-test:generateContent";
pub const COHERE_PATH: &str = "/v1/chat";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    /// Stands for the news API and both language model APIs
    pub mock: MockServer,
    pub store: SharedStore,
    pub services: ApplicationServices,
}

/// Start the application on a random port, backed by the in-memory store
pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[]).await
}

/// Same as [`spawn_app`], with some environment variables overridden.
/// An empty value unsets the variable.
pub async fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let mock = MockServer::start().await;
    let uri = mock.uri();

    let mut vars: HashMap<String, String> = [
        ("STORE", "memory"),
        ("JWT_SECRET", "test-secret"),
        ("STATIC_DIR", "./no-static-dir/"),
        ("RATE_LIMITING_BUCKET_SIZE", "10000"),
        ("GNEWS_API_KEY", "gnews-key"),
        ("GEMINI_API_KEY", "gemini-key"),
        ("GEMINI_MODEL", "gemini-test"),
        ("COHERE_API_KEY", "cohere-key"),
        ("COHERE_MODEL", "command-test"),
        ("INGESTION_TOPICS", "technology,science"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for key in ["GNEWS_BASE_URL", "GEMINI_BASE_URL", "COHERE_BASE_URL"] {
        vars.insert(key.to_string(), uri.clone());
    }
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let configuration = ApplicationConfiguration::from_lookup(|key| vars.get(key).cloned())
        .expect("Test configuration is valid");

    let store: SharedStore = Arc::new(MemoryStore::new());
    let services = build_services(store.clone(), &configuration).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Could not bind a random port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let server = startup(services.clone(), &configuration, listener).unwrap();
    tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
        mock,
        store,
        services,
    }
}

/// A fetched article, as the news API returns them
pub fn headline(id: &str, title: &str, content: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": format!("About {title}"),
        "content": content,
        "url": format!("https://news.example/{id}"),
        "image": null,
        "publishedAt": "2024-03-01T10:00:00Z",
        "source": {"name": "Example", "url": "https://news.example"}
    })
}

pub fn gemini_answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
    }))
}

pub fn cohere_answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "text": text }))
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    pub async fn register(&self, username: &str) -> Response {
        self.post("/auth/register")
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "correct horse",
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register a user, returning its token and id
    pub async fn signed_up(&self, username: &str) -> (String, i64) {
        let body: Value = self.register(username).await.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_owned(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    pub async fn seed_article(&self, external_id: &str, content: &str) -> Article {
        self.store
            .insert_article(&NewArticle {
                external_id: external_id.into(),
                title: format!("Article {external_id}"),
                description: Some(String::from("Some description")),
                url: format!("https://news.example/{external_id}"),
                image_url: None,
                source_name: Some(String::from("Example")),
                source_url: None,
                content: Some(content.into()),
                topic: String::from("technology"),
                published_at: Some(Utc::now()),
                fetched_at: Utc::now(),
            })
            .await
            .unwrap()
            .expect("Seeded articles are new")
    }

    /// Serve the given headlines for a topic
    pub async fn mount_headlines(&self, topic: &str, articles: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .and(query_param("category", topic))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalArticles": articles.len(),
                "articles": articles,
            })))
            .mount(&self.mock)
            .await;
    }

    /// Answer the Gemini prompts containing `marker`, expecting `calls` of them
    pub async fn mount_gemini(&self, marker: &str, answer: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .and(body_string_contains(marker))
            .respond_with(gemini_answer(answer))
            .expect(calls)
            .mount(&self.mock)
            .await;
    }

    /// Answer the sentiment prompts, expecting `calls` of them
    pub async fn mount_sentiment(&self, answer: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path(COHERE_PATH))
            .and(body_string_contains("positive, neutral, negative"))
            .respond_with(cohere_answer(answer))
            .expect(calls)
            .mount(&self.mock)
            .await;
    }

    /// Answer the three summary prompts, each expected `calls` times
    pub async fn mount_summaries(&self, calls: u64) {
        self.mount_gemini("TL;DR", "Short version", calls).await;
        self.mount_gemini("bullet points", "- one\n- two\n- three", calls)
            .await;
        self.mount_gemini("Explain like I", "Simple version", calls)
            .await;
    }
}
