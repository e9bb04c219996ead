use reqwest::StatusCode;
use serde_json::{json, Value};
use speculoos::prelude::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use std::time::Duration;

use helpers::{headline, spawn_app, spawn_app_with, GEMINI_PATH};
use newsroom::common::model::{ArticleFilter, SummaryKind};
use newsroom::scheduler::start_scheduler;
use newsroom::store::Store;

mod helpers;

fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn articles_are_inserted_once_and_enriched() {
    let app = spawn_app().await;
    app.mount_headlines(
        "technology",
        vec![headline("t1", "Chips", "Chip body"), headline("shared", "Both", "Shared body")],
    )
    .await;
    app.mount_headlines(
        "science",
        vec![headline("shared", "Both", "Shared body"), headline("s1", "Comet", "Comet body")],
    )
    .await;
    app.mount_summaries(3).await;
    app.mount_sentiment("positive", 3).await;

    let ingestion = &app.services.ingestion_service;
    let first = ingestion
        .run_cycle(&topics(&["technology", "science"]))
        .await
        .unwrap();

    assert_that(&first.topics).is_equal_to(2);
    assert_that(&first.fetched).is_equal_to(4);
    assert_that(&first.skipped).is_equal_to(1);
    assert_that(&first.inserted).is_equal_to(3);
    assert_that(&first.enriched).is_equal_to(3);
    assert_that(&first.failed).is_equal_to(0);

    let second = ingestion
        .run_cycle(&topics(&["technology", "science"]))
        .await
        .unwrap();
    assert_that(&second.inserted).is_equal_to(0);
    assert_that(&second.skipped).is_equal_to(4);

    let articles = app
        .store
        .list_articles(&ArticleFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_that(articles.total_items()).is_equal_to(&3);
    for article in articles.content() {
        assert!(article.processed);
        let summaries = app.store.summaries_of_article(article.id).await.unwrap();
        assert_that(&summaries).has_length(3);
    }
}

#[tokio::test]
async fn failures_only_lose_their_own_result() {
    let app = spawn_app().await;
    Mock::given(method("GET"))
        .and(path("/top-headlines"))
        .and(query_param("category", "technology"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.mock)
        .await;
    app.mount_headlines("science", vec![headline("s1", "Comet", "Comet body")])
        .await;
    app.mount_gemini("TL;DR", "Short version", 1).await;
    app.mount_gemini("Explain like I", "Simple version", 1).await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.mock)
        .await;
    app.mount_sentiment("negative", 1).await;

    let report = app
        .services
        .ingestion_service
        .run_cycle(&topics(&["technology", "science"]))
        .await
        .unwrap();

    assert_that(&report.topics).is_equal_to(1);
    assert_that(&report.inserted).is_equal_to(1);
    assert_that(&report.failed).is_equal_to(1);

    let articles = app
        .store
        .list_articles(&ArticleFilter::default(), 1, 10)
        .await
        .unwrap();
    let article = &articles.content()[0];
    let kinds: Vec<SummaryKind> = app
        .store
        .summaries_of_article(article.id)
        .await
        .unwrap()
        .iter()
        .map(|summary| summary.kind)
        .collect();
    assert_that(&kinds).is_equal_to(vec![SummaryKind::Tldr, SummaryKind::Eli5]);
}

#[tokio::test]
async fn paywalled_articles_are_stored_without_summaries() {
    let app = spawn_app().await;
    app.mount_headlines(
        "science",
        vec![headline("s1", "Comet", "A comet was... Subscribe to read more")],
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&app.mock)
        .await;

    let report = app
        .services
        .ingestion_service
        .run_cycle(&topics(&["science"]))
        .await
        .unwrap();
    assert_that(&report.inserted).is_equal_to(1);

    let articles = app
        .store
        .list_articles(&ArticleFilter::default(), 1, 10)
        .await
        .unwrap();
    let article = &articles.content()[0];
    assert!(article.processed);
    assert!(app
        .store
        .summaries_of_article(article.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn articles_are_categorized_among_known_topics() {
    let app = spawn_app_with(&[("INGESTION_CATEGORIZE", "true")]).await;
    app.mount_headlines("technology", vec![headline("t1", "Comet chip", "Space body")])
        .await;
    app.mount_gemini("Pick the topic", "Science.", 1).await;

    app.services
        .ingestion_service
        .run_cycle(&topics(&["technology"]))
        .await
        .unwrap();

    let filter = ArticleFilter {
        topic: Some(String::from("science")),
        query: None,
    };
    let articles = app.store.list_articles(&filter, 1, 10).await.unwrap();
    assert_that(articles.content()).has_length(1);
}

#[tokio::test]
async fn new_articles_are_announced() {
    let app = spawn_app().await;
    let mut events = app.services.events.subscribe();
    app.mount_headlines("science", vec![headline("s1", "Comet", "Comet body")])
        .await;

    app.services
        .ingestion_service
        .run_cycle(&topics(&["science"]))
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    assert_that(&event.kind()).is_equal_to("news_refreshed");
}

#[tokio::test]
async fn refresh_can_target_some_topics() {
    let app = spawn_app().await;
    let (token, _) = app.signed_up("alice").await;
    Mock::given(method("GET"))
        .and(path("/top-headlines"))
        .and(query_param("category", "science"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalArticles": 0,
            "articles": []
        })))
        .expect(1)
        .mount(&app.mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/top-headlines"))
        .and(query_param("category", "technology"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.mock)
        .await;

    let response = app
        .post("/news/refresh")
        .bearer_auth(&token)
        .json(&json!({ "topics": [" Science "] }))
        .send()
        .await
        .unwrap();
    assert_that(&response.status()).is_equal_to(StatusCode::OK);

    let report: Value = response.json().await.unwrap();
    assert_that(&report["topics"]).is_equal_to(json!(1));
    assert_that(&report["inserted"]).is_equal_to(json!(0));

    let unknown = app
        .post("/news/refresh")
        .bearer_auth(&token)
        .json(&json!({ "topics": ["science", "gossip"] }))
        .send()
        .await
        .unwrap();
    assert_that(&unknown.status()).is_equal_to(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_needs_authentication() {
    let app = spawn_app().await;

    let response = app.post("/news/refresh").send().await.unwrap();

    assert_that(&response.status()).is_equal_to(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scheduled_cycles_fetch_the_configured_topics() {
    let app = spawn_app().await;
    app.mount_headlines("technology", vec![headline("t1", "Chips", "Chip body")])
        .await;
    app.mount_headlines("science", vec![]).await;

    let mut scheduler = start_scheduler(app.services.ingestion_service.clone(), "* * * * * *")
        .await
        .unwrap();

    let mut articles = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        articles = *app
            .store
            .list_articles(&ArticleFilter::default(), 1, 10)
            .await
            .unwrap()
            .total_items();
        if articles > 0 {
            break;
        }
    }
    scheduler.shutdown().await.unwrap();

    assert_that(&articles).is_equal_to(1);
    let requests = app.mock.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .any(|request| request.url.path() == "/top-headlines"));
}
