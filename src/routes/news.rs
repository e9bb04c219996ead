use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::common::model::{ArticleFilter, PageParameters};
use crate::routes::ApiError;
use crate::startup::ApplicationServices;

#[derive(Deserialize, Debug)]
pub struct TrendingParameters {
    limit: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RefreshRequest {
    topics: Option<Vec<String>>,
}

#[derive(Deserialize, Debug)]
pub struct TranslationRequest {
    language: String,
}

#[get("/news")]
#[tracing::instrument(skip(services))]
pub async fn list_news(
    filter: web::Query<ArticleFilter>,
    page: web::Query<PageParameters>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    let articles = services
        .news_service
        .list(&filter, page.get_page(), page.get_size())
        .await?;

    Ok(HttpResponse::Ok().json(articles))
}

#[get("/news/trending")]
#[tracing::instrument(skip(services))]
pub async fn trending_news(
    parameters: web::Query<TrendingParameters>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    let articles = services.news_service.trending(parameters.limit).await?;

    Ok(HttpResponse::Ok().json(articles))
}

#[get("/news/{id:\\d+}")]
#[tracing::instrument(skip(services))]
pub async fn get_news(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    let article = services.news_service.detail(id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(article))
}

#[post("/news/refresh")]
#[tracing::instrument(skip(services, request))]
pub async fn refresh_news(
    request: Option<web::Json<RefreshRequest>>,
    services: web::Data<ApplicationServices>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let topics = request.and_then(|request| request.into_inner().topics);
    let report = services.ingestion_service.refresh(topics).await?;

    Ok(HttpResponse::Ok().json(report))
}

#[post("/news/{id:\\d+}/click")]
#[tracing::instrument(skip(services))]
pub async fn click_news(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let clicks = services.news_service.click(id).await?;

    Ok(HttpResponse::Ok().json(json!({"id": id, "clicks": clicks})))
}

#[post("/news/{id:\\d+}/summaries")]
#[tracing::instrument(skip(services))]
pub async fn summarize_news(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let summaries = services.news_service.summarize(id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(summaries))
}

#[post("/news/{id:\\d+}/translation")]
#[tracing::instrument(skip(services))]
pub async fn translate_news(
    id: web::Path<i32>,
    request: web::Json<TranslationRequest>,
    services: web::Data<ApplicationServices>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let translation = services
        .news_service
        .translate(id.into_inner(), &request.language)
        .await?;

    Ok(HttpResponse::Ok().json(translation))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_news)
        .service(trending_news)
        .service(refresh_news)
        .service(get_news)
        .service(click_news)
        .service(summarize_news)
        .service(translate_news);
}
