use actix_web::http::StatusCode;
use actix_web::{get, web, HttpResponse, ResponseError};
use chrono::Utc;
use serde_json::json;

use crate::auth::AuthenticationError;
use crate::common::errors::{ServiceError, StoreError};

pub mod auth;
pub mod comments;
pub mod events;
pub mod news;
pub mod notifications;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Authentication error {0:?}")]
    AuthenticationError(#[from] AuthenticationError),
    #[error("{0}")]
    ServiceError(#[from] ServiceError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ApiError::ServiceError(ServiceError::validation(message))
    }
}

fn problem(status: StatusCode, kind: &str, title: &str, detail: String) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "type": format!("/problem/{kind}"),
        "title": title,
        "status": status.as_u16(),
        "detail": detail
    }))
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationError(error) => error.status_code(),
            ApiError::ServiceError(error) => match error {
                ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(..) => StatusCode::NOT_FOUND,
                ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                ServiceError::StoreError(StoreError::Conflict(_)) => StatusCode::CONFLICT,
                ServiceError::Paywalled(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::ClientError(_) => StatusCode::BAD_GATEWAY,
                ServiceError::StoreError(_) | ServiceError::Unexpected(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::AuthenticationError(error) => error.error_response(),
            ApiError::ServiceError(error) => match error {
                ServiceError::ValidationError(message) => {
                    problem(status, "validation", "Invalid request", message.clone())
                }
                ServiceError::NotFound(..) => {
                    problem(status, "not-found", "Object not found", error.to_string())
                }
                ServiceError::Forbidden(message) => {
                    problem(status, "forbidden", "Forbidden", message.clone())
                }
                ServiceError::StoreError(StoreError::Conflict(message)) => {
                    problem(status, "conflict", "Conflict", message.clone())
                }
                ServiceError::Paywalled(_) => {
                    problem(status, "paywalled", "Content unavailable", error.to_string())
                }
                ServiceError::Unavailable(_) => {
                    problem(status, "unavailable", "Service unavailable", error.to_string())
                }
                ServiceError::ClientError(e) => {
                    tracing::error!("Upstream API failure: {}", e);
                    problem(
                        status,
                        "upstream",
                        "Upstream API error",
                        String::from("An external API call failed"),
                    )
                }
                ServiceError::StoreError(_) | ServiceError::Unexpected(_) => {
                    tracing::error!("Unexpected error: {:?}", error);
                    problem(
                        status,
                        "internal",
                        "Internal error",
                        String::from("Unexpected error"),
                    )
                }
            },
            ApiError::Unexpected(e) => {
                tracing::error!("Unexpected error: {:?}", e);
                problem(
                    status,
                    "internal",
                    "Internal error",
                    String::from("Unexpected error"),
                )
            }
        }
    }
}

#[get("/api/v1/ping")]
#[tracing::instrument]
pub async fn ping() -> HttpResponse {
    let quotes = [
        "Stop the presses",
        "All the news that's fit to print",
        "Extra! Extra! Read all about it",
        "Film at eleven",
        "Developing story",
        "Breaking news",
        "And now, the weather",
    ];
    let index = Utc::now().timestamp_subsec_nanos() as usize % quotes.len();

    HttpResponse::Ok()
        .content_type("text/plain")
        .body(quotes[index])
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(auth::configure)
        .configure(news::configure)
        .configure(comments::configure)
        .configure(notifications::configure)
        .configure(events::configure);
}
