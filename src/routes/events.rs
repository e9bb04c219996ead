use std::convert::Infallible;

use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::routes::ApiError;
use crate::services::events::Event;
use crate::startup::ApplicationServices;

const MAX_CHAT_MESSAGE_LENGTH: usize = 500;

#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    message: String,
}

/// Wait for the next event that can be framed. `None` once the hub is gone.
async fn next_frame(receiver: &mut Receiver<Event>) -> Option<String> {
    loop {
        match receiver.recv().await {
            Ok(event) => match event.to_sse_frame() {
                Ok(frame) => return Some(frame),
                Err(e) => tracing::warn!("Could not serialize {} event: {}", event.kind(), e),
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Event subscriber lagged, {} events skipped", skipped)
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

#[get("/events")]
#[tracing::instrument(skip(services))]
pub async fn events(services: web::Data<ApplicationServices>) -> HttpResponse {
    let receiver = services.events.subscribe();
    let frames = stream::unfold(receiver, |mut receiver| async move {
        next_frame(&mut receiver)
            .await
            .map(|frame| (Ok::<_, Infallible>(web::Bytes::from(frame)), receiver))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(frames)
}

#[post("/chat")]
#[tracing::instrument(skip(services, request))]
pub async fn chat(
    request: web::Json<ChatRequest>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let message = request.into_inner().message.trim().to_owned();
    let length = message.chars().count();
    if length == 0 || length > MAX_CHAT_MESSAGE_LENGTH {
        return Err(ApiError::validation(format!(
            "Chat messages must be between 1 and {MAX_CHAT_MESSAGE_LENGTH} characters"
        )));
    }

    let id = Uuid::new_v4();
    let delivered = services.events.publish(Event::ChatMessage {
        id,
        user: user.login,
        message,
        timestamp: Utc::now(),
    });

    Ok(HttpResponse::Accepted().json(json!({ "id": id, "delivered": delivered })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(events).service(chat);
}

#[cfg(test)]
mod tests {
    use speculoos::prelude::*;

    use super::*;
    use crate::services::events::EventHub;

    #[tokio::test]
    async fn frames_follow_published_events() {
        let hub = EventHub::new(4);
        let mut receiver = hub.subscribe();

        hub.publish(Event::CommentDeleted {
            article_id: 1,
            comment_ids: vec![2, 3],
        });

        let frame = next_frame(&mut receiver).await.unwrap();
        assert!(frame.starts_with("event: comment_deleted\n"));
    }

    #[tokio::test]
    async fn lagged_subscribers_skip_ahead() {
        let hub = EventHub::new(1);
        let mut receiver = hub.subscribe();

        for article_id in 1..=3 {
            hub.publish(Event::CommentDeleted {
                article_id,
                comment_ids: vec![],
            });
        }

        let frame = next_frame(&mut receiver).await.unwrap();
        assert_that(&frame.contains("\"article_id\":3")).is_true();
    }

    #[tokio::test]
    async fn stream_ends_with_the_hub() {
        let hub = EventHub::new(4);
        let mut receiver = hub.subscribe();
        drop(hub);

        assert!(next_frame(&mut receiver).await.is_none());
    }
}
