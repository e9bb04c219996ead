use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::common::model::Comment;
use crate::services::ingestion::IngestionReport;

/// Something every connected client should hear about
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ChatMessage {
        id: Uuid,
        user: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    CommentCreated {
        comment: Comment,
    },
    CommentDeleted {
        article_id: i32,
        comment_ids: Vec<i32>,
    },
    NewsRefreshed {
        report: IngestionReport,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ChatMessage { .. } => "chat_message",
            Event::CommentCreated { .. } => "comment_created",
            Event::CommentDeleted { .. } => "comment_deleted",
            Event::NewsRefreshed { .. } => "news_refreshed",
        }
    }

    /// Server-Sent Events frame of this event
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "event: {}\ndata: {}\n\n",
            self.kind(),
            serde_json::to_string(self)?
        ))
    }
}

/// In-process fan out of [`Event`]s. Slow subscribers lose the oldest events.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of subscribers reached
    #[tracing::instrument(skip(self), fields(kind = event.kind()), level = "debug")]
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use speculoos::prelude::*;

    use super::*;

    #[test]
    fn publishing_without_subscriber_is_fine() {
        let hub = EventHub::new(4);

        let reached = hub.publish(Event::CommentDeleted {
            article_id: 1,
            comment_ids: vec![1],
        });

        assert_that(&reached).is_equal_to(0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let hub = EventHub::new(4);
        let mut receiver = hub.subscribe();

        hub.publish(Event::ChatMessage {
            id: Uuid::new_v4(),
            user: "alice".into(),
            message: "hello".into(),
            timestamp: Utc::now(),
        });

        let event = receiver.recv().await.unwrap();
        assert_that(&event.kind()).is_equal_to("chat_message");
    }

    #[tokio::test]
    async fn slow_subscribers_lag() {
        let hub = EventHub::new(2);
        let mut receiver = hub.subscribe();

        for id in 0..5 {
            hub.publish(Event::CommentDeleted {
                article_id: 1,
                comment_ids: vec![id],
            });
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(receiver.recv().await.is_ok());
    }

    #[test]
    fn sse_frame_carries_kind_and_payload() {
        let frame = Event::CommentDeleted {
            article_id: 3,
            comment_ids: vec![4, 5],
        }
        .to_sse_frame()
        .unwrap();

        assert_that(&frame.as_str()).starts_with("event: comment_deleted\ndata: {");
        assert_that(&frame.as_str()).contains("\"comment_ids\":[4,5]");
        assert_that(&frame.as_str()).ends_with("\n\n");
    }
}
