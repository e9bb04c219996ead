use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::common::errors::ServiceError;
use crate::common::model::{
    Comment, CommentNode, NewComment, NewNotification, NotificationKind, Reaction,
};
use crate::services::events::{Event, EventHub};
use crate::store::{SharedStore, Store};

const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
    pub parent_id: Option<i32>,
}

/// Arrange the comments of an article as a forest, roots and replies oldest first
pub fn build_thread(comments: Vec<Comment>) -> Vec<CommentNode> {
    let known: HashSet<i32> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<i32, Vec<Comment>> = HashMap::new();
    let mut roots = vec![];

    for comment in comments {
        match comment.parent_id {
            Some(parent_id) if known.contains(&parent_id) => {
                children.entry(parent_id).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    fn attach(comment: Comment, children: &mut HashMap<i32, Vec<Comment>>) -> CommentNode {
        let replies = children.remove(&comment.id).unwrap_or_default();
        CommentNode {
            children: replies
                .into_iter()
                .map(|reply| attach(reply, children))
                .collect(),
            comment,
        }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

/// Usernames mentioned with `@name` in a text
fn mentions(text: &str) -> HashSet<&str> {
    text.split_whitespace()
        .filter_map(|word| word.strip_prefix('@'))
        .map(|name| name.trim_end_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-')))
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Clone)]
pub struct CommentService {
    store: SharedStore,
    events: EventHub,
}

impl CommentService {
    pub fn new(store: SharedStore, events: EventHub) -> Self {
        Self { store, events }
    }

    async fn comment(&self, id: i32) -> Result<Comment, ServiceError> {
        self.store
            .get_comment(id)
            .await?
            .ok_or(ServiceError::NotFound("Comment", id))
    }

    /// Notifications are a side effect: failing to record one is only logged
    async fn notify(&self, notification: NewNotification) {
        if let Err(e) = self.store.insert_notification(&notification).await {
            tracing::error!(
                "Could not notify user {}: {}",
                notification.recipient_id,
                e
            );
        }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn create(
        &self,
        article_id: i32,
        user_id: i32,
        request: &CommentRequest,
    ) -> Result<Comment, ServiceError> {
        let text = request.text.trim();
        let length = text.chars().count();
        if length == 0 || length > MAX_COMMENT_LENGTH {
            return Err(ServiceError::validation(format!(
                "Comment must be between 1 and {MAX_COMMENT_LENGTH} characters"
            )));
        }

        if self.store.get_article(article_id).await?.is_none() {
            return Err(ServiceError::NotFound("Article", article_id));
        }

        let parent = match request.parent_id {
            Some(parent_id) => {
                let parent = self.comment(parent_id).await?;
                if parent.article_id != article_id {
                    return Err(ServiceError::validation(
                        "The parent comment belongs to another article",
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let comment = self
            .store
            .insert_comment(&NewComment {
                article_id,
                user_id,
                text: text.to_owned(),
                parent_id: request.parent_id,
            })
            .await?;

        let mut notified = HashSet::from([user_id]);
        if let Some(parent) = parent {
            if notified.insert(parent.user_id) {
                self.notify(NewNotification {
                    recipient_id: parent.user_id,
                    sender_id: Some(user_id),
                    kind: NotificationKind::Reply,
                    article_id: Some(article_id),
                    comment_id: Some(comment.id),
                    message: format!("{} replied to your comment", comment.username),
                })
                .await;
            }
        }

        for username in mentions(&comment.text) {
            let mentioned = match self.store.user_by_login(username).await {
                Ok(Some(user)) if user.username == username => user,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("Could not look up mentioned user {}: {}", username, e);
                    continue;
                }
            };
            if notified.insert(mentioned.id) {
                self.notify(NewNotification {
                    recipient_id: mentioned.id,
                    sender_id: Some(user_id),
                    kind: NotificationKind::Mention,
                    article_id: Some(article_id),
                    comment_id: Some(comment.id),
                    message: format!("{} mentioned you in a comment", comment.username),
                })
                .await;
            }
        }

        self.events.publish(Event::CommentCreated {
            comment: comment.clone(),
        });

        Ok(comment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn thread(&self, article_id: i32) -> Result<Vec<CommentNode>, ServiceError> {
        if self.store.get_article(article_id).await?.is_none() {
            return Err(ServiceError::NotFound("Article", article_id));
        }

        let comments = self.store.comments_of_article(article_id).await?;
        Ok(build_thread(comments))
    }

    /// Toggle a reaction: the same reaction twice clears it, the opposite one replaces it
    #[tracing::instrument(skip(self))]
    pub async fn react(
        &self,
        comment_id: i32,
        user_id: i32,
        username: &str,
        reaction: Reaction,
    ) -> Result<Comment, ServiceError> {
        let comment = self.comment(comment_id).await?;

        let already = match reaction {
            Reaction::Like => comment.liked_by.contains(&user_id),
            Reaction::Dislike => comment.disliked_by.contains(&user_id),
        };
        let wanted = if already { None } else { Some(reaction) };

        let updated = self
            .store
            .set_reaction(comment_id, user_id, wanted)
            .await?
            .ok_or(ServiceError::NotFound("Comment", comment_id))?;

        if wanted == Some(Reaction::Like) && comment.user_id != user_id {
            self.notify(NewNotification {
                recipient_id: comment.user_id,
                sender_id: Some(user_id),
                kind: NotificationKind::Like,
                article_id: Some(comment.article_id),
                comment_id: Some(comment_id),
                message: format!("{username} liked your comment"),
            })
            .await;
        }

        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn flag(&self, comment_id: i32, user_id: i32) -> Result<Comment, ServiceError> {
        self.store
            .flag_comment(comment_id, user_id)
            .await?
            .ok_or(ServiceError::NotFound("Comment", comment_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn flagged(&self) -> Result<Vec<Comment>, ServiceError> {
        Ok(self.store.flagged_comments().await?)
    }

    /// Delete the comment and all its replies. Only its author or an admin may do it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        comment_id: i32,
        user_id: i32,
        is_admin: bool,
    ) -> Result<Vec<i32>, ServiceError> {
        let comment = self.comment(comment_id).await?;
        if comment.user_id != user_id && !is_admin {
            return Err(ServiceError::Forbidden(String::from(
                "Only the author or an admin may delete this comment",
            )));
        }

        let comment_ids = self.store.delete_comment_tree(comment_id).await?;
        if !comment_ids.is_empty() {
            self.events.publish(Event::CommentDeleted {
                article_id: comment.article_id,
                comment_ids: comment_ids.clone(),
            });
        }

        Ok(comment_ids)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use speculoos::prelude::*;

    use super::*;
    use crate::common::errors::StoreError;
    use crate::common::model::{NewArticle, NewUser, UserRole};
    use crate::store::MemoryStore;

    struct Fixture {
        store: SharedStore,
        service: CommentService,
        events: EventHub,
        article_id: i32,
        alice: i32,
        bob: i32,
    }

    async fn fixture() -> Fixture {
        let store: SharedStore = Arc::new(MemoryStore::default());
        let events = EventHub::new(16);
        let service = CommentService::new(store.clone(), events.clone());

        let article = store
            .insert_article(&NewArticle {
                external_id: "a1".into(),
                title: "Title".into(),
                description: None,
                url: "https://news.example/1".into(),
                image_url: None,
                source_name: None,
                source_url: None,
                content: None,
                topic: "world".into(),
                published_at: None,
                fetched_at: Utc::now(),
            })
            .await
            .unwrap()
            .unwrap();

        let mut ids = vec![];
        for name in ["alice", "bob"] {
            let user = store
                .create_user(&NewUser {
                    username: name.into(),
                    email: format!("{name}@example.com"),
                    password: "hash".into(),
                    display_name: None,
                    role: UserRole::Basic,
                })
                .await
                .unwrap();
            ids.push(user.id);
        }

        Fixture {
            store,
            service,
            events,
            article_id: article.id,
            alice: ids[0],
            bob: ids[1],
        }
    }

    fn request(text: &str, parent_id: Option<i32>) -> CommentRequest {
        CommentRequest {
            text: text.into(),
            parent_id,
        }
    }

    #[tokio::test]
    async fn text_is_trimmed_and_validated() {
        let f = fixture().await;

        let comment = f
            .service
            .create(f.article_id, f.alice, &request("  Hello  ", None))
            .await
            .unwrap();
        assert_that(&comment.text.as_str()).is_equal_to("Hello");

        let blank = f.service.create(f.article_id, f.alice, &request("   ", None)).await;
        assert!(matches!(blank, Err(ServiceError::ValidationError(_))));

        let long = "x".repeat(2001);
        let too_long = f.service.create(f.article_id, f.alice, &request(&long, None)).await;
        assert!(matches!(too_long, Err(ServiceError::ValidationError(_))));

        let unknown = f.service.create(9999, f.alice, &request("Hi", None)).await;
        assert!(matches!(unknown, Err(ServiceError::NotFound("Article", 9999))));
    }

    #[tokio::test]
    async fn duplicate_comments_are_rejected() {
        let f = fixture().await;
        f.service
            .create(f.article_id, f.alice, &request("Same", None))
            .await
            .unwrap();

        let duplicate = f
            .service
            .create(f.article_id, f.alice, &request(" Same ", None))
            .await;
        assert!(matches!(
            duplicate,
            Err(ServiceError::StoreError(StoreError::Conflict(_)))
        ));

        // Another author may say the same thing
        assert!(f
            .service
            .create(f.article_id, f.bob, &request("Same", None))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn replies_notify_the_parent_author_and_broadcast() {
        let f = fixture().await;
        let mut receiver = f.events.subscribe();
        let root = f
            .service
            .create(f.article_id, f.alice, &request("Root", None))
            .await
            .unwrap();

        let reply = f
            .service
            .create(f.article_id, f.bob, &request("Reply", Some(root.id)))
            .await
            .unwrap();
        f.service
            .create(f.article_id, f.alice, &request("Self reply", Some(root.id)))
            .await
            .unwrap();

        let root = f.store.get_comment(root.id).await.unwrap().unwrap();
        assert!(root.replies.contains(&reply.id));

        let notifications = f.store.notifications_of_user(f.alice, 1, 10).await.unwrap();
        assert_that(notifications.content()).has_length(1);
        assert_that(&notifications.content()[0].kind).is_equal_to(NotificationKind::Reply);
        assert_that(&notifications.content()[0].sender_id).is_equal_to(Some(f.bob));

        let event = receiver.recv().await.unwrap();
        assert_that(&event.kind()).is_equal_to("comment_created");
    }

    #[tokio::test]
    async fn parent_must_belong_to_the_article() {
        let f = fixture().await;
        let other = f
            .store
            .insert_article(&NewArticle {
                external_id: "a2".into(),
                title: "Other".into(),
                description: None,
                url: "https://news.example/2".into(),
                image_url: None,
                source_name: None,
                source_url: None,
                content: None,
                topic: "world".into(),
                published_at: None,
                fetched_at: Utc::now(),
            })
            .await
            .unwrap()
            .unwrap();
        let root = f
            .service
            .create(other.id, f.alice, &request("Elsewhere", None))
            .await
            .unwrap();

        let result = f
            .service
            .create(f.article_id, f.bob, &request("Reply", Some(root.id)))
            .await;

        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn mentions_notify_known_users() {
        let f = fixture().await;

        f.service
            .create(f.article_id, f.alice, &request("Hey @bob, and @nobody!", None))
            .await
            .unwrap();

        let notifications = f.store.notifications_of_user(f.bob, 1, 10).await.unwrap();
        assert_that(notifications.content()).has_length(1);
        assert_that(&notifications.content()[0].kind).is_equal_to(NotificationKind::Mention);
    }

    #[tokio::test]
    async fn reactions_toggle() {
        let f = fixture().await;
        let comment = f
            .service
            .create(f.article_id, f.alice, &request("Nice", None))
            .await
            .unwrap();

        let liked = f.service.react(comment.id, f.bob, "bob", Reaction::Like).await.unwrap();
        assert_that(&liked.liked_by).is_equal_to(vec![f.bob]);

        let disliked = f
            .service
            .react(comment.id, f.bob, "bob", Reaction::Dislike)
            .await
            .unwrap();
        assert_that(&disliked.liked_by).is_empty();
        assert_that(&disliked.disliked_by).is_equal_to(vec![f.bob]);

        let cleared = f
            .service
            .react(comment.id, f.bob, "bob", Reaction::Dislike)
            .await
            .unwrap();
        assert_that(&cleared.disliked_by).is_empty();

        let notifications = f.store.notifications_of_user(f.alice, 1, 10).await.unwrap();
        assert_that(notifications.content()).has_length(1);
        assert_that(&notifications.content()[0].kind).is_equal_to(NotificationKind::Like);
    }

    #[tokio::test]
    async fn self_likes_do_not_notify() {
        let f = fixture().await;
        let comment = f
            .service
            .create(f.article_id, f.alice, &request("Mine", None))
            .await
            .unwrap();

        f.service
            .react(comment.id, f.alice, "alice", Reaction::Like)
            .await
            .unwrap();

        let unread = f.store.unread_notifications_count(f.alice).await.unwrap();
        assert_that(&unread).is_equal_to(0);
    }

    #[tokio::test]
    async fn flags_are_counted_once_per_user() {
        let f = fixture().await;
        let comment = f
            .service
            .create(f.article_id, f.alice, &request("Spam", None))
            .await
            .unwrap();

        f.service.flag(comment.id, f.bob).await.unwrap();
        let flagged = f.service.flag(comment.id, f.bob).await.unwrap();

        assert_that(&flagged.flagged_by).is_equal_to(vec![f.bob]);
        assert_that(&f.service.flagged().await.unwrap()).has_length(1);
    }

    #[tokio::test]
    async fn deletion_cascades_and_is_restricted() {
        let f = fixture().await;
        let root = f
            .service
            .create(f.article_id, f.alice, &request("Root", None))
            .await
            .unwrap();
        let reply = f
            .service
            .create(f.article_id, f.bob, &request("Reply", Some(root.id)))
            .await
            .unwrap();
        let nested = f
            .service
            .create(f.article_id, f.alice, &request("Nested", Some(reply.id)))
            .await
            .unwrap();

        let forbidden = f.service.delete(reply.id, f.alice, false).await;
        assert!(matches!(forbidden, Err(ServiceError::Forbidden(_))));

        let mut deleted = f.service.delete(reply.id, f.bob, false).await.unwrap();
        deleted.sort();
        assert_that(&deleted).is_equal_to(vec![reply.id, nested.id]);

        let root = f.store.get_comment(root.id).await.unwrap().unwrap();
        assert_that(&root.replies).is_empty();

        let admin_delete = f.service.delete(root.id, f.bob, true).await.unwrap();
        assert_that(&admin_delete).is_equal_to(vec![root.id]);
    }

    #[tokio::test]
    async fn thread_is_nested() {
        let f = fixture().await;
        let first = f
            .service
            .create(f.article_id, f.alice, &request("First", None))
            .await
            .unwrap();
        let second = f
            .service
            .create(f.article_id, f.bob, &request("Second", None))
            .await
            .unwrap();
        let reply = f
            .service
            .create(f.article_id, f.bob, &request("Reply", Some(first.id)))
            .await
            .unwrap();

        let thread = f.service.thread(f.article_id).await.unwrap();

        assert_that(&thread).has_length(2);
        assert_that(&thread[0].comment.id).is_equal_to(first.id);
        assert_that(&thread[1].comment.id).is_equal_to(second.id);
        assert_that(&thread[0].children).has_length(1);
        assert_that(&thread[0].children[0].comment.id).is_equal_to(reply.id);
    }
}
