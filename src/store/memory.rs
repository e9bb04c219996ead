use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Result, Store};
use crate::common::errors::StoreError;
use crate::common::model::{
    Article, ArticleFilter, Comment, NewArticle, NewComment, NewNotification, NewSummary,
    NewUser, Notification, PagedResult, PageParameters, ProfileUpdate, Reaction, Summary, User,
};

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    articles: Vec<Article>,
    summaries: Vec<Summary>,
    users: Vec<User>,
    comments: Vec<Comment>,
    notifications: Vec<Notification>,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn username(&self, user_id: i32) -> Option<String> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
    }

    fn comment_mut(&mut self, id: i32) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }
}

/// Store keeping everything in process memory. Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: serde::Serialize + std::fmt::Debug + Clone>(
    items: Vec<T>,
    page_number: u64,
    page_size: u64,
) -> PagedResult<T> {
    let parameters = PageParameters::new(page_number, page_size);
    let total_items = items.len() as u64;
    let content = items
        .into_iter()
        .skip(parameters.offset() as usize)
        .collect::<Vec<_>>();

    PagedResult::new(content, total_items, page_size, page_number)
}

#[async_trait]
impl Store for MemoryStore {
    async fn article_exists(&self, external_id: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.articles.iter().any(|a| a.external_id == external_id))
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<Option<Article>> {
        let mut state = self.state.write().await;
        if state
            .articles
            .iter()
            .any(|a| a.external_id == article.external_id)
        {
            return Ok(None);
        }

        let article = Article {
            id: state.next_id(),
            external_id: article.external_id.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            url: article.url.clone(),
            image_url: article.image_url.clone(),
            source_name: article.source_name.clone(),
            source_url: article.source_url.clone(),
            content: article.content.clone(),
            topic: article.topic.clone(),
            clicks: 0,
            processed: false,
            published_at: article.published_at,
            fetched_at: article.fetched_at,
        };
        state.articles.push(article.clone());

        Ok(Some(article))
    }

    async fn get_article(&self, id: i32) -> Result<Option<Article>> {
        let state = self.state.read().await;
        Ok(state.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Article>> {
        let state = self.state.read().await;
        let query = filter.query.as_ref().map(|q| q.to_lowercase());

        let mut articles = state
            .articles
            .iter()
            .filter(|a| filter.topic.as_ref().map_or(true, |t| &a.topic == t))
            .filter(|a| {
                query
                    .as_ref()
                    .map_or(true, |q| a.title.to_lowercase().contains(q))
            })
            .cloned()
            .collect::<Vec<_>>();
        articles.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(page(articles, page_number, page_size))
    }

    async fn trending_articles(&self, limit: u64) -> Result<Vec<Article>> {
        let state = self.state.read().await;
        let mut articles = state.articles.clone();
        articles.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| b.id.cmp(&a.id)));
        articles.truncate(limit as usize);

        Ok(articles)
    }

    async fn increment_clicks(&self, id: i32) -> Result<Option<i64>> {
        let mut state = self.state.write().await;
        Ok(state.articles.iter_mut().find(|a| a.id == id).map(|a| {
            a.clicks += 1;
            a.clicks
        }))
    }

    async fn mark_processed(&self, id: i32) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(article) = state.articles.iter_mut().find(|a| a.id == id) {
            article.processed = true;
        }
        Ok(())
    }

    async fn insert_summary(&self, article_id: i32, summary: &NewSummary) -> Result<Summary> {
        let mut state = self.state.write().await;
        let summary = Summary {
            id: state.next_id(),
            article_id,
            kind: summary.kind,
            language: summary.language.clone(),
            content: summary.content.clone(),
            sentiment: summary.sentiment,
            created_at: Utc::now(),
        };
        state.summaries.push(summary.clone());

        Ok(summary)
    }

    async fn summaries_of_article(&self, article_id: i32) -> Result<Vec<Summary>> {
        let state = self.state.read().await;
        Ok(state
            .summaries
            .iter()
            .filter(|s| s.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict(String::from(
                "Username or email already taken",
            )));
        }

        let user = User {
            id: state.next_id(),
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            display_name: user.display_name.clone(),
            bio: None,
            avatar_url: None,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());

        Ok(user)
    }

    async fn user_by_id(&self, id: i32) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_login(&self, login: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.users.iter_mut().find(|u| u.id == id).map(|user| {
            if let Some(display_name) = &update.display_name {
                user.display_name = Some(display_name.clone());
            }
            if let Some(bio) = &update.bio {
                user.bio = Some(bio.clone());
            }
            if let Some(avatar_url) = &update.avatar_url {
                user.avatar_url = Some(avatar_url.clone());
            }
            user.clone()
        }))
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut state = self.state.write().await;
        let duplicate = state.comments.iter().any(|c| {
            c.user_id == comment.user_id
                && c.article_id == comment.article_id
                && c.text == comment.text
                && c.parent_id == comment.parent_id
        });
        if duplicate {
            return Err(StoreError::Conflict(String::from(
                "This comment was already posted",
            )));
        }

        let username = state.username(comment.user_id).unwrap_or_default();
        let comment = Comment {
            id: state.next_id(),
            article_id: comment.article_id,
            user_id: comment.user_id,
            username,
            text: comment.text.clone(),
            parent_id: comment.parent_id,
            replies: vec![],
            liked_by: vec![],
            disliked_by: vec![],
            flagged_by: vec![],
            created_at: Utc::now(),
        };

        if let Some(parent) = comment.parent_id.and_then(|id| state.comment_mut(id)) {
            parent.replies.push(comment.id);
        }
        state.comments.push(comment.clone());

        Ok(comment)
    }

    async fn get_comment(&self, id: i32) -> Result<Option<Comment>> {
        let state = self.state.read().await;
        Ok(state.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn comments_of_article(&self, article_id: i32) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn set_reaction(
        &self,
        comment_id: i32,
        user_id: i32,
        reaction: Option<Reaction>,
    ) -> Result<Option<Comment>> {
        let mut state = self.state.write().await;
        Ok(state.comment_mut(comment_id).map(|comment| {
            comment.liked_by.retain(|id| *id != user_id);
            comment.disliked_by.retain(|id| *id != user_id);
            match reaction {
                Some(Reaction::Like) => comment.liked_by.push(user_id),
                Some(Reaction::Dislike) => comment.disliked_by.push(user_id),
                None => {}
            }
            comment.clone()
        }))
    }

    async fn flag_comment(&self, comment_id: i32, user_id: i32) -> Result<Option<Comment>> {
        let mut state = self.state.write().await;
        Ok(state.comment_mut(comment_id).map(|comment| {
            if !comment.flagged_by.contains(&user_id) {
                comment.flagged_by.push(user_id);
            }
            comment.clone()
        }))
    }

    async fn flagged_comments(&self) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| !c.flagged_by.is_empty())
            .cloned()
            .collect())
    }

    async fn delete_comment_tree(&self, comment_id: i32) -> Result<Vec<i32>> {
        let mut state = self.state.write().await;
        let Some(parent_id) = state
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| c.parent_id)
        else {
            return Ok(vec![]);
        };

        let mut doomed = vec![comment_id];
        let mut index = 0;
        while index < doomed.len() {
            let current = doomed[index];
            doomed.extend(
                state
                    .comments
                    .iter()
                    .filter(|c| c.parent_id == Some(current))
                    .map(|c| c.id),
            );
            index += 1;
        }

        let doomed_set = doomed.iter().copied().collect::<HashSet<_>>();
        state.comments.retain(|c| !doomed_set.contains(&c.id));
        state
            .notifications
            .retain(|n| n.comment_id.map_or(true, |id| !doomed_set.contains(&id)));
        if let Some(parent) = parent_id.and_then(|id| state.comment_mut(id)) {
            parent.replies.retain(|id| *id != comment_id);
        }

        Ok(doomed)
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification> {
        let mut state = self.state.write().await;
        let sender_username = notification.sender_id.and_then(|id| state.username(id));
        let notification = Notification {
            id: state.next_id(),
            recipient_id: notification.recipient_id,
            sender_id: notification.sender_id,
            sender_username,
            kind: notification.kind,
            article_id: notification.article_id,
            comment_id: notification.comment_id,
            message: notification.message.clone(),
            read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());

        Ok(notification)
    }

    async fn notifications_of_user(
        &self,
        user_id: i32,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Notification>> {
        let state = self.state.read().await;
        let notifications = state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect::<Vec<_>>();

        Ok(page(notifications, page_number, page_size))
    }

    async fn unread_notifications_count(&self, user_id: i32) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.read)
            .count() as u64)
    }

    async fn mark_notification_read(&self, id: i32, user_id: i32) -> Result<bool> {
        let mut state = self.state.write().await;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == user_id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: i32) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == user_id && !n.read)
        {
            notification.read = true;
            updated += 1;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use speculoos::prelude::*;

    use super::*;
    use crate::common::model::UserRole;

    fn new_article(external_id: &str) -> NewArticle {
        NewArticle {
            external_id: external_id.to_owned(),
            title: format!("Article {external_id}"),
            description: None,
            url: format!("https://news.example/{external_id}"),
            image_url: None,
            source_name: Some("Example".into()),
            source_url: None,
            content: Some("Some content".into()),
            topic: "world".into(),
            published_at: Some(Utc::now()),
            fetched_at: Utc::now(),
        }
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(&NewUser {
                username: name.to_owned(),
                email: format!("{name}@example.com"),
                password: String::from("hash"),
                display_name: None,
                role: UserRole::Basic,
            })
            .await
            .unwrap()
    }

    fn reply(article_id: i32, user_id: i32, text: &str, parent_id: Option<i32>) -> NewComment {
        NewComment {
            article_id,
            user_id,
            text: text.to_owned(),
            parent_id,
        }
    }

    #[tokio::test]
    async fn article_external_id_is_unique() {
        let store = MemoryStore::new();

        let first = store.insert_article(&new_article("a")).await.unwrap();
        let second = store.insert_article(&new_article("a")).await.unwrap();

        assert_that(&first).is_some();
        assert_that(&second).is_none();
        assert!(store.article_exists("a").await.unwrap());
        assert!(!store.article_exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_descendants_and_unlinks_parent() {
        let store = MemoryStore::new();
        let article = store.insert_article(&new_article("a")).await.unwrap().unwrap();
        let alice = user(&store, "alice").await;

        let root = store
            .insert_comment(&reply(article.id, alice.id, "root", None))
            .await
            .unwrap();
        let child = store
            .insert_comment(&reply(article.id, alice.id, "child", Some(root.id)))
            .await
            .unwrap();
        let grand_child = store
            .insert_comment(&reply(article.id, alice.id, "grand child", Some(child.id)))
            .await
            .unwrap();
        let sibling = store
            .insert_comment(&reply(article.id, alice.id, "sibling", Some(root.id)))
            .await
            .unwrap();

        let mut deleted = store.delete_comment_tree(child.id).await.unwrap();
        deleted.sort();

        assert_that(&deleted).is_equal_to(vec![child.id, grand_child.id]);
        let root = store.get_comment(root.id).await.unwrap().unwrap();
        assert_that(&root.replies).is_equal_to(vec![sibling.id]);
        assert_that(&store.get_comment(grand_child.id).await.unwrap()).is_none();
    }

    #[tokio::test]
    async fn reactions_are_exclusive() {
        let store = MemoryStore::new();
        let article = store.insert_article(&new_article("a")).await.unwrap().unwrap();
        let alice = user(&store, "alice").await;
        let comment = store
            .insert_comment(&reply(article.id, alice.id, "hello", None))
            .await
            .unwrap();

        let liked = store
            .set_reaction(comment.id, 42, Some(Reaction::Like))
            .await
            .unwrap()
            .unwrap();
        assert_that(&liked.liked_by).is_equal_to(vec![42]);

        let disliked = store
            .set_reaction(comment.id, 42, Some(Reaction::Dislike))
            .await
            .unwrap()
            .unwrap();
        assert_that(&disliked.liked_by).is_empty();
        assert_that(&disliked.disliked_by).is_equal_to(vec![42]);
    }

    #[tokio::test]
    async fn notifications_are_paged_newest_first() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;

        for i in 0..3 {
            store
                .insert_notification(&NewNotification {
                    recipient_id: alice.id,
                    sender_id: None,
                    kind: crate::common::model::NotificationKind::System,
                    article_id: None,
                    comment_id: None,
                    message: format!("message {i}"),
                })
                .await
                .unwrap();
        }

        let page = store.notifications_of_user(alice.id, 1, 2).await.unwrap();
        assert_that(page.content()).has_length(2);
        assert_that(&page.content()[0].message.as_str()).is_equal_to("message 2");
        assert_that(&*page.total_items()).is_equal_to(3);
        assert_that(&store.unread_notifications_count(alice.id).await.unwrap()).is_equal_to(3);
    }
}
