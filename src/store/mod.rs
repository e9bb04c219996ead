//! Persistence of the newsroom data.
//!
//! The [`Store`] trait holds every operation the services need. Two
//! backends implement it: [`PgStore`] on top of Postgres, and
//! [`MemoryStore`] used by the tests and the `STORE=memory` mode.
//!
//! Uniqueness rules (article external id, comment composite key, user
//! name and email) are enforced by the backends, not by the services.

use std::sync::Arc;

use async_trait::async_trait;

use crate::common::errors::StoreError;
use crate::common::model::{
    Article, ArticleFilter, Comment, NewArticle, NewComment, NewNotification, NewSummary,
    NewUser, Notification, PagedResult, ProfileUpdate, Reaction, Summary, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Shared handle on a store backend
pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether an article with this external id was already ingested
    async fn article_exists(&self, external_id: &str) -> Result<bool>;

    /// Insert an article. Returns `None` when its external id is already known.
    async fn insert_article(&self, article: &NewArticle) -> Result<Option<Article>>;

    async fn get_article(&self, id: i32) -> Result<Option<Article>>;

    /// Newest articles first
    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Article>>;

    /// Most clicked articles first
    async fn trending_articles(&self, limit: u64) -> Result<Vec<Article>>;

    /// Atomically add one to the click count. Returns the new count, `None` for an unknown article.
    async fn increment_clicks(&self, id: i32) -> Result<Option<i64>>;

    async fn mark_processed(&self, id: i32) -> Result<()>;

    async fn insert_summary(&self, article_id: i32, summary: &NewSummary) -> Result<Summary>;

    /// Summaries of an article, oldest first
    async fn summaries_of_article(&self, article_id: i32) -> Result<Vec<Summary>>;

    /// Insert a user. Fails with [`StoreError::Conflict`] on a known username or email.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn user_by_id(&self, id: i32) -> Result<Option<User>>;

    /// Find a user by username or email
    async fn user_by_login(&self, login: &str) -> Result<Option<User>>;

    async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<Option<User>>;

    /// Insert a comment and register it in its parent's replies.
    /// Fails with [`StoreError::Conflict`] when the same author already posted
    /// the same text under the same article and parent.
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment>;

    async fn get_comment(&self, id: i32) -> Result<Option<Comment>>;

    /// Every comment of an article, oldest first
    async fn comments_of_article(&self, article_id: i32) -> Result<Vec<Comment>>;

    /// Set the reaction of a user on a comment, `None` clearing it
    async fn set_reaction(
        &self,
        comment_id: i32,
        user_id: i32,
        reaction: Option<Reaction>,
    ) -> Result<Option<Comment>>;

    /// Record a flag, at most once per user
    async fn flag_comment(&self, comment_id: i32, user_id: i32) -> Result<Option<Comment>>;

    async fn flagged_comments(&self) -> Result<Vec<Comment>>;

    /// Delete a comment with all its descendants, and unlink it from its parent.
    /// Returns the ids of the deleted comments.
    async fn delete_comment_tree(&self, comment_id: i32) -> Result<Vec<i32>>;

    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification>;

    /// Notifications of a user, newest first
    async fn notifications_of_user(
        &self,
        user_id: i32,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Notification>>;

    async fn unread_notifications_count(&self, user_id: i32) -> Result<u64>;

    /// Mark a notification as read. Returns `false` when it does not belong to the user.
    async fn mark_notification_read(&self, id: i32, user_id: i32) -> Result<bool>;

    async fn mark_all_notifications_read(&self, user_id: i32) -> Result<u64>;
}
