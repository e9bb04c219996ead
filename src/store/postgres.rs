use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::{Result, Store};
use crate::common::errors::StoreError;
use crate::common::model::{
    Article, ArticleFilter, Comment, NewArticle, NewComment, NewNotification, NewSummary,
    NewUser, Notification, PageParameters, PagedResult, ProfileUpdate, Reaction, Summary, User,
};
use crate::common::Pool;

const ARTICLE_COLUMNS: &str = r#"
    id, external_id, title, description, url, image_url, source_name, source_url,
    content, topic, clicks, processed, published_at, fetched_at
"#;

const SUMMARY_COLUMNS: &str = r#"
    id, article_id, kind, language, content, sentiment, created_at
"#;

const USER_COLUMNS: &str = r#"
    id, username, email, password, display_name, bio, avatar_url, role, created_at
"#;

/// Comments are always read alongside the username of their author
const SELECT_COMMENTS: &str = r#"
    SELECT comments.id,
           comments.article_id,
           comments.user_id,
           users.username,
           comments.text,
           comments.parent_id,
           comments.replies,
           comments.liked_by,
           comments.disliked_by,
           comments.flagged_by,
           comments.created_at
    FROM comments
             JOIN users ON comments.user_id = users.id
"#;

const SELECT_NOTIFICATIONS: &str = r#"
    SELECT notifications.id,
           notifications.recipient_id,
           notifications.sender_id,
           users.username AS sender_username,
           notifications.kind,
           notifications.article_id,
           notifications.comment_id,
           notifications.message,
           notifications.read,
           notifications.created_at
    FROM notifications
             LEFT JOIN users ON notifications.sender_id = users.id
"#;

/// Postgres backed store
#[derive(Clone)]
pub struct PgStore {
    db: Pool,
}

impl PgStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }

    async fn comment_by_id(&self, id: i32) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "{SELECT_COMMENTS} WHERE comments.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(comment)
    }
}

fn add_article_filters(query: &mut QueryBuilder<Postgres>, filter: &ArticleFilter) {
    if let Some(topic) = &filter.topic {
        query.push(" AND topic = ");
        query.push_bind(topic.clone());
    }

    if let Some(search) = &filter.query {
        query.push(" AND title ILIKE ");
        query.push_bind(format!("%{}%", search.trim()));
    }
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn article_exists(&self, external_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM articles WHERE external_id = $1)",
        )
        .bind(external_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self, article), fields(external_id = %article.external_id))]
    async fn insert_article(&self, article: &NewArticle) -> Result<Option<Article>> {
        let inserted = sqlx::query_as::<_, Article>(&format!(
            r#"
            INSERT INTO articles (external_id, title, description, url, image_url, source_name,
                                  source_url, content, topic, published_at, fetched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {ARTICLE_COLUMNS}
            "#
        ))
        .bind(&article.external_id)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.url)
        .bind(&article.image_url)
        .bind(&article.source_name)
        .bind(&article.source_url)
        .bind(&article.content)
        .bind(&article.topic)
        .bind(article.published_at)
        .bind(article.fetched_at)
        .fetch_optional(&self.db)
        .await?;

        Ok(inserted)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_article(&self, id: i32) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(article)
    }

    #[tracing::instrument(skip(self))]
    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Article>> {
        let parameters = PageParameters::new(page_number, page_size);

        let mut page_query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE TRUE"
        ));
        add_article_filters(&mut page_query, filter);
        page_query.push(" ORDER BY published_at DESC NULLS LAST, id DESC");
        page_query.push(" LIMIT ");
        page_query.push_bind(page_size as i64);
        page_query.push(" OFFSET ");
        page_query.push_bind(parameters.offset() as i64);

        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles WHERE TRUE");
        add_article_filters(&mut count_query, filter);

        let content = page_query
            .build_query_as::<Article>()
            .fetch_all(&self.db)
            .await?;
        let total_items = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await? as u64;

        Ok(PagedResult::new(
            content,
            total_items,
            page_size,
            page_number,
        ))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn trending_articles(&self, limit: u64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY clicks DESC, id DESC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(articles)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn increment_clicks(&self, id: i32) -> Result<Option<i64>> {
        let clicks = sqlx::query_scalar::<_, i64>(
            "UPDATE articles SET clicks = clicks + 1 WHERE id = $1 RETURNING clicks",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(clicks)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn mark_processed(&self, id: i32) -> Result<()> {
        sqlx::query("UPDATE articles SET processed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, summary), fields(kind = summary.kind.as_str()))]
    async fn insert_summary(&self, article_id: i32, summary: &NewSummary) -> Result<Summary> {
        let summary = sqlx::query_as::<_, Summary>(&format!(
            r#"
            INSERT INTO summaries (article_id, kind, language, content, sentiment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SUMMARY_COLUMNS}
            "#
        ))
        .bind(article_id)
        .bind(summary.kind)
        .bind(&summary.language)
        .bind(&summary.content)
        .bind(summary.sentiment)
        .fetch_one(&self.db)
        .await?;

        Ok(summary)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn summaries_of_article(&self, article_id: i32) -> Result<Vec<Summary>> {
        let summaries = sqlx::query_as::<_, Summary>(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM summaries WHERE article_id = $1 ORDER BY id"
        ))
        .bind(article_id)
        .fetch_all(&self.db)
        .await?;

        Ok(summaries)
    }

    #[tracing::instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password, display_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.display_name)
        .bind(user.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| StoreError::from_insert(e, "Username or email already taken"))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn user_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn user_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1"
        ))
        .bind(login)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, update))]
    async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                bio          = COALESCE($3, bio),
                avatar_url   = COALESCE($4, avatar_url)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.display_name)
        .bind(&update.bio)
        .bind(&update.avatar_url)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, comment), fields(article_id = comment.article_id))]
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut transaction = self.db.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO comments (article_id, user_id, text, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(comment.article_id)
        .bind(comment.user_id)
        .bind(&comment.text)
        .bind(comment.parent_id)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|e| StoreError::from_insert(e, "This comment was already posted"))?;

        if let Some(parent_id) = comment.parent_id {
            sqlx::query("UPDATE comments SET replies = array_append(replies, $1) WHERE id = $2")
                .bind(id)
                .bind(parent_id)
                .execute(&mut *transaction)
                .await?;
        }

        let inserted = sqlx::query_as::<_, Comment>(&format!(
            "{SELECT_COMMENTS} WHERE comments.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(inserted)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_comment(&self, id: i32) -> Result<Option<Comment>> {
        self.comment_by_id(id).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn comments_of_article(&self, article_id: i32) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{SELECT_COMMENTS} WHERE comments.article_id = $1 ORDER BY comments.created_at, comments.id"
        ))
        .bind(article_id)
        .fetch_all(&self.db)
        .await?;

        Ok(comments)
    }

    #[tracing::instrument(skip(self))]
    async fn set_reaction(
        &self,
        comment_id: i32,
        user_id: i32,
        reaction: Option<Reaction>,
    ) -> Result<Option<Comment>> {
        let reaction = reaction.map(|r| match r {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
        });

        let updated = sqlx::query(
            r#"
            UPDATE comments
            SET liked_by    = CASE
                                  WHEN $3::TEXT = 'like' THEN array_append(array_remove(liked_by, $2), $2)
                                  ELSE array_remove(liked_by, $2) END,
                disliked_by = CASE
                                  WHEN $3::TEXT = 'dislike' THEN array_append(array_remove(disliked_by, $2), $2)
                                  ELSE array_remove(disliked_by, $2) END
            WHERE id = $1
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(reaction)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.comment_by_id(comment_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn flag_comment(&self, comment_id: i32, user_id: i32) -> Result<Option<Comment>> {
        let updated = sqlx::query(
            r#"
            UPDATE comments
            SET flagged_by = CASE WHEN $2 = ANY (flagged_by) THEN flagged_by
                                  ELSE array_append(flagged_by, $2) END
            WHERE id = $1
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.comment_by_id(comment_id).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn flagged_comments(&self) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{SELECT_COMMENTS} WHERE cardinality(comments.flagged_by) > 0 ORDER BY comments.id"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(comments)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_comment_tree(&self, comment_id: i32) -> Result<Vec<i32>> {
        let mut transaction = self.db.begin().await?;

        let parent_id = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT parent_id FROM comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&mut *transaction)
        .await?;

        let Some(parent_id) = parent_id else {
            return Ok(vec![]);
        };

        if let Some(parent_id) = parent_id {
            sqlx::query("UPDATE comments SET replies = array_remove(replies, $1) WHERE id = $2")
                .bind(comment_id)
                .bind(parent_id)
                .execute(&mut *transaction)
                .await?;
        }

        let deleted = sqlx::query_scalar::<_, i32>(
            r#"
            WITH RECURSIVE tree AS (
                SELECT id FROM comments WHERE id = $1
                UNION ALL
                SELECT comments.id FROM comments JOIN tree ON comments.parent_id = tree.id
            )
            DELETE FROM comments WHERE id IN (SELECT id FROM tree)
            RETURNING id
            "#,
        )
        .bind(comment_id)
        .fetch_all(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(deleted)
    }

    #[tracing::instrument(skip(self, notification), fields(recipient_id = notification.recipient_id))]
    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO notifications (recipient_id, sender_id, kind, article_id, comment_id, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(notification.recipient_id)
        .bind(notification.sender_id)
        .bind(notification.kind)
        .bind(notification.article_id)
        .bind(notification.comment_id)
        .bind(&notification.message)
        .fetch_one(&self.db)
        .await?;

        let inserted = sqlx::query_as::<_, Notification>(&format!(
            "{SELECT_NOTIFICATIONS} WHERE notifications.id = $1"
        ))
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        Ok(inserted)
    }

    #[tracing::instrument(skip(self))]
    async fn notifications_of_user(
        &self,
        user_id: i32,
        page_number: u64,
        page_size: u64,
    ) -> Result<PagedResult<Notification>> {
        let parameters = PageParameters::new(page_number, page_size);

        let content = sqlx::query_as::<_, Notification>(&format!(
            r#"
            {SELECT_NOTIFICATIONS}
            WHERE notifications.recipient_id = $1
            ORDER BY notifications.created_at DESC, notifications.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page_size as i64)
        .bind(parameters.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        let total_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await? as u64;

        Ok(PagedResult::new(
            content,
            total_items,
            page_size,
            page_number,
        ))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn unread_notifications_count(&self, user_id: i32) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT read",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count as u64)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_notification_read(&self, id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND recipient_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_all_notifications_read(&self, user_id: i32) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND NOT read",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
