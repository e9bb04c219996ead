use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Label used both to query the news API and to classify stored articles
pub type Topic = String;

/// A news article, as ingested from the news API
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: i32,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub content: Option<String>,
    pub topic: Topic,
    pub clicks: i64,
    pub processed: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    /// Text the summaries are built from: the body, or the description when the body is empty
    pub fn text(&self) -> &str {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => content,
            _ => self.description.as_deref().unwrap_or_default(),
        }
    }
}

/// Article to be inserted in the store
#[derive(Debug, Clone, Serialize)]
pub struct NewArticle {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub content: Option<String>,
    pub topic: Topic,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// An article alongside its derived summaries
#[derive(Debug, Serialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: Article,
    pub summaries: Vec<Summary>,
}

#[derive(sqlx::Type, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[sqlx(type_name = "summary_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Tldr,
    Bullets,
    Eli5,
    Translation,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Tldr => "tldr",
            SummaryKind::Bullets => "bullets",
            SummaryKind::Eli5 => "eli5",
            SummaryKind::Translation => "translation",
        }
    }
}

#[derive(sqlx::Type, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[sqlx(type_name = "sentiment_label", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Read a sentiment label out of a free-form model answer
    pub fn from_answer(answer: &str) -> Option<Self> {
        let answer = answer.to_lowercase();
        answer
            .split(|c: char| !c.is_alphabetic())
            .find_map(|word| match word {
                "positive" => Some(Sentiment::Positive),
                "neutral" => Some(Sentiment::Neutral),
                "negative" => Some(Sentiment::Negative),
                _ => None,
            })
    }
}

/// Text artefact derived from an article by a language model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub id: i32,
    pub article_id: i32,
    pub kind: SummaryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub content: String,
    pub sentiment: Option<Sentiment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSummary {
    pub kind: SummaryKind,
    pub language: Option<String>,
    pub content: String,
    pub sentiment: Option<Sentiment>,
}

#[derive(sqlx::Type, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Basic,
}

/// A newsroom user
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip)] // Never ever serialize this field
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// User to be inserted, the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub role: UserRole,
}

/// Profile fields a user may change. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// A comment on an article, possibly answering another one
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i32,
    pub article_id: i32,
    pub user_id: i32,
    pub username: String,
    pub text: String,
    pub parent_id: Option<i32>,
    pub replies: Vec<i32>,
    pub liked_by: Vec<i32>,
    pub disliked_by: Vec<i32>,
    pub flagged_by: Vec<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: i32,
    pub user_id: i32,
    pub text: String,
    pub parent_id: Option<i32>,
}

/// A comment with its replies, recursively
#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Dislike,
}

#[derive(sqlx::Type, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reply,
    Like,
    Mention,
    System,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i32,
    pub recipient_id: i32,
    pub sender_id: Option<i32>,
    pub sender_username: Option<String>,
    pub kind: NotificationKind,
    pub article_id: Option<i32>,
    pub comment_id: Option<i32>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i32,
    pub sender_id: Option<i32>,
    pub kind: NotificationKind,
    pub article_id: Option<i32>,
    pub comment_id: Option<i32>,
    pub message: String,
}

/// Criteria for article listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleFilter {
    pub topic: Option<Topic>,
    #[serde(rename = "q")]
    pub query: Option<String>,
}

/// Page of elements
#[derive(Debug, Serialize)]
pub struct PagedResult<T> {
    /// Actual content.
    content: Vec<T>,
    /// Number of the page.
    page_number: u64,
    /// Desired size of the page.
    page_size: u64,
    /// Total number of pages.
    total_pages: u64,
    /// Number of elements returned.
    elements_number: usize,
    /// Total number of elements.
    total_items: u64,
}

impl<T> PagedResult<T>
where
    T: Serialize + Debug,
{
    /// Build a Page from a vector, a number of total element matching a query, the page size and page number
    pub fn new(source: Vec<T>, total_items: u64, page_size: u64, page_number: u64) -> Self {
        let content: Vec<T> = source.into_iter().take(page_size as usize).collect();
        let elements_number = content.len();
        let total_pages = (total_items as f64 / page_size.max(1) as f64).ceil() as u64;

        PagedResult {
            content,
            page_number,
            page_size,
            total_pages,
            elements_number,
            total_items,
        }
    }

    pub fn content(&self) -> &Vec<T> {
        &self.content
    }

    pub fn page_number(&self) -> &u64 {
        &self.page_number
    }

    pub fn page_size(&self) -> &u64 {
        &self.page_size
    }

    pub fn total_pages(&self) -> &u64 {
        &self.total_pages
    }

    pub fn elements_number(&self) -> &usize {
        &self.elements_number
    }

    pub fn total_items(&self) -> &u64 {
        &self.total_items
    }
}

/// Pagination query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParameters {
    page: Option<u64>,
    size: Option<u64>,
}

impl PageParameters {
    pub const DEFAULT_SIZE: u64 = 20;
    pub const MAX_SIZE: u64 = 100;
    /// Keeps offsets within what an `i64` holds
    pub const MAX_PAGE: u64 = i64::MAX as u64 / Self::MAX_SIZE;

    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
        }
    }

    /// Page number, starting at 1
    pub fn get_page(&self) -> u64 {
        self.page.unwrap_or(1).clamp(1, Self::MAX_PAGE)
    }

    pub fn get_size(&self) -> u64 {
        self.size
            .unwrap_or(Self::DEFAULT_SIZE)
            .clamp(1, Self::MAX_SIZE)
    }

    pub fn offset(&self) -> u64 {
        (self.get_page() - 1).saturating_mul(self.get_size())
    }
}
