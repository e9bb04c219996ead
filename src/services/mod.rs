pub mod comments;
pub mod enrichment;
pub mod events;
pub mod ingestion;
pub mod news;
pub mod notifications;
pub mod users;
