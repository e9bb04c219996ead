use serde::Serialize;

use crate::common::errors::ServiceError;
use crate::common::model::{Notification, PagedResult};
use crate::store::{SharedStore, Store};

/// A page of notifications, with the overall number of unread ones
#[derive(Debug, Serialize)]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: PagedResult<Notification>,
    pub unread: u64,
}

#[derive(Clone)]
pub struct NotificationService {
    store: SharedStore,
}

impl NotificationService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: i32,
        page_number: u64,
        page_size: u64,
    ) -> Result<NotificationPage, ServiceError> {
        let page = self
            .store
            .notifications_of_user(user_id, page_number, page_size)
            .await?;
        let unread = self.store.unread_notifications_count(user_id).await?;

        Ok(NotificationPage { page, unread })
    }

    /// Someone else's notification is reported as not found
    #[tracing::instrument(skip(self))]
    pub async fn mark_read(&self, id: i32, user_id: i32) -> Result<(), ServiceError> {
        if self.store.mark_notification_read(id, user_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Notification", id))
        }
    }

    /// Returns the number of notifications marked
    #[tracing::instrument(skip(self))]
    pub async fn mark_all_read(&self, user_id: i32) -> Result<u64, ServiceError> {
        Ok(self.store.mark_all_notifications_read(user_id).await?)
    }
}
