use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::common::model::PageParameters;
use crate::routes::ApiError;
use crate::startup::ApplicationServices;

#[get("/notifications")]
#[tracing::instrument(skip(services))]
pub async fn list_notifications(
    page: web::Query<PageParameters>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let notifications = services
        .notification_service
        .list(user.id, page.get_page(), page.get_size())
        .await?;

    Ok(HttpResponse::Ok().json(notifications))
}

#[post("/notifications/{id:\\d+}/read")]
#[tracing::instrument(skip(services))]
pub async fn read_notification(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    services
        .notification_service
        .mark_read(id.into_inner(), user.id)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

#[post("/notifications/read-all")]
#[tracing::instrument(skip(services))]
pub async fn read_all_notifications(
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let updated = services.notification_service.mark_all_read(user.id).await?;

    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_notifications)
        .service(read_all_notifications)
        .service(read_notification);
}
