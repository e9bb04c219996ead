use actix_web::{delete, get, post, web, HttpResponse};
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::common::model::Reaction;
use crate::routes::ApiError;
use crate::services::comments::CommentRequest;
use crate::startup::ApplicationServices;

#[post("/news/{id:\\d+}/comments")]
#[tracing::instrument(skip(services, request))]
pub async fn create_comment(
    id: web::Path<i32>,
    request: web::Json<CommentRequest>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let comment = services
        .comment_service
        .create(id.into_inner(), user.id, &request)
        .await?;

    Ok(HttpResponse::Created().json(comment))
}

#[get("/news/{id:\\d+}/comments")]
#[tracing::instrument(skip(services))]
pub async fn list_comments(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    let thread = services.comment_service.thread(id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(thread))
}

#[post("/comments/{id:\\d+}/like")]
#[tracing::instrument(skip(services))]
pub async fn like_comment(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    react(id.into_inner(), &services, &user, Reaction::Like).await
}

#[post("/comments/{id:\\d+}/dislike")]
#[tracing::instrument(skip(services))]
pub async fn dislike_comment(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    react(id.into_inner(), &services, &user, Reaction::Dislike).await
}

async fn react(
    id: i32,
    services: &ApplicationServices,
    user: &AuthenticatedUser,
    reaction: Reaction,
) -> Result<HttpResponse, ApiError> {
    let comment = services
        .comment_service
        .react(id, user.id, &user.login, reaction)
        .await?;

    Ok(HttpResponse::Ok().json(comment))
}

#[post("/comments/{id:\\d+}/flag")]
#[tracing::instrument(skip(services))]
pub async fn flag_comment(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let comment = services
        .comment_service
        .flag(id.into_inner(), user.id)
        .await?;

    Ok(HttpResponse::Ok().json(comment))
}

#[get("/comments/flagged")]
#[tracing::instrument(skip(services))]
pub async fn flagged_comments(
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let comments = services.comment_service.flagged().await?;

    Ok(HttpResponse::Ok().json(comments))
}

#[delete("/comments/{id:\\d+}")]
#[tracing::instrument(skip(services))]
pub async fn delete_comment(
    id: web::Path<i32>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let deleted = services
        .comment_service
        .delete(id.into_inner(), user.id, user.is_admin())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_comment)
        .service(list_comments)
        .service(flagged_comments)
        .service(like_comment)
        .service(dislike_comment)
        .service(flag_comment)
        .service(delete_comment);
}
