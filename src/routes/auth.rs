use actix_web::{get, patch, post, web, HttpResponse};
use secrecy::Secret;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AuthenticatedUser, AuthenticationError};
use crate::common::model::ProfileUpdate;
use crate::routes::ApiError;
use crate::services::users::RegisterRequest;
use crate::startup::ApplicationServices;

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    login: String,
    password: Secret<String>,
}

#[post("/auth/register")]
#[tracing::instrument(skip(services, request), fields(username = %request.username))]
pub async fn register(
    request: web::Json<RegisterRequest>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    if !services.allow_account_creation {
        tracing::debug!("Account creation attempt while it's disabled");
        return Err(AuthenticationError::Forbidden("Account creation is disabled".into()).into());
    }

    let user = services.user_service.register(&request).await?;
    let token = services.tokens.sign(&user)?;

    Ok(HttpResponse::Created().json(json!({"token": token, "user": user})))
}

#[post("/auth/login")]
#[tracing::instrument(skip(services, login), fields(login = %login.login), level = "debug")]
pub async fn login(
    login: web::Json<LoginRequest>,
    services: web::Data<ApplicationServices>,
) -> Result<HttpResponse, ApiError> {
    let user = services
        .user_service
        .authenticate(&login.login, &login.password)
        .await?
        .ok_or_else(|| AuthenticationError::Unauthorized("Invalid credentials".into()))?;
    let token = services.tokens.sign(&user)?;

    Ok(HttpResponse::Ok().json(json!({"token": token, "user": user})))
}

#[get("/auth/profile")]
#[tracing::instrument(skip(services))]
pub async fn get_profile(
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let profile = services.user_service.get_user(user.id).await?;

    Ok(HttpResponse::Ok().json(profile))
}

#[patch("/auth/profile")]
#[tracing::instrument(skip(services))]
pub async fn update_profile(
    update: web::Json<ProfileUpdate>,
    services: web::Data<ApplicationServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let profile = services
        .user_service
        .update_profile(user.id, &update)
        .await?;

    Ok(HttpResponse::Ok().json(profile))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(get_profile)
        .service(update_profile);
}
