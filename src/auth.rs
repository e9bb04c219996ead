use std::future::Future;
use std::pin::Pin;

use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{dev, FromRequest, HttpRequest, HttpResponse, ResponseError};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use http_auth_basic::Credentials;
use jwt::{SignWithKey, VerifyWithKey};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;

use crate::common::model::{User, UserRole};
use crate::startup::ApplicationServices;

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid JWT")]
    InvalidJwt(#[from] jwt::Error),
    #[error("JWT Token is expired. Please renew it")]
    ExpiredToken,
    #[error("Unsupported authentication scheme, Only Basic HTTP and JWT Bearer are supported")]
    UnknownAuthScheme,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResponseError for AuthenticationError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthenticationError::Unauthorized(_)
            | AuthenticationError::InvalidJwt(_)
            | AuthenticationError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AuthenticationError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthenticationError::UnknownAuthScheme => StatusCode::BAD_REQUEST,
            AuthenticationError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let detail = match self {
            AuthenticationError::Other(e) => {
                tracing::error!("Authentication failure: {:?}", e);
                String::from("Unexpected error")
            }
            e => e.to_string(),
        };

        HttpResponse::build(status).json(json!({
            "type": "/problem/authentication",
            "title": "Authentication error",
            "status": status.as_u16(),
            "detail": detail
        }))
    }
}

/// # Represent an authenticated user, from JWT or HTTP Basic Auth
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub login: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn from_user(user: &User) -> Self {
        AuthenticatedUser {
            id: user.id,
            login: user.username.clone(),
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Fail with a 403 unless the user is an admin
    pub fn require_admin(&self) -> Result<(), AuthenticationError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthenticationError::Forbidden(String::from(
                "Admin role required",
            )))
        }
    }
}

/// # JWT claims
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    user: AuthenticatedUser,
    exp: i64,
}

/// Signs and verifies the HS256 JWTs
#[derive(Clone)]
pub struct TokenSigner {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl TokenSigner {
    pub fn new(secret: &Secret<String>, lifetime_minutes: i64) -> anyhow::Result<Self> {
        let key = Hmac::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid JWT secret: {e}"))?;

        Ok(Self {
            key,
            lifetime: Duration::minutes(lifetime_minutes),
        })
    }

    /// # Generate a JWT for the given user
    pub fn sign(&self, user: &User) -> Result<String, AuthenticationError> {
        let claims = Claims {
            user: AuthenticatedUser::from_user(user),
            exp: (Utc::now() + self.lifetime).timestamp(),
        };

        Ok(claims.sign_with_key(&self.key)?)
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthenticationError> {
        let claims: Claims = token.verify_with_key(&self.key)?;

        if claims.exp < Utc::now().timestamp() {
            return Err(AuthenticationError::ExpiredToken);
        }
        Ok(claims.user)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AuthenticationError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    #[tracing::instrument(skip_all, level = "trace")]
    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { extract_authenticated_user(&req).await })
    }
}

/// # Extract the authenticated user from the request
async fn extract_authenticated_user(
    req: &HttpRequest,
) -> Result<AuthenticatedUser, AuthenticationError> {
    let services = req
        .app_data::<Data<ApplicationServices>>()
        .ok_or_else(|| anyhow::anyhow!("Application services are not registered"))?;
    let header_value = extract_value_authentication_header(req.headers())?;

    let mut split_header = header_value.split_whitespace();
    let (Some(scheme), Some(value)) = (split_header.next(), split_header.next()) else {
        return Err(AuthenticationError::Unauthorized(
            "Invalid Authorization header value".into(),
        ));
    };

    match scheme.to_ascii_lowercase().as_str() {
        "bearer" => services.tokens.verify(value),
        "basic" => {
            let (login, password) = extract_credentials_from_http_basic(header_value)?;
            let user = services
                .user_service
                .authenticate(&login, &Secret::new(password))
                .await
                .map_err(|e| anyhow::anyhow!("Could not check credentials: {e}"))?
                .ok_or_else(|| AuthenticationError::Unauthorized("Invalid credentials".into()))?;

            Ok(AuthenticatedUser::from_user(&user))
        }
        _ => Err(AuthenticationError::UnknownAuthScheme),
    }
}

/// # Extract the authentication string form the Header
fn extract_value_authentication_header(headers: &HeaderMap) -> Result<&str, AuthenticationError> {
    match headers.get("Authorization") {
        None => Err(AuthenticationError::Unauthorized(
            "Missing Authorization header value".into(),
        )),
        Some(header) => header.to_str().map_err(|x| {
            AuthenticationError::Unauthorized(format!("Invalid Authentication header value: {}", x))
        }),
    }
}

/// # Return user and password from basic auth value
fn extract_credentials_from_http_basic(
    header_value: &str,
) -> Result<(String, String), AuthenticationError> {
    let credentials = Credentials::from_header(header_value.to_owned())
        .map_err(|_| AuthenticationError::Unauthorized("Invalid Basic credentials".into()))?;
    Ok((credentials.user_id, credentials.password))
}
