use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::common::errors::{ServiceError, StoreError};
use crate::common::model::{NewUser, ProfileUpdate, User, UserRole};
use crate::common::password::{encode_password, verify_password};
use crate::store::{SharedStore, Store};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
    pub display_name: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    store: SharedStore,
}

fn validate_username(username: &str) -> Result<(), ServiceError> {
    let length = username.chars().count();
    if !(3..=32).contains(&length) {
        return Err(ServiceError::validation(
            "Username must be between 3 and 32 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::validation(
            "Username may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ServiceError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ServiceError::validation("Invalid email address")),
    }
}

fn validate_profile(update: &ProfileUpdate) -> Result<(), ServiceError> {
    if let Some(display_name) = &update.display_name {
        if display_name.chars().count() > 64 {
            return Err(ServiceError::validation(
                "Display name must be at most 64 characters",
            ));
        }
    }
    if let Some(bio) = &update.bio {
        if bio.chars().count() > 500 {
            return Err(ServiceError::validation("Bio must be at most 500 characters"));
        }
    }
    if let Some(avatar_url) = &update.avatar_url {
        if !(avatar_url.starts_with("http://") || avatar_url.starts_with("https://"))
            || avatar_url.len() > 2048
        {
            return Err(ServiceError::validation("Invalid avatar url"));
        }
    }
    Ok(())
}

impl UserService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ServiceError> {
        self.create_user(request, UserRole::Basic).await
    }

    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(
        &self,
        request: &RegisterRequest,
        role: UserRole,
    ) -> Result<User, ServiceError> {
        let username = request.username.trim();
        let email = request.email.trim().to_lowercase();

        validate_username(username)?;
        validate_email(&email)?;
        if request.password.expose_secret().chars().count() < 8 {
            return Err(ServiceError::validation(
                "Password must be at least 8 characters",
            ));
        }

        let user = NewUser {
            username: username.to_owned(),
            email,
            password: encode_password(&request.password)?,
            display_name: request
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from),
            role,
        };

        Ok(self.store.create_user(&user).await?)
    }

    /// Create the admin account unless its username is already taken
    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub async fn ensure_admin(&self, request: &RegisterRequest) -> Result<(), ServiceError> {
        if let Some(existing) = self.store.user_by_login(request.username.trim()).await? {
            if existing.role != UserRole::Admin {
                tracing::warn!(
                    "Account {} already exists without the admin role, no admin was created",
                    existing.username
                );
            }
            return Ok(());
        }

        match self.create_user(request, UserRole::Admin).await {
            Ok(_) | Err(ServiceError::StoreError(StoreError::Conflict(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// The user matching the login (username or email) and password, if any
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        login: &str,
        password: &Secret<String>,
    ) -> Result<Option<User>, ServiceError> {
        let login = login.trim();
        let user = match self.store.user_by_login(login).await? {
            Some(user) => Some(user),
            None => self.store.user_by_login(&login.to_lowercase()).await?,
        };

        Ok(user.filter(|user| verify_password(&user.password, password)))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_user(&self, id: i32) -> Result<User, ServiceError> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("User", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_profile(
        &self,
        id: i32,
        update: &ProfileUpdate,
    ) -> Result<User, ServiceError> {
        validate_profile(update)?;

        self.store
            .update_profile(id, update)
            .await?
            .ok_or(ServiceError::NotFound("User", id))
    }
}
