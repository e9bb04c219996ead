#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    SqlError(#[from] sqlx::Error),
    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    /// Turn a unique constraint violation into a [`StoreError::Conflict`]
    pub fn from_insert(error: sqlx::Error, conflict: &str) -> Self {
        let unique_violation = error
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false);

        if unique_violation {
            StoreError::Conflict(conflict.to_owned())
        } else {
            StoreError::SqlError(error)
        }
    }
}

/// Failures of the third-party HTTP APIs
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Non OK Http status returned: {0}")]
    NonOkStatus(u16),
    #[error("Error while reading response: {0}")]
    ReadResponseError(#[from] reqwest::Error),
    #[error("Error while sending request: {0}")]
    HttpError(#[from] reqwest_middleware::Error),
    #[error("Could not encode request: {0}")]
    EncodingError(#[from] serde_json::Error),
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0} returned an empty answer")]
    EmptyAnswer(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0} with id {1} was not found")]
    NotFound(&'static str, i32),
    #[error("{0}")]
    Forbidden(String),
    #[error("Content of article {0} is behind a paywall")]
    Paywalled(i32),
    #[error("{0} is not configured")]
    Unavailable(&'static str),
    #[error("Upstream API error: {0}")]
    ClientError(#[from] ClientError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ServiceError::ValidationError(message.into())
    }
}
