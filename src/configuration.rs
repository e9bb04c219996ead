use std::str::FromStr;

use secrecy::Secret;

/// GNews categories fetched when `INGESTION_TOPICS` is not set
pub const DEFAULT_TOPICS: [&str; 8] = [
    "world",
    "nation",
    "business",
    "technology",
    "entertainment",
    "sports",
    "science",
    "health",
];

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("{0} environment variable is mandatory")]
    Missing(&'static str),
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Where the application data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            _ => Err(()),
        }
    }
}

/// Language model vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Cohere,
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "cohere" => Ok(Provider::Cohere),
            _ => Err(()),
        }
    }
}

/// Location and credentials of a third-party API
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    /// Model name, for the language model APIs
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct RateLimiting {
    pub per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Cron expression, with seconds
    pub cron: String,
    pub topics: Vec<String>,
    pub max_results: u32,
    pub language: String,
    /// Ask a language model to refine the topic of new articles
    pub categorize: bool,
}

/// Administrator account created at startup when missing
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

/// # Application configuration
#[derive(Debug, Clone)]
pub struct ApplicationConfiguration {
    pub listen_on: String,
    pub store: StoreKind,
    pub database_url: Option<Secret<String>>,
    pub database_max_connections: u32,
    pub static_dir: String,
    /// Allow user creation without authentication
    pub allow_account_creation: bool,
    pub jwt_secret: Secret<String>,
    pub token_lifetime_minutes: i64,
    pub rate_limiting: RateLimiting,
    pub ingestion: IngestionSettings,
    pub http_timeout_seconds: u64,
    pub news_api: ApiSettings,
    pub gemini: ApiSettings,
    pub cohere: ApiSettings,
    pub summary_provider: Provider,
    pub sentiment_provider: Provider,
    pub category_provider: Provider,
    pub admin: Option<AdminAccount>,
}

impl ApplicationConfiguration {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through the given variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let secret = |key: &str| get(key).map(Secret::new);

        let store = parse_or(&get, "STORE", StoreKind::Postgres)?;
        let database_url = secret("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(ConfigurationError::Missing("DATABASE_URL"));
        }

        let jwt_secret = secret("JWT_SECRET").ok_or(ConfigurationError::Missing("JWT_SECRET"))?;

        let topics = get("INGESTION_TOPICS")
            .map(|topics| {
                topics
                    .split(',')
                    .map(|topic| topic.trim().to_lowercase())
                    .filter(|topic| !topic.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect());

        let admin = match (get("ADMIN_USERNAME"), secret("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminAccount {
                email: get("ADMIN_EMAIL").unwrap_or_else(|| format!("{username}@localhost")),
                username,
                password,
            }),
            (Some(_), None) => return Err(ConfigurationError::Missing("ADMIN_PASSWORD")),
            _ => None,
        };

        Ok(ApplicationConfiguration {
            listen_on: get("NEWSROOM_LISTEN_ON").unwrap_or_else(|| String::from("0.0.0.0:8080")),
            store,
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            static_dir: get("STATIC_DIR").unwrap_or_else(|| String::from("./static/")),
            allow_account_creation: parse_or(&get, "ALLOW_ACCOUNT_CREATION", true)?,
            jwt_secret,
            token_lifetime_minutes: parse_or(&get, "TOKEN_LIFETIME_MINUTES", 60 * 24)?,
            rate_limiting: RateLimiting {
                per_second: parse_or(&get, "RATE_LIMITING_PER_SECOND", 10)?,
                burst_size: parse_or(&get, "RATE_LIMITING_BUCKET_SIZE", 100)?,
            },
            ingestion: IngestionSettings {
                cron: get("INGESTION_CRON").unwrap_or_else(|| String::from("0 */30 * * * *")),
                topics,
                max_results: parse_or(&get, "INGESTION_MAX_RESULTS", 10)?,
                language: get("INGESTION_LANGUAGE").unwrap_or_else(|| String::from("en")),
                categorize: parse_or(&get, "INGESTION_CATEGORIZE", false)?,
            },
            http_timeout_seconds: parse_or(&get, "HTTP_TIMEOUT_SECONDS", 30)?,
            news_api: ApiSettings {
                base_url: get("GNEWS_BASE_URL")
                    .unwrap_or_else(|| String::from("https://gnews.io/api/v4")),
                api_key: secret("GNEWS_API_KEY"),
                model: String::new(),
            },
            gemini: ApiSettings {
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| String::from("https://generativelanguage.googleapis.com")),
                api_key: secret("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL").unwrap_or_else(|| String::from("gemini-1.5-flash")),
            },
            cohere: ApiSettings {
                base_url: get("COHERE_BASE_URL")
                    .unwrap_or_else(|| String::from("https://api.cohere.ai")),
                api_key: secret("COHERE_API_KEY"),
                model: get("COHERE_MODEL").unwrap_or_else(|| String::from("command-r")),
            },
            summary_provider: parse_or(&get, "SUMMARY_PROVIDER", Provider::Gemini)?,
            sentiment_provider: parse_or(&get, "SENTIMENT_PROVIDER", Provider::Cohere)?,
            category_provider: parse_or(&get, "CATEGORY_PROVIDER", Provider::Gemini)?,
            admin,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &'static str, default: T) -> Result<T, ConfigurationError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::Invalid { key, value }),
    }
}
