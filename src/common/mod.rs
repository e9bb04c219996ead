use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
pub use sqlx::PgPool as Pool;

use crate::configuration::ApplicationConfiguration;

pub mod errors;
pub mod model;
pub mod password;

/// Build the Postgres connection and bring the schema up to date
pub async fn init_postgres_connection(
    configuration: &ApplicationConfiguration,
) -> anyhow::Result<Pool> {
    let connection_spec = configuration
        .database_url
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL env variable should be set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database_max_connections)
        .connect(connection_spec.expose_secret())
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
