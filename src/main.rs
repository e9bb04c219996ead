use std::net::TcpListener;
use std::sync::Arc;

use newsroom::common::init_postgres_connection;
use newsroom::configuration::{ApplicationConfiguration, StoreKind};
use newsroom::observability::{get_subscriber, init_subscriber};
use newsroom::scheduler::start_scheduler;
use newsroom::services::users::RegisterRequest;
use newsroom::startup::{build_services, startup};
use newsroom::store::memory::MemoryStore;
use newsroom::store::postgres::PgStore;
use newsroom::store::SharedStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = get_subscriber("newsroom", "info")?;
    init_subscriber(subscriber)?;

    let configuration = ApplicationConfiguration::from_env()?;

    let store: SharedStore = match configuration.store {
        StoreKind::Postgres => Arc::new(PgStore::new(
            init_postgres_connection(&configuration).await?,
        )),
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store, nothing will survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let services = build_services(store, &configuration)?;

    if let Some(admin) = &configuration.admin {
        services
            .user_service
            .ensure_admin(&RegisterRequest {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password: admin.password.clone(),
                display_name: None,
            })
            .await?;
    }

    let _scheduler =
        start_scheduler(services.ingestion_service.clone(), &configuration.ingestion.cron).await?;

    let listener = TcpListener::bind(&configuration.listen_on)?;
    tracing::info!("Listening on {}", configuration.listen_on);

    startup(services, &configuration, listener)?.await?;

    Ok(())
}
