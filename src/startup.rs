use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;

use actix_governor::Governor;
use actix_web::dev::Server;
use actix_web::web::Data;
use actix_web::{web, App, HttpServer};
use reqwest_middleware::ClientWithMiddleware;

use crate::auth::TokenSigner;
use crate::clients::build_http_client;
use crate::clients::gnews::{GNewsClient, NewsSource};
use crate::clients::llm::{CohereModel, GeminiModel, LanguageModel};
use crate::configuration::{ApplicationConfiguration, Provider};
use crate::rate_limiting::build_rate_limiting_conf;
use crate::routes::{self, ApiError};
use crate::services::comments::CommentService;
use crate::services::enrichment::Enricher;
use crate::services::events::EventHub;
use crate::services::ingestion::IngestionService;
use crate::services::news::NewsService;
use crate::services::notifications::NotificationService;
use crate::services::users::UserService;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct ApplicationServices {
    pub news_service: NewsService,
    pub user_service: UserService,
    pub comment_service: CommentService,
    pub notification_service: NotificationService,
    pub ingestion_service: IngestionService,
    pub events: EventHub,
    pub tokens: TokenSigner,
    pub allow_account_creation: bool,
}

/// The language model of the given vendor, if its API key is configured
fn build_model(
    provider: Provider,
    client: &ClientWithMiddleware,
    configuration: &ApplicationConfiguration,
) -> Option<Arc<dyn LanguageModel>> {
    match provider {
        Provider::Gemini => configuration.gemini.api_key.clone().map(|key| {
            Arc::new(GeminiModel::new(
                client.clone(),
                &configuration.gemini.base_url,
                key,
                &configuration.gemini.model,
            )) as Arc<dyn LanguageModel>
        }),
        Provider::Cohere => configuration.cohere.api_key.clone().map(|key| {
            Arc::new(CohereModel::new(
                client.clone(),
                &configuration.cohere.base_url,
                key,
                &configuration.cohere.model,
            )) as Arc<dyn LanguageModel>
        }),
    }
}

pub fn build_services(
    store: SharedStore,
    configuration: &ApplicationConfiguration,
) -> anyhow::Result<ApplicationServices> {
    let client = build_http_client(configuration.http_timeout_seconds)?;

    let source = match &configuration.news_api.api_key {
        Some(key) => Some(Arc::new(GNewsClient::new(
            client.clone(),
            &configuration.news_api.base_url,
            key.clone(),
            &configuration.ingestion.language,
            configuration.ingestion.max_results,
        )) as Arc<dyn NewsSource>),
        None => {
            tracing::warn!("GNEWS_API_KEY is not set, news ingestion is disabled");
            None
        }
    };

    let summarizer = build_model(configuration.summary_provider, &client, configuration);
    if summarizer.is_none() {
        tracing::warn!("No API key for the summary provider, summaries are disabled");
    }
    let sentiment = build_model(configuration.sentiment_provider, &client, configuration);
    let categorizer = build_model(configuration.category_provider, &client, configuration);

    let events = EventHub::default();
    let enricher = Enricher::new(store.clone(), summarizer, sentiment, categorizer);

    Ok(ApplicationServices {
        news_service: NewsService::new(store.clone(), enricher.clone()),
        user_service: UserService::new(store.clone()),
        comment_service: CommentService::new(store.clone(), events.clone()),
        notification_service: NotificationService::new(store.clone()),
        ingestion_service: IngestionService::new(
            store,
            source,
            enricher,
            events.clone(),
            configuration.ingestion.topics.clone(),
            configuration.ingestion.categorize,
        ),
        events,
        tokens: TokenSigner::new(
            &configuration.jwt_secret,
            configuration.token_lifetime_minutes,
        )?,
        allow_account_creation: configuration.allow_account_creation,
    })
}

/// Turn body, query and path extraction failures into problem responses
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| ApiError::validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| ApiError::validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| ApiError::validation(err.to_string()).into()),
    );
}

/// Bind the HTTP server on the listener. The returned server runs once awaited.
pub fn startup(
    services: ApplicationServices,
    configuration: &ApplicationConfiguration,
    listener: TcpListener,
) -> anyhow::Result<Server> {
    let governor_conf = build_rate_limiting_conf(&configuration.rate_limiting)?;
    let services = Data::new(services);
    let static_dir = configuration.static_dir.clone();
    let serve_static = Path::new(&static_dir).is_dir();
    if !serve_static {
        tracing::info!("No static directory at {}, not serving it", static_dir);
    }

    let server = HttpServer::new(move || {
        let app = App::new()
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(services.clone())
            .configure(configure_extractors)
            .service(routes::ping)
            .service(
                web::scope("/api/v1")
                    .wrap(Governor::new(&governor_conf))
                    .configure(routes::configure),
            );

        if serve_static {
            app.service(actix_files::Files::new("/", &static_dir).index_file("index.html"))
        } else {
            app
        }
    })
    .listen(listener)?
    .run();

    Ok(server)
}
