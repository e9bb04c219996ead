use tracing::{subscriber::set_global_default, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Build the subscriber: env filter, stdout formatting (JSON when `LOG_FORMAT=json`)
/// and a Jaeger exporter when `JAEGER_ENABLED` is set.
pub fn get_subscriber(name: &str, env_filter: &str) -> anyhow::Result<impl Subscriber + Sync + Send> {
    let telemetry = if std::env::var("JAEGER_ENABLED").is_ok() {
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(name)
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let formatting_layer = if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    Ok(Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(formatting_layer))
}

pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) -> anyhow::Result<()> {
    set_global_default(subscriber)?;
    Ok(())
}
