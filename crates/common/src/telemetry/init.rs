use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::{TelemetryConfig, TelemetryProviders};

/// Install the global tracing subscriber.
///
/// Logs are always written to stdout as JSON with the active span list.
/// When OTEL is enabled, spans are additionally exported over OTLP/gRPC and the
/// returned providers must be passed to [`shutdown_telemetry`] before exit.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if !config.otel_enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_fmt_layer())
            .init();
        return Ok(None);
    }

    let resource = Resource::new(vec![KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        config.service_name.clone(),
    )]);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer("donation-distributor");
    let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    // The OTel layer must see spans before the fmt layer so trace ids are assigned first
    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_trace_layer)
        .with(json_fmt_layer())
        .init();

    Ok(Some(TelemetryProviders { tracer_provider }))
}

/// JSON stdout layer, built per subscriber stack since its type depends on the layers below it
fn json_fmt_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true)
}

/// Flush and shut down exporters, if any were started
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    if let Some(providers) = providers {
        if let Err(e) = providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();

        assert_eq!(config.service_name, "donation-distributor");
        assert_eq!(config.log_level, "info");
        assert!(!config.otel_enabled);
    }

    #[test]
    fn test_json_layer_stacks_on_top_of_otel_layer() {
        let tracer_provider = SdkTracerProvider::builder().build();
        let otel_trace_layer =
            tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer("test"));

        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("debug"))
            .with(otel_trace_layer)
            .with(json_fmt_layer());

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("distribute", correlation_id = "abc");
            let _guard = span.enter();
            tracing::info!("inside span");
        });
    }

    #[test]
    fn test_shutdown_without_providers_is_noop() {
        shutdown_telemetry(None);
    }
}
