//! Tracing init (spec §6 [AMBIENT]): always builds a `tracing_subscriber`
//! JSON-formatted fmt layer filtered by `ObservabilityConfig::log_filter`
//! (`NEXTAI_LOG`, default `info`). When `NEXTAI_OTEL_ENDPOINT` is set, an
//! additional OTLP/gRPC span exporter layer is attached; otherwise
//! tracing-subscriber runs alone and no exporter is built.

use opentelemetry::global;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use sa_domain::config::ObservabilityConfig;

/// Installs the global tracing subscriber. Returns the `SdkTracerProvider`
/// (when OTLP is enabled) so the caller can `shutdown()` it on exit and
/// flush any batched spans.
pub fn init(cfg: &ObservabilityConfig) -> Option<SdkTracerProvider> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_filter.clone()));
    let fmt_layer = tracing_subscriber::fmt::layer().json();

    let Some(endpoint) = cfg.otel_endpoint.clone() else {
        Registry::default().with(filter).with(fmt_layer).init();
        return None;
    };

    match build_tracer_provider(&endpoint, &cfg.service_name) {
        Ok(provider) => {
            global::set_tracer_provider(provider.clone());
            let tracer = provider.tracer(cfg.service_name.clone());
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            Registry::default().with(filter).with(fmt_layer).with(otel_layer).init();
            Some(provider)
        }
        Err(err) => {
            // Fall back to plain logging rather than fail startup over a
            // misconfigured collector endpoint.
            Registry::default().with(filter).with(fmt_layer).init();
            tracing::warn!(endpoint, error = %err, "failed to initialize OTLP exporter, continuing without it");
            None
        }
    }
}

fn build_tracer_provider(endpoint: &str, service_name: &str) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
    let exporter = SpanExporter::builder().with_tonic().with_endpoint(endpoint).build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(service_name.to_string()).build())
        .build())
}
