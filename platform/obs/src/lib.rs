//! Tracing bootstrap for the access engine binaries.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{self as sdk, Resource};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,tower_http=warn,sqlx=warn";

/// Configuration for tracing initialization.
#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub ansi: bool,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "access-engine",
            env_filter: None,
            otlp_endpoint: None,
            ansi: true,
        }
    }
}

impl ObsConfig {
    /// Picks up `RUST_LOG` and `OTLP_ENDPOINT`; blank values count as unset.
    pub fn from_env(service_name: &'static str) -> Self {
        Self {
            service_name,
            env_filter: non_blank(std::env::var("RUST_LOG").ok()),
            otlp_endpoint: non_blank(std::env::var("OTLP_ENDPOINT").ok()),
            ansi: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn filter(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(DEFAULT_FILTER)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Install tracing subscribers with optional OTLP exporter. Later calls are no-ops.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.filter())?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(config.ansi);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(endpoint) = config.otlp_endpoint.clone() {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint)
            .build()?;

        let resource = Resource::builder()
            .with_service_name(config.service_name)
            .build();

        let provider = sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();
        let tracer = provider.tracer(config.service_name);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
    } else {
        registry.try_init()?;
    }

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    tracing::debug!(service = config.service_name, "tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_http_and_sql() {
        let config = ObsConfig::default();
        assert_eq!(config.filter(), DEFAULT_FILTER);
    }

    #[test]
    fn blank_values_are_ignored() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("debug".into())), Some("debug".into()));
    }

    #[test]
    fn init_is_idempotent() {
        let config = ObsConfig {
            env_filter: Some("warn".into()),
            ansi: false,
            ..ObsConfig::default()
        };
        init_tracing(config.clone()).unwrap();
        init_tracing(config).unwrap();
    }
}
