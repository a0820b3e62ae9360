use std::collections::HashMap;

use opentelemetry::trace::TracerProvider as TracerProviderTrait;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::context::Tags;
use crate::layer::WorkflowLayer;

pub const PROJECT_ID_HEADER: &str = "X-Project-Id";

/// Settings for span export and the `_global` workflow record.
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    pub service_name: String,
    /// Platform base URL; spans go to `{api_endpoint}/api/v1/traces`.
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub environment: Option<String>,
    pub tags: Tags,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            service_name: "vendi-sdk".to_string(),
            api_endpoint: None,
            api_key: None,
            project_id: None,
            environment: None,
            tags: Tags::new(),
        }
    }
}

impl InstrumentConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            api_endpoint: non_empty("VENDI_TRACES_ENDPOINT"),
            api_key: non_empty("VENDI_API_KEY"),
            project_id: non_empty("VENDI_PROJECT_ID"),
            environment: non_empty("VENDI_ENVIRONMENT"),
            ..Self::default()
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn traces_url(&self) -> Option<String> {
        self.api_endpoint
            .as_deref()
            .map(|base| format!("{}/api/v1/traces", base.trim_end_matches('/')))
    }

    /// Tags of the `_global` record: environment and project id, then user tags.
    pub fn global_tags(&self) -> Tags {
        let mut tags = Tags::new();
        if let Some(env) = &self.environment {
            tags.insert("environment".to_string(), Value::String(env.clone()));
        }
        if let Some(project_id) = &self.project_id {
            tags.insert("project_id".to_string(), Value::String(project_id.clone()));
        }
        for (k, v) in &self.tags {
            tags.insert(k.clone(), v.clone());
        }
        tags
    }

    pub fn export_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert("Authorization".to_string(), format!("Bearer {key}"));
        }
        if let Some(project_id) = &self.project_id {
            headers.insert(PROJECT_ID_HEADER.to_string(), project_id.clone());
        }
        headers
    }

    pub fn workflow_layer(&self) -> WorkflowLayer {
        WorkflowLayer::new().with_global_tags(self.global_tags())
    }
}

/// Initialize tracing with the workflow layer and optional OTLP export.
///
/// Must be called from within a tokio runtime when export is enabled. Returns
/// the provider that the caller should keep alive and `shutdown()` before exit.
pub fn init_tracing(config: &InstrumentConfig) -> Option<TracerProvider> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer();
    let workflow_layer = config.workflow_layer();

    if let Some(endpoint) = config.traces_url() {
        let exporter = match opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.as_str())
            .with_headers(config.export_headers())
            .build()
        {
            Ok(e) => e,
            Err(err) => {
                eprintln!("failed to create OTLP exporter: {err}, falling back to stdout only");
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(workflow_layer)
                    .try_init();
                return None;
            }
        };

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(Resource::new([KeyValue::new(
                "service.name",
                config.service_name.clone(),
            )]))
            .build();

        let otel_layer =
            tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()));

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .with(workflow_layer)
            .try_init();

        tracing::info!(endpoint = %endpoint, service_name = %config.service_name, "OTLP tracing enabled");
        Some(provider)
    } else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(workflow_layer)
            .try_init();
        None
    }
}
