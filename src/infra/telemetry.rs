use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::render::METRIC_MARKDOWN_RENDER_MS;
use crate::cache::{
    METRIC_MARKDOWN_CACHE_EVICT, METRIC_MARKDOWN_CACHE_HIT, METRIC_MARKDOWN_CACHE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::METRIC_DB_SESSION_FINALIZE;

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_MARKDOWN_CACHE_HIT,
            Unit::Count,
            "Total number of rendered-markdown cache hits."
        );
        describe_counter!(
            METRIC_MARKDOWN_CACHE_MISS,
            Unit::Count,
            "Total number of rendered-markdown cache misses."
        );
        describe_counter!(
            METRIC_MARKDOWN_CACHE_EVICT,
            Unit::Count,
            "Total number of rendered-markdown cache evictions due to capacity."
        );
        describe_histogram!(
            METRIC_MARKDOWN_RENDER_MS,
            Unit::Milliseconds,
            "Markdown rendering latency on cache miss in milliseconds."
        );
        describe_counter!(
            METRIC_DB_SESSION_FINALIZE,
            Unit::Count,
            "Request sessions finalized after a 500 response, labelled by outcome."
        );
    });
}
