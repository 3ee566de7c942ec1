use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        diagram::{
            METRIC_DIAGRAM_FAILED, METRIC_DIAGRAM_RENDERED, METRIC_HYDRATION_ABANDONED,
            METRIC_HYDRATION_MS,
        },
        render::METRIC_RENDER_MS,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
/// Diagnostics go to stderr so rendered output on stdout stays clean.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Markdown render latency in milliseconds."
        );
        describe_counter!(
            METRIC_DIAGRAM_RENDERED,
            Unit::Count,
            "Total number of diagram placeholders hydrated with a graphic."
        );
        describe_counter!(
            METRIC_DIAGRAM_FAILED,
            Unit::Count,
            "Total number of diagram placeholders replaced by an error panel."
        );
        describe_counter!(
            METRIC_HYDRATION_ABANDONED,
            Unit::Count,
            "Total number of hydration passes abandoned because a newer render superseded them."
        );
        describe_histogram!(
            METRIC_HYDRATION_MS,
            Unit::Milliseconds,
            "Hydration pass latency in milliseconds."
        );
    });
}
