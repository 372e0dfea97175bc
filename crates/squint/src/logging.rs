//! File logging. The terminal belongs to the UI, so nothing is logged
//! unless a log file is requested.

use camino::Utf8Path;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding an `EnvFilter` directive.
const FILTER_VAR: &str = "SQUINT_LOG";

/// Install the subscriber. Keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init(log_file: Option<&Utf8Path>) -> Result<Option<WorkerGuard>> {
    let Some(path) = log_file else {
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| miette::miette!("log file path {} has no file name", path))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot open log file {}", path))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(build_filter())
        .with(file_layer)
        .try_init()
        .into_diagnostic()?;

    Ok(Some(guard))
}

fn build_filter() -> EnvFilter {
    match env::var(FILTER_VAR) {
        Ok(value) if !value.trim().is_empty() => EnvFilter::new(value),
        _ => EnvFilter::new("info"),
    }
}
