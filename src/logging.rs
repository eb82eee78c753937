//! Log output setup
//!
//! The plugin logs through `tracing` everywhere; this module installs
//! a subscriber for embedders that do not bring their own. Install is
//! best-effort: when a subscriber is already set, `init` fails instead
//! of clobbering it.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

fn rotation(raw: &str) -> Rotation {
    match raw {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Install the plugin's subscriber: a rolling file layer plus, for
/// plain-text output, a console layer.
///
/// Returns the guard that flushes the file writer; keep it alive for
/// the lifetime of the process. The filter honors `RUST_LOG` over the
/// configured level.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
    let appender =
        RollingFileAppender::new(rotation(&config.rotation), &config.dir, &config.file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        registry
            .with(fmt::layer().json().with_writer(writer).with_ansi(false))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .with(fmt::layer().with_ansi(true))
            .try_init()
    }
    .context("a tracing subscriber is already installed")?;

    Ok(guard)
}
