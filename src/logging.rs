//! Subscriber setup for the `detvote` binary.

use crate::config::{LogFormat, LoggingSettings};
use anyhow::Context;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the filter: `RUST_LOG` when set, else `detvote=<level>`.
pub fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(format!("detvote={level}"))
        .with_context(|| format!("invalid log level `{level}`"))
}

/// Install the global subscriber. Call once, from `main`.
pub fn init(settings: &LoggingSettings, color: bool) -> anyhow::Result<()> {
    let filter = env_filter(&settings.level)?;

    if let Some(path) = &settings.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        let writer = Mutex::new(file);
        match settings.format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(writer))
                .with(filter)
                .try_init()?,
            LogFormat::Text => tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .try_init()?,
        }
        return Ok(());
    }

    match settings.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(color)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?,
    }
    Ok(())
}
