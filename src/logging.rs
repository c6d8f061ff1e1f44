//! Structured logging via `tracing`.
//!
//! Initialize once at startup from the `[logging]` config section. Events go
//! to stderr so stdout stays clean for command output (`resolve`, `env`).
//!
//! Correlation fields used across the crate: `user_id`, `resource_link_id`,
//! `path`, `consumer_key`. Never log a full launch parameter map at info
//! level or above: it carries names and e-mail addresses.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingSection};

static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `RUST_LOG` if set, else `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Build a subscriber writing to `writer` in the configured format.
pub fn build_subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
    ansi: bool,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(ansi),
            ),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_timer(SystemTime)
                    .with_writer(writer)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true),
            ),
        ),
    }
}

/// Install the global subscriber. `verbose` raises the default level to
/// `debug`; `RUST_LOG` still wins over both.
pub fn init_logging(config: &LoggingSection, verbose: bool) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let level = if verbose { "debug" } else { config.level.as_str() };
    let subscriber = build_subscriber(
        config.format,
        env_filter(level),
        std::io::stderr,
        std::io::stderr().is_terminal(),
    );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOGGING_INITIALIZED.set(true);

    tracing::debug!(log_level = %level, log_format = %config.format, "Logging initialized");
    Ok(())
}
