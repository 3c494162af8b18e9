//! Diagnostic logging.
//!
//! Filtered by `OBSIDIAN_LOG` (same syntax as `RUST_LOG`, default `warn`) and
//! written to stderr, or to a file when one is given. Never to stdout, which
//! carries the transcript.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "OBSIDIAN_LOG";
const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!("Tracing initialized");
    }
    Ok(())
}
