//! Tracing initialization.
//!
//! Logs go to stderr so that stdout carries only command output. The filter is read from
//! `RUST_LOG` and defaults to `info`:
//!
//! ```bash
//! # Show every obtained connection and each repository call
//! RUST_LOG=memberbank=debug memberbank transfer memberA memberB 2000
//!
//! # Show statements sqlx executes
//! RUST_LOG=info,sqlx::query=debug memberbank list
//! ```

use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with a fmt layer writing to stderr.
///
/// Fails if a global subscriber has already been installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    debug!("Telemetry initialized");
    Ok(())
}
