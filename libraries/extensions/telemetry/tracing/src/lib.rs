//! Tracing setup shared by all components.
//!
//! Components are silent unless started with `--debug`. The `RUST_LOG`
//! environment variable overrides both defaults.

use eyre::Context as EyreContext;
use tracing_subscriber::{EnvFilter, Layer};

pub fn set_up_tracing(debug: bool) -> eyre::Result<()> {
    use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(debug)))
        .context("failed to parse tracing filter")?;

    let stdout_log = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(filter);
    let subscriber = tracing_subscriber::Registry::default().with(stdout_log);
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing global subscriber")
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "off"
    }
}
