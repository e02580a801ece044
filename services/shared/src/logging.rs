//! Tracing subscriber setup for service binaries

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `<service>=info,warn` is used, with
/// dashes in the service name mapped to the crate-style underscores.
pub fn init_logging(service: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(service)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

fn default_directive(service: &str) -> String {
    format!("{}=info,stream_service_shared=info,warn", service.replace('-', "_"))
}
