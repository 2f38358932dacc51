//! Tracing setup for the switcher binary.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Fallback directives when `RUST_LOG` is unset: migration progress at
/// INFO, the HTTP and cluster client internals quieted down.
const DEFAULT_DIRECTIVES: &str = "info,kube=warn,hyper=warn,tower=warn";

/// Install the global subscriber. `RUST_LOG` overrides the defaults
/// wholesale; output goes to stderr so the listener port stays the only
/// stdout consumer.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
