//! Logging setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config file sets one
pub const DEFAULT_FILTER: &str = "rig_recorder=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `fallback`. Calling this twice is harmless; the second
/// install attempt is ignored.
pub fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback.unwrap_or(DEFAULT_FILTER).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
