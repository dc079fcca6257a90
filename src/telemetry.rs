use std::sync::OnceLock;

use tracing_subscriber::{
    EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,tsl_trust=debug";

static TRACING: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once; later calls do nothing.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);

        // another subscriber may already be installed by a host application
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
}
