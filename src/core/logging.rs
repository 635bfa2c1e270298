//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber honouring `RUST_LOG`
///
/// Falls back to `default_directive` (e.g. "pulse=info") when `RUST_LOG` is
/// unset or unparsable. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
