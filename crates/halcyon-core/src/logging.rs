//! `tracing` subscriber setup.

/// Default filter: verbose for Halcyon crates, quiet for everything else.
pub const DEFAULT_FILTER: &str = "info,halcyon_texture=debug,halcyon_core=debug";

/// Install a formatted subscriber using `RUST_LOG` if set, otherwise [`DEFAULT_FILTER`].
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    init_with_filter(&filter);
}

/// Install a formatted subscriber with an explicit env-filter directive string.
pub fn init_with_filter(filter: &str) {
    // A subscriber installed earlier wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
