//! Tracing setup (v0.1)

/// Initialize the global tracing subscriber
///
/// Respects `RUST_LOG`, defaulting to `info`. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
