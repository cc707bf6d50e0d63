use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise fall back to the configured level
/// (usually `infra.log_level`). Safe to call more than once.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
