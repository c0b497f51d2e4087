//! Logging setup for the scanwatch binary

use tracing_subscriber::EnvFilter;

/// Parse log level from config string
fn parse_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initialize console logging at the configured level (RUST_LOG overrides)
pub fn init(level: &str) {
  let filter = EnvFilter::builder()
    .with_default_directive(parse_level(level).into())
    .from_env_lossy();

  tracing_subscriber::fmt().with_env_filter(filter).init();
}
