#[cfg(not(debug_assertions))]
use human_panic::setup_panic;
use tracing::subscriber::{DefaultGuard, SetGlobalDefaultError};

#[cfg(debug_assertions)]
extern crate better_panic;

use tracing_subscriber::EnvFilter;

// [NOTE] tracing
//
// Use the `tracing` macros (`trace!`, `debug!`, `info!`, `warn!`, `error!`) directly.
// `#[tracing::instrument]` opens a span per call named after the function.
// Verbosity follows RUST_LOG, defaulting to `info`.

pub fn install_logger() -> Result<(), SetGlobalDefaultError> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let subscriber = tracing_subscriber::fmt().compact().with_env_filter(filter).finish();
  tracing::subscriber::set_global_default(subscriber)
}

pub fn init_logging() -> Result<(), SetGlobalDefaultError> {
  // Human Panic. Only enabled when *not* debugging.
  #[cfg(not(debug_assertions))]
  {
    setup_panic!();
  }

  // Better Panic. Only enabled *when* debugging.
  #[cfg(debug_assertions)]
  {
    better_panic::Settings::debug()
      .most_recent_first(false)
      .lineno_suffix(true)
      .verbosity(better_panic::Verbosity::Full)
      .install();
  }

  install_logger()?;

  Ok(())
}

/// Thread local subscriber writing through the test harness capture.
/// Logging stops when the guard is dropped.
pub fn init_logging_tests() -> DefaultGuard {
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_max_level(tracing::Level::DEBUG)
    .with_test_writer()
    .finish();
  tracing::subscriber::set_default(subscriber)
}
