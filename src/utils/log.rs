/// Global logging configuration
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLE_LOG: AtomicBool = AtomicBool::new(true);

/// Set logging enabled
pub fn set_log(enabled: bool) {
  ENABLE_LOG.store(enabled, Ordering::Relaxed);
}

/// Check if logging is enabled, default is true
pub fn is_log_enabled() -> bool {
  ENABLE_LOG.load(Ordering::Relaxed)
}

/// Initialise `env_logger` once. `RUST_LOG` wins over the default filter,
/// which is `info`, or `warn` in quiet mode.
pub fn init_log(quiet: bool) {
  set_log(!quiet);
  let default_filter = if quiet { "warn" } else { "info" };
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
    .format_timestamp(None)
    .try_init();
}
