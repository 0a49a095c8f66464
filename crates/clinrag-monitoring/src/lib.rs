//! Composition-root logging init: `tracing` + `tracing-subscriber` with an
//! env filter, initialized once per process.

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Installs a global `tracing` subscriber reading `RUST_LOG` (falling back
/// to `info`). Call once, at process start, before spawning any workers.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// A fresh correlation id for one request or job, carried as a `tracing`
/// span field so `INTERNAL` errors can be traced back to their origin.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(new_correlation_id(), new_correlation_id());
    }
}
