//! Tracing subscriber initialization.
//!
//! The engine only emits events through `tracing` macros; installing a
//! subscriber is left to whoever embeds it.

use tracing_subscriber::EnvFilter;

/// Installs a JSON fmt subscriber with system-time timestamps.
///
/// `RUST_LOG` takes precedence over `fallback`. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init_with_default(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn repeated_init_is_harmless() {
        super::init_with_default("debug");
        super::init_with_default("warn");
        crate::init();
    }
}
