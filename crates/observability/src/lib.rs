//! Process-wide logging setup for binaries and tests using the engine.

/// Initialize process-wide logging, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with_default("info");
}

/// Like [`init`], with `filter` used when `RUST_LOG` is unset or invalid.
pub fn init_with_default(filter: &str) {
    tracing::init_with_default(filter);
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
