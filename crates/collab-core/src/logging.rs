//! Structured logging bootstrap, initialized once in the binary's `main`.

/// Initialize the global `tracing` subscriber from `RUST_LOG` (standard
/// env-filter syntax). Idempotent only in the sense that the caller is
/// expected to call this exactly once at process start.
pub fn init() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();
}

// vim: ts=4
