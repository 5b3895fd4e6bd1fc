//! Process-wide application state shared across every axum handler.

use std::sync::Arc;

use collab_room::Registry;
use collab_types::config::Config;

pub struct AppState {
	pub registry: Arc<Registry>,
	pub shared_secret: Option<Box<str>>,
	pub return_stack_traces: bool,
}

/// The shape every handler's `State<App>` extractor asks for, same
/// cloneable-`Arc`-around-state convention used throughout this stack.
pub type App = Arc<AppState>;

impl AppState {
	pub fn new(registry: Arc<Registry>, config: &Config) -> Self {
		Self {
			registry,
			shared_secret: config.shared_secret.clone(),
			return_stack_traces: config.return_stack_traces,
		}
	}
}

// vim: ts=4
