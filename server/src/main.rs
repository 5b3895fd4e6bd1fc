//! Edge Dispatcher binary entry point; see `lib.rs` for the actual wiring.

use collab_types::prelude::*;

#[tokio::main]
async fn main() -> ClResult<()> {
	collab_room_server::run().await
}

// vim: ts=4
