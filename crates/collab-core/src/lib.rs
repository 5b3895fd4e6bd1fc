//! Core infrastructure shared by every collab room component: logging
//! bootstrap, the write-back debounce timer, and the per-room generation
//! counter used to discard stale suspended work.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod debounce;
pub mod generation;
pub mod logging;

// vim: ts=4
