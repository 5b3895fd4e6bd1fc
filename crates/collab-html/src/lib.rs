//! Bidirectional HTML <-> CRDT tree converter (§4.1).
//!
//! Parses authored HTML leniently with `html5ever`/`markup5ever_rcdom`,
//! walks it through a handful of normalization passes (legacy tags,
//! regional-edit wrapping, block/table conversion, section splitting), and
//! stores the result into a `collab_crdt::SharedDocument`'s structured
//! fragment — and back.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod blocks;
mod dom;
mod from_tree;
mod schema;
mod to_tree;
mod transforms;

pub use from_tree::to_html;
pub use to_tree::to_tree;

// vim: ts=4
