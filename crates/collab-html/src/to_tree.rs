//! HTML -> Tree (§4.1.1): the "to-tree" direction.

use collab_crdt::SharedDocument;
use collab_types::prelude::*;

use crate::blocks::div_to_table;
use crate::dom;
use crate::schema::html_to_fragment;
use crate::transforms;

const EMPTY_BODY: &str = "<body><header></header><main></main><footer></footer></body>";

/// Convert `html` into the document's structured tree, replacing whatever
/// was there before. Steps follow §4.1.1 in order.
pub fn to_tree(html: &str, doc: &SharedDocument) -> ClResult<()> {
	// Step 1: empty/null input substitutes the canonical empty body.
	let html = if html.trim().is_empty() { EMPTY_BODY } else { html };

	// Step 2: legacy tag rewrite.
	let root = dom::parse_fragment_lenient(html);
	transforms::rewrite_legacy_tags(&root);

	// Step 4: locate <main>, falling back to the whole tree.
	let main = dom::find_first(&root, "main").unwrap_or(root.clone());

	// Step 5: extract + remove da-metadata.
	let metadata = transforms::extract_metadata(&main);

	// Step 6: wrap da-diff-added elements.
	transforms::wrap_diff_added(&main);

	// Step 7: link-wraps-image normalization.
	transforms::hoist_link_wrapped_images(&main);

	// Step 8: strip comments.
	transforms::strip_comments(&main);

	// Step 9: block-to-table conversion, one level of top-level <div>s.
	convert_blocks_to_tables(&main);

	// Step 10: section break detection (`<p>---</p>` -> `<hr>`).
	transforms::detect_section_breaks(&main);

	// Step 11: section splitting, flattening sections behind `<hr>`.
	transforms::split_sections(&main);

	// Steps 12-13: schema-guided parse, then store into the document.
	doc.clear_and_rebuild(|txn, fragment, metadata_map| {
		if let Err(e) = html_to_fragment(&main, fragment, txn) {
			warn!("html to tree conversion failed: {}", e);
		}
		for (key, value) in &metadata {
			metadata_map.insert(txn, key.as_str(), value.as_str());
		}
	});

	Ok(())
}

fn convert_blocks_to_tables(main: &dom::Handle) {
	let kids = dom::children(main);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		if dom::is_element(&child, "div") && !dom::class_list(&child).is_empty() {
			new_kids.push(div_to_table(&child));
		} else {
			convert_blocks_to_tables(&child);
			new_kids.push(child);
		}
	}
	dom::replace_children(main, new_kids);
}


// vim: ts=4
