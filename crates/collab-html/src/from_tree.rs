//! Tree -> HTML (§4.1.2): the "from-tree" direction.

use collab_crdt::SharedDocument;
use collab_types::prelude::*;

use crate::blocks::table_to_div;
use crate::dom::{self, Handle};
use crate::schema::fragment_to_html;
use crate::transforms::join_sections;

/// Serialize the document's structured tree back to HTML.
pub fn to_html(doc: &SharedDocument) -> ClResult<String> {
	// Steps 1-2: walk the fragment, overlaying metadata separately (it lives
	// in its own slot and is appended back in step 7 below).
	let main = doc.with_fragment_snapshot(fragment_to_html);

	// Step 3: table-to-block, reversing the to-tree block conversion.
	convert_tables_to_blocks(&main);

	// Step 4: diff wrappers. `<da-diff-added>` is unwrapped; others pass
	// through with `contenteditable` stripped.
	unwrap_diff_added(&main);

	// Step 5: section join, splitting the flat sequence at every `<hr>`.
	join_sections(&main);

	// Step 6: final per-node emission tweaks (img -> picture, etc).
	finalize_inline_shapes(&main);

	// Step 7: append the metadata block, if non-empty.
	let metadata = doc.metadata_snapshot();
	if !metadata.is_empty() {
		dom::append_child(&main, build_metadata_div(&metadata));
	}

	// Step 8: wrap in the canonical envelope.
	let body = dom::new_element("body", &[]);
	dom::append_child(&body, dom::new_element("header", &[]));
	dom::append_child(&body, main);
	dom::append_child(&body, dom::new_element("footer", &[]));

	dom::serialize_node(&body)
}

fn convert_tables_to_blocks(main: &Handle) {
	let kids = dom::children(main);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		if dom::is_element(&child, "table") {
			new_kids.push(table_to_div(&child));
		} else {
			convert_tables_to_blocks(&child);
			new_kids.push(child);
		}
	}
	dom::replace_children(main, new_kids);
}

fn unwrap_diff_added(node: &Handle) {
	let kids = dom::children(node);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		unwrap_diff_added(&child);
		if dom::is_element(&child, "da-diff-added") {
			new_kids.extend(dom::children(&child));
		} else {
			if dom::is_element(&child, "da-diff-deleted") {
				dom::remove_attr(&child, "contenteditable");
			}
			new_kids.push(child);
		}
	}
	dom::replace_children(node, new_kids);
}

/// Step 6 details: `<li>` containing exactly one `<p>` collapses to inline
/// children; a `<p>` whose only non-whitespace children are `<img>` is
/// unwrapped; every `<img src>` is wrapped in a `<picture>` with two
/// `<source>` elements (hoisting `href`/`title`/`da-diff-added` back to a
/// wrapping `<a>` if present), with `loading="lazy"` defaulted in.
fn finalize_inline_shapes(node: &Handle) {
	let kids = dom::children(node);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		finalize_inline_shapes(&child);

		if dom::is_element(&child, "li") {
			let grandkids = dom::children(&child);
			if grandkids.len() == 1 && dom::is_element(&grandkids[0], "p") {
				dom::replace_children(&child, dom::children(&grandkids[0]));
			}
		}

		if dom::is_element(&child, "img") && dom::attr(&child, "src").is_some() {
			new_kids.push(wrap_picture(&child));
			continue;
		}

		if dom::is_element(&child, "p") {
			let non_blank: Vec<_> = dom::children(&child).into_iter().filter(|c| !dom::is_blank_text(c)).collect();
			if !non_blank.is_empty() && non_blank.iter().all(|c| dom::is_element(c, "img") || dom::is_element(c, "picture")) {
				new_kids.extend(non_blank);
				continue;
			}
		}

		new_kids.push(child);
	}
	dom::replace_children(node, new_kids);
}

fn wrap_picture(img: &Handle) -> Handle {
	let src = dom::attr(img, "src").unwrap_or_default();
	if dom::attr(img, "loading").is_none() {
		dom::set_attr(img, "loading", "lazy");
	}

	let picture = dom::new_element("picture", &[]);
	dom::append_child(&picture, dom::new_element("source", &[("srcset", &src)]));
	dom::append_child(
		&picture,
		dom::new_element("source", &[("srcset", &src), ("media", "(min-width: 600px)")]),
	);
	dom::append_child(&picture, img.clone());

	match dom::attr(img, "href") {
		Some(href) => {
			let mut attrs = vec![("href", href.clone())];
			if let Some(title) = dom::attr(img, "title") {
				attrs.push(("title", title));
			}
			let attr_refs: Vec<(&str, &str)> = attrs.iter().map(|(k, v)| (*k, v.as_str())).collect();
			let anchor = dom::new_element("a", &attr_refs);
			if dom::has_attr(img, "da-diff-added") {
				dom::set_attr(&anchor, "da-diff-added", "");
			}
			dom::remove_attr(img, "href");
			dom::remove_attr(img, "title");
			dom::remove_attr(img, "da-diff-added");
			dom::append_child(&anchor, picture);
			anchor
		}
		None => picture,
	}
}

fn build_metadata_div(metadata: &std::collections::BTreeMap<String, String>) -> Handle {
	let div = dom::new_element("div", &[("class", "da-metadata")]);
	for (key, value) in metadata {
		let row = dom::new_element("div", &[]);
		let key_cell = dom::new_element("div", &[]);
		dom::append_child(&key_cell, dom::new_text(key));
		let value_cell = dom::new_element("div", &[]);
		dom::append_child(&value_cell, dom::new_text(value));
		dom::append_child(&row, key_cell);
		dom::append_child(&row, value_cell);
		dom::append_child(&div, row);
	}
	div
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::to_tree::to_tree;

	#[test]
	fn image_is_wrapped_in_a_picture_element() {
		let doc = SharedDocument::new();
		to_tree("<body><main><p><img src=\"a.png\"></p></main></body>", &doc).expect("to_tree");
		let html = to_html(&doc).expect("to_html");
		assert!(html.contains("<picture>"));
		assert!(html.contains("loading=\"lazy\""));
	}

	#[test]
	fn linked_image_hoists_href_onto_the_anchor_not_the_img() {
		let doc = SharedDocument::new();
		to_tree(r#"<body><main><p><a href="x"><img src="y"></a></p></main></body>"#, &doc).expect("to_tree");
		let html = to_html(&doc).expect("to_html");
		assert!(html.contains(r#"<a href="x">"#));
		assert!(!html.contains(r#"<img src="y" href="x""#));
		assert_eq!(html.matches("href=\"x\"").count(), 1);
	}

	#[test]
	fn metadata_is_appended_as_trailing_div() {
		let doc = SharedDocument::new();
		to_tree(
			r#"<body><main><p>Hi</p><div class="da-metadata"><div><div>title</div><div>Doc</div></div></div></main></body>"#,
			&doc,
		)
		.expect("to_tree");
		let html = to_html(&doc).expect("to_html");
		assert!(html.contains("da-metadata"));
		assert!(html.contains("Doc"));
	}
}

// vim: ts=4
