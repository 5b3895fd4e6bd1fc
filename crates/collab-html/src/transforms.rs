//! The HTML <-> tree pre/post-processing passes that run around the
//! schema-guided walk: legacy tag rewriting, regional-edit wrapping,
//! link-wraps-image normalization, comment stripping, and section
//! splitting/joining (§4.1.1 steps 2-11, §4.1.2 steps 3-5).

use std::collections::BTreeMap;

use markup5ever_rcdom::{Handle, NodeData};

use crate::dom::*;

/// Step 2: rename legacy `<da-loc-added>`/`<da-loc-deleted>` to their
/// current `da-diff-*` names, recursively. `markup5ever_rcdom` elements are
/// immutable in their tag name, so a matching element is rebuilt fresh and
/// spliced into its parent's child list rather than mutated in place.
pub fn rewrite_legacy_tags(node: &Handle) {
	let kids = children(node);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		rewrite_legacy_tags(&child);
		let legacy_name = match &child.data {
			NodeData::Element { name, .. } => match &*name.local {
				"da-loc-added" => Some("da-diff-added"),
				"da-loc-deleted" => Some("da-diff-deleted"),
				_ => None,
			},
			_ => None,
		};
		match legacy_name {
			Some(new_name) => new_kids.push(rebuild_with_name(&child, new_name)),
			None => new_kids.push(child),
		}
	}
	replace_children(node, new_kids);
}

/// Clone `node` as a new element named `new_name`, carrying over its
/// attributes and children.
fn rebuild_with_name(node: &Handle, new_name: &str) -> Handle {
	let attrs: Vec<(String, String)> = match &node.data {
		NodeData::Element { attrs, .. } => {
			attrs.borrow().iter().map(|a| (a.name.local.to_string(), a.value.to_string())).collect()
		}
		_ => Vec::new(),
	};
	let attr_refs: Vec<(&str, &str)> = attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
	let rebuilt = new_element(new_name, &attr_refs);
	replace_children(&rebuilt, children(node));
	rebuilt
}

/// A block-group-start/end marker spans an element across several sibling
/// blocks (e.g. a multi-row table body represented as separate top-level
/// divs) so a single regional-edit wrapper can cover the whole group.
fn is_block_group_start(node: &Handle) -> bool {
	attr(node, "data-block-group").as_deref() == Some("start")
}

fn is_block_group_end(node: &Handle) -> bool {
	attr(node, "data-block-group").as_deref() == Some("end")
}

/// Step 6: wrap any element carrying `da-diff-added` in a synthesized
/// `<da-diff-added>` wrapper, recursively. A run of adjacent tagged
/// siblings is merged into a single wrapper; a tagged block-group-start
/// additionally absorbs every sibling up to and including its matching
/// block-group-end, nested groups included.
pub fn wrap_diff_added(node: &Handle) {
	let kids = children(node);
	let mut new_kids: Vec<Handle> = Vec::with_capacity(kids.len());
	let mut pending: Vec<Handle> = Vec::new();

	let flush = |pending: &mut Vec<Handle>, out: &mut Vec<Handle>| {
		if pending.is_empty() {
			return;
		}
		let wrapper = new_element("da-diff-added", &[]);
		replace_children(&wrapper, std::mem::take(pending));
		out.push(wrapper);
	};

	let mut i = 0;
	while i < kids.len() {
		let child = kids[i].clone();
		wrap_diff_added(&child);
		if has_attr(&child, "da-diff-added") {
			let starts_group = is_block_group_start(&child);
			pending.push(child);
			if starts_group {
				let mut depth = 1usize;
				i += 1;
				while i < kids.len() && depth > 0 {
					let sibling = kids[i].clone();
					wrap_diff_added(&sibling);
					if is_block_group_start(&sibling) {
						depth += 1;
					}
					if is_block_group_end(&sibling) {
						depth -= 1;
					}
					pending.push(sibling);
					i += 1;
				}
				continue;
			}
		} else {
			flush(&mut pending, &mut new_kids);
			new_kids.push(child);
		}
		i += 1;
	}
	flush(&mut pending, &mut new_kids);
	replace_children(node, new_kids);
}

/// Step 5: extract and remove a top-level `<div class="da-metadata">`,
/// parsing its rows as two-column key/value pairs.
pub fn extract_metadata(main: &Handle) -> BTreeMap<String, String> {
	let mut metadata = BTreeMap::new();
	let mut kept = Vec::new();
	for child in children(main) {
		if is_element(&child, "div") && class_list(&child).iter().any(|c| c == "da-metadata") {
			for row in children(&child) {
				let cells: Vec<Handle> = children(&row).into_iter().filter(|c| !is_blank_text(c)).collect();
				if cells.len() == 2 {
					metadata.insert(text_content(&cells[0]).trim().to_string(), text_content(&cells[1]).trim().to_string());
				}
			}
		} else {
			kept.push(child);
		}
	}
	replace_children(main, kept);
	metadata
}

/// Step 7: hoist `href`/`title`/`da-diff-added` from an `<a>` wrapping an
/// image onto the `<img>` itself, dropping the wrapping `<a>`.
pub fn hoist_link_wrapped_images(node: &Handle) {
	let kids = children(node);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		if is_element(&child, "a") {
			if let Some(img) = find_image_descendant(&child) {
				if let Some(href) = attr(&child, "href") {
					set_attr(&img, "href", &href);
				}
				if let Some(title) = attr(&child, "title") {
					set_attr(&img, "title", &title);
				}
				if has_attr(&child, "da-diff-added") {
					set_attr(&img, "da-diff-added", "");
				}
				for grandchild in children(&child) {
					hoist_link_wrapped_images(&grandchild);
					new_kids.push(grandchild);
				}
				continue;
			}
		}
		hoist_link_wrapped_images(&child);
		new_kids.push(child);
	}
	replace_children(node, new_kids);
}

fn find_image_descendant(node: &Handle) -> Option<Handle> {
	if is_element(node, "img") {
		return Some(node.clone());
	}
	if is_element(node, "picture") {
		return find_first(node, "img");
	}
	for child in children(node) {
		if is_element(&child, "img") || is_element(&child, "picture") {
			return find_image_descendant(&child);
		}
	}
	None
}

/// Step 8: strip HTML comment nodes everywhere.
pub fn strip_comments(node: &Handle) {
	let kept: Vec<Handle> = children(node).into_iter().filter(|c| !is_comment(c)).collect();
	replace_children(node, kept);
	for child in children(node) {
		strip_comments(&child);
	}
}

/// Step 10: a `<p>` whose sole text child is exactly `---` becomes an `<hr>`.
pub fn detect_section_breaks(node: &Handle) {
	let kids = children(node);
	let mut new_kids = Vec::with_capacity(kids.len());
	for child in kids {
		if is_element(&child, "p") {
			let text_children: Vec<_> = children(&child).into_iter().filter(|c| !is_blank_text(c)).collect();
			if text_children.len() == 1 && is_text(&text_children[0]) && text_content(&text_children[0]).trim() == "---" {
				new_kids.push(new_element("hr", &[]));
				continue;
			}
		}
		detect_section_breaks(&child);
		new_kids.push(child);
	}
	replace_children(node, new_kids);
}

/// Step 11: every top-level `<div>` after the first becomes an `<hr>`
/// (flanked by empty `<p>` spacers) followed by its inline contents.
pub fn split_sections(main: &Handle) {
	let kids = children(main);
	let mut new_kids = Vec::new();
	let mut seen_div = false;
	for child in kids {
		if is_element(&child, "div") {
			if seen_div {
				new_kids.push(new_element("p", &[]));
				new_kids.push(new_element("hr", &[]));
				new_kids.push(new_element("p", &[]));
			}
			seen_div = true;
			new_kids.extend(children(&child));
		} else {
			new_kids.push(child);
		}
	}
	replace_children(main, new_kids);
}

/// Step 5 of the reverse direction: split the flat sequence at every `<hr>`
/// back into sibling `<div>` sections.
pub fn join_sections(main: &Handle) {
	let kids = children(main);
	let mut sections: Vec<Vec<Handle>> = vec![Vec::new()];
	for child in kids {
		if is_element(&child, "hr") {
			sections.push(Vec::new());
		} else if is_element(&child, "p") && children(&child).iter().all(is_blank_text) {
			// drop the spacer paragraphs introduced around `<hr>` in step 11
		} else {
			if let Some(last) = sections.last_mut() {
				last.push(child);
			}
		}
	}
	let divs: Vec<Handle> = sections
		.into_iter()
		.filter(|s| !s.is_empty())
		.map(|s| {
			let div = new_element("div", &[]);
			replace_children(&div, s);
			div
		})
		.collect();
	replace_children(main, divs);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dom::{parse_fragment_lenient, serialize_node};

	#[test]
	fn metadata_div_is_extracted() {
		let root = parse_fragment_lenient(
			r#"<main><div class="da-metadata"><div><div>title</div><div>Hello</div></div></div></main>"#,
		);
		let main = find_first(&root, "main").expect("main");
		let metadata = extract_metadata(&main);
		assert_eq!(metadata.get("title").map(String::as_str), Some("Hello"));
	}

	#[test]
	fn comments_are_stripped() {
		let root = parse_fragment_lenient("<p>hi<!-- note --></p>");
		strip_comments(&root);
		let html = serialize_node(&root).expect("serialize");
		assert!(!html.contains("note"));
	}

	#[test]
	fn section_break_paragraph_becomes_hr() {
		let root = parse_fragment_lenient("<div><p>---</p></div>");
		detect_section_breaks(&root);
		let html = serialize_node(&root).expect("serialize");
		assert!(html.contains("<hr"));
	}

	#[test]
	fn single_tagged_element_is_wrapped() {
		let root = parse_fragment_lenient(r#"<main><p da-diff-added="">Hi</p></main>"#);
		let main = find_first(&root, "main").expect("main");
		wrap_diff_added(&main);
		let html = serialize_node(&main).expect("serialize");
		assert!(html.contains("<da-diff-added>"));
	}

	#[test]
	fn block_group_absorbs_untagged_siblings_until_the_matching_end() {
		let root = parse_fragment_lenient(
			r#"<main><div da-diff-added="" data-block-group="start">a</div><div>b</div><div data-block-group="end">c</div><p>after</p></main>"#,
		);
		let main = find_first(&root, "main").expect("main");
		wrap_diff_added(&main);

		let wrapper = find_first(&main, "da-diff-added").expect("wrapper");
		let wrapped_divs: Vec<_> = children(&wrapper).into_iter().filter(|c| is_element(c, "div")).collect();
		assert_eq!(wrapped_divs.len(), 3);

		let html = serialize_node(&main).expect("serialize");
		assert!(html.contains("after"));
		assert!(!html.contains("<da-diff-added>after"));
	}
}

// vim: ts=4
