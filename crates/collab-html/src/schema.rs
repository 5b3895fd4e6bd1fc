//! The schema-guided walk between the pre-processed DOM tree and the CRDT's
//! structured XML representation (§4.1.1 step 12, §4.1.2 steps 1-2).
//!
//! The tree schema mirrors the semantic HTML tags it's drawn from 1:1
//! (paragraph, heading, list/list-item, blockquote, pre, img, a, table, and
//! the two diff wrappers, with marks carried as nested inline elements) so
//! the mapping in both directions is a straightforward structural walk
//! rather than a second parser.

use markup5ever_rcdom::Handle;
use yrs::{Any, TransactionMut, Xml, XmlElementPrelim, XmlFragment, XmlFragmentRef, XmlOut, XmlTextPrelim};

use crate::dom;
use collab_types::prelude::*;

/// Walk a pre-processed DOM subtree into `fragment`, starting from `main`'s
/// children (the `<main>` wrapper itself carries no tree node).
pub fn html_to_fragment(
	main: &Handle,
	fragment: &XmlFragmentRef,
	txn: &mut TransactionMut,
) -> ClResult<()> {
	for child in dom::children(main) {
		append_dom_node(fragment, txn, &child)?;
	}
	Ok(())
}

fn append_dom_node(
	parent: &XmlFragmentRef,
	txn: &mut TransactionMut,
	node: &Handle,
) -> ClResult<()> {
	if dom::is_blank_text(node) {
		return Ok(());
	}
	if dom::is_text(node) {
		let idx = parent.len(txn);
		parent.insert(txn, idx, XmlTextPrelim::new(dom::text_content(node)));
		return Ok(());
	}
	let Some(tag) = dom::tag_name(node) else { return Ok(()) };

	let attrs = dom::all_attrs(node).into_iter().map(|(k, v)| (k, Any::from(v)));
	let idx = parent.len(txn);
	let element = parent.insert(txn, idx, XmlElementPrelim::new(tag, attrs));
	for child in dom::children(node) {
		append_dom_node_into_element(&element, txn, &child)?;
	}
	Ok(())
}

fn append_dom_node_into_element(
	parent: &yrs::XmlElementRef,
	txn: &mut TransactionMut,
	node: &Handle,
) -> ClResult<()> {
	if dom::is_blank_text(node) {
		return Ok(());
	}
	if dom::is_text(node) {
		let idx = parent.len(txn);
		parent.insert(txn, idx, XmlTextPrelim::new(dom::text_content(node)));
		return Ok(());
	}
	let Some(tag) = dom::tag_name(node) else { return Ok(()) };
	let attrs = dom::all_attrs(node).into_iter().map(|(k, v)| (k, Any::from(v)));
	let idx = parent.len(txn);
	let element = parent.insert(txn, idx, XmlElementPrelim::new(tag, attrs));
	for child in dom::children(node) {
		append_dom_node_into_element(&element, txn, &child)?;
	}
	Ok(())
}

/// Reverse of [`html_to_fragment`]: rebuild a DOM subtree (the direct
/// children of a synthetic `<main>`) from the CRDT's structured content.
pub fn fragment_to_html(fragment: &XmlFragmentRef, txn: &impl yrs::ReadTxn) -> Handle {
	let main = dom::new_element("main", &[]);
	for xml_node in fragment.iter(txn) {
		if let Some(child) = xml_out_to_dom(&xml_node, txn) {
			dom::append_child(&main, child);
		}
	}
	main
}

fn xml_out_to_dom(xml_node: &XmlOut, txn: &impl yrs::ReadTxn) -> Option<Handle> {
	match xml_node {
		XmlOut::Text(text) => Some(dom::new_text(&text.get_string(txn))),
		XmlOut::Element(el) => {
			let tag = el.tag().to_string();
			let attr_pairs: Vec<(String, String)> =
				el.attributes(txn).map(|(k, v)| (k.to_string(), v.to_string())).collect();
			let attr_refs: Vec<(&str, &str)> =
				attr_pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
			let dom_el = dom::new_element(&tag, &attr_refs);
			for child in el.children(txn) {
				if let Some(dom_child) = xml_out_to_dom(&child, txn) {
					dom::append_child(&dom_el, dom_child);
				}
			}
			Some(dom_el)
		}
		XmlOut::Fragment(_) => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use collab_crdt::SharedDocument;

	#[test]
	fn simple_paragraph_roundtrips_through_the_fragment() {
		let doc = SharedDocument::new();
		let root = dom::parse_fragment_lenient("<main><p>Hello</p></main>");
		let main = dom::find_first(&root, "main").expect("main");

		doc.clear_and_rebuild(|txn, fragment, _metadata| {
			html_to_fragment(&main, fragment, txn).expect("to_fragment");
		});

		let html = crate::to_html(&doc).expect("from_fragment");
		assert!(html.contains("Hello"));
		assert!(html.contains("<p>"));
	}

	#[test]
	fn arbitrary_attributes_survive_the_walk() {
		let doc = SharedDocument::new();
		let root = dom::parse_fragment_lenient(
			r#"<main><da-diff-deleted data-mdast="ignore"><p>Old</p></da-diff-deleted></main>"#,
		);
		let main = dom::find_first(&root, "main").expect("main");

		doc.clear_and_rebuild(|txn, fragment, _metadata| {
			html_to_fragment(&main, fragment, txn).expect("to_fragment");
		});

		let html = crate::to_html(&doc).expect("from_fragment");
		assert!(html.contains(r#"data-mdast="ignore""#));
	}
}

// vim: ts=4
