//! Thin helpers over `html5ever`/`markup5ever_rcdom`: lenient fragment
//! parsing, serialization, and the small set of tree-walking predicates the
//! converter needs (attribute lookup, tag matching, child/sibling access).
//! This is the only place that touches the parser crates directly.

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, serialize, ParseOpts, QualName};
pub use markup5ever_rcdom::Handle;
use markup5ever_rcdom::{NodeData, RcDom, SerializableHandle};

use collab_types::prelude::*;

/// Parse `html` as a lenient HTML fragment rooted at `<body>`.
pub fn parse_fragment_lenient(html: &str) -> Handle {
	let dom = parse_fragment(
		RcDom::default(),
		ParseOpts::default(),
		QualName::new(None, ns!(html), local_name!("body")),
		vec![],
	)
	.from_utf8()
	.one(html.as_bytes());
	dom.document
}

/// Serialize a node (and its descendants) back to an HTML string.
pub fn serialize_node(handle: &Handle) -> ClResult<String> {
	let mut buf = Vec::new();
	let serializable: SerializableHandle = handle.clone().into();
	serialize(&mut buf, &serializable, Default::default())
		.map_err(|e| Error::Convert(format!("serialize failed: {e}")))?;
	String::from_utf8(buf).map_err(|e| Error::Convert(e.to_string()))
}

pub fn new_element(name: &str, attrs: &[(&str, &str)]) -> Handle {
	let attrs = attrs
		.iter()
		.map(|(k, v)| html5ever::Attribute {
			name: html5ever::QualName::new(None, ns!(), (*k).into()),
			value: (*v).into(),
		})
		.collect();
	Rc::new(markup5ever_rcdom::Node::new(NodeData::Element {
		name: QualName::new(None, ns!(html), (*name).into()),
		attrs: RefCell::new(attrs),
		template_contents: RefCell::new(None),
		mathml_annotation_xml_integration_point: false,
	}))
}

pub fn new_text(text: &str) -> Handle {
	Rc::new(markup5ever_rcdom::Node::new(NodeData::Text { contents: RefCell::new(text.into()) }))
}

pub fn tag_name(node: &Handle) -> Option<String> {
	match &node.data {
		NodeData::Element { name, .. } => Some(name.local.to_string()),
		_ => None,
	}
}

pub fn is_element(node: &Handle, name: &str) -> bool {
	tag_name(node).as_deref() == Some(name)
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
	match &node.data {
		NodeData::Element { attrs, .. } => {
			attrs.borrow().iter().find(|a| &*a.name.local == name).map(|a| a.value.to_string())
		}
		_ => None,
	}
}

pub fn has_attr(node: &Handle, name: &str) -> bool {
	attr(node, name).is_some()
}

/// Every attribute on `node`, in source order.
pub fn all_attrs(node: &Handle) -> Vec<(String, String)> {
	match &node.data {
		NodeData::Element { attrs, .. } => {
			attrs.borrow().iter().map(|a| (a.name.local.to_string(), a.value.to_string())).collect()
		}
		_ => Vec::new(),
	}
}

pub fn set_attr(node: &Handle, name: &str, value: &str) {
	if let NodeData::Element { attrs, .. } = &node.data {
		let mut attrs = attrs.borrow_mut();
		if let Some(a) = attrs.iter_mut().find(|a| &*a.name.local == name) {
			a.value = value.into();
		} else {
			attrs.push(html5ever::Attribute {
				name: html5ever::QualName::new(None, ns!(), name.into()),
				value: value.into(),
			});
		}
	}
}

pub fn remove_attr(node: &Handle, name: &str) {
	if let NodeData::Element { attrs, .. } = &node.data {
		attrs.borrow_mut().retain(|a| &*a.name.local != name);
	}
}

pub fn class_list(node: &Handle) -> Vec<String> {
	attr(node, "class")
		.map(|c| c.split_whitespace().map(str::to_string).collect())
		.unwrap_or_default()
}

pub fn children(node: &Handle) -> Vec<Handle> {
	node.children.borrow().clone()
}

pub fn is_text(node: &Handle) -> bool {
	matches!(node.data, NodeData::Text { .. })
}

pub fn is_comment(node: &Handle) -> bool {
	matches!(node.data, NodeData::Comment { .. })
}

pub fn text_content(node: &Handle) -> String {
	match &node.data {
		NodeData::Text { contents } => contents.borrow().to_string(),
		_ => children(node).iter().map(text_content).collect(),
	}
}

pub fn is_blank_text(node: &Handle) -> bool {
	is_text(node) && text_content(node).trim().is_empty()
}

/// Depth-first search for the first descendant (or self) matching `name`.
pub fn find_first<'a>(node: &'a Handle, name: &str) -> Option<Handle> {
	if is_element(node, name) {
		return Some(node.clone());
	}
	for child in node.children.borrow().iter() {
		if let Some(found) = find_first(child, name) {
			return Some(found);
		}
	}
	None
}

pub fn append_child(parent: &Handle, child: Handle) {
	parent.children.borrow_mut().push(child);
}

pub fn replace_children(parent: &Handle, new_children: Vec<Handle>) {
	*parent.children.borrow_mut() = new_children;
}

// vim: ts=4
