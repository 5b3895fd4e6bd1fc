//! Block <-> table conversion (§4.1.1 step 9, §4.1.2 step 3).
//!
//! A classed `<div>` block is serialized as a `<table>` whose header row
//! names the block (`first-class (remaining, classes)`), and deserialized
//! back into a classed `<div>` by reversing `to_block_css_class_names`.

use crate::dom::*;
use markup5ever_rcdom::Handle;

/// `"marquee light"` -> `"marquee (light)"`; the reverse of
/// [`to_block_css_class_names`].
pub fn block_header_from_classes(classes: &[String]) -> String {
	match classes.split_first() {
		None => String::new(),
		Some((first, rest)) if rest.is_empty() => first.clone(),
		Some((first, rest)) => format!("{first} ({})", rest.join(", ")),
	}
}

/// Reverse of [`block_header_from_classes`]: turn a table header's text back
/// into a lowercase, dash-joined class list.
pub fn to_block_css_class_names(header: &str) -> Vec<String> {
	let (first, rest) = match header.split_once('(') {
		Some((first, rest)) => (first.trim(), Some(rest.trim_end_matches(')'))),
		None => (header.trim(), None),
	};
	let mut classes = vec![normalize_class(first)];
	if let Some(rest) = rest {
		for part in rest.split(',') {
			let part = part.trim();
			if !part.is_empty() {
				classes.push(normalize_class(part));
			}
		}
	}
	classes.retain(|c| !c.is_empty());
	classes
}

fn normalize_class(raw: &str) -> String {
	let lowered = raw.to_lowercase();
	let mut out = String::with_capacity(lowered.len());
	let mut last_was_dash = false;
	for ch in lowered.chars() {
		if ch.is_ascii_alphanumeric() {
			out.push(ch);
			last_was_dash = false;
		} else if !last_was_dash {
			out.push('-');
			last_was_dash = true;
		}
	}
	out.trim_matches('-').to_string()
}

/// Convert a classed `<div>` into a `<table>`, recursing into nested classed
/// `<div>` rows. Non-classed children are left as inline content of the
/// spanning header cell's sibling rows.
pub fn div_to_table(div: &Handle) -> Handle {
	let classes = class_list(div);
	let header_text = block_header_from_classes(&classes);

	let table = new_element("table", &[]);
	let header_row = new_element("tr", &[]);
	let header_cell = new_element("td", &[("colspan", "0")]);
	append_child(&header_cell, new_text(&header_text));
	append_child(&header_row, header_cell);
	append_child(&table, header_row);

	let rows: Vec<Handle> = children(div)
		.into_iter()
		.filter(|c| !is_blank_text(c) && !is_comment(c))
		.collect();
	let widest = rows
		.iter()
		.map(|r| if is_element(r, "div") { children(r).iter().filter(|c| !is_blank_text(c)).count() } else { 1 })
		.max()
		.unwrap_or(1)
		.max(1);

	for row in rows {
		let cells: Vec<Handle> = if is_element(&row, "div") {
			children(&row).into_iter().filter(|c| !is_blank_text(c)).collect()
		} else {
			vec![row]
		};
		let tr = new_element("tr", &[]);
		let last = cells.len();
		for (i, cell_content) in cells.into_iter().enumerate() {
			let colspan = if i + 1 == last && last < widest { widest - last + 1 } else { 1 };
			let td = new_element("td", &[("colspan", &colspan.to_string())]);
			append_child(&td, cell_content);
			append_child(&tr, td);
		}
		append_child(&table, tr);
	}

	if let Some(id) = attr(div, "data-id") {
		set_attr(&table, "data-id", &id);
	}
	if has_attr(div, "da-diff-added") {
		set_attr(&table, "da-diff-added", "");
	}
	table
}

/// Reverse of [`div_to_table`]: the first row's single cell names the block;
/// remaining rows become the `<div>`'s children.
pub fn table_to_div(table: &Handle) -> Handle {
	let rows = children(table);
	let header_text = rows.first().map(text_content).unwrap_or_default();
	let classes = to_block_css_class_names(&header_text);
	let class_attr = classes.join(" ");

	let div = new_element("div", &[("class", &class_attr)]);
	for row in rows.into_iter().skip(1) {
		let cells = children(&row);
		if cells.len() == 1 {
			for child in children(&cells[0]) {
				append_child(&div, child);
			}
		} else {
			let row_div = new_element("div", &[]);
			for cell in cells {
				for child in children(&cell) {
					append_child(&row_div, child);
				}
			}
			append_child(&div, row_div);
		}
	}
	if let Some(id) = attr(table, "data-id") {
		set_attr(&div, "data-id", &id);
	}
	if has_attr(table, "da-diff-added") {
		set_attr(&div, "da-diff-added", "");
	}
	div
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_and_classes_roundtrip() {
		let classes = vec!["marquee".to_string(), "light".to_string()];
		let header = block_header_from_classes(&classes);
		assert_eq!(header, "marquee (light)");
		assert_eq!(to_block_css_class_names(&header), classes);
	}

	#[test]
	fn single_class_has_no_parens() {
		assert_eq!(block_header_from_classes(&["callout".to_string()]), "callout");
		assert_eq!(to_block_css_class_names("callout"), vec!["callout".to_string()]);
	}

	#[test]
	fn normalize_class_collapses_non_alphanumerics() {
		assert_eq!(normalize_class("Light Blue!!"), "light-blue");
	}
}

// vim: ts=4
