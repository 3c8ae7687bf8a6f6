//! Serialization of arena subtrees back to XML text

use crate::tree::{NodeId, NodeKind, Tree};
use indexmap::IndexMap;
use quick_xml::escape::escape;

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf8\"?>\n";

fn write_attrs(out: &mut String, attrs: &IndexMap<String, String>) {
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Write one node (and its subtree) with two-space indentation.
///
/// Elements with any text child are written on one line exactly as held,
/// so re-reading never picks up indentation as text. Everything else
/// places each child on its own line.
pub fn write_node(tree: &Tree, id: NodeId, depth: usize, out: &mut String) {
    write_node_with(tree, id, depth, None, out);
}

fn write_node_with(
    tree: &Tree,
    id: NodeId,
    depth: usize,
    extra_attrs: Option<&IndexMap<String, String>>,
    out: &mut String,
) {
    let Some(node) = tree.get(id) else {
        return;
    };
    indent(out, depth);
    if node.kind == NodeKind::Text {
        out.push_str(&escape(node.text.as_str()));
        out.push('\n');
        return;
    }

    out.push('<');
    out.push_str(&node.name);
    if let Some(extra) = extra_attrs {
        let missing: IndexMap<String, String> = extra
            .iter()
            .filter(|(k, _)| !node.attrs.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        write_attrs(out, &missing);
    }
    write_attrs(out, &node.attrs);

    if node.children.is_empty() {
        out.push_str("/>\n");
        return;
    }

    let has_text = node
        .children
        .iter()
        .any(|c| tree.get(*c).map(|n| n.kind == NodeKind::Text).unwrap_or(false));
    if has_text {
        out.push('>');
        for child in &node.children {
            write_inline(tree, *child, out);
        }
    } else {
        out.push_str(">\n");
        for child in &node.children {
            write_node_with(tree, *child, depth + 1, None, out);
        }
        indent(out, depth);
    }
    out.push_str("</");
    out.push_str(&node.name);
    out.push_str(">\n");
}

fn write_inline(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    if node.kind == NodeKind::Text {
        out.push_str(&escape(node.text.as_str()));
        return;
    }
    out.push('<');
    out.push_str(&node.name);
    write_attrs(out, &node.attrs);
    if node.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &node.children {
        write_inline(tree, *child, out);
    }
    out.push_str("</");
    out.push_str(&node.name);
    out.push('>');
}

/// Serialize `root` as a complete document with an XML declaration
pub fn write_document(tree: &Tree, root: NodeId) -> String {
    let mut out = String::from(XML_DECLARATION);
    write_node(tree, root, 0, &mut out);
    out
}

/// Serialize `root` as a document, declaring `namespaces` on the root
/// element unless it already carries them.
pub fn write_document_with_namespaces(
    tree: &Tree,
    root: NodeId,
    namespaces: &IndexMap<String, String>,
) -> String {
    let mut out = String::from(XML_DECLARATION);
    write_node_with(tree, root, 0, Some(namespaces), &mut out);
    out
}

/// Serialize the children of a fragment holder as a bare node sequence
pub fn write_fragment(tree: &Tree, holder: NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(holder) {
        write_node(tree, *child, 0, &mut out);
    }
    out
}

/// Serialize an element with only its attribute set (used for `.attrs`)
pub fn write_attrs_document(name: &str, attrs: &IndexMap<String, String>) -> String {
    let mut out = String::from(XML_DECLARATION);
    out.push('<');
    out.push_str(name);
    write_attrs(&mut out, attrs);
    out.push_str("/>\n");
    out
}
