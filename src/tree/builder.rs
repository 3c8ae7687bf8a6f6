//! Tree builder for parsing XML text into the arena
//!
//! Blank text between elements is dropped and surrounding whitespace of text
//! runs is trimmed, so a parsed document re-serializes with canonical
//! indentation.

use crate::tree::{NodeId, Tree};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

/// Name given to the holder element of a parsed fragment
pub const FRAGMENT_HOLDER: &str = "fragment";

/// Structural parse failure with the 1-based line it was detected on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

fn line_at(input: &str, pos: usize) -> usize {
    let end = pos.min(input.len());
    input.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

fn error_at(input: &str, pos: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        line: line_at(input, pos),
        message: message.into(),
    }
}

fn open_element(
    tree: &mut Tree,
    input: &str,
    pos: usize,
    start: &BytesStart<'_>,
) -> Result<NodeId, ParseError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| error_at(input, pos, format!("invalid element name: {}", e)))?
        .to_string();
    let id = tree.new_element(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| error_at(input, pos, format!("bad attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| error_at(input, pos, format!("invalid attribute name: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| error_at(input, pos, format!("bad attribute value: {}", e)))?;
        tree.set_attr(id, &key, &value);
    }
    Ok(id)
}

/// Parse a sequence of nodes under `holder`.
///
/// Returns the top-level nodes that were attached to `holder`.
fn parse_into(tree: &mut Tree, holder: NodeId, input: &str) -> Result<Vec<NodeId>, ParseError> {
    let mut reader = Reader::from_str(input);

    let mut stack: Vec<NodeId> = vec![holder];
    let mut top_level = Vec::new();

    loop {
        let pos = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| error_at(input, reader.buffer_position(), e.to_string()))?;
        match event {
            Event::Start(start) => {
                let id = open_element(tree, input, pos, &start)?;
                let parent = *stack.last().unwrap_or(&holder);
                tree.append_child(parent, id);
                if parent == holder {
                    top_level.push(id);
                }
                stack.push(id);
            }
            Event::Empty(start) => {
                let id = open_element(tree, input, pos, &start)?;
                let parent = *stack.last().unwrap_or(&holder);
                tree.append_child(parent, id);
                if parent == holder {
                    top_level.push(id);
                }
            }
            Event::End(_) => {
                if stack.len() <= 1 {
                    return Err(error_at(input, pos, "unexpected closing tag"));
                }
                stack.pop();
            }
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| error_at(input, pos, format!("bad text: {}", e)))?;
                if content.trim().is_empty() {
                    continue;
                }
                let parent = *stack.last().unwrap_or(&holder);
                let id = tree.new_text(content.into_owned());
                tree.append_child(parent, id);
                if parent == holder {
                    top_level.push(id);
                }
            }
            Event::CData(data) => {
                let content = String::from_utf8_lossy(&data).into_owned();
                let parent = *stack.last().unwrap_or(&holder);
                let id = tree.new_text(content);
                tree.append_child(parent, id);
                if parent == holder {
                    top_level.push(id);
                }
            }
            Event::Eof => break,
            // Comments, declarations, processing instructions and doctypes
            // are not part of the configuration model.
            _ => {}
        }
    }

    if stack.len() > 1 {
        return Err(error_at(input, input.len(), "unexpected end of input"));
    }
    Ok(top_level)
}

/// Parse a single-rooted document; returns the detached root element.
pub fn parse_document(tree: &mut Tree, input: &str) -> Result<NodeId, ParseError> {
    let holder = tree.new_element(FRAGMENT_HOLDER);
    let parsed = parse_into(tree, holder, input);
    let top_level = match parsed {
        Ok(nodes) => nodes,
        Err(e) => {
            tree.remove_subtree(holder);
            return Err(e);
        }
    };

    let elements: Vec<NodeId> = top_level
        .iter()
        .copied()
        .filter(|n| tree.is_element(*n))
        .collect();
    if elements.len() != 1 || elements.len() != top_level.len() {
        tree.remove_subtree(holder);
        let message = if elements.is_empty() {
            "document has no root element".to_string()
        } else {
            "document must have exactly one root element".to_string()
        };
        return Err(error_at(input, input.len(), message));
    }

    let root = elements[0];
    tree.detach(root);
    tree.remove_subtree(holder);
    Ok(root)
}

/// Parse a bare node sequence (a snippet) under a fresh holder element.
pub fn parse_fragment(tree: &mut Tree, input: &str) -> Result<NodeId, ParseError> {
    let holder = tree.new_element(FRAGMENT_HOLDER);
    match parse_into(tree, holder, input) {
        Ok(_) => Ok(holder),
        Err(e) => {
            tree.remove_subtree(holder);
            Err(e)
        }
    }
}
