//! Node types stored in the document arena

use indexmap::IndexMap;
use std::fmt;

/// Stable handle to a node in a [`Tree`](super::Tree).
///
/// The `doc` field identifies the owning arena and `generation` the slot
/// occupancy, so a handle kept across a removal or a reload never resolves
/// to a different node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) doc: u32,
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Serial of the document arena that allocated this node
    pub fn doc(&self) -> u32 {
        self.doc
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.doc, self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

/// A single tree node.
///
/// Attributes live on their element as an ordered map; text content lives on
/// `Text` nodes only.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub name: String,
    pub text: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            name: name.into(),
            text: String::new(),
            attrs: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            name: "text".to_string(),
            text: content.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Namespace prefix of the element name (`ns` in `ns:name`)
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Element name without its namespace prefix
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }
}
