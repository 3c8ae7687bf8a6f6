//! Document Tree
//!
//! Generational arena holding every node of a loaded configuration. The host
//! document, each included source document and each backing-store root are
//! separate roots inside the same arena; splicing between them only moves
//! indices around, so no node is ever copied or aliased.

pub mod builder;
pub mod node;
pub mod path;
pub mod writer;

pub use node::{Node, NodeId, NodeKind};

use indexmap::IndexMap;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of nodes keyed by stable [`NodeId`]s
pub struct Tree {
    doc: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Tree {
    /// Create an empty arena; `doc` tags every id it hands out
    pub fn new(doc: u32) -> Self {
        Self {
            doc,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn doc(&self) -> u32 {
        self.doc
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId {
                doc: self.doc,
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                doc: self.doc,
                index,
                generation: 0,
            }
        }
    }

    /// Allocate a detached element
    pub fn new_element(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::element(name))
    }

    /// Allocate a detached text node
    pub fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::text(text))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.doc != self.doc {
            return None;
        }
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.doc != self.doc {
            return None;
        }
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.name.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).map(Node::is_element).unwrap_or(false)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Element children only, in document order
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.get(id)
            .and_then(|n| n.attrs.get(key))
            .map(String::as_str)
    }

    pub fn attrs(&self, id: NodeId) -> Option<&IndexMap<String, String>> {
        self.get(id).map(|n| &n.attrs)
    }

    /// Create or overwrite an attribute; returns false for a missing node
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) -> bool {
        match self.get_mut(id) {
            Some(node) if node.is_element() => {
                node.attrs.insert(key.to_string(), value.to_string());
                true
            }
            _ => false,
        }
    }

    /// Append `child` under `parent`, detaching it from any previous parent
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        true
    }

    /// Unlink a node from its parent's children list
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
    }

    /// Replace a node's children list wholesale, returning the old list.
    ///
    /// Parent pointers of both lists are left untouched; callers re-parent
    /// explicitly with [`Tree::set_parent`].
    pub fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) -> Vec<NodeId> {
        match self.get_mut(id) {
            Some(node) => std::mem::replace(&mut node.children, children),
            None => Vec::new(),
        }
    }

    pub fn set_parent(&mut self, ids: &[NodeId], parent: Option<NodeId>) {
        for id in ids {
            if let Some(node) = self.get_mut(*id) {
                node.parent = parent;
            }
        }
    }

    /// Move the entire children list of `from` to the end of `to`'s list
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let moved = self.replace_children(from, Vec::new());
        self.set_parent(&moved, Some(to));
        if let Some(node) = self.get_mut(to) {
            node.children.extend(moved);
        }
    }

    /// Pre-order list of `id` and all of its descendants
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Detach and free a node with its whole subtree; returns the freed ids
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        self.detach(id);
        let freed = self.descendants(id);
        for node in &freed {
            let slot = &mut self.slots[node.index as usize];
            slot.node = None;
            self.free.push(node.index);
        }
        freed
    }

    /// Concatenated text of the node and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(n) = self.get(node) {
                if n.kind == NodeKind::Text {
                    out.push_str(&n.text);
                }
            }
        }
        out
    }

    /// True when the element directly holds non-empty text
    pub fn has_text_child(&self, id: NodeId) -> bool {
        self.children(id).iter().any(|c| {
            self.get(*c)
                .map(|n| n.kind == NodeKind::Text && !n.text.trim().is_empty())
                .unwrap_or(false)
        })
    }

    /// Walk parents up to the top of whatever tree the node is attached to
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).contains(&ancestor)
    }
}
