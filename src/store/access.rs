//! Section lookup, typed getters and setters

use super::values::{
    format_boolean, format_float, string_to_boolean, string_to_float, string_to_int,
    string_to_int64,
};
use super::ConfStore;
use crate::error::ConfError;
use crate::include::shuffle::drop_within;
use crate::include::INCLUDE_ELEMENT;
use crate::tree::NodeId;
use tracing::{debug, warn};
use uuid::Uuid;

/// Element names accepted by [`ConfStore::add_section`]
fn valid_section_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

impl ConfStore {
    /// A context that no longer belongs to the live document
    pub(super) fn stale(&self, ctx: Option<NodeId>) -> bool {
        matches!(ctx, Some(id) if !self.tree.contains(id))
    }

    /// First element or text node selected by `path`
    pub fn get_section(&self, ctx: Option<NodeId>, path: &str) -> Option<NodeId> {
        self.get_sections(ctx, path).into_iter().next()
    }

    /// Every node selected by `path`, in document order
    pub fn get_sections(&self, ctx: Option<NodeId>, path: &str) -> Vec<NodeId> {
        if self.stale(ctx) {
            return Vec::new();
        }
        let Some(selector) = self.selector() else {
            return Vec::new();
        };
        match selector.select_nodes(ctx, path) {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!(path, error = %e, "section lookup failed");
                Vec::new()
            }
        }
    }

    /// String value of the last node selected by `path`, or the fallback
    /// registered for its absolute form.
    fn lookup(&self, ctx: Option<NodeId>, path: &str) -> Option<String> {
        if self.stale(ctx) {
            return None;
        }
        if let Some(selector) = self.selector() {
            match selector.select(ctx, path) {
                Ok(items) => {
                    if let Some(last) = items.last() {
                        return Some(selector.string_value(last));
                    }
                }
                Err(e) => debug!(path, error = %e, "value lookup failed"),
            }
        }

        let key = match ctx {
            Some(id) if !path.starts_with('/') => match self.node_path(id) {
                Some(base) => format!("{}/{}", base, path),
                None => path.to_string(),
            },
            _ => path.to_string(),
        };
        self.fallback(&key).map(str::to_string)
    }

    pub fn get_string(&self, ctx: Option<NodeId>, path: &str) -> Option<String> {
        self.lookup(ctx, path)
    }

    pub fn get_int(&self, ctx: Option<NodeId>, path: &str) -> Option<i32> {
        self.lookup(ctx, path).map(|v| string_to_int(&v))
    }

    pub fn get_int64(&self, ctx: Option<NodeId>, path: &str) -> Option<i64> {
        self.lookup(ctx, path).map(|v| string_to_int64(&v))
    }

    pub fn get_float(&self, ctx: Option<NodeId>, path: &str) -> Option<f32> {
        self.lookup(ctx, path).map(|v| string_to_float(&v))
    }

    pub fn get_boolean(&self, ctx: Option<NodeId>, path: &str) -> Option<bool> {
        self.lookup(ctx, path).map(|v| string_to_boolean(&v))
    }

    /// A value that is present but not a UUID reads as not found
    pub fn get_uuid(&self, ctx: Option<NodeId>, path: &str) -> Option<Uuid> {
        let value = self.lookup(ctx, path)?;
        match Uuid::parse_str(value.trim()) {
            Ok(uuid) => Some(uuid),
            Err(e) => {
                debug!(path, value = %value, error = %e, "value is not a uuid");
                None
            }
        }
    }

    /// Set a value below `node`.
    ///
    /// `@name` creates or overwrites an attribute of `node`. A bare `name`
    /// appends a new `<name>value</name>` child every time, so repeated
    /// calls accumulate siblings. Paths with more than one step are refused.
    pub fn set_string(&mut self, node: NodeId, path: &str, value: &str) -> bool {
        if !self.tree.is_element(node) {
            return false;
        }
        if path.is_empty() || path == "@" || path.contains('/') {
            debug!(path, "refusing multi-step set");
            return false;
        }

        let dirty = if let Some(attr) = path.strip_prefix('@') {
            self.tree.set_attr(node, attr, value);
            node
        } else {
            let child = self.tree.new_element(path);
            let text = self.tree.new_text(value);
            self.tree.append_child(child, text);
            self.tree.append_child(node, child);
            child
        };
        self.backing.mark_dirty(&self.tree, dirty);
        self.mark_changed();
        self.request_write();
        true
    }

    pub fn set_int(&mut self, node: NodeId, path: &str, value: i32) -> bool {
        self.set_string(node, path, &value.to_string())
    }

    pub fn set_float(&mut self, node: NodeId, path: &str, value: f32) -> bool {
        self.set_string(node, path, &format_float(value))
    }

    pub fn set_boolean(&mut self, node: NodeId, path: &str, value: bool) -> bool {
        self.set_string(node, path, format_boolean(value))
    }

    fn check_reserved(&self, name: &str) -> Result<(), ConfError> {
        if name == INCLUDE_ELEMENT || self.hooks.is_reserved(name) {
            return Err(ConfError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    /// Append an empty `<name/>` element to `node`
    pub fn add_section(&mut self, node: NodeId, name: &str) -> Result<NodeId, ConfError> {
        if !self.tree.is_element(node) {
            return Err(ConfError::InvalidNode(format!("{} is not a live element", node)));
        }
        if !valid_section_name(name) {
            return Err(ConfError::InvalidNode(format!("'{}' is not a valid section name", name)));
        }
        self.check_reserved(name)?;

        let child = self.tree.new_element(name);
        self.tree.append_child(node, child);
        self.backing.mark_dirty(&self.tree, child);
        self.mark_changed();
        self.request_write();
        Ok(child)
    }

    /// Detach and free the subtree at `node`.
    ///
    /// Backing-store files of the subtree are queued for deletion at the
    /// next write. The document root and subtrees holding a backing-store
    /// mount cannot be removed.
    pub fn remove_section(&mut self, node: NodeId) -> Result<(), ConfError> {
        let root = self.root().ok_or(ConfError::NoDocument)?;
        let name = match self.tree.name(node) {
            Some(name) if self.tree.is_element(node) => name.to_string(),
            _ => return Err(ConfError::InvalidNode(format!("{} is not a live element", node))),
        };
        if node == root {
            return Err(ConfError::InvalidNode("the document root cannot be removed".into()));
        }
        self.check_reserved(&name)?;
        if self.backing.contains_mount(&self.tree, node) {
            return Err(ConfError::InvalidNode(format!(
                "{} holds a backing store",
                self.node_path(node).unwrap_or(name)
            )));
        }

        let parent = self.tree.parent(node);
        let queued = self.backing.queue_removal(&self.tree, node);
        let dropped = drop_within(&mut self.includes, &mut self.tree, node);
        if dropped > 0 {
            warn!(includes = dropped, "removed section contained includes");
        }
        self.tree.remove_subtree(node);
        if let Some(parent) = parent {
            self.backing.mark_dirty(&self.tree, parent);
        }
        debug!(section = %name, queued, "section removed");
        self.mark_changed();
        self.request_write();
        Ok(())
    }
}
