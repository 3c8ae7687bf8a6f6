//! Layered key/value resolution
//!
//! A hash for `path` is built from three layers, applied in order so later
//! layers win:
//!
//! 1. the same-named section one level further out, when the path matches
//!    at several depths of the context's ancestry;
//! 2. the section named by an `inherit="id"` attribute;
//! 3. the direct element children of the matched section itself.
//!
//! A child called `value` contributes under its `name` attribute, so
//! `<value name="k">v</value>` and `<k>v</k>` are equivalent; without a `name` the
//! key stays `value`.

use super::ConfStore;
use crate::tree::NodeId;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

const INHERIT_ATTR: &str = "inherit";

impl ConfStore {
    /// Unprefixed key/value pairs for `path`
    pub fn get_hash(&self, ctx: Option<NodeId>, path: &str) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        self.resolve_into(ctx, path, None, &mut out, &mut HashSet::new());
        out
    }

    /// Pairs whose element carries the `ns` prefix; `None` when empty
    pub fn get_namespaced_hash(
        &self,
        ctx: Option<NodeId>,
        path: &str,
        ns: &str,
    ) -> Option<IndexMap<String, String>> {
        let mut out = IndexMap::new();
        self.resolve_into(ctx, path, Some(ns), &mut out, &mut HashSet::new());
        (!out.is_empty()).then_some(out)
    }

    fn resolve_into(
        &self,
        ctx: Option<NodeId>,
        path: &str,
        ns: Option<&str>,
        out: &mut IndexMap<String, String>,
        visiting: &mut HashSet<NodeId>,
    ) {
        if self.stale(ctx) {
            return;
        }
        let Some(selector) = self.selector() else {
            return;
        };
        let expr = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("ancestor-or-self::node()/{}", path)
        };
        let matches = match selector.select_nodes(ctx, &expr) {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!(path, error = %e, "hash lookup failed");
                return;
            }
        };
        let Some(&leaf) = matches.last() else {
            return;
        };
        if !visiting.insert(leaf) {
            debug!(path, "inheritance cycle cut");
            return;
        }

        if matches.len() >= 2 {
            let outer = matches[matches.len() - 2];
            if Some(outer) != ctx {
                if let Some(name) = self.tree.name(leaf).map(str::to_string) {
                    self.resolve_into(Some(outer), &name, ns, out, visiting);
                }
            }
        }

        if let Some(id) = self.tree.attr(leaf, INHERIT_ATTR) {
            let expr = format!("//*[@id=\"{}\"]", id);
            self.resolve_into(None, &expr, ns, out, visiting);
        }

        for child in self.tree.element_children(leaf) {
            let Some(node) = self.tree.get(child) else {
                continue;
            };
            if node.prefix() != ns {
                continue;
            }
            let key = if node.local_name() == "value" {
                node.attrs
                    .get("name")
                    .cloned()
                    .unwrap_or_else(|| "value".to_string())
            } else {
                node.local_name().to_string()
            };
            out.insert(key, self.tree.text_content(child));
        }

        visiting.remove(&leaf);
    }
}
