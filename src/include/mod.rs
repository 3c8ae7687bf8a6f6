//! Include Resolution
//!
//! Merges external files into the host document. Backing-store markers of
//! the master document are mounted first; then every `include` element with
//! a `file` attribute is resolved depth-first: the target is loaded, its own
//! includes are resolved, and its content is spliced in place of the
//! marker's children. Each splice is remembered in an [`IncludeRecord`] so
//! the shuffle can later take the document apart again.
//!
//! A failed include is logged and reported, but its siblings still resolve.

pub mod shuffle;

use crate::backing::{namespace_decls, BackingState, MARKER_ATTR};
use crate::hooks::Hooks;
use crate::query::Selector;
use crate::tree::builder::{parse_document, parse_fragment};
use crate::tree::path::{canonical_file_path, resolve_relative};
use crate::tree::{NodeId, Tree};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const INCLUDE_ELEMENT: &str = "include";

/// One spliced include
#[derive(Debug, Clone)]
pub struct IncludeRecord {
    /// The `include` element whose children were replaced
    pub insertion_point: NodeId,
    /// Root element of the included document, or the fragment holder of a snippet
    pub source_root: NodeId,
    /// Children the marker had before the splice; empty while undone
    pub saved_children: Vec<NodeId>,
    pub snippet: bool,
    pub readonly: bool,
    /// False for a snippet whose file did not exist; nothing is written back
    pub loaded: bool,
    pub path: PathBuf,
    pub nested: Vec<IncludeRecord>,
    pub(crate) spliced: bool,
}

impl IncludeRecord {
    pub fn is_spliced(&self) -> bool {
        self.spliced
    }

    /// Move the source content under the insertion point, keeping the
    /// marker's previous children aside.
    fn splice(&mut self, tree: &mut Tree) {
        let content = tree.replace_children(self.source_root, Vec::new());
        tree.set_parent(&content, Some(self.insertion_point));
        let saved = tree.replace_children(self.insertion_point, content);
        tree.set_parent(&saved, None);
        self.saved_children = saved;
        self.spliced = true;
    }
}

/// Outcome of resolving one master document
#[derive(Debug, Default)]
pub struct Resolution {
    pub records: Vec<IncludeRecord>,
    /// Files that could not be loaded
    pub failures: Vec<PathBuf>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct IncludeResolver<'a> {
    tree: &'a mut Tree,
    hooks: &'a Hooks,
    /// Files currently being resolved, outermost first
    chain: Vec<PathBuf>,
    failures: Vec<PathBuf>,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(tree: &'a mut Tree, hooks: &'a Hooks) -> Self {
        Self {
            tree,
            hooks,
            chain: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Resolve the master document rooted at `root`, loaded from `file`.
    pub fn resolve(mut self, root: NodeId, file: &Path, backing: &mut BackingState) -> Resolution {
        self.mount_backing_stores(root, file, backing);
        self.chain.push(canonical_file_path(file));
        let records = self.resolve_includes(root, file);
        Resolution {
            records,
            failures: self.failures,
        }
    }

    fn select(&self, root: NodeId, expr: &str) -> Vec<NodeId> {
        Selector::new(&*self.tree, root)
            .select_nodes(None, expr)
            .unwrap_or_default()
    }

    fn mount_backing_stores(&mut self, root: NodeId, file: &Path, backing: &mut BackingState) {
        let namespaces = namespace_decls(self.tree, root);
        let markers = self.select(root, "//*[@backingstore]");
        for marker in markers {
            let Some(dir) = self.tree.attr(marker, MARKER_ATTR).map(str::to_string) else {
                continue;
            };
            let dir = resolve_relative(file, &dir);
            if let Err(e) = backing.mount(self.tree, marker, &dir, self.hooks, &namespaces) {
                error!(path = %dir.display(), error = %e, "Could not load backing store");
                self.failures.push(dir);
            }
        }
        debug!(count = backing.mounts().len(), "processed backing stores");
    }

    fn resolve_includes(&mut self, root: NodeId, file: &Path) -> Vec<IncludeRecord> {
        let markers = self.select(root, "//include[@file]");
        let mut records = Vec::with_capacity(markers.len());

        for marker in markers {
            let Some(target) = self.tree.attr(marker, "file").map(str::to_string) else {
                continue;
            };
            let snippet = self
                .tree
                .attr(marker, "snippet")
                .map(|v| v != "false")
                .unwrap_or(false);
            let readonly = self.tree.attr(marker, "readonly") == Some("true");
            let path = resolve_relative(file, &target);

            let canonical = canonical_file_path(&path);
            if self.chain.contains(&canonical) {
                error!(path = %path.display(), "include cycle");
                self.failures.push(path);
                continue;
            }

            let Some((source_root, loaded)) = self.load_source(&path, snippet) else {
                self.failures.push(path);
                continue;
            };

            self.chain.push(canonical);
            let nested = self.resolve_includes(source_root, &path);
            self.chain.pop();

            let mut record = IncludeRecord {
                insertion_point: marker,
                source_root,
                saved_children: Vec::new(),
                snippet,
                readonly,
                loaded,
                path,
                nested,
                spliced: false,
            };
            record.splice(self.tree);
            records.push(record);
        }
        debug!(count = records.len(), file = %file.display(), "processed includes");
        records
    }

    /// Load an include target into the arena. Returns the source root and
    /// whether a file was actually read.
    fn load_source(&mut self, path: &Path, snippet: bool) -> Option<(NodeId, bool)> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if snippet && e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "snippet absent, including nothing");
                return Some((parse_fragment(self.tree, "").ok()?, false));
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Could not load");
                return None;
            }
        };

        let parsed = if snippet {
            parse_fragment(self.tree, &text)
        } else {
            parse_document(self.tree, &text)
        };
        match parsed {
            Ok(root) => Some((root, true)),
            Err(e) => {
                self.hooks.report_parse(path, &e);
                error!(path = %path.display(), "Could not load");
                None
            }
        }
    }
}
