//! Configuration Store
//!
//! [`ConfStore`] is the single owner of a loaded configuration: the node
//! arena, the include and backing-store bookkeeping, the fallback table and
//! the change coalescer. Every operation goes through it.
//!
//! Loading parses the file into a fresh arena first; only when that succeeds
//! is the previous document separated from its includes and replaced, so a
//! broken file never clobbers a working configuration.

mod access;
mod hash;
pub mod values;

use crate::backing::atomic::write_preserving;
use crate::backing::BackingState;
use crate::coalesce::{ChangeCoalescer, TickOutcome};
use crate::config::StoreSettings;
use crate::error::{io_error, ConfError};
use crate::hooks::{DiagnosticSink, Hooks};
use crate::include::shuffle::{redo_all, separate, undo_all, write_sources};
use crate::include::{IncludeRecord, IncludeResolver};
use crate::query::Selector;
use crate::tree::builder::parse_document;
use crate::tree::path::{canonical_file_path, node_path};
use crate::tree::writer::write_document;
use crate::tree::{NodeId, Tree};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a successful parse of the master file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Complete,
    /// The document is active but some includes or backing stores failed
    Partial { failures: Vec<PathBuf> },
}

impl LoadStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, LoadStatus::Complete)
    }
}

#[derive(Debug)]
struct Document {
    root: NodeId,
    path: PathBuf,
}

pub struct ConfStore {
    tree: Tree,
    document: Option<Document>,
    includes: Vec<IncludeRecord>,
    backing: BackingState,
    coalescer: ChangeCoalescer,
    fallbacks: HashMap<String, String>,
    hooks: Hooks,
    namespace_base: String,
    next_doc: u32,
}

impl ConfStore {
    /// Create an empty store. Fallback patterns are instantiated with the
    /// configured top-level section name.
    pub fn new(settings: &StoreSettings) -> Self {
        let mut store = Self {
            tree: Tree::new(0),
            document: None,
            includes: Vec::new(),
            backing: BackingState::new(),
            coalescer: ChangeCoalescer::new(settings.coalesce_window_secs),
            fallbacks: HashMap::new(),
            hooks: Hooks::default(),
            namespace_base: settings.namespace_base.clone(),
            next_doc: 1,
        };
        for (key, value) in &settings.fallbacks {
            store.poke(&settings.toplevel, key, value);
        }
        store.mark_changed();
        store
    }

    pub fn set_leaf_predicate<F>(&mut self, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.hooks.leaf = Arc::new(predicate);
    }

    pub fn set_reserved_predicate<F>(&mut self, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.hooks.reserved = Arc::new(predicate);
    }

    pub fn set_diagnostic_sink<S>(&mut self, sink: S)
    where
        S: DiagnosticSink + 'static,
    {
        self.hooks.diagnostics = Arc::new(sink);
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Load `path` as the active configuration.
    ///
    /// A file that cannot be read or parsed is an error and leaves the
    /// current document in place. Include and backing-store failures do
    /// not fail the load; they are reported through [`LoadStatus::Partial`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<LoadStatus, ConfError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;

        let mut tree = Tree::new(self.next_doc);
        let root = parse_document(&mut tree, &text).map_err(|e| {
            self.hooks.report_parse(path, &e);
            ConfError::Parse {
                file: path.display().to_string(),
                line: e.line,
                message: e.message,
            }
        })?;
        self.next_doc = self.next_doc.wrapping_add(1);

        if self.document.is_some() {
            separate(&mut self.includes, &mut self.tree);
            self.backing.release_document();
        }
        self.tree = tree;

        let canonical = canonical_file_path(path);
        let resolution =
            IncludeResolver::new(&mut self.tree, &self.hooks).resolve(root, &canonical, &mut self.backing);
        self.includes = resolution.records;
        self.document = Some(Document {
            root,
            path: canonical,
        });
        self.mark_changed();

        if resolution.failures.is_empty() {
            info!(path = %path.display(), "configuration loaded");
            Ok(LoadStatus::Complete)
        } else {
            warn!(
                path = %path.display(),
                failures = resolution.failures.len(),
                "configuration loaded with failures"
            );
            Ok(LoadStatus::Partial {
                failures: resolution.failures,
            })
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Root element of the active document
    pub fn root(&self) -> Option<NodeId> {
        self.document.as_ref().map(|d| d.root)
    }

    /// Name of the root element
    pub fn toplevel(&self) -> Option<&str> {
        self.root().and_then(|r| self.tree.name(r))
    }

    /// Canonical path of the loaded file
    pub fn config_filename(&self) -> Option<&Path> {
        self.document.as_ref().map(|d| d.path.as_path())
    }

    pub fn includes(&self) -> &[IncludeRecord] {
        &self.includes
    }

    pub fn backing(&self) -> &BackingState {
        &self.backing
    }

    pub fn selector(&self) -> Option<Selector<'_>> {
        self.root().map(|root| Selector::new(&self.tree, root))
    }

    /// Absolute location of `id`, e.g. `/app/listeners/listener[2]`
    pub fn node_path(&self, id: NodeId) -> Option<String> {
        let root = self.root()?;
        if !self.tree.contains(id) {
            return None;
        }
        Some(node_path(&self.tree, root, id))
    }

    fn document_parts(&self) -> Result<(NodeId, PathBuf), ConfError> {
        self.document
            .as_ref()
            .map(|d| (d.root, d.path.clone()))
            .ok_or(ConfError::NoDocument)
    }

    /// Persist the configuration: pending backing-store deletions, dirty
    /// backing-store entries, the master file and every writable include.
    ///
    /// Returns the size of the master file. The live view is restored even
    /// when a step fails; the first failure is returned.
    pub fn write_file(&mut self) -> Result<usize, ConfError> {
        let (root, path) = self.document_parts()?;

        undo_all(&mut self.includes, &mut self.tree);
        let removed = self.backing.drain_deletions();
        self.backing.shatter(&mut self.tree);
        let backing = self.backing.write(&self.tree, &self.hooks);
        let text = write_document(&self.tree, root);
        self.backing.postwrite(&mut self.tree);
        let sources = write_sources(&self.includes, &self.tree);
        redo_all(&mut self.includes, &mut self.tree);

        let master = write_preserving(&path, text.as_bytes());
        let entries = backing?;
        let written = master?;
        let includes = sources?;
        debug!(
            bytes = written,
            backing_entries = entries,
            removed,
            includes,
            "configuration flushed"
        );
        Ok(written)
    }

    /// The master document as it would be written to disk
    pub fn xml_in_mem(&mut self) -> Result<String, ConfError> {
        let (root, _) = self.document_parts()?;
        undo_all(&mut self.includes, &mut self.tree);
        let text = write_document(&self.tree, root);
        redo_all(&mut self.includes, &mut self.tree);
        Ok(text)
    }

    /// Base used to build namespace URIs, e.g. `conftree://module/<prefix>`
    pub fn use_namespace(&mut self, base: &str) {
        self.namespace_base = base.to_string();
    }

    /// Declare the namespace `prefix` on the root element unless present
    pub fn set_namespace(&mut self, prefix: &str) -> Result<(), ConfError> {
        let (root, _) = self.document_parts()?;
        let key = format!("xmlns:{}", prefix);
        if self.tree.attr(root, &key).is_none() {
            let uri = format!("{}://module/{}", self.namespace_base, prefix);
            self.tree.set_attr(root, &key, &uri);
        }
        Ok(())
    }

    pub fn mark_changed(&mut self) {
        self.coalescer.mark_changed();
    }

    pub fn request_write(&mut self) {
        self.coalescer.request_write();
    }

    pub fn set_coalesce_window(&mut self, seconds: u32) {
        self.coalescer.set_window(seconds);
    }

    /// Revision counter, bumped by every mutation
    pub fn generation(&self) -> u32 {
        self.coalescer.generation()
    }

    pub fn coalescer(&self) -> &ChangeCoalescer {
        &self.coalescer
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.coalescer.tick()
    }

    /// Register a fallback value; `%s` in `key` becomes `toplevel`
    pub fn poke(&mut self, toplevel: &str, key: &str, value: &str) {
        self.fallbacks
            .insert(key.replace("%s", toplevel), value.to_string());
    }

    pub(crate) fn fallback(&self, key: &str) -> Option<&str> {
        self.fallbacks.get(key).map(String::as_str)
    }
}
