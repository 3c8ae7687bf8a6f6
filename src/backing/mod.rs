//! Backing Store
//!
//! Mirrors a subtree onto a directory. Every element below a backing-store
//! marker owns one entry named `<name>#<generation>`: a directory for
//! containers, a `<name>#<generation>.xml` file for leaves. A container's own
//! attributes live in its `.attrs` file.
//!
//! Generation ids are allocated from a counter seeded by the largest id seen
//! on disk, so fresh entries never collide with restored ones. Dirty stamps
//! come from a logical clock; a flush writes what is newer than the last
//! successful flush and then advances the watermark.

pub mod atomic;

use crate::error::{io_error, StorageError};
use crate::hooks::Hooks;
use crate::tree::builder::parse_document;
use crate::tree::writer::{write_attrs_document, write_document_with_namespaces};
use crate::tree::{NodeId, Tree};
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Attribute name marking an element as a backing-store mount point
pub const MARKER_ATTR: &str = "backingstore";
/// Per-directory attribute file
pub const ATTRS_FILE: &str = ".attrs";
const GENERATION_SEP: char = '#';
const LEAF_SUFFIX: &str = ".xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The marker element; its entry is the mounted directory itself
    Root,
    Container,
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingRecord {
    pub name: String,
    pub path: PathBuf,
    pub generation: u64,
    pub dirty: u64,
    pub kind: EntryKind,
}

/// A marker element together with the root that owns its content during a flush
#[derive(Debug, Clone)]
pub struct BackingMount {
    pub marker: NodeId,
    pub root: NodeId,
    pub dir: PathBuf,
    shattered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Split `name#gen[.xml]` into its logical name and generation.
///
/// The generation is the run of decimal digits after `#` (0 when there are
/// none), mirroring `strtoull`.
pub fn parse_entry_name(entry: &str) -> Option<(&str, u64)> {
    let (name, rest) = entry.split_once(GENERATION_SEP)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let generation = digits.parse().unwrap_or(0);
    Some((name, generation))
}

pub fn entry_file_name(name: &str, generation: u64, leaf: bool) -> String {
    if leaf {
        format!("{}{}{}{}", name, GENERATION_SEP, generation, LEAF_SUFFIX)
    } else {
        format!("{}{}{}", name, GENERATION_SEP, generation)
    }
}

/// Namespace declarations (`xmlns`, `xmlns:*`) of an element
pub fn namespace_decls(tree: &Tree, id: NodeId) -> IndexMap<String, String> {
    tree.attrs(id)
        .map(|attrs| {
            attrs
                .iter()
                .filter(|(k, _)| *k == "xmlns" || k.starts_with("xmlns:"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn write_attrs_file(
    dir: &Path,
    name: &str,
    attrs: &IndexMap<String, String>,
) -> Result<(), StorageError> {
    let path = dir.join(ATTRS_FILE);
    if attrs.is_empty() {
        remove_if_present(&path).map_err(|e| io_error(&path, e))?;
        return Ok(());
    }
    debug!(path = %path.display(), "writing attributes");
    atomic::write_preserving(&path, write_attrs_document(name, attrs).as_bytes())?;
    Ok(())
}

/// Backing-store bookkeeping of one store.
///
/// Generation counter, logical clock, watermark and the deletion queue
/// survive document reloads; records and mounts belong to the active
/// document and are released with it.
#[derive(Debug, Default)]
pub struct BackingState {
    max_generation: u64,
    clock: u64,
    watermark: u64,
    pending: VecDeque<PendingDeletion>,
    records: HashMap<NodeId, BackingRecord>,
    mounts: Vec<BackingMount>,
}

impl BackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_generation(&self) -> u64 {
        self.max_generation
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    pub fn record(&self, id: NodeId) -> Option<&BackingRecord> {
        self.records.get(&id)
    }

    pub fn mounts(&self) -> &[BackingMount] {
        &self.mounts
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingDeletion> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn observe_generation(&mut self, generation: u64) {
        if generation > self.max_generation {
            self.max_generation = generation;
        }
    }

    /// Forget records, mounts and queued deletions of the outgoing
    /// document. Its unflushed edits are discarded along with it.
    pub fn release_document(&mut self) {
        self.records.clear();
        self.mounts.clear();
        self.pending.clear();
    }

    /// Mount the directory `dir` at `marker`.
    ///
    /// The directory's `.attrs` are overlaid onto the marker; its entries
    /// become the marker's children, followed by any inline children the
    /// marker already had. A missing directory mounts as empty.
    pub fn mount(
        &mut self,
        tree: &mut Tree,
        marker: NodeId,
        dir: &Path,
        hooks: &Hooks,
        namespaces: &IndexMap<String, String>,
    ) -> Result<(), StorageError> {
        let name = tree.name(marker).unwrap_or_default().to_string();
        let root = tree.new_element(name.clone());
        debug!(path = %dir.display(), "reading backing store");

        if let Err(e) = self
            .read_attrs(tree, marker, dir, hooks)
            .and_then(|_| self.read_into(tree, root, dir, hooks, namespaces))
        {
            tree.remove_subtree(root);
            return Err(e);
        }

        tree.move_children(marker, root);
        tree.move_children(root, marker);
        self.records.insert(
            marker,
            BackingRecord {
                name,
                path: dir.to_path_buf(),
                generation: 0,
                dirty: 0,
                kind: EntryKind::Root,
            },
        );
        self.mounts.push(BackingMount {
            marker,
            root,
            dir: dir.to_path_buf(),
            shattered: false,
        });
        Ok(())
    }

    fn read_attrs(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        dir: &Path,
        hooks: &Hooks,
    ) -> Result<(), StorageError> {
        let path = dir.join(ATTRS_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(&path, e)),
        };
        match parse_document(tree, &text) {
            Ok(parsed) => {
                let attrs = tree.attrs(parsed).cloned().unwrap_or_default();
                for (key, value) in attrs.iter().filter(|(k, _)| *k != MARKER_ATTR) {
                    tree.set_attr(node, key, value);
                }
                tree.remove_subtree(parsed);
            }
            Err(e) => hooks.report_parse(&path, &e),
        }
        Ok(())
    }

    fn read_into(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        dir: &Path,
        hooks: &Hooks,
        namespaces: &IndexMap<String, String>,
    ) -> Result<(), StorageError> {
        if !dir.exists() {
            debug!(path = %dir.display(), "backing store directory absent, mounting empty");
            return Ok(());
        }

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                match e.into_io_error() {
                    Some(source) => io_error(&path, source),
                    None => StorageError::InvalidEntry {
                        path,
                        reason: "filesystem loop".to_string(),
                    },
                }
            })?;
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            if file_name.ends_with(".tmp") {
                continue;
            }
            let Some((name, generation)) = parse_entry_name(file_name) else {
                continue;
            };
            let name = name.to_string();
            self.observe_generation(generation);
            let path = entry.path().to_path_buf();

            if entry.file_type().is_dir() {
                debug!(path = %path.display(), "<dir<");
                let child = tree.new_element(name.clone());
                if let Err(e) = self
                    .read_attrs(tree, child, &path, hooks)
                    .and_then(|_| self.read_into(tree, child, &path, hooks, namespaces))
                {
                    error!(path = %path.display(), error = %e, "unreadable backing store directory");
                }
                tree.append_child(node, child);
                self.records.insert(
                    child,
                    BackingRecord {
                        name,
                        path,
                        generation,
                        dirty: 0,
                        kind: EntryKind::Container,
                    },
                );
            } else if entry.file_type().is_file() {
                debug!(path = %path.display(), "<file<");
                let text = match fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "unreadable backing store file");
                        continue;
                    }
                };
                let leaf = match parse_document(tree, &text) {
                    Ok(leaf) => leaf,
                    Err(e) => {
                        hooks.report_parse(&path, &e);
                        continue;
                    }
                };
                // Namespace declarations copied from the host root on write.
                if let Some(parsed) = tree.get_mut(leaf) {
                    parsed.attrs.retain(|k, v| {
                        namespaces
                            .get(k)
                            .map(|ns| ns.as_str() != v.as_str())
                            .unwrap_or(true)
                    });
                }
                tree.append_child(node, leaf);
                self.records.insert(
                    leaf,
                    BackingRecord {
                        name,
                        path,
                        generation,
                        dirty: 0,
                        kind: EntryKind::Leaf,
                    },
                );
            }
        }
        Ok(())
    }

    /// Stamp the nearest ancestor-or-self of `node` that owns a record.
    ///
    /// Returns false when the node is not inside any backing store.
    pub fn mark_dirty(&mut self, tree: &Tree, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.records.contains_key(&id) {
                let stamp = self.tick();
                if let Some(record) = self.records.get_mut(&id) {
                    record.dirty = stamp;
                    debug!(path = %record.path.display(), "backing store marked dirty");
                }
                return true;
            }
            current = tree.parent(id);
        }
        false
    }

    /// True when `node` is a mount point or contains one
    pub fn contains_mount(&self, tree: &Tree, node: NodeId) -> bool {
        self.mounts
            .iter()
            .any(|m| tree.is_ancestor_or_self(node, m.marker))
    }

    /// Move every record of the subtree at `node` to the deletion queue,
    /// descendants before their containers.
    pub fn queue_removal(&mut self, tree: &Tree, node: NodeId) -> usize {
        let mut queued = 0;
        for id in tree.descendants(node).into_iter().rev() {
            match self.records.get(&id).map(|r| r.kind) {
                None | Some(EntryKind::Root) => {}
                Some(_) => {
                    if let Some(record) = self.records.remove(&id) {
                        debug!(path = %record.path.display(), "marking for removal");
                        self.pending.push_back(PendingDeletion {
                            path: record.path,
                            kind: record.kind,
                        });
                        queued += 1;
                    }
                }
            }
        }
        queued
    }

    /// Remove the files of every queued deletion. Each entry is attempted
    /// once; failures are logged and the entry is dropped.
    pub fn drain_deletions(&mut self) -> usize {
        let mut removed = 0;
        while let Some(entry) = self.pending.pop_front() {
            match entry.kind {
                EntryKind::Leaf => match remove_if_present(&entry.path) {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(path = %entry.path.display(), error = %e, "backing store cleanup failed")
                    }
                },
                EntryKind::Container | EntryKind::Root => {
                    let attrs = entry.path.join(ATTRS_FILE);
                    if let Err(e) = remove_if_present(&attrs) {
                        warn!(path = %attrs.display(), error = %e, "backing store cleanup failed");
                    }
                    match fs::remove_dir(&entry.path) {
                        Ok(()) => removed += 1,
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            warn!(path = %entry.path.display(), error = %e, "backing store mess left behind")
                        }
                    }
                }
            }
        }
        removed
    }

    /// Move live content of every mount under its backing root so the host
    /// document serializes without it.
    pub fn shatter(&mut self, tree: &mut Tree) {
        for mount in self.mounts.iter_mut().filter(|m| !m.shattered) {
            tree.move_children(mount.marker, mount.root);
            mount.shattered = true;
        }
    }

    /// Re-attach backing content to the live tree after a flush
    pub fn postwrite(&mut self, tree: &mut Tree) {
        for mount in self.mounts.iter_mut().filter(|m| m.shattered) {
            tree.move_children(mount.root, mount.marker);
            mount.shattered = false;
        }
    }

    /// Write every dirty entry of every mount.
    ///
    /// Returns the number of files written. The watermark only advances when
    /// the whole pass succeeds so failed entries are retried next time.
    pub fn write(&mut self, tree: &Tree, hooks: &Hooks) -> Result<usize, StorageError> {
        let mut written = 0;
        let mounts: Vec<(NodeId, NodeId, PathBuf)> = self
            .mounts
            .iter()
            .map(|m| {
                // Content sits under the backing root while shattered.
                let holder = if m.shattered { m.root } else { m.marker };
                (m.marker, holder, m.dir.clone())
            })
            .collect();

        for (marker, holder, dir) in mounts {
            fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
            let dirty = self
                .records
                .get(&marker)
                .map(|r| r.dirty > self.watermark)
                .unwrap_or(false);
            if dirty {
                let name = tree.name(marker).unwrap_or("stub").to_string();
                let mut attrs = tree.attrs(marker).cloned().unwrap_or_default();
                attrs.shift_remove(MARKER_ATTR);
                write_attrs_file(&dir, &name, &attrs)?;
                written += 1;
            }
            let namespaces = tree
                .ancestors(marker)
                .last()
                .copied()
                .map(|top| namespace_decls(tree, top))
                .unwrap_or_else(|| namespace_decls(tree, marker));
            written += self.write_children(tree, holder, &dir, hooks, &namespaces)?;
        }

        self.watermark = self.clock;
        Ok(written)
    }

    fn write_children(
        &mut self,
        tree: &Tree,
        parent: NodeId,
        dir: &Path,
        hooks: &Hooks,
        namespaces: &IndexMap<String, String>,
    ) -> Result<usize, StorageError> {
        let mut written = 0;
        let children: Vec<NodeId> = tree.element_children(parent).collect();
        for child in children {
            if !self.records.contains_key(&child) {
                let name = tree.name(child).unwrap_or_default().to_string();
                let leaf = hooks.is_leaf(tree, child);
                self.max_generation += 1;
                let generation = self.max_generation;
                let path = dir.join(entry_file_name(&name, generation, leaf));
                debug!(path = %path.display(), "allocated backing store entry");
                let dirty = self.tick();
                self.records.insert(
                    child,
                    BackingRecord {
                        name,
                        path,
                        generation,
                        dirty,
                        kind: if leaf {
                            EntryKind::Leaf
                        } else {
                            EntryKind::Container
                        },
                    },
                );
            }
            let Some(record) = self.records.get(&child).cloned() else {
                continue;
            };
            let dirty = record.dirty > self.watermark;

            match record.kind {
                EntryKind::Leaf => {
                    if dirty {
                        let text = write_document_with_namespaces(tree, child, namespaces);
                        atomic::write_preserving(&record.path, text.as_bytes())?;
                        debug!(path = %record.path.display(), "==>");
                        written += 1;
                    }
                }
                EntryKind::Container | EntryKind::Root => {
                    fs::create_dir_all(&record.path).map_err(|e| io_error(&record.path, e))?;
                    if dirty {
                        let attrs = tree.attrs(child).cloned().unwrap_or_default();
                        write_attrs_file(&record.path, &record.name, &attrs)?;
                    }
                    debug!(path = %record.path.display(), "-->");
                    written += self.write_children(tree, child, &record.path, hooks, namespaces)?;
                }
            }
        }
        Ok(written)
    }
}
