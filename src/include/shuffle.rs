//! Reversible splice of included content
//!
//! While merged, the content of an included file hangs under the host's
//! `include` element. Before serializing, [`undo_all`] hands every piece of
//! content back to its source root and restores the marker's own children,
//! so the host and each source document serialize in their original shape.
//! [`redo_all`] restores the merged view. Both walk nested records first and
//! are no-ops for records already in the requested state.

use super::IncludeRecord;
use crate::backing::atomic::write_preserving;
use crate::error::StorageError;
use crate::tree::writer::{write_document, write_fragment};
use crate::tree::{NodeId, Tree};
use tracing::{debug, error};

impl IncludeRecord {
    pub fn undo(&mut self, tree: &mut Tree) {
        undo_all(&mut self.nested, tree);
        if !self.spliced {
            return;
        }
        let saved = std::mem::take(&mut self.saved_children);
        tree.set_parent(&saved, Some(self.insertion_point));
        let content = tree.replace_children(self.insertion_point, saved);
        tree.set_parent(&content, Some(self.source_root));
        tree.replace_children(self.source_root, content);
        self.spliced = false;
    }

    pub fn redo(&mut self, tree: &mut Tree) {
        redo_all(&mut self.nested, tree);
        if !self.spliced {
            self.splice(tree);
        }
    }

    /// Serialized form of the source in its undone shape
    pub fn render(&self, tree: &Tree) -> String {
        if self.snippet {
            write_fragment(tree, self.source_root)
        } else {
            write_document(tree, self.source_root)
        }
    }
}

pub fn undo_all(records: &mut [IncludeRecord], tree: &mut Tree) {
    for record in records.iter_mut() {
        record.undo(tree);
    }
}

pub fn redo_all(records: &mut [IncludeRecord], tree: &mut Tree) {
    for record in records.iter_mut() {
        record.redo(tree);
    }
}

/// Permanently undo every include and drop the records
pub fn separate(records: &mut Vec<IncludeRecord>, tree: &mut Tree) {
    undo_all(records, tree);
    records.clear();
}

fn release(record: IncludeRecord, tree: &mut Tree) {
    for nested in record.nested {
        release(nested, tree);
    }
    for child in record.saved_children {
        tree.remove_subtree(child);
    }
    tree.remove_subtree(record.source_root);
}

/// Drop the records whose insertion point lies inside the subtree at
/// `node`, freeing their detached source roots and saved children.
pub fn drop_within(records: &mut Vec<IncludeRecord>, tree: &mut Tree, node: NodeId) -> usize {
    let mut dropped = 0;
    let mut kept = Vec::with_capacity(records.len());
    for mut record in records.drain(..) {
        if tree.is_ancestor_or_self(node, record.insertion_point) {
            release(record, tree);
            dropped += 1;
        } else {
            dropped += drop_within(&mut record.nested, tree, node);
            kept.push(record);
        }
    }
    *records = kept;
    dropped
}

/// Write every writable source file. Must run while undone.
///
/// Read-only includes are not rewritten, but their nested includes are.
/// The first failure is returned after all records were attempted.
pub fn write_sources(records: &[IncludeRecord], tree: &Tree) -> Result<usize, StorageError> {
    let mut written = 0;
    let mut first_error = None;
    visit_sources(records, tree, &mut written, &mut first_error);
    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

fn visit_sources(
    records: &[IncludeRecord],
    tree: &Tree,
    written: &mut usize,
    first_error: &mut Option<StorageError>,
) {
    for record in records {
        if !record.readonly && record.loaded {
            match write_preserving(&record.path, record.render(tree).as_bytes()) {
                Ok(_) => {
                    debug!(path = %record.path.display(), "include written");
                    *written += 1;
                }
                Err(e) => {
                    error!(path = %record.path.display(), error = %e, "couldn't write out include");
                    first_error.get_or_insert(e);
                }
            }
        }
        visit_sources(&record.nested, tree, written, first_error);
    }
}
