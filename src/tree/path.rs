//! Path utilities: node paths inside the tree and file paths of sources

use crate::tree::{NodeId, Tree};
use std::path::{Path, PathBuf};

/// Absolute location of a node, e.g. `/app/listeners/listener[2]`.
///
/// A positional index is added only when the parent has several elements
/// of the same name. `root` is the document element; nodes outside it get
/// a path relative to whatever tree they hang off.
pub fn node_path(tree: &Tree, root: NodeId, id: NodeId) -> String {
    let mut chain = vec![id];
    chain.extend(tree.ancestors(id));
    if let Some(pos) = chain.iter().position(|n| *n == root) {
        chain.truncate(pos + 1);
    }
    chain.reverse();

    let mut out = String::new();
    for node in chain {
        let Some(name) = tree.name(node) else {
            continue;
        };
        out.push('/');
        out.push_str(name);
        if let Some(parent) = tree.parent(node) {
            let same: Vec<NodeId> = tree
                .element_children(parent)
                .filter(|c| tree.name(*c) == Some(name))
                .collect();
            if same.len() > 1 {
                if let Some(index) = same.iter().position(|c| *c == node) {
                    out.push_str(&format!("[{}]", index + 1));
                }
            }
        }
    }
    out
}

/// Resolve `target` against the directory of `including_file`.
pub fn resolve_relative(including_file: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match including_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(target),
        _ => PathBuf::from(".").join(target),
    }
}

/// Canonical form of a loaded file path; falls back to the given path
/// when the file cannot be resolved.
pub fn canonical_file_path(path: &Path) -> PathBuf {
    match dunce::canonicalize(path) {
        Ok(canonical) => canonical,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "realpath failed");
            path.to_path_buf()
        }
    }
}
