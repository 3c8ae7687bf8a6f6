//! Integration tests for the conftree configuration store

mod backing_store;
mod cli_commands;
mod coalescer;
mod include_roundtrip;
mod store_lifecycle;

use conftree::config::StoreSettings;
use conftree::tree::writer::XML_DECLARATION;
use conftree::ConfStore;
use std::path::{Path, PathBuf};

/// Write `content` to `dir/name`, creating parent directories
pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// A document in the exact shape the writer produces
pub fn canonical(body: &str) -> String {
    format!("{}{}", XML_DECLARATION, body)
}

pub fn load(path: &Path) -> ConfStore {
    let mut store = ConfStore::new(&StoreSettings::default());
    let status = store.load(path).unwrap();
    assert!(status.is_complete(), "unexpected partial load: {:?}", status);
    store
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Sorted entry names of a directory
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
