//! conftree: hierarchical file-backed configuration
//!
//! An XML configuration document held in an arena tree, with `include`
//! elements that splice other files in reversibly, `backingstore` subtrees
//! mirrored one file per node into a directory, path-based typed access,
//! layered hashes with inheritance, and a coalescing scheduler that batches
//! mutations into journal entries and flushes.

pub mod backing;
pub mod cli;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod hooks;
pub mod include;
pub mod journal;
pub mod logging;
pub mod query;
pub mod store;
pub mod tree;

pub use error::{ConfError, StorageError};
pub use store::{ConfStore, LoadStatus};
pub use tree::NodeId;
