//! Collaborator hooks injected by the embedding process

use crate::tree::builder::ParseError;
use crate::tree::{NodeId, Tree};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Predicate over element names
pub type NamePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A structural parse problem in one of the loaded files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn from_parse(file: &Path, err: &ParseError) -> Self {
        Self {
            file: file.display().to_string(),
            line: err.line,
            message: err.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

/// Receiver of parse diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Diagnostic) + Send + Sync,
{
    fn report(&self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

/// Default sink: every diagnostic becomes an error event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &Diagnostic) {
        tracing::error!(
            file = %diagnostic.file,
            line = diagnostic.line,
            "{}",
            diagnostic.message
        );
    }
}

#[derive(Clone)]
pub struct Hooks {
    pub leaf: NamePredicate,
    pub reserved: NamePredicate,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            leaf: Arc::new(|_| false),
            reserved: Arc::new(|_| false),
            diagnostics: Arc::new(LogSink),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

impl Hooks {
    /// Leaves are stored as single files. An element holding text is
    /// always a leaf since a directory cannot carry it.
    pub fn is_leaf(&self, tree: &Tree, id: NodeId) -> bool {
        tree.has_text_child(id) || tree.name(id).map(|n| (self.leaf)(n)).unwrap_or(false)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        (self.reserved)(name)
    }

    pub fn report_parse(&self, file: &Path, err: &ParseError) {
        self.diagnostics.report(&Diagnostic::from_parse(file, err));
    }
}
