use nx_core::ast::Expr;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reduction state of one imported file.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportState {
    /// Parsed and wrapped, reduction still running. Returned for cyclic
    /// references back into the file.
    InProgress(Expr),
    Done(Expr),
}

impl ImportState {
    pub fn expr(&self) -> &Expr {
        match self {
            ImportState::InProgress(expr) | ImportState::Done(expr) => expr,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ImportState::Done(_))
    }
}

/// Canonical file path to import state. One cache belongs to one reduction
/// run; every distinct path is parsed at most once while it lives.
#[derive(Debug, Default)]
pub struct ImportCache {
    entries: HashMap<PathBuf, ImportState>,
}

impl ImportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&ImportState> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Record `placeholder` for `path` before its reduction starts.
    pub fn begin(&mut self, path: PathBuf, placeholder: Expr) {
        self.entries
            .insert(path, ImportState::InProgress(placeholder));
    }

    /// Replace the placeholder with the reduced tree.
    pub fn finish(&mut self, path: PathBuf, reduced: Expr) {
        self.entries.insert(path, ImportState::Done(reduced));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached paths in sorted order.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.entries.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }
}
