//! Audio file library
//!
//! Ordered list of loadable files backing track selection. Paths are
//! filtered on entry, so everything in the library is worth offering in a
//! file list.

use std::path::{Path, PathBuf};

use crate::audio::decoder;

/// Ordered, deduplicated collection of audio file paths.
#[derive(Debug, Default)]
pub struct AudioLibrary {
    files: Vec<PathBuf>,
}

impl AudioLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add paths in the given order, skipping non-files, unsupported
    /// extensions and entries already present. Paths are stored in
    /// canonical form when the filesystem can provide one. Returns how many
    /// entries were added.
    pub fn add_paths<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !path.is_file() || !decoder::is_supported(path) {
                log::warn!("Skipping unsupported file: {}", path.display());
                continue;
            }
            let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            if !self.files.contains(&resolved) {
                self.files.push(resolved);
                added += 1;
            }
        }
        if added > 0 {
            log::info!("Added {} files to the library", added);
        }
        added
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Next file after `path` in library order, wrapping at the end.
    /// Unknown paths start from the first file.
    pub fn next_after(&self, path: &Path) -> Option<&Path> {
        if self.files.is_empty() {
            return None;
        }
        let next = match self.files.iter().position(|p| p == path) {
            Some(pos) => (pos + 1) % self.files.len(),
            None => 0,
        };
        self.files.get(next).map(PathBuf::as_path)
    }

    /// Previous file before `path` in library order, wrapping at the start.
    pub fn previous_before(&self, path: &Path) -> Option<&Path> {
        if self.files.is_empty() {
            return None;
        }
        let previous = match self.files.iter().position(|p| p == path) {
            Some(pos) => (pos + self.files.len() - 1) % self.files.len(),
            None => 0,
        };
        self.files.get(previous).map(PathBuf::as_path)
    }
}
