/// Pseudo-filesystem access shared by all counter readers
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReadError;

/// Read-only view of a proc tree rooted at a configurable path.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProcFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file relative to the root
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a whole pseudo-file into a string.
    pub fn read(&self, relative: &str) -> Result<String, ReadError> {
        let path = self.path(relative);
        tracing::debug!(path = %path.display(), "reading pseudo-file");
        fs::read_to_string(&path).map_err(|source| ReadError::Io { path, source })
    }

    /// Read only the first line of a pseudo-file.
    pub fn read_first_line(&self, relative: &str) -> Result<String, ReadError> {
        let content = self.read(relative)?;
        match content.lines().next() {
            Some(line) => Ok(line.to_string()),
            None => Err(ReadError::malformed(self.path(relative), "file is empty")),
        }
    }
}

/// Parse whitespace separated unsigned integers, failing on the first bad token.
pub fn parse_u64_fields<'a>(
    tokens: impl Iterator<Item = &'a str>,
    path: &Path,
) -> Result<Vec<u64>, ReadError> {
    tokens
        .map(|token| {
            token.parse::<u64>().map_err(|_| {
                ReadError::malformed(path, format!("expected an integer, found {token:?}"))
            })
        })
        .collect()
}

/// Require at least `expected` fields, a short row means the interface changed.
pub fn require_fields<T>(
    fields: &[T],
    expected: usize,
    path: &Path,
    row: &str,
) -> Result<(), ReadError> {
    if fields.len() < expected {
        return Err(ReadError::malformed(
            path,
            format!("{row}: expected {expected} fields, found {}", fields.len()),
        ));
    }
    Ok(())
}
