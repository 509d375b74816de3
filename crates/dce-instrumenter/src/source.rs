// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Source files and locations.
//!
//! Every file handled by a rewriting stage is registered in a [`SourceManager`], which
//! owns the current text of the file. Syntax nodes hand out [`SourceLocation`]s; a
//! location only becomes a concrete byte offset once it is resolved against the
//! manager, which is where out-of-range or mismatched positions are caught.

use anyhow::Context;
use codespan::{ByteIndex, FileId, Files};
use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
};

/// An unresolved position inside a registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    file: FileId,
    offset: ByteIndex,
}

impl SourceLocation {
    pub fn new(file: FileId, offset: usize) -> Self {
        Self {
            file,
            offset: ByteIndex::from(offset as u32),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    /// Returns a location `delta` bytes further into the same file.
    pub fn advanced_by(&self, delta: usize) -> Self {
        Self::new(self.file, self.offset.to_usize() + delta)
    }
}

/// A location which has been checked against the text of its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedLocation {
    pub file: FileId,
    pub offset: usize,
}

/// Owner of all file texts processed by one run.
pub struct SourceManager {
    files: Files<String>,
    ids: Vec<FileId>,
    modified: BTreeSet<FileId>,
}

impl Default for SourceManager {
    fn default() -> Self {
        Self {
            files: Files::new(),
            ids: vec![],
            modified: BTreeSet::new(),
        }
    }
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an in-memory file.
    pub fn add_file(&mut self, path: impl AsRef<Path>, text: impl Into<String>) -> FileId {
        let id = self.files.add(path.as_ref().as_os_str(), text.into());
        self.ids.push(id);
        id
    }

    /// Reads a file from disk and registers it.
    pub fn load(&mut self, path: &Path) -> anyhow::Result<FileId> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.add_file(path, text))
    }

    pub fn file_ids(&self) -> &[FileId] {
        &self.ids
    }

    pub fn source(&self, file: FileId) -> &str {
        self.files.source(file)
    }

    pub fn path(&self, file: FileId) -> PathBuf {
        PathBuf::from(self.files.name(file))
    }

    pub fn is_modified(&self, file: FileId) -> bool {
        self.modified.contains(&file)
    }

    /// Replaces the text of a file. Callers only do this once a whole stage produced
    /// the new content.
    pub fn update(&mut self, file: FileId, text: String) {
        if self.files.source(file) != &text {
            self.modified.insert(file);
            self.files.update(file, text);
        }
    }

    pub fn start_of_file(&self, file: FileId) -> SourceLocation {
        SourceLocation::new(file, 0)
    }

    /// Resolves a location to a byte offset, or `None` if the offset does not point into
    /// (or just past the end of) the text of its file.
    pub fn resolve(&self, location: SourceLocation) -> Option<ResolvedLocation> {
        if !self.ids.contains(&location.file) {
            return None;
        }
        let text = self.source(location.file);
        let offset = location.offset.to_usize();
        if offset > text.len() || !text.is_char_boundary(offset) {
            return None;
        }
        Some(ResolvedLocation {
            file: location.file,
            offset,
        })
    }

    /// Renders `path:line:column` for diagnostics.
    pub fn describe(&self, location: SourceLocation) -> String {
        let path = self.path(location.file);
        match self.files.location(location.file, location.offset) {
            Ok(loc) => format!(
                "{}:{}:{}",
                path.display(),
                loc.line.number(),
                loc.column.number()
            ),
            Err(_) => format!("{}:<offset {}>", path.display(), location.offset.to_usize()),
        }
    }
}

impl fmt::Debug for SourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.ids.iter().map(|id| self.path(*id)))
            .finish()
    }
}

/// Skips whitespace and comments starting at `offset`.
pub fn skip_trivia(text: &str, mut offset: usize) -> usize {
    let bytes = text.as_bytes();
    while offset < bytes.len() {
        match bytes[offset] {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c' => offset += 1,
            b'/' if bytes.get(offset + 1) == Some(&b'/') => {
                offset = text[offset..]
                    .find('\n')
                    .map_or(bytes.len(), |nl| offset + nl);
            }
            b'/' if bytes.get(offset + 1) == Some(&b'*') => {
                offset = text[offset + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |close| offset + 2 + close + 2);
            }
            _ => break,
        }
    }
    offset
}

/// Start offset of the first token at or after `offset`.
pub fn next_token_start(text: &str, offset: usize) -> Option<usize> {
    let start = skip_trivia(text, offset);
    (start < text.len()).then_some(start)
}

/// The point just past a statement which ends at `end`: the end itself if the statement
/// already ends with its terminator, the point past the next token if that token is a
/// `;`, and `end` otherwise. Returns `None` if `end` is not readable.
pub fn closing_offset(text: &str, end: usize) -> Option<usize> {
    if end == 0 || end > text.len() {
        return None;
    }
    if text.as_bytes()[end - 1] == b';' {
        return Some(end);
    }
    match next_token_start(text, end) {
        Some(next) if text.as_bytes()[next] == b';' => Some(next + 1),
        _ => Some(end),
    }
}
