// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Positional text edits.
//!
//! All rewriting stages express their output as [`Edit`]s collected in a
//! [`ReplacementSet`]. Nothing is written while a file is traversed; once a stage finished
//! all files, every file's edits are applied in one ascending pass.

use codespan::FileId;
use itertools::Itertools;
use std::{collections::BTreeMap, fmt};

use crate::source::{SourceLocation, SourceManager};

/// Replace the bytes `[start, end)` of `file` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Edit {
    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    fn overlaps(&self, other: &Edit) -> bool {
        let (first, second) = if (self.start, self.end) <= (other.start, other.end) {
            (self, other)
        } else {
            (other, self)
        };
        if first.start == second.start && first.is_insertion() != second.is_insertion() {
            return false;
        }
        first.end > second.start
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) -> {:?}", self.start, self.end, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    InvalidLocation(SourceLocation),
    DifferentFiles,
    ReversedRange { start: usize, end: usize },
    Overlap { existing: Edit, new: Edit },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::InvalidLocation(loc) => {
                write!(f, "start or end location were invalid: {:?}", loc)
            }
            EditError::DifferentFiles => write!(f, "start or end location were in different files"),
            EditError::ReversedRange { start, end } => {
                write!(f, "edit range ends before it starts: [{}, {})", start, end)
            }
            EditError::Overlap { existing, new } => {
                write!(f, "edit {} overlaps existing edit {}", new, existing)
            }
        }
    }
}

impl std::error::Error for EditError {}

/// Resolves a pair of locations into an edit.
pub fn create_edit(
    sources: &SourceManager,
    start: SourceLocation,
    end: SourceLocation,
    text: impl Into<String>,
) -> Result<Edit, EditError> {
    let resolved_start = sources
        .resolve(start)
        .ok_or(EditError::InvalidLocation(start))?;
    let resolved_end = sources.resolve(end).ok_or(EditError::InvalidLocation(end))?;
    if resolved_start.file != resolved_end.file {
        return Err(EditError::DifferentFiles);
    }
    if resolved_start.offset > resolved_end.offset {
        return Err(EditError::ReversedRange {
            start: resolved_start.offset,
            end: resolved_end.offset,
        });
    }
    Ok(Edit {
        file: resolved_start.file,
        start: resolved_start.offset,
        end: resolved_end.offset,
        text: text.into(),
    })
}

/// Edits per file, ordered and non-overlapping.
#[derive(Debug, Default)]
pub struct ReplacementSet {
    // Keyed by (start, end); a point insertion sorts before a replacement starting at
    // the same offset.
    edits: BTreeMap<FileId, BTreeMap<(usize, usize), Edit>>,
}

impl ReplacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edit. A second insertion at the same point is appended to the first one;
    /// any other overlap is rejected.
    pub fn add(&mut self, edit: Edit) -> Result<(), EditError> {
        let file_edits = self.edits.entry(edit.file).or_default();
        let key = (edit.start, edit.end);
        if edit.is_insertion() {
            if let Some(existing) = file_edits.get_mut(&key) {
                existing.text.push_str(&edit.text);
                return Ok(());
            }
        }
        let conflict = file_edits
            .range(..key)
            .next_back()
            .into_iter()
            .chain(file_edits.range(key..).next())
            .map(|(_, existing)| existing)
            .find(|existing| existing.overlaps(&edit));
        if let Some(existing) = conflict {
            return Err(EditError::Overlap {
                existing: existing.clone(),
                new: edit,
            });
        }
        file_edits.insert(key, edit);
        Ok(())
    }

    /// Resolves and adds an edit; a contract breach aborts.
    pub fn make_edit(
        &mut self,
        sources: &SourceManager,
        start: SourceLocation,
        end: SourceLocation,
        text: impl Into<String>,
    ) {
        let result = create_edit(sources, start, end, text).and_then(|edit| self.add(edit));
        if let Err(err) = result {
            panic!("{}", err);
        }
    }

    pub fn edits(&self, file: FileId) -> impl Iterator<Item = &Edit> {
        self.edits.get(&file).into_iter().flat_map(|edits| edits.values())
    }

    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.edits
            .iter()
            .filter(|(_, edits)| !edits.is_empty())
            .map(|(file, _)| *file)
    }

    pub fn len(&self) -> usize {
        self.edits.values().map(|edits| edits.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the edits of `file` to `text` in ascending order.
    pub fn apply_to(&self, file: FileId, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut cursor = 0;
        for edit in self.edits(file) {
            result.push_str(&text[cursor..edit.start]);
            result.push_str(&edit.text);
            cursor = edit.end;
        }
        result.push_str(&text[cursor..]);
        result
    }

    /// Produces the new text of every edited file. The source manager is not touched.
    pub fn apply(&self, sources: &SourceManager) -> BTreeMap<FileId, String> {
        self.files()
            .map(|file| (file, self.apply_to(file, sources.source(file))))
            .collect()
    }

    /// Renders the edits of a file, one per line, for debug logging.
    pub fn describe(&self, file: FileId) -> String {
        self.edits(file).map(|edit| edit.to_string()).join("\n")
    }
}
