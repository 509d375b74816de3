// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Running rewriting stages over a set of files.
//!
//! Each stage parses every file, collects that file's edits with a fresh callback, and
//! only once all files produced their edits swaps the new texts into the
//! [`SourceManager`]. The next stage parses the result again. Writing to disk is a
//! separate, final step.

use anyhow::Context;
use codespan::FileId;
use log::{debug, info};
use std::{fmt, io::Write, path::Path};

use crate::{
    canonicalizer::Canonicalizer,
    edit::{Edit, ReplacementSet},
    instrumenter::Instrumenter,
    matcher::{MatchCallback, MatchFinder},
    options::Options,
    source::SourceManager,
    static_annotator::StaticAnnotator,
    syntax::{Dialect, SyntaxTree},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Canonicalize,
    MakeGlobalsStatic,
    Instrument,
}

impl Stage {
    /// A fresh callback carrying the per-file state of this stage.
    pub fn callback(&self) -> Box<dyn MatchCallback> {
        match self {
            Stage::Canonicalize => Box::new(Canonicalizer::new()),
            Stage::MakeGlobalsStatic => Box::new(StaticAnnotator::new()),
            Stage::Instrument => Box::new(Instrumenter::new()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.callback().name())
    }
}

/// A sequence of stages, run in order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Canonicalize, then annotate, then instrument, each only if enabled.
    pub fn from_options(options: &Options) -> Self {
        let mut stages = vec![];
        if options.canonicalize {
            stages.push(Stage::Canonicalize);
        }
        if options.make_globals_static {
            stages.push(Stage::MakeGlobalsStatic);
        }
        if options.instrument {
            stages.push(Stage::Instrument);
        }
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs all stages over `files`, leaving the results in `sources`.
    pub fn run(
        &self,
        sources: &mut SourceManager,
        files: &[(FileId, Dialect)],
    ) -> anyhow::Result<()> {
        for stage in &self.stages {
            run_stage(*stage, sources, files)?;
        }
        Ok(())
    }
}

/// Collects the edits one stage makes to one file.
pub fn collect_edits(
    stage: Stage,
    sources: &SourceManager,
    tree: &SyntaxTree,
    replacements: &mut ReplacementSet,
) {
    let mut callback = stage.callback();
    let finder = MatchFinder::new(callback.as_ref());
    finder.match_ast(tree, callback.as_mut(), sources, replacements);
}

/// Runs one stage over all files. Either every file is rewritten or, on a parse error,
/// none is.
pub fn run_stage(
    stage: Stage,
    sources: &mut SourceManager,
    files: &[(FileId, Dialect)],
) -> anyhow::Result<()> {
    let mut replacements = ReplacementSet::new();
    for (file, dialect) in files {
        let tree = SyntaxTree::parse(sources, *file, *dialect)?;
        collect_edits(stage, sources, &tree, &mut replacements);
        debug!(
            "{} edits for {}:\n{}",
            stage,
            sources.path(*file).display(),
            replacements.describe(*file)
        );
    }
    let new_texts = replacements.apply(sources);
    for (file, text) in new_texts {
        info!(
            "{}: {} edit(s) in {}",
            stage,
            replacements.edits(file).count(),
            sources.path(file).display()
        );
        sources.update(file, text);
    }
    Ok(())
}

/// Runs `stages` over a standalone text and returns the result.
pub fn rewrite_source(text: &str, dialect: Dialect, stages: &[Stage]) -> anyhow::Result<String> {
    let mut sources = SourceManager::new();
    let file = sources.add_file(format!("input.{}", dialect), text);
    Pipeline::new(stages.to_vec()).run(&mut sources, &[(file, dialect)])?;
    Ok(sources.source(file).to_string())
}

pub fn canonicalize_source(text: &str, dialect: Dialect) -> anyhow::Result<String> {
    rewrite_source(text, dialect, &[Stage::Canonicalize])
}

/// Canonicalizes and instruments a standalone text.
pub fn instrument_source(text: &str, dialect: Dialect) -> anyhow::Result<String> {
    rewrite_source(text, dialect, &[Stage::Canonicalize, Stage::Instrument])
}

pub fn annotate_source(text: &str, dialect: Dialect) -> anyhow::Result<String> {
    rewrite_source(text, dialect, &[Stage::MakeGlobalsStatic])
}

/// The edits a single stage would make to a standalone text.
pub fn edits_for(stage: Stage, text: &str, dialect: Dialect) -> anyhow::Result<Vec<Edit>> {
    let mut sources = SourceManager::new();
    let tree = SyntaxTree::parse_str(&mut sources, "input", text, dialect)?;
    let mut replacements = ReplacementSet::new();
    collect_edits(stage, &sources, &tree, &mut replacements);
    Ok(replacements.edits(tree.file()).cloned().collect())
}

/// Writes every modified file back to disk. Each file is written to a temporary file in
/// the same directory, then renamed over the original.
pub fn write_back(sources: &SourceManager) -> anyhow::Result<usize> {
    let mut written = 0;
    for file in sources.file_ids() {
        if !sources.is_modified(*file) {
            continue;
        }
        let path = sources.path(*file);
        persist(&path, sources.source(*file))?;
        info!("wrote {}", path.display());
        written += 1;
    }
    Ok(written)
}

fn persist(path: &Path, text: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(text.as_bytes())
        .with_context(|| format!("Failed to write {}", temp.path().display()))?;
    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(temp.path(), metadata.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", path.display()))?;
    }
    temp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_options() {
        let options = Options::default();
        assert_eq!(
            Pipeline::from_options(&options).stages(),
            &[Stage::Canonicalize, Stage::MakeGlobalsStatic, Stage::Instrument]
        );
        assert_eq!(
            Pipeline::from_options(&Options::static_only()).stages(),
            &[Stage::MakeGlobalsStatic]
        );
    }

    #[test]
    fn full_pipeline() {
        let code = "int x;\nint foo(int a){ if (a>0) a=1; else a=0; return a; }\nint main(void) { return foo(x); }\n";
        let out = rewrite_source(
            code,
            Dialect::C,
            Pipeline::from_options(&Options::default()).stages(),
        )
        .unwrap();
        assert_eq!(
            out,
            "void DCEMarker0_(void);\nvoid DCEMarker1_(void);\nstatic int x;\n\
             static int foo(int a){ if (a>0) {\nDCEMarker0_();a=1;} else {\nDCEMarker1_();a=0;} return a; }\n\
             int main(void) { return foo(x); }\n"
        );
    }

    #[test]
    fn marker_declarations_are_not_made_static() {
        let once = rewrite_source(
            "int f(int a) { if (a) return 1; return 0; }",
            Dialect::C,
            &[Stage::Canonicalize, Stage::Instrument],
        )
        .unwrap();
        let annotated = annotate_source(&once, Dialect::C).unwrap();
        assert!(annotated.starts_with("void DCEMarker0_(void);\nvoid DCEMarker1_(void);\nstatic int f"));
    }

    #[test]
    fn edits_of_a_single_stage() {
        let edits = edits_for(Stage::Canonicalize, "void f(int a){ if (a) ; }", Dialect::C).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!((edits[0].start, edits[0].end, edits[0].text.as_str()), (22, 23, "{}"));
    }

    #[test]
    fn parse_errors_leave_sources_unchanged() {
        let mut sources = SourceManager::new();
        let good = sources.add_file("good.c", "void f(int a) { if (a) a--; }");
        let bad = sources.add_file("bad.c", "void g( {");
        let err = run_stage(
            Stage::Canonicalize,
            &mut sources,
            &[(good, Dialect::C), (bad, Dialect::C)],
        )
        .unwrap_err();
        assert!(format!("{:?}", err).contains("bad.c could not be parsed."));
        assert!(!sources.is_modified(good));
    }

    #[test]
    fn write_back_replaces_modified_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let changed = dir.path().join("changed.c");
        let same = dir.path().join("same.c");
        std::fs::write(&changed, "int a;\n").unwrap();
        std::fs::write(&same, "static int b;\n").unwrap();

        let mut sources = SourceManager::new();
        let files = vec![
            (sources.load(&changed).unwrap(), Dialect::C),
            (sources.load(&same).unwrap(), Dialect::C),
        ];
        Pipeline::new(vec![Stage::MakeGlobalsStatic])
            .run(&mut sources, &files)
            .unwrap();
        assert_eq!(write_back(&sources).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&changed).unwrap(), "static int a;\n");
        assert_eq!(std::fs::read_to_string(&same).unwrap(), "static int b;\n");
    }
}
