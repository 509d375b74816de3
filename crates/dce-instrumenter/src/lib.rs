// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Source-to-source rewriting of C and C++ programs for dead code elimination checks.
//!
//! Three stages are provided, each a [`matcher::MatchCallback`]:
//! [`canonicalizer::Canonicalizer`] turns every body of a conditional, loop or case label
//! into a block, [`static_annotator::StaticAnnotator`] gives file-scope definitions internal
//! linkage, and [`instrumenter::Instrumenter`] inserts numbered marker calls. The
//! [`pipeline`] module chains them over a set of files.

pub mod canonicalizer;
pub mod edit;
pub mod instrumenter;
pub mod markers;
pub mod matcher;
pub mod options;
pub mod pipeline;
pub mod source;
pub mod static_annotator;
pub mod syntax;

pub use options::Options;
pub use pipeline::{Pipeline, Stage};
pub use source::SourceManager;
pub use syntax::{Dialect, SyntaxTree};

pub use codespan::FileId;
