// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Static call graph of C/C++ sources and reachability queries over it.

pub mod collector;
pub mod graph;

pub use collector::{collect_calls, CallPair};
pub use graph::{call_chain_exists, CallGraph, ChainQuery};

use dce_instrumenter::{SourceManager, SyntaxTree};
use log::info;

/// Collects the calls of every file loaded into `sources`.
pub fn collect_all(
    sources: &SourceManager,
    files: &[(dce_instrumenter::FileId, dce_instrumenter::Dialect)],
) -> anyhow::Result<Vec<CallPair>> {
    let mut calls = vec![];
    for (file, dialect) in files {
        let tree = SyntaxTree::parse(sources, *file, *dialect)?;
        let found = collect_calls(&tree);
        info!(
            "{}: {} call(s) collected",
            sources.path(*file).display(),
            found.len()
        );
        calls.extend(found);
    }
    Ok(calls)
}
