// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use log::warn;
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::Bfs,
};
use std::{collections::HashMap, fmt};

use crate::collector::CallPair;

/// Outcome of a reachability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainQuery {
    Exists,
    NoChain,
    /// The named function has no edge in the graph.
    Unknown(String),
}

impl ChainQuery {
    pub fn exists(&self) -> bool {
        matches!(self, ChainQuery::Exists)
    }
}

/// Directed caller -> callee graph over function names.
#[derive(Default)]
pub struct CallGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl CallGraph {
    pub fn new(calls: &[CallPair]) -> Self {
        let mut result = Self::default();
        for call in calls {
            let caller = result.node(&call.caller);
            let callee = result.node(&call.callee);
            result.graph.update_edge(caller, callee, ());
        }
        result
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.nodes.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), index);
        index
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn function_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Breadth-first search from `from`. A function reaches itself.
    pub fn query(&self, from: &str, to: &str) -> ChainQuery {
        let Some(start) = self.nodes.get(from) else {
            return ChainQuery::Unknown(from.to_string());
        };
        let Some(target) = self.nodes.get(to) else {
            return ChainQuery::Unknown(to.to_string());
        };
        let mut bfs = Bfs::new(&self.graph, *start);
        while let Some(visited) = bfs.next(&self.graph) {
            if visited == *target {
                return ChainQuery::Exists;
            }
        }
        ChainQuery::NoChain
    }

    /// Like [`CallGraph::query`], reporting names missing from the graph as a warning.
    pub fn call_chain_exists(&self, from: &str, to: &str) -> bool {
        match self.query(from, to) {
            ChainQuery::Exists => true,
            ChainQuery::NoChain => false,
            ChainQuery::Unknown(name) => {
                warn!("{} is not part of the call graph", name);
                false
            }
        }
    }
}

impl fmt::Debug for CallGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(a, b)| format!("{} -> {}", self.graph[a], self.graph[b]))
            .collect();
        f.debug_list().entries(edges).finish()
    }
}

/// Whether `to` is reachable from `from` over `calls`.
pub fn call_chain_exists(calls: &[CallPair], from: &str, to: &str) -> bool {
    CallGraph::new(calls).call_chain_exists(from, to)
}
