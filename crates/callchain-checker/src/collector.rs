// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Collection of (caller, callee) pairs from a syntax tree.

use dce_instrumenter::{
    syntax::{SyntaxKind, SyntaxNode},
    Dialect, SyntaxTree,
};
use log::debug;
use std::collections::BTreeSet;

/// A call from the body of `caller` to the function `callee`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallPair {
    pub caller: String,
    pub callee: String,
}

impl CallPair {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
        }
    }
}

/// Names declared in a file, split into functions and objects.
#[derive(Debug, Default)]
struct DeclaredNames<'t> {
    functions: BTreeSet<&'t str>,
    objects: BTreeSet<&'t str>,
}

impl<'t> DeclaredNames<'t> {
    fn collect(root: SyntaxNode<'t>) -> Self {
        let mut names = Self::default();
        for node in root.preorder() {
            if let Some(name) = node.function_name() {
                names.functions.insert(last_segment(name).text());
                continue;
            }
            if matches!(
                node.grammar_kind(),
                "declaration" | "parameter_declaration" | "optional_parameter_declaration"
            ) {
                for (name, is_function) in node.declared_names() {
                    if is_function {
                        names.functions.insert(name);
                    } else {
                        names.objects.insert(name);
                    }
                }
            }
        }
        names
    }

    /// Whether `name` can only denote an object, e.g. a function pointer parameter.
    fn is_object_only(&self, name: &str) -> bool {
        self.objects.contains(name) && !self.functions.contains(name)
    }
}

/// Strips namespace qualification and template arguments from a callee name.
fn last_segment(mut node: SyntaxNode<'_>) -> SyntaxNode<'_> {
    loop {
        let inner = match node.grammar_kind() {
            "qualified_identifier" | "template_function" | "template_method" => node.field("name"),
            _ => None,
        };
        match inner {
            Some(inner) => node = inner,
            None => return node,
        }
    }
}

fn callee_name<'t>(call: &SyntaxNode<'t>, dialect: Dialect) -> Option<SyntaxNode<'t>> {
    let function = call.field("function")?;
    match function.grammar_kind() {
        "identifier" => Some(function),
        "qualified_identifier" | "template_function" => Some(last_segment(function)),
        "field_expression" if dialect == Dialect::Cpp => function.field("field").map(last_segment),
        _ => None,
    }
}

fn enclosing_function<'t>(node: &SyntaxNode<'t>) -> Option<SyntaxNode<'t>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if candidate.kind() == SyntaxKind::FunctionDefinition {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

/// Every direct call to a named function made inside a function definition, in source
/// order. Calls through objects (function pointers) are skipped.
pub fn collect_calls(tree: &SyntaxTree) -> Vec<CallPair> {
    let root = tree.root();
    let names = DeclaredNames::collect(root);
    let mut calls = vec![];
    for node in root.preorder() {
        if node.grammar_kind() != "call_expression" {
            continue;
        }
        let Some(callee) = callee_name(&node, tree.dialect()) else {
            continue;
        };
        if callee.grammar_kind() == "identifier" && names.is_object_only(callee.text()) {
            debug!("skipping call through object `{}`", callee.text());
            continue;
        }
        let Some(caller) = enclosing_function(&node).and_then(|def| def.function_name()) else {
            continue;
        };
        calls.push(CallPair::new(last_segment(caller).text(), callee.text()));
    }
    calls
}
