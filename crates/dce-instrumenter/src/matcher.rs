// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Pattern dispatch over syntax trees.
//!
//! A rewriting stage implements [`MatchCallback`]: it registers a list of [`Pattern`]s and
//! receives every node matching one of them. The [`MatchFinder`] visits the tree level by
//! level within each subtree: the statement children of a node are all matched before the
//! walk descends into them. On each node the patterns are tried in registration order.
//! Marker numbering relies on this order.

use codespan::FileId;
use log::debug;

use crate::{
    edit::ReplacementSet,
    source::{self, SourceLocation, SourceManager},
    syntax::{SyntaxKind, SyntaxNode, SyntaxTree},
};

/// Restricts the statement bound by a body pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Any,
    Block,
}

impl BodyShape {
    fn accepts(&self, node: &SyntaxNode<'_>) -> bool {
        match self {
            BodyShape::Any => true,
            BodyShape::Block => node.kind() == SyntaxKind::Block,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Binds the then-arm of an `if`.
    ThenArm(BodyShape),
    /// Binds the else-arm of an `if`.
    ElseArm(BodyShape),
    /// Binds the body of a `for`, range-`for`, `while` or `do` loop.
    LoopBody(BodyShape),
    /// Binds the statement owned by a `case`/`default` label which does not itself
    /// contain another label.
    CaseBody(BodyShape),
    /// Binds a conditional, loop or switch with a `return` somewhere below it.
    ReturningConstruct,
    /// Binds a non-static variable definition at file scope. Definitions of class
    /// members outside their class are excluded.
    GlobalVariableDefinition,
    /// Binds a non-static function definition at file scope, `main` excluded.
    ExternalFunctionDefinition,
}

impl Pattern {
    /// Returns the node bound by this pattern when it matches `node`.
    pub fn bind<'t>(&self, node: &SyntaxNode<'t>) -> Option<SyntaxNode<'t>> {
        match self {
            Pattern::ThenArm(shape) => node.then_branch().filter(|b| shape.accepts(b)),
            Pattern::ElseArm(shape) => node.else_branch().filter(|b| shape.accepts(b)),
            Pattern::LoopBody(shape) => node.loop_body().filter(|b| shape.accepts(b)),
            Pattern::CaseBody(shape) => node
                .case_body()
                .filter(|b| !b.contains_case_label() && shape.accepts(b)),
            Pattern::ReturningConstruct => {
                let kind = node.kind();
                ((kind == SyntaxKind::If || kind == SyntaxKind::Switch || kind.is_loop())
                    && node.has_return_descendant())
                .then_some(*node)
            }
            Pattern::GlobalVariableDefinition => (node.kind() == SyntaxKind::Declaration
                && node.is_file_scope()
                && node.declares_variable()
                && node.storage_classes().iter().all(|s| *s != "static" && *s != "extern")
                && node
                    .declared_objects()
                    .iter()
                    .all(|name| name.grammar_kind() == "identifier"))
            .then_some(*node),
            Pattern::ExternalFunctionDefinition => {
                if node.kind() != SyntaxKind::FunctionDefinition
                    || !node.is_file_scope()
                    || node.has_storage_class("static")
                    || node.has_storage_class("extern")
                {
                    return None;
                }
                let name = node.function_name()?;
                let plain_name = matches!(name.grammar_kind(), "identifier" | "operator_name");
                (plain_name && name.text() != "main").then_some(*node)
            }
        }
    }
}

/// One successful pattern application.
#[derive(Debug, Clone, Copy)]
pub struct Match<'t> {
    pub pattern: Pattern,
    /// The node the pattern was tried on.
    pub node: SyntaxNode<'t>,
    /// The node the pattern bound.
    pub bound: SyntaxNode<'t>,
}

/// Per-file view handed to callbacks.
pub struct FileContext<'a> {
    file: FileId,
    sources: &'a SourceManager,
    replacements: &'a mut ReplacementSet,
}

impl<'a> FileContext<'a> {
    pub fn new(file: FileId, sources: &'a SourceManager, replacements: &'a mut ReplacementSet) -> Self {
        Self {
            file,
            sources,
            replacements,
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn sources(&self) -> &SourceManager {
        self.sources
    }

    pub fn source(&self) -> &str {
        self.sources.source(self.file)
    }

    pub fn location(&self, offset: usize) -> SourceLocation {
        SourceLocation::new(self.file, offset)
    }

    /// Replaces `[start, end)` with `text`; aborts on a malformed or overlapping edit.
    pub fn make_edit(&mut self, start: SourceLocation, end: SourceLocation, text: impl Into<String>) {
        self.replacements.make_edit(self.sources, start, end, text)
    }

    pub fn insert(&mut self, at: SourceLocation, text: impl Into<String>) {
        self.make_edit(at, at, text)
    }

    /// Start of the first token at or after `offset`.
    pub fn next_token(&self, offset: usize) -> Option<usize> {
        source::next_token_start(self.source(), offset)
    }

    /// The offset just past `node`, including an immediately following `;`.
    pub fn closing_offset(&self, node: &SyntaxNode<'_>) -> usize {
        match source::closing_offset(self.source(), node.end_offset()) {
            Some(offset) => offset,
            None => panic!(
                "cannot read source code at {}",
                self.sources.describe(node.end())
            ),
        }
    }

    pub fn closing_point(&self, node: &SyntaxNode<'_>) -> SourceLocation {
        self.location(self.closing_offset(node))
    }

    /// Checks that the source at `offset` starts with `expected`; aborts otherwise.
    pub fn expect_text(&self, offset: usize, expected: &str) {
        let found = self.source().get(offset..offset + expected.len());
        if found != Some(expected) {
            panic!(
                "cannot read source code at {}: expected `{}`",
                self.sources.describe(self.location(offset)),
                expected
            );
        }
    }
}

/// A rewriting stage driven by pattern matches.
pub trait MatchCallback {
    /// Returns a name for this callback, used in logs.
    fn name(&self) -> String;

    /// The patterns this callback wants to see, in registration order.
    fn patterns(&self) -> Vec<Pattern>;

    /// Called once per file before the traversal starts.
    fn on_start_of_translation_unit(&mut self, _cx: &mut FileContext<'_>) {}

    /// Called for every match.
    fn run(&mut self, cx: &mut FileContext<'_>, m: &Match<'_>);

    /// Called once per file after the traversal.
    fn on_end_of_translation_unit(&mut self, _cx: &mut FileContext<'_>) {}
}

/// Drives a callback over a syntax tree.
pub struct MatchFinder {
    patterns: Vec<Pattern>,
}

impl MatchFinder {
    pub fn new(callback: &dyn MatchCallback) -> Self {
        Self {
            patterns: callback.patterns(),
        }
    }

    fn match_node<'t>(&self, node: SyntaxNode<'t>, result: &mut Vec<Match<'t>>) {
        for pattern in &self.patterns {
            if let Some(bound) = pattern.bind(&node) {
                result.push(Match {
                    pattern: *pattern,
                    node,
                    bound,
                });
            }
        }
    }

    /// All matches of the registered patterns in visit order: expanding a node matches
    /// all of its statement children before descending into the first of them.
    pub fn matches<'t>(&self, tree: &'t SyntaxTree) -> Vec<Match<'t>> {
        let mut result = vec![];
        let root = tree.root();
        self.match_node(root, &mut result);
        let mut queue = vec![root];
        while let Some(node) = queue.pop() {
            let children = node.statement_children();
            for child in &children {
                self.match_node(*child, &mut result);
            }
            queue.extend(children.into_iter().rev());
        }
        result
    }

    /// Runs `callback` over one file, collecting its edits into `replacements`.
    pub fn match_ast(
        &self,
        tree: &SyntaxTree,
        callback: &mut dyn MatchCallback,
        sources: &SourceManager,
        replacements: &mut ReplacementSet,
    ) {
        let mut cx = FileContext::new(tree.file(), sources, replacements);
        callback.on_start_of_translation_unit(&mut cx);
        for m in self.matches(tree) {
            debug!("{}: {:?} at {}", callback.name(), m.pattern, sources.describe(m.bound.begin()));
            callback.run(&mut cx, &m);
        }
        callback.on_end_of_translation_unit(&mut cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Dialect;

    fn bound_texts(text: &str, dialect: Dialect, patterns: Vec<Pattern>) -> Vec<String> {
        struct Collect(Vec<Pattern>);
        impl MatchCallback for Collect {
            fn name(&self) -> String {
                "collect".to_string()
            }
            fn patterns(&self) -> Vec<Pattern> {
                self.0.clone()
            }
            fn run(&mut self, _cx: &mut FileContext<'_>, _m: &Match<'_>) {}
        }
        let mut sources = SourceManager::new();
        let tree = SyntaxTree::parse_str(&mut sources, "input", text, dialect).unwrap();
        let finder = MatchFinder::new(&Collect(patterns));
        finder
            .matches(&tree)
            .iter()
            .map(|m| m.bound.text().to_string())
            .collect()
    }

    #[test]
    fn patterns_fire_in_registration_order_per_node() {
        let texts = bound_texts(
            "int f(int a) { if (a) { return 1; } else a = 2; return 0; }",
            Dialect::C,
            vec![
                Pattern::ThenArm(BodyShape::Block),
                Pattern::ElseArm(BodyShape::Any),
                Pattern::ReturningConstruct,
            ],
        );
        assert_eq!(
            texts,
            vec![
                "{ return 1; }",
                "a = 2;",
                "if (a) { return 1; } else a = 2;"
            ]
        );
    }

    #[test]
    fn block_shape_filters_bodies() {
        let texts = bound_texts(
            "void f(int a) { while (a) a--; for (;;) { break; } }",
            Dialect::C,
            vec![Pattern::LoopBody(BodyShape::Block)],
        );
        assert_eq!(texts, vec!["{ break; }"]);
    }

    #[test]
    fn fallthrough_labels_do_not_bind() {
        let texts = bound_texts(
            "void f(int a) { switch (a) { case 1: case 2: a = 0; break; default: a = 1; } }",
            Dialect::C,
            vec![Pattern::CaseBody(BodyShape::Any)],
        );
        assert_eq!(texts, vec!["a = 1;", "a = 0;"]);
    }

    #[test]
    fn siblings_are_matched_before_nested_statements() {
        let texts = bound_texts(
            "void f(int a, int b, int c) { if (a) { if (b) { a = 1; } } if (c) { a = 2; } }",
            Dialect::C,
            vec![Pattern::ThenArm(BodyShape::Block)],
        );
        assert_eq!(texts, vec!["{ if (b) { a = 1; } }", "{ a = 2; }", "{ a = 1; }"]);
    }

    #[test]
    fn else_if_is_matched_with_its_sibling_arm() {
        let texts = bound_texts(
            "void f(int a, int b, int c) { if (a) { if (b) { a = 1; } } else if (c) { a = 2; } }",
            Dialect::C,
            vec![Pattern::ThenArm(BodyShape::Block)],
        );
        assert_eq!(texts, vec!["{ if (b) { a = 1; } }", "{ a = 2; }", "{ a = 1; }"]);
    }

    #[test]
    fn label_owning_nested_labels_does_not_bind() {
        let texts = bound_texts(
            "void f(int a, int n) { switch (a) { case 0: do { n--; case 1: n--; } while (n); } }",
            Dialect::C,
            vec![Pattern::CaseBody(BodyShape::Any)],
        );
        assert_eq!(texts, vec!["n--;"]);
    }

    #[test]
    fn global_definitions() {
        let texts = bound_texts(
            "int a; static int b; extern int c; int f(void); int main(void) { int d; return 0; } int g(void) { return 1; } static int h(void) { return 2; }",
            Dialect::C,
            vec![
                Pattern::GlobalVariableDefinition,
                Pattern::ExternalFunctionDefinition,
            ],
        );
        assert_eq!(texts, vec!["int a;", "int g(void) { return 1; }"]);
    }

    #[test]
    fn member_definitions_are_not_external_functions() {
        let texts = bound_texts(
            "struct A { int f(); }; int A::f() { return 0; } namespace n { int g() { return 1; } }",
            Dialect::Cpp,
            vec![Pattern::ExternalFunctionDefinition],
        );
        assert_eq!(texts, vec!["int g() { return 1; }"]);
    }

    #[test]
    fn out_of_class_member_variables_are_not_globals() {
        let texts = bound_texts(
            "struct A { static int count; }; int A::count = 0; int total = 0;",
            Dialect::Cpp,
            vec![Pattern::GlobalVariableDefinition],
        );
        assert_eq!(texts, vec!["int total = 0;"]);
    }
}
