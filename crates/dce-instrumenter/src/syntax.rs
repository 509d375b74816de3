// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Read-only syntax trees for C and C++ sources.
//!
//! Files are parsed with tree-sitter. A [`SyntaxTree`] owns the parse tree together with
//! the text it was produced from, and hands out [`SyntaxNode`] views which classify the
//! concrete grammar nodes into the handful of statement kinds the rewriting stages care
//! about.

use anyhow::bail;
use codespan::FileId;
use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFile,
    term::{self, termcolor::Buffer},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};
use tree_sitter::{Node, Parser, Tree, TreeCursor};

use crate::source::{SourceLocation, SourceManager};

/// The language a file is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    C,
    Cpp,
}

impl Dialect {
    /// Guesses the dialect from a file extension.
    pub fn from_path(path: &Path) -> Option<Dialect> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "c" | "h" | "i" => Some(Dialect::C),
            "C" | "cc" | "cpp" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "ii" => Some(Dialect::Cpp),
            _ => None,
        }
    }

    fn language(&self) -> tree_sitter::Language {
        match self {
            Dialect::C => tree_sitter_c::LANGUAGE.into(),
            Dialect::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(Dialect::C),
            "cpp" | "c++" | "cxx" => Ok(Dialect::Cpp),
            _ => bail!("unknown language `{}`, expected `c` or `cpp`", s),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::C => write!(f, "c"),
            Dialect::Cpp => write!(f, "cpp"),
        }
    }
}

/// Statement kinds distinguished by the rewriting stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    If,
    For,
    RangeFor,
    While,
    Do,
    Switch,
    /// A `case` or `default` label.
    Case,
    Block,
    Null,
    Return,
    FunctionDefinition,
    Declaration,
    Other,
}

impl SyntaxKind {
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            SyntaxKind::For | SyntaxKind::RangeFor | SyntaxKind::While | SyntaxKind::Do
        )
    }
}

/// A parsed file.
pub struct SyntaxTree {
    file: FileId,
    dialect: Dialect,
    text: String,
    tree: Tree,
}

impl SyntaxTree {
    /// Parses the current text of `file`. A tree with syntax errors is rejected with a
    /// rendered diagnostic.
    pub fn parse(sources: &SourceManager, file: FileId, dialect: Dialect) -> anyhow::Result<Self> {
        let text = sources.source(file).to_string();
        let mut parser = Parser::new();
        parser.set_language(&dialect.language())?;
        let Some(tree) = parser.parse(&text, None) else {
            bail!("{} could not be parsed.", sources.path(file).display());
        };
        let syntax = SyntaxTree {
            file,
            dialect,
            text,
            tree,
        };
        if let Some(broken) = syntax.first_broken_node() {
            let message = if broken.is_missing() {
                format!("missing `{}`", broken.kind())
            } else {
                "syntax error".to_string()
            };
            let diagnostic = Diagnostic::error()
                .with_message(message)
                .with_labels(vec![Label::primary((), broken.start_byte()..broken.end_byte())]);
            let path = sources.path(file).display().to_string();
            let simple_file = SimpleFile::new(path.clone(), syntax.text.as_str());
            let mut error_writer = Buffer::no_color();
            term::emit(&mut error_writer, &term::Config::default(), &simple_file, &diagnostic)?;
            let diagnostic_output = String::from_utf8_lossy(&error_writer.into_inner()).to_string();
            bail!("{} could not be parsed.\n{}", path, diagnostic_output);
        }
        Ok(syntax)
    }

    /// Parses a standalone text, registering it under `name`.
    pub fn parse_str(
        sources: &mut SourceManager,
        name: &str,
        text: &str,
        dialect: Dialect,
    ) -> anyhow::Result<Self> {
        let file = sources.add_file(name, text);
        Self::parse(sources, file, dialect)
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode::new(self.tree.root_node(), self.file, &self.text)
    }

    fn first_broken_node(&self) -> Option<Node<'_>> {
        if !self.tree.root_node().has_error() {
            return None;
        }
        self.root()
            .preorder()
            .map(|node| node.raw)
            .find(|node| node.is_error() || node.is_missing())
    }
}

/// A view of one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct SyntaxNode<'t> {
    raw: Node<'t>,
    file: FileId,
    source: &'t str,
}

impl<'t> fmt::Debug for SyntaxNode<'t> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{}",
            self.raw.kind(),
            self.raw.start_byte(),
            self.raw.end_byte()
        )
    }
}

impl<'t> PartialEq for SyntaxNode<'t> {
    fn eq(&self, other: &Self) -> bool {
        self.raw.id() == other.raw.id()
    }
}

impl<'t> SyntaxNode<'t> {
    fn new(raw: Node<'t>, file: FileId, source: &'t str) -> Self {
        Self { raw, file, source }
    }

    fn wrap(&self, raw: Node<'t>) -> Self {
        Self::new(raw, self.file, self.source)
    }

    /// The grammar name of the node.
    pub fn grammar_kind(&self) -> &'static str {
        self.raw.kind()
    }

    pub fn kind(&self) -> SyntaxKind {
        match self.raw.kind() {
            "if_statement" => SyntaxKind::If,
            "for_statement" => SyntaxKind::For,
            "for_range_loop" => SyntaxKind::RangeFor,
            "while_statement" => SyntaxKind::While,
            "do_statement" => SyntaxKind::Do,
            "switch_statement" => SyntaxKind::Switch,
            "case_statement" => SyntaxKind::Case,
            "compound_statement" => SyntaxKind::Block,
            "expression_statement" if self.children().next().is_none() => SyntaxKind::Null,
            "return_statement" => SyntaxKind::Return,
            "function_definition" => SyntaxKind::FunctionDefinition,
            "declaration" => SyntaxKind::Declaration,
            _ => SyntaxKind::Other,
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn begin_offset(&self) -> usize {
        self.raw.start_byte()
    }

    pub fn end_offset(&self) -> usize {
        self.raw.end_byte()
    }

    pub fn begin(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.begin_offset())
    }

    /// The location just past the last token of the node.
    pub fn end(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.end_offset())
    }

    pub fn text(&self) -> &'t str {
        &self.source[self.begin_offset()..self.end_offset()]
    }

    pub fn parent(&self) -> Option<SyntaxNode<'t>> {
        self.raw.parent().map(|raw| self.wrap(raw))
    }

    /// Named children, comments excluded.
    pub fn children(&self) -> impl Iterator<Item = SyntaxNode<'t>> {
        let this = *self;
        let mut cursor = self.raw.walk();
        let children: Vec<_> = self
            .raw
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .collect();
        children.into_iter().map(move |raw| this.wrap(raw))
    }

    pub fn field(&self, name: &str) -> Option<SyntaxNode<'t>> {
        self.raw.child_by_field_name(name).map(|raw| self.wrap(raw))
    }

    fn fields(&self, name: &str) -> Vec<SyntaxNode<'t>> {
        let mut cursor = self.raw.walk();
        let nodes: Vec<_> = self.raw.children_by_field_name(name, &mut cursor).collect();
        nodes.into_iter().map(|raw| self.wrap(raw)).collect()
    }

    /// The then-arm of an `if`.
    pub fn then_branch(&self) -> Option<SyntaxNode<'t>> {
        (self.kind() == SyntaxKind::If)
            .then(|| self.field("consequence"))
            .flatten()
    }

    /// The statement of the `else` clause of an `if`.
    pub fn else_branch(&self) -> Option<SyntaxNode<'t>> {
        if self.kind() != SyntaxKind::If {
            return None;
        }
        let clause = self.field("alternative")?;
        if clause.grammar_kind() == "else_clause" {
            clause.children().next()
        } else {
            Some(clause)
        }
    }

    pub fn loop_body(&self) -> Option<SyntaxNode<'t>> {
        if self.kind().is_loop() {
            self.field("body")
        } else {
            None
        }
    }

    /// The statement owned by a `case`/`default` label: the first statement after the
    /// colon, if any.
    pub fn case_body(&self) -> Option<SyntaxNode<'t>> {
        if self.kind() != SyntaxKind::Case {
            return None;
        }
        self.label_statements().next()
    }

    fn label_statements(&self) -> impl Iterator<Item = SyntaxNode<'t>> {
        let value = self.field("value");
        self.children().filter(move |child| Some(*child) != value)
    }

    /// The label right after this one, if nothing but comments separates them.
    fn following_label(&self) -> Option<SyntaxNode<'t>> {
        let mut next = self.raw.next_named_sibling();
        while let Some(raw) = next {
            if raw.kind() != "comment" {
                let node = self.wrap(raw);
                return (node.kind() == SyntaxKind::Case).then_some(node);
            }
            next = raw.next_named_sibling();
        }
        None
    }

    /// Children arranged as a statement tree. Else clauses are looked through. A label
    /// without statements owns the label following it, and a label owns only its first
    /// statement: the statements after it belong to the enclosing block.
    pub fn statement_children(&self) -> Vec<SyntaxNode<'t>> {
        if self.kind() == SyntaxKind::Case {
            let sub = self.case_body().or_else(|| self.following_label());
            return self.field("value").into_iter().chain(sub).collect();
        }
        let mut result = vec![];
        let mut owned_by_previous = false;
        for child in self.children() {
            if child.kind() == SyntaxKind::Case {
                if !owned_by_previous {
                    result.push(child);
                }
                owned_by_previous = child.case_body().is_none();
                result.extend(child.label_statements().skip(1));
                continue;
            }
            owned_by_previous = false;
            if child.grammar_kind() == "else_clause" {
                result.extend(child.children());
            } else {
                result.push(child);
            }
        }
        result
    }

    /// Iterates the subtree rooted at this node in pre-order, this node first.
    pub fn preorder(&self) -> Preorder<'t> {
        Preorder {
            cursor: self.raw.walk(),
            file: self.file,
            source: self.source,
            done: false,
        }
    }

    fn has_descendant(&self, kind: SyntaxKind) -> bool {
        self.preorder().skip(1).any(|node| node.kind() == kind)
    }

    /// Whether a `return` statement occurs anywhere below this node.
    pub fn has_return_descendant(&self) -> bool {
        self.has_descendant(SyntaxKind::Return)
    }

    /// Whether this node is or contains a `case`/`default` label.
    pub fn contains_case_label(&self) -> bool {
        self.kind() == SyntaxKind::Case || self.has_descendant(SyntaxKind::Case)
    }

    /// Whether the node sits at namespace scope, looking through preprocessor
    /// conditionals, namespaces and braced linkage specifications.
    pub fn is_file_scope(&self) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            match node.grammar_kind() {
                "translation_unit" => return true,
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "namespace_definition" => {}
                "declaration_list" => match node.parent().map(|p| p.grammar_kind()) {
                    Some("namespace_definition") | Some("linkage_specification") => {}
                    _ => return false,
                },
                "linkage_specification" => {
                    // `extern "C" int f() {}` without braces is extern-qualified.
                    if node.field("body") == Some(*self) {
                        return false;
                    }
                }
                _ => return false,
            }
            current = node.parent();
        }
        false
    }

    /// The storage class keywords spelled on a declaration or definition.
    pub fn storage_classes(&self) -> Vec<&'t str> {
        self.children()
            .filter(|child| child.grammar_kind() == "storage_class_specifier")
            .map(|child| child.text().trim())
            .collect()
    }

    pub fn has_storage_class(&self, keyword: &str) -> bool {
        self.storage_classes().contains(&keyword)
    }

    /// Whether a declaration introduces at least one object, as opposed to only
    /// function prototypes.
    pub fn declares_variable(&self) -> bool {
        self.kind() == SyntaxKind::Declaration
            && self
                .fields("declarator")
                .iter()
                .any(|declarator| !declares_function(*declarator))
    }

    /// Name nodes of the objects, functions excluded, introduced by a declaration.
    pub fn declared_objects(&self) -> Vec<SyntaxNode<'t>> {
        self.fields("declarator")
            .into_iter()
            .filter(|declarator| !declares_function(*declarator))
            .filter_map(declarator_name)
            .collect()
    }

    /// Names of all objects and functions introduced by a declaration.
    pub fn declared_names(&self) -> Vec<(&'t str, bool)> {
        self.fields("declarator")
            .into_iter()
            .filter_map(|declarator| {
                let is_function = declares_function(declarator);
                declarator_name(declarator).map(|name| (name.text(), is_function))
            })
            .collect()
    }

    /// The declarator name of a function definition, e.g. `f` in `int *f(void) {..}`.
    pub fn function_name(&self) -> Option<SyntaxNode<'t>> {
        if self.kind() != SyntaxKind::FunctionDefinition {
            return None;
        }
        declarator_name(self.field("declarator")?)
    }
}

/// Descends through a declarator to the name it declares.
fn declarator_name(mut node: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    loop {
        match node.grammar_kind() {
            "identifier" | "field_identifier" | "qualified_identifier" | "operator_name"
            | "destructor_name" | "template_function" => return Some(node),
            "init_declarator" | "function_declarator" | "pointer_declarator"
            | "array_declarator" | "reference_declarator" | "attributed_declarator" => {
                node = node.field("declarator")?;
            }
            "parenthesized_declarator" => {
                node = node.children().next()?;
            }
            _ => {
                // Remaining wrappers carry their inner declarator as a plain child.
                node = node.children().find(|child| {
                    child.grammar_kind() == "identifier"
                        || child.grammar_kind().ends_with("declarator")
                })?;
            }
        }
    }
}

/// Whether the derivation closest to the declared name is a function declarator, so
/// `int f(void)` and `int *f(void)` declare functions while `int (*fp)(void)` does not.
fn declares_function(mut node: SyntaxNode<'_>) -> bool {
    let mut innermost = None;
    loop {
        match node.grammar_kind() {
            "parenthesized_declarator" => match node.children().next() {
                Some(inner) => node = inner,
                None => return false,
            },
            "init_declarator" | "function_declarator" | "pointer_declarator"
            | "array_declarator" | "reference_declarator" | "attributed_declarator" => {
                innermost = Some(node.grammar_kind());
                match node.field("declarator") {
                    Some(inner) => node = inner,
                    None => return false,
                }
            }
            _ => return innermost == Some("function_declarator"),
        }
    }
}

/// Pre-order traversal over a subtree.
pub struct Preorder<'t> {
    cursor: TreeCursor<'t>,
    file: FileId,
    source: &'t str,
    done: bool,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = SyntaxNode<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.cursor.node();
        if !self.cursor.goto_first_child() {
            loop {
                if self.cursor.goto_next_sibling() {
                    break;
                }
                if !self.cursor.goto_parent() {
                    self.done = true;
                    break;
                }
            }
        }
        Some(SyntaxNode::new(node, self.file, self.source))
    }
}
