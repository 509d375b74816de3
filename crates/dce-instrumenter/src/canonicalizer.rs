// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Wraps the bodies of conditionals, loops and case labels into blocks.
//!
//! After this stage every body the instrumenter is interested in is a `{ .. }` block, so
//! markers can always be placed right after an opening brace. Closing braces are not
//! emitted immediately: several bodies can end at the same point (`if (a) while (b) c;`),
//! so the owed braces are counted per offset and flushed as one insertion per offset once
//! the file has been traversed.

use log::debug;
use std::collections::BTreeMap;

use crate::{
    matcher::{BodyShape, FileContext, Match, MatchCallback, Pattern},
    syntax::SyntaxKind,
};

#[derive(Debug, Default)]
pub struct Canonicalizer {
    /// Offset -> number of `}` owed at that offset.
    pending_braces: BTreeMap<usize, usize>,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_brace_count(&self) -> usize {
        self.pending_braces.values().sum()
    }
}

impl MatchCallback for Canonicalizer {
    fn name(&self) -> String {
        "canonicalize".to_string()
    }

    fn patterns(&self) -> Vec<Pattern> {
        vec![
            Pattern::ThenArm(BodyShape::Any),
            Pattern::ElseArm(BodyShape::Any),
            Pattern::LoopBody(BodyShape::Any),
            Pattern::CaseBody(BodyShape::Any),
        ]
    }

    fn on_start_of_translation_unit(&mut self, _cx: &mut FileContext<'_>) {
        self.pending_braces.clear();
    }

    fn run(&mut self, cx: &mut FileContext<'_>, m: &Match<'_>) {
        let body = &m.bound;
        match body.kind() {
            SyntaxKind::Block => {}
            SyntaxKind::Null => cx.make_edit(body.begin(), body.end(), "{}"),
            _ => {
                cx.insert(body.begin(), "{");
                let offset = cx.closing_offset(body);
                *self.pending_braces.entry(offset).or_default() += 1;
            }
        }
    }

    fn on_end_of_translation_unit(&mut self, cx: &mut FileContext<'_>) {
        for (offset, count) in std::mem::take(&mut self.pending_braces) {
            debug!("closing {} block(s) at offset {}", count, offset);
            let at = cx.location(offset);
            cx.insert(at, "}".repeat(count));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{pipeline::canonicalize_source, syntax::Dialect};

    fn canonicalize(text: &str) -> String {
        canonicalize_source(text, Dialect::C).unwrap()
    }

    fn canonicalize_cpp(text: &str) -> String {
        canonicalize_source(text, Dialect::Cpp).unwrap()
    }

    #[test]
    fn if_else_arms() {
        assert_eq!(
            canonicalize("int foo(int a){ if (a > 0)a = 1; else a = 0;return a; }"),
            "int foo(int a){ if (a > 0){a = 1;} else {a = 0;}return a; }"
        );
    }

    #[test]
    fn semicolon_after_the_statement_is_swallowed() {
        assert_eq!(
            canonicalize("int foo(int a){ if (a){ a = 1; } else a = 0 ; return a; }"),
            "int foo(int a){ if (a){ a = 1; } else {a = 0 ;} return a; }"
        );
    }

    #[test]
    fn null_bodies() {
        assert_eq!(
            canonicalize("int foo(int a){ if (a > 0); for(;;); do;while(1); return a; }"),
            "int foo(int a){ if (a > 0){} for(;;){} do{}while(1); return a; }"
        );
    }

    #[test]
    fn loops() {
        assert_eq!(
            canonicalize("void f(int a){ for(;;) a = 0; while(1) a = 0 ; do a = 0; while(1); }"),
            "void f(int a){ for(;;) {a = 0;} while(1) {a = 0 ;} do {a = 0;} while(1); }"
        );
        assert_eq!(
            canonicalize_cpp("void f(int a){ for(auto b: {1,2,3}) a = b; }"),
            "void f(int a){ for(auto b: {1,2,3}) {a = b;} }"
        );
    }

    #[test]
    fn switch_groups() {
        let code = "int foo(int a){ switch(a){ case 1: break; case 2:{ a = 3; break; } \
                    case -1: case 3: a = 4; break; case 4: default: return 2; } return a; }";
        let expected = "int foo(int a){ switch(a){ case 1: {break;} case 2:{ a = 3; break; } \
                        case -1: case 3: {a = 4;} break; case 4: default: {return 2;} } return a; }";
        assert_eq!(canonicalize(code), expected);
    }

    #[test]
    fn nested_bodies_share_one_closing_insertion() {
        assert_eq!(
            canonicalize("int foo(int a){ if (a > 0) if (a == 10) return 10; return a; }"),
            "int foo(int a){ if (a > 0) {if (a == 10) {return 10;}} return a; }"
        );
    }

    #[test]
    fn else_if_chain() {
        assert_eq!(
            canonicalize("void f(int a, int b, int x){ if (a) x = 1; else if (b) x = 2; else x = 3; }"),
            "void f(int a, int b, int x){ if (a) {x = 1;} else {if (b) {x = 2;} else {x = 3;}} }"
        );
    }

    #[test]
    fn nested_complex() {
        let code = "int foo(int a){ if (a > 0) for (int b=a; b > 0; --b) switch(b){ case 1: break; \
                    default: while(b > 10) --b; return b; } else do ++a;while(a<0); return a; }";
        let expected = "int foo(int a){ if (a > 0) {for (int b=a; b > 0; --b) {switch(b){ case 1: {break;} \
                        default: {while(b > 10) {--b;}} return b; }}} else {do {++a;}while(a<0);} return a; }";
        assert_eq!(canonicalize(code), expected);
    }

    #[test]
    fn canonical_output_is_a_fixed_point() {
        let code = "int foo(int a){ if (a > 0) for (;;) a--; else if (a) ; else switch (a) { case 1: a = 2; } return a; }";
        let once = canonicalize(code);
        assert_eq!(canonicalize(&once), once);
    }
}
