// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! The marker ABI shared with the tools that consume instrumented programs.
//!
//! A marker `k` is declared as `void DCEMarker<k>_(void);` at the top of the file and
//! called as the statement `DCEMarker<k>_();`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const MARKER_PREFIX: &str = "DCEMarker";

static DECLARATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^void DCEMarker([0-9]+)_\(void\)").expect("valid regex"));

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"DCEMarker([0-9]+)_").expect("valid regex"));

static ASM_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^.*\b(?:call|jmp)\w*\b.*?DCEMarker([0-9]+)_.*$").expect("valid regex")
});

pub fn marker_name(index: usize) -> String {
    format!("{}{}_", MARKER_PREFIX, index)
}

/// The call statement inserted into the program.
pub fn marker_call(index: usize) -> String {
    format!("{}();", marker_name(index))
}

/// The forward declaration line, newline included.
pub fn marker_declaration(index: usize) -> String {
    format!("void {}(void);\n", marker_name(index))
}

fn indices<'a>(re: &Regex, text: &'a str) -> impl Iterator<Item = usize> + 'a {
    let captures: Vec<usize> = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();
    captures.into_iter()
}

/// One past the highest marker declared at the start of a line, 0 if there is none.
pub fn declared_marker_count(source: &str) -> usize {
    indices(&DECLARATION_RE, source)
        .max()
        .map_or(0, |max| max + 1)
}

/// Every marker index mentioned in `text`.
pub fn markers_in(text: &str) -> BTreeSet<usize> {
    indices(&MARKER_RE, text).collect()
}

/// Markers still referenced by a call or jump in compiler-generated assembly.
pub fn alive_markers_in_asm(asm: &str) -> BTreeSet<usize> {
    indices(&ASM_MARKER_RE, asm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_spelling() {
        assert_eq!(marker_name(3), "DCEMarker3_");
        assert_eq!(marker_call(12), "DCEMarker12_();");
        assert_eq!(marker_declaration(0), "void DCEMarker0_(void);\n");
    }

    #[test]
    fn declared_count() {
        assert_eq!(declared_marker_count("int main() {}"), 0);
        let source = "void DCEMarker0_(void);\nvoid DCEMarker7_(void);\nvoid DCEMarker2_(void);\n";
        assert_eq!(declared_marker_count(source), 8);
        // Calls and indented text do not count as declarations.
        assert_eq!(declared_marker_count("  void DCEMarker9_(void);\nDCEMarker4_();"), 0);
    }

    #[test]
    fn markers_in_text() {
        let text = "{\nDCEMarker1_();x;}\nDCEMarker10_(); DCEMarker1_();";
        assert_eq!(markers_in(text), BTreeSet::from([1, 10]));
    }

    #[test]
    fn alive_markers() {
        let asm = "\
foo:
        pushq   %rbp
        callq   DCEMarker0_@PLT
        movl    $DCEMarker3_, %eax
        jmp     DCEMarker5_
        call    DCEMarker12_
";
        assert_eq!(alive_markers_in_asm(asm), BTreeSet::from([0, 5, 12]));
    }
}
