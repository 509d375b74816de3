// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Inserts marker calls into canonicalized sources.
//!
//! Each block which is the arm of a conditional, the body of a loop, or the block owned
//! by a case label receives a call `DCEMarker<k>_();` as its new first statement. Every
//! conditional, loop or switch with a `return` below it receives one more call right after
//! it: that point is only reached if the construct did not return. Markers are numbered
//! in visit order and declared at the top of the file.

use log::{debug, info};

use crate::{
    markers::{declared_marker_count, marker_call, marker_declaration},
    matcher::{BodyShape, FileContext, Match, MatchCallback, Pattern},
};

/// Hands out marker numbers for one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarkerCounter {
    first: usize,
    next: usize,
}

impl MarkerCounter {
    /// A counter whose first marker is `first`.
    pub fn starting_at(first: usize) -> Self {
        Self { first, next: first }
    }

    pub fn next_marker(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }

    /// The markers handed out so far.
    pub fn issued(&self) -> std::ops::Range<usize> {
        self.first..self.next
    }

    pub fn issued_count(&self) -> usize {
        self.next - self.first
    }
}

#[derive(Debug, Default)]
pub struct Instrumenter {
    counter: MarkerCounter,
}

impl Instrumenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> MarkerCounter {
        self.counter
    }

    fn new_marker_call(&mut self) -> String {
        format!("\n{}", marker_call(self.counter.next_marker()))
    }
}

impl MatchCallback for Instrumenter {
    fn name(&self) -> String {
        "instrument".to_string()
    }

    fn patterns(&self) -> Vec<Pattern> {
        vec![
            Pattern::ThenArm(BodyShape::Block),
            Pattern::ElseArm(BodyShape::Block),
            Pattern::LoopBody(BodyShape::Block),
            Pattern::CaseBody(BodyShape::Block),
            Pattern::ReturningConstruct,
        ]
    }

    fn on_start_of_translation_unit(&mut self, cx: &mut FileContext<'_>) {
        // Markers already present from an earlier run keep their numbers.
        self.counter = MarkerCounter::starting_at(declared_marker_count(cx.source()));
        if self.counter.first > 0 {
            debug!("resuming marker numbering at {}", self.counter.first);
        }
    }

    fn run(&mut self, cx: &mut FileContext<'_>, m: &Match<'_>) {
        match m.pattern {
            Pattern::ReturningConstruct => {
                let at = cx.closing_point(&m.bound);
                let call = self.new_marker_call();
                cx.insert(at, call);
            }
            _ => {
                let brace = m.bound.begin_offset();
                cx.expect_text(brace, "{");
                let call = self.new_marker_call();
                cx.insert(cx.location(brace + 1), call);
            }
        }
    }

    fn on_end_of_translation_unit(&mut self, cx: &mut FileContext<'_>) {
        if self.counter.issued_count() == 0 {
            return;
        }
        let declarations: String = self.counter.issued().map(marker_declaration).collect();
        let start = cx.sources().start_of_file(cx.file());
        cx.insert(start, declarations);
        info!(
            "inserted {} marker(s) into {}",
            self.counter.issued_count(),
            cx.sources().path(cx.file()).display()
        );
    }
}
