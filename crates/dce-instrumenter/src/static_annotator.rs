// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Gives file-scope definitions internal linkage by prefixing them with `static `.

use log::debug;

use crate::matcher::{FileContext, Match, MatchCallback, Pattern};

#[derive(Debug, Default)]
pub struct StaticAnnotator {
    annotated: usize,
}

impl StaticAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotated(&self) -> usize {
        self.annotated
    }
}

impl MatchCallback for StaticAnnotator {
    fn name(&self) -> String {
        "make_globals_static".to_string()
    }

    fn patterns(&self) -> Vec<Pattern> {
        vec![
            Pattern::GlobalVariableDefinition,
            Pattern::ExternalFunctionDefinition,
        ]
    }

    fn on_start_of_translation_unit(&mut self, _cx: &mut FileContext<'_>) {
        self.annotated = 0;
    }

    fn run(&mut self, cx: &mut FileContext<'_>, m: &Match<'_>) {
        self.annotated += 1;
        cx.insert(m.bound.begin(), "static ");
    }

    fn on_end_of_translation_unit(&mut self, cx: &mut FileContext<'_>) {
        debug!(
            "{} definition(s) made static in {}",
            self.annotated,
            cx.sources().path(cx.file()).display()
        );
    }
}
