// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use clap::*;
use dce_instrument::{execute, init_logging, load_options, report_and_exit, CommonArgs, RewriteArgs};

#[derive(Parser)]
#[clap(
    name = env!("CARGO_BIN_NAME"),
    about = "Prefixes file-scope variable and function definitions of C/C++ sources with `static`",
    rename_all = "kebab-case",
    author,
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Args {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[clap(flatten)]
    pub rewrite: RewriteArgs,
}

fn run(args: Args) -> anyhow::Result<()> {
    let loaded = load_options(&args.common, &args.rewrite)?;
    let options = dce_instrumenter::Options {
        dialect: loaded.dialect,
        dry_run: loaded.dry_run,
        verbosity_level: loaded.verbosity_level,
        ..dce_instrumenter::Options::static_only()
    };
    init_logging(options.verbosity_level);
    execute(&args.common, &options)
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    report_and_exit(run(Args::parse()));
}
