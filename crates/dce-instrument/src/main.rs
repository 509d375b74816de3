// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use clap::*;
use dce_instrument::{execute, init_logging, load_options, report_and_exit, CommonArgs, RewriteArgs};
use log::debug;

#[derive(Parser)]
#[clap(
    name = env!("CARGO_BIN_NAME"),
    about = "Rewrites C/C++ sources in place: wraps branch bodies into blocks, gives file-scope definitions internal linkage and inserts numbered DCEMarker calls",
    rename_all = "kebab-case",
    author,
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Args {
    /// Input files and compatibility options
    #[clap(flatten)]
    pub common: CommonArgs,

    /// Rewriting options
    #[clap(flatten)]
    pub rewrite: RewriteArgs,

    /// Do not wrap bodies of conditionals, loops and case labels into blocks
    #[clap(long = "no-canonicalize")]
    pub no_canonicalize: bool,

    /// Do not add `static` to file-scope definitions
    #[clap(long = "no-static")]
    pub no_static: bool,

    /// Do not insert marker calls
    #[clap(long = "no-instrument")]
    pub no_instrument: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut options = load_options(&args.common, &args.rewrite)?;
    options.canonicalize &= !args.no_canonicalize;
    options.make_globals_static &= !args.no_static;
    options.instrument &= !args.no_instrument;
    init_logging(options.verbosity_level);
    debug!("{} version {}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));
    execute(&args.common, &options)
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    report_and_exit(run(Args::parse()));
}
