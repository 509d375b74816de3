// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use callchain_checker::{collect_all, CallGraph};
use clap::*;
use dce_instrument::{init_logging, load_options, report_and_exit, CommonArgs, RewriteArgs};
use log::debug;

#[derive(Parser)]
#[clap(
    name = env!("CARGO_BIN_NAME"),
    about = "Checks whether a static call chain leads from one function to another",
    rename_all = "kebab-case",
    author,
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Args {
    /// Name of the calling function
    #[clap(long = "from")]
    pub from: String,

    /// Name of the function that should be reached
    #[clap(long = "to")]
    pub to: String,

    /// Input files and compatibility options
    #[clap(flatten)]
    pub common: CommonArgs,
}

fn run(args: Args) -> anyhow::Result<()> {
    let options = load_options(&args.common, &RewriteArgs::default())?;
    init_logging(options.verbosity_level);
    args.common.log_ignored_arguments();
    let (sources, files) = args.common.load_sources(&options)?;
    let calls = collect_all(&sources, &files)?;
    let graph = CallGraph::new(&calls);
    debug!("call graph {:?}", graph);

    if graph.call_chain_exists(&args.from, &args.to) {
        println!("call chain exists between {} -> {}", args.from, args.to);
    } else {
        println!("no call chain between {} -> {}", args.from, args.to);
    }
    Ok(())
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    report_and_exit(run(Args::parse()));
}
