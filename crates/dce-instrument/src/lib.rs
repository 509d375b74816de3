// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Shared command line plumbing of the toolchain binaries.

use clap::Args;
use colored::Colorize;
use dce_instrumenter::{pipeline, Dialect, Options, Pipeline, SourceManager};
use log::{debug, info, warn, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;

use dce_instrumenter::FileId;

/// Inputs understood by every tool.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Source files to process
    #[clap(name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Parse inputs as this language (`c` or `cpp`) instead of guessing from the extension
    #[clap(name = "lang", long = "lang")]
    pub lang: Option<Dialect>,

    /// Display detailed progress
    #[clap(name = "verbose", long, short = 'v')]
    pub verbose: bool,

    /// Additional compiler argument; accepted for compatibility and ignored
    #[clap(name = "extra-arg", long = "extra-arg", allow_hyphen_values = true)]
    pub extra_args: Vec<String>,

    /// Compiler arguments after `--`; accepted for compatibility and ignored
    #[clap(name = "COMPILER_ARGS", last = true)]
    pub compiler_args: Vec<String>,
}

/// Options of the rewriting tools.
#[derive(Args, Debug, Clone, Default)]
pub struct RewriteArgs {
    /// Read options from a toml file; command line flags take precedence
    #[clap(name = "config", long = "config")]
    pub config: Option<PathBuf>,

    /// Print the rewritten sources instead of writing them back
    #[clap(name = "dry-run", long = "dry-run")]
    pub dry_run: bool,
}

impl CommonArgs {
    pub fn log_ignored_arguments(&self) {
        let ignored: Vec<_> = self
            .extra_args
            .iter()
            .chain(self.compiler_args.iter())
            .collect();
        if !ignored.is_empty() {
            debug!("ignoring compiler arguments {:?}", ignored);
        }
    }

    /// Loads every input file, paired with the dialect `options` selects for it.
    pub fn load_sources(
        &self,
        options: &Options,
    ) -> anyhow::Result<(SourceManager, Vec<(FileId, Dialect)>)> {
        let mut sources = SourceManager::new();
        let mut files = vec![];
        for path in &self.files {
            let file = sources.load(path)?;
            files.push((file, options.dialect_for(path)));
        }
        Ok((sources, files))
    }
}

/// Builds the effective options: the config file, if any, overridden by flags.
pub fn load_options(common: &CommonArgs, rewrite: &RewriteArgs) -> anyhow::Result<Options> {
    let mut options = match &rewrite.config {
        Some(path) => Options::from_toml_file(path)?,
        None => Options::default(),
    };
    if common.lang.is_some() {
        options.dialect = common.lang;
    }
    if common.verbose {
        options.verbosity_level = LevelFilter::Trace;
    }
    options.dry_run |= rewrite.dry_run;
    Ok(options)
}

/// Installs the terminal logger on stderr.
pub fn init_logging(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    if TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto).is_err() {
        warn!("logger already initialized");
    }
}

/// Runs the pipeline selected by `options` over the inputs.
pub fn execute(common: &CommonArgs, options: &Options) -> anyhow::Result<()> {
    common.log_ignored_arguments();
    let (mut sources, files) = common.load_sources(options)?;
    let pipeline = Pipeline::from_options(options);
    debug!("running stages {:?}", pipeline.stages());
    pipeline.run(&mut sources, &files)?;

    if options.dry_run {
        for (file, _) in &files {
            print!("{}", sources.source(*file));
        }
        return Ok(());
    }
    let written = pipeline::write_back(&sources)?;
    info!("{} of {} file(s) rewritten", written, files.len());
    Ok(())
}

/// Prints an error the way every tool of the toolchain does and exits with status 1.
pub fn report_and_exit(result: anyhow::Result<()>) {
    if let Err(err) = result {
        let err = format!("{:?}", err);
        println!("{}", err.bold().red());
        std::process::exit(1);
    }
}
