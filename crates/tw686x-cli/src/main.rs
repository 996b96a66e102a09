// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod error;
mod formats;
mod metrics;
mod simulate;
mod utils;
mod weave;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// TW686x CLI - Simulated capture runs, field weaving and format tables
#[derive(Parser)]
#[command(name = "tw686x")]
#[command(version)]
#[command(about = "TW686x CLI - Simulated capture runs, field weaving and format tables")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=trace for per-interrupt detail)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture core against simulated hardware with fault injection
    Simulate(simulate::Args),

    /// Weave raw top and bottom fields into one frame
    Weave(weave::Args),

    /// List pixel formats, standards, frame rates and controls
    Formats(formats::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Simulate(args) => simulate::execute(args, cli.json),
        Commands::Weave(args) => weave::execute(args, cli.json),
        Commands::Formats(args) => formats::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
