//! # Unshared Groups CLI
//!
//! This is the binary entry point for the `unshared-groups` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Handling top-level application errors and translating them into
//!   user-friendly output.
//!
//! The analysis itself lives in the `unshared_groups` library crate; the binary
//! only gathers settings, draws progress and writes the result file.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
