//! # CLI Command Implementations
//!
//! Each subcommand of the `unshared-groups` tool lives in its own file and
//! provides:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and calls into the
//!   `unshared_groups` library.

pub mod completions;
pub mod scan;
