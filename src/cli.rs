//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::{self, ColorChoice};

/// Unshared Groups - find the communities a user shares with few or none of their friends
#[derive(Parser, Debug)]
#[command(name = "unshared-groups")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output
    #[arg(long, global = true, value_name = "WHEN", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn", value_parser = parse_level)]
    log_level: log::LevelFilter,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a user's groups and write the unshared ones to a JSON file
    Scan(commands::scan::ScanArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(self.log_level);
        let use_color = output::apply_color_choice(self.color);

        match self.command {
            Commands::Scan(args) => commands::scan::execute(args, use_color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

fn parse_level(value: &str) -> std::result::Result<log::LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level '{}'", value))
}

fn init_logging(level: log::LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // A second init (tests) keeps the first logger.
    let _ = builder.try_init();
}
