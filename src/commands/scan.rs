//! # Scan Command Implementation
//!
//! Runs one analysis for one user and writes the unshared groups to a JSON
//! file.
//!
//! ## Settings precedence
//!
//! 1. Command-line flags (the token also from `VK_TOKEN`)
//! 2. The settings file given with `--config`, or
//!    `<config dir>/unshared-groups/config.toml` when it exists
//! 3. Built-in defaults
//!
//! The user reference is parsed before anything touches the network, and the
//! finished configuration is validated before the first request. Ctrl-C stops
//! the run between two groups; the groups analyzed so far are still written.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use log::debug;
use std::path::{Path, PathBuf};

use unshared_groups::config::{seconds, Credential, FailurePolicy, RunConfig, Settings};
use unshared_groups::defaults;
use unshared_groups::identifier::UserRef;
use unshared_groups::orchestrator::{find_unshared_groups, CancelToken, RunOutcome};
use unshared_groups::sink;

use crate::output::{marker, ProgressReporter};

/// Analyze a user's groups and write the unshared ones to a JSON file
#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// User to analyze: numeric id, id<digits>, or screen name
    #[arg(value_name = "USER")]
    pub user: Option<String>,

    /// Prompt for the user and the access token when they are not given
    #[arg(short, long)]
    pub interactive: bool,

    /// A group is unshared when at most this many friends are members
    #[arg(short, long, value_name = "N")]
    pub threshold: Option<u32>,

    /// Access token
    #[arg(long, value_name = "TOKEN", env = "VK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Language of names returned by the service
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,

    /// Result file
    #[arg(short, long, value_name = "PATH", default_value = defaults::OUTPUT_FILE)]
    pub output: PathBuf,

    /// Do not write a result file
    #[arg(long)]
    pub no_output: bool,

    /// Groups per call when listing the user's groups (1..=1000)
    #[arg(long, value_name = "N")]
    pub group_step: Option<usize>,

    /// Friends per call when listing the user's friends (1..=5000)
    #[arg(long, value_name = "N")]
    pub friend_step: Option<usize>,

    /// Friends per call when loading friends for a membership check (1..=5000)
    #[arg(long, value_name = "N")]
    pub friend_load_step: Option<usize>,

    /// Friends per membership query (1..=500)
    #[arg(long, value_name = "N")]
    pub is_member_step: Option<usize>,

    /// Attempts per request
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Pause between failed attempts, in seconds
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<f64>,

    /// Connect timeout in seconds; 0 waits without limit
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<f64>,

    /// Read timeout in seconds; 0 waits without limit
    #[arg(long, value_name = "SECS")]
    pub read_timeout: Option<f64>,

    /// Maximum requests per second
    #[arg(long, value_name = "N")]
    pub rate: Option<f64>,

    /// Treat a missing or deactivated user as an empty result instead of an error
    #[arg(long)]
    pub soft_missing: bool,

    /// Skip groups whose check keeps failing instead of aborting the run
    #[arg(long)]
    pub isolate_failures: bool,

    /// Settings file (TOML)
    #[arg(short, long, value_name = "FILE", env = "UNSHARED_GROUPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `scan` command.
pub fn execute(args: ScanArgs, use_color: bool) -> Result<()> {
    let raw_user = match (&args.user, args.interactive) {
        (Some(user), _) => user.clone(),
        (None, true) => prompt_user()?,
        (None, false) => {
            anyhow::bail!("No user given. Pass USER or use --interactive to be prompted.")
        }
    };
    let user = UserRef::parse(&raw_user)?;

    let settings = load_settings(args.config.as_deref())?;
    let mut config = build_config(&args, user, &settings)?;
    if args.interactive && config.credential.expose().is_empty() {
        config.credential = prompt_token()?;
    }
    config.validate()?;

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let reporter = ProgressReporter::new(!args.quiet);
    reporter.set_message(format!("analyzing {}", config.user));
    let result = find_unshared_groups(&config, &reporter, &cancel);
    reporter.finish();
    let outcome = result?;

    if !args.quiet {
        print_summary(&outcome, use_color);
    }

    if !args.no_output {
        sink::write_json(&args.output, &outcome.records)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        if !args.quiet {
            println!(
                "{} Result written to {}",
                marker(use_color, "💾", "[OUT]"),
                args.output.display()
            );
        }
    }

    Ok(())
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
        return Settings::from_file(path)
            .with_context(|| format!("Invalid configuration file {}", path.display()));
    }
    match defaults::default_settings_path() {
        Some(path) if path.is_file() => {
            debug!("using settings from {}", path.display());
            Settings::from_file(&path)
                .with_context(|| format!("Invalid configuration file {}", path.display()))
        }
        _ => Ok(Settings::default()),
    }
}

fn build_config(args: &ScanArgs, user: UserRef, settings: &Settings) -> Result<RunConfig> {
    let mut config = RunConfig::new(user, Credential::new(""));
    settings.apply_to(&mut config)?;

    if let Some(token) = &args.token {
        config.credential = Credential::new(token.clone());
    }
    if let Some(lang) = &args.lang {
        config.locale = lang.clone();
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    config.pages.group = args.group_step.unwrap_or(config.pages.group);
    config.pages.friend = args.friend_step.unwrap_or(config.pages.friend);
    config.pages.friend_load = args.friend_load_step.unwrap_or(config.pages.friend_load);
    config.pages.is_member = args.is_member_step.unwrap_or(config.pages.is_member);

    if let Some(retries) = args.retries {
        config.retry.attempts = retries;
    }
    if let Some(delay) = args.retry_delay {
        config.retry.delay = seconds("retry delay", delay)?;
    }
    if let Some(connect) = args.connect_timeout {
        config.timeouts.connect = optional_timeout("connect timeout", connect)?;
    }
    if let Some(read) = args.read_timeout {
        config.timeouts.read = optional_timeout("read timeout", read)?;
    }
    if let Some(rate) = args.rate {
        config.requests_per_second = rate;
    }
    if args.soft_missing {
        config.raise_on_missing_user = false;
    }
    if args.isolate_failures {
        config.failure_policy = FailurePolicy::Isolate;
    }

    Ok(config)
}

fn optional_timeout(name: &str, secs: f64) -> Result<Option<std::time::Duration>> {
    if secs == 0.0 {
        return Ok(None);
    }
    Ok(Some(seconds(name, secs)?))
}

fn install_interrupt_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            eprintln!("\nInterrupted again. Exiting.");
            std::process::exit(130);
        }
        eprintln!("\nInterrupted. Finishing the current group...");
        token.cancel();
    });
    if let Err(e) = installed {
        debug!("Ctrl-C handler not installed: {}", e);
    }
}

fn prompt_user() -> Result<String> {
    let user: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("User (id or screen name)")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            UserRef::parse(input).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(user)
}

fn prompt_token() -> Result<Credential> {
    let token = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Access token")
        .interact()?;
    Ok(Credential::new(token))
}

fn print_summary(outcome: &RunOutcome, use_color: bool) {
    if let Some(notice) = &outcome.notice {
        println!("{} {}", marker(use_color, "⚠️ ", "[WARN]"), style(notice).yellow());
        return;
    }

    if let Some(user) = &outcome.user {
        println!(
            "{} {} {} (id {})",
            style("User:").red().bold(),
            user.first_name,
            user.last_name,
            user.id
        );
        println!("   {} friends", user.friend_count);
        println!("   {} groups", user.group_count);
    }

    for record in &outcome.records {
        let members = record
            .members_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "hidden".to_string());
        println!(
            "{} {} (id {}, {} members)",
            style("Group:").cyan(),
            record.name,
            record.gid,
            members
        );
    }

    for failure in &outcome.failures {
        println!(
            "{} group {} skipped: {}",
            marker(use_color, "❌", "[ERR]"),
            failure.gid,
            failure.error
        );
    }

    if outcome.cancelled {
        println!(
            "{} Interrupted after {} groups",
            marker(use_color, "⏹️ ", "[STOP]"),
            outcome.groups_checked
        );
    }

    let total = outcome.user.as_ref().map_or(0, |user| user.group_count);
    println!(
        "{} {} of {} groups checked, {} unshared",
        marker(use_color, "✅", "[OK]"),
        outcome.groups_checked,
        total,
        style(outcome.records.len()).red().bold()
    );
}
