//! # Terminal Output
//!
//! Color handling and the progress bar for the `scan` command.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto`
//! - `NO_COLOR` disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` disables colors, `CLICOLOR_FORCE=1` forces them
//! - `TERM=dumb` disables colors
//!
//! The progress bar and all other decoration go to stderr so that stdout stays
//! usable in pipelines.

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::env;
use unshared_groups::progress::ProgressSink;

/// Value of the global `--color` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// Resolves `choice` against the environment and configures `console`.
///
/// Returns whether colors are in use.
pub fn apply_color_choice(choice: ColorChoice) -> bool {
    let use_color = resolve(choice, |name| env::var(name).ok(), || {
        console::Term::stderr().features().colors_supported()
    });
    console::set_colors_enabled(use_color);
    console::set_colors_enabled_stderr(use_color);
    use_color
}

fn resolve(
    choice: ColorChoice,
    var: impl Fn(&str) -> Option<String>,
    terminal_supports: impl FnOnce() -> bool,
) -> bool {
    match choice {
        ColorChoice::Always => return true,
        ColorChoice::Never => return false,
        ColorChoice::Auto => {}
    }
    if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    if var("TERM").as_deref() == Some("dumb") {
        return false;
    }
    terminal_supports()
}

/// Picks the decorated or the plain marker.
pub fn marker<'a>(use_color: bool, decorated: &'a str, plain: &'a str) -> &'a str {
    if use_color {
        decorated
    } else {
        plain
    }
}

/// Progress sink drawing a 0-100 bar on stderr.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(100),
            if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, percent: f64) {
        self.bar.set_position(percent.round().clamp(0.0, 100.0) as u64);
    }
}
