//! # Run Configuration
//!
//! This module defines `RunConfig`, the single immutable value that carries
//! every tunable of one run, and the optional TOML settings file that can
//! override the defaults.
//!
//! ## Key Components
//!
//! - **`RunConfig`**: the user to analyze, the access credential, locale,
//!   threshold, per-call page sizes, retry/timeout/rate settings and the
//!   policies for missing users and failed groups. Built with
//!   [`RunConfig::new`] and checked with [`RunConfig::validate`] before any
//!   network call.
//!
//! - **`PageLimits`**: the four page sizes used by the batch scripts. Each is
//!   bounded by the matching per-call ceiling of the remote service.
//!
//! - **`Settings`**: the deserialized form of a settings file. Every field is
//!   optional; present fields are applied on top of a `RunConfig`.
//!
//! ## Settings file
//!
//! ```toml
//! threshold = 2
//! locale = "en"
//! raise_on_missing_user = false
//! failure_policy = "isolate"
//!
//! [pages]
//! group = 1000
//! is_member = 250
//!
//! [retry]
//! attempts = 5
//! delay_ms = 1000
//!
//! [timeouts]
//! connect_secs = 3.0
//! read_secs = 10.0
//! ```

use crate::defaults;
use crate::error::{Error, Result};
use crate::identifier::UserRef;
use crate::script::SummaryScript;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Access token authorizing calls on behalf of a user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Page sizes used by the batch scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Groups per "list groups" call in the summary script.
    pub group: usize,
    /// Friends per "list friends" call in the summary script.
    pub friend: usize,
    /// Friends per "list friends" call in the membership script.
    pub friend_load: usize,
    /// Friends per "is-member" call in the membership script.
    pub is_member: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            group: defaults::GROUP_PAGE_SIZE,
            friend: defaults::FRIEND_PAGE_SIZE,
            friend_load: defaults::FRIEND_LOAD_PAGE_SIZE,
            is_member: defaults::IS_MEMBER_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    pub fn validate(&self) -> Result<()> {
        check_page("group", self.group, defaults::MAX_GROUPS_PER_CALL)?;
        check_page("friend", self.friend, defaults::MAX_FRIENDS_PER_CALL)?;
        check_page(
            "friend load",
            self.friend_load,
            defaults::MAX_FRIENDS_PER_CALL,
        )?;
        check_page(
            "is-member",
            self.is_member,
            defaults::MAX_IS_MEMBER_PER_CALL,
        )
    }
}

fn check_page(name: &str, value: usize, ceiling: usize) -> Result<()> {
    if value == 0 || value > ceiling {
        return Err(Error::config(
            format!("{} page size {} is out of range", name, value),
            Some(&format!("use a value in 1..={}", ceiling)),
        ));
    }
    Ok(())
}

/// Bounded retry with a fixed pause between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: defaults::RETRY_ATTEMPTS,
            delay: defaults::RETRY_DELAY,
        }
    }
}

/// Connect and read timeouts. `None` waits without limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Some(defaults::CONNECT_TIMEOUT),
            read: Some(defaults::READ_TIMEOUT),
        }
    }
}

/// What to do when a group's membership check fails after all retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole run with the group's error.
    #[default]
    Abort,
    /// Record the failure and continue with the next group.
    Isolate,
}

/// Every tunable of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub user: UserRef,
    pub credential: Credential,
    pub locale: String,
    /// A group is unshared when at most this many friends are members.
    pub threshold: u32,
    pub pages: PageLimits,
    pub retry: RetryPolicy,
    pub timeouts: Timeouts,
    /// Minimum spacing of HTTP requests, in requests per second.
    pub requests_per_second: f64,
    /// Return an error for a missing or deactivated user instead of an empty
    /// result with a notice.
    pub raise_on_missing_user: bool,
    pub failure_policy: FailurePolicy,
    pub endpoint: String,
    pub api_version: String,
}

impl RunConfig {
    /// Creates a configuration with default tunables.
    pub fn new(user: UserRef, credential: Credential) -> Self {
        Self {
            user,
            credential,
            locale: defaults::LOCALE.to_string(),
            threshold: defaults::THRESHOLD,
            pages: PageLimits::default(),
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            raise_on_missing_user: true,
            failure_policy: FailurePolicy::default(),
            endpoint: defaults::EXECUTE_ENDPOINT.to_string(),
            api_version: defaults::API_VERSION.to_string(),
        }
    }

    /// Checks every value against the limits of the remote service.
    pub fn validate(&self) -> Result<()> {
        self.pages.validate()?;
        SummaryScript {
            user: &self.user,
            group_page: self.pages.group,
            friend_page: self.pages.friend,
        }
        .check_budget(defaults::MAX_GROUPS_PER_USER, defaults::MAX_FRIENDS_PER_USER)?;

        if self.credential.expose().trim().is_empty() {
            return Err(Error::config(
                "access token is empty",
                Some("pass --token or set VK_TOKEN"),
            ));
        }
        if self.locale.trim().is_empty() {
            return Err(Error::config("locale is empty", None));
        }
        if self.api_version.trim().is_empty() {
            return Err(Error::config("API version is empty", None));
        }
        if self.retry.attempts == 0 {
            return Err(Error::config(
                "retry attempts must be at least 1",
                None,
            ));
        }
        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            return Err(Error::config(
                format!("request rate {} is not positive", self.requests_per_second),
                None,
            ));
        }
        for timeout in [self.timeouts.connect, self.timeouts.read].into_iter().flatten() {
            if timeout.is_zero() {
                return Err(Error::config(
                    "timeouts must be positive",
                    Some("omit the timeout to wait without limit"),
                ));
            }
        }

        let endpoint = url::Url::parse(&self.endpoint).map_err(|e| {
            Error::config(format!("endpoint {:?} is not a URL: {}", self.endpoint, e), None)
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(
                format!("endpoint scheme {:?} is not http(s)", endpoint.scheme()),
                None,
            ));
        }

        Ok(())
    }
}

/// Optional overrides read from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub token: Option<String>,
    pub locale: Option<String>,
    pub threshold: Option<u32>,
    pub raise_on_missing_user: Option<bool>,
    pub failure_policy: Option<FailurePolicy>,
    pub requests_per_second: Option<f64>,
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
    #[serde(default)]
    pub pages: PageSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageSettings {
    pub group: Option<usize>,
    pub friend: Option<usize>,
    pub friend_load: Option<usize>,
    pub is_member: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub attempts: Option<u32>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSettings {
    pub connect_secs: Option<f64>,
    pub read_secs: Option<f64>,
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Applies every present field on top of `config`.
    pub fn apply_to(&self, config: &mut RunConfig) -> Result<()> {
        if let Some(token) = &self.token {
            config.credential = Credential::new(token.clone());
        }
        if let Some(locale) = &self.locale {
            config.locale = locale.clone();
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(raise) = self.raise_on_missing_user {
            config.raise_on_missing_user = raise;
        }
        if let Some(policy) = self.failure_policy {
            config.failure_policy = policy;
        }
        if let Some(rate) = self.requests_per_second {
            config.requests_per_second = rate;
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(version) = &self.api_version {
            config.api_version = version.clone();
        }

        let pages = &self.pages;
        config.pages.group = pages.group.unwrap_or(config.pages.group);
        config.pages.friend = pages.friend.unwrap_or(config.pages.friend);
        config.pages.friend_load = pages.friend_load.unwrap_or(config.pages.friend_load);
        config.pages.is_member = pages.is_member.unwrap_or(config.pages.is_member);

        if let Some(attempts) = self.retry.attempts {
            config.retry.attempts = attempts;
        }
        if let Some(delay_ms) = self.retry.delay_ms {
            config.retry.delay = Duration::from_millis(delay_ms);
        }

        if let Some(secs) = self.timeouts.connect_secs {
            config.timeouts.connect = Some(seconds("connect timeout", secs)?);
        }
        if let Some(secs) = self.timeouts.read_secs {
            config.timeouts.read = Some(seconds("read timeout", secs)?);
        }

        Ok(())
    }
}

/// Converts a user-supplied number of seconds into a `Duration`.
pub fn seconds(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::config(format!("{} {} is not a valid duration", name, secs), None))
}
