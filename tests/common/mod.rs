//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a scripted stand-in for the remote batch service,
//! progress recorders, and helpers for CLI tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let service = FakeService::new(FakeUser::active(1, "Ann", "Lee"))
//!         .with_friends(&[10, 11])
//!         .with_group(FakeGroup::new(5, "Chess").members(&[10]));
//!     let config = config_for("id1");
//!     let recorder = ProgressRecorder::default();
//!     let outcome = Orchestrator::new(&config, &service).run(&recorder).unwrap();
//! }
//! ```

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use regex::Regex;
use serde_json::{json, Value};
use unshared_groups::config::{Credential, RunConfig};
use unshared_groups::error::{Error, Result};
use unshared_groups::identifier::{GroupId, UserRef};
use unshared_groups::progress::ProgressSink;
use unshared_groups::script::{BatchScript, Pagination, ScriptKind};
use unshared_groups::transport::BatchExecutor;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{
        config_for, gid, write_settings, FakeGroup, FakeService, FakeUser, ProgressRecorder,
    };
    #[allow(unused_imports)]
    pub use unshared_groups::orchestrator::{CancelToken, Orchestrator};
}

pub fn gid(id: u64) -> GroupId {
    GroupId::new(id).expect("positive group id")
}

/// A run configuration for `user` with a dummy token.
pub fn config_for(user: &str) -> RunConfig {
    RunConfig::new(
        UserRef::parse(user).expect("valid user reference"),
        Credential::new("test-token"),
    )
}

/// Writes a settings file into `dir` and returns its path.
#[allow(dead_code)]
pub fn write_settings(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("settings.toml");
    std::fs::write(&path, content).expect("Failed to write settings file");
    path
}

/// The account the summary script resolves to.
#[derive(Debug, Clone)]
pub enum FakeUser {
    Missing,
    Deactivated { id: u64, reason: String },
    Active { id: u64, first: String, last: String },
}

impl FakeUser {
    pub fn active(id: u64, first: &str, last: &str) -> Self {
        FakeUser::Active {
            id,
            first: first.to_string(),
            last: last.to_string(),
        }
    }

    #[allow(dead_code)]
    pub fn deactivated(id: u64, reason: &str) -> Self {
        FakeUser::Deactivated {
            id,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub id: u64,
    pub name: String,
    pub members_count: Option<u64>,
    pub members: BTreeSet<u64>,
}

impl FakeGroup {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            members_count: Some(1000 + id),
            members: BTreeSet::new(),
        }
    }

    /// Friends (by id) that are members of the group.
    pub fn members(mut self, friends: &[u64]) -> Self {
        self.members.extend(friends.iter().copied());
        self
    }

    #[allow(dead_code)]
    pub fn hidden_count(mut self) -> Self {
        self.members_count = None;
        self
    }
}

/// Scripted batch service.
///
/// Answers the summary script from the configured user, friends and groups.
/// Membership scripts are answered by slicing the friend list into pages of
/// the script's own `member_step` literal and counting members per slice, then
/// comparing the sum with the script's own threshold literal. The loop itself
/// is not executed, but the numbers it runs on come from the rendered text.
/// Every request is recorded.
pub struct FakeService {
    user: FakeUser,
    friends: Vec<u64>,
    groups: Vec<FakeGroup>,
    failing: HashMap<u64, Error>,
    on_membership: Option<Box<dyn Fn(GroupId)>>,
    requests: RefCell<Vec<BatchScript>>,
}

#[allow(dead_code)]
impl FakeService {
    pub fn new(user: FakeUser) -> Self {
        Self {
            user,
            friends: Vec::new(),
            groups: Vec::new(),
            failing: HashMap::new(),
            on_membership: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_friends(mut self, friends: &[u64]) -> Self {
        self.friends = friends.to_vec();
        self
    }

    pub fn with_group(mut self, group: FakeGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Membership checks of `group` fail with `error`.
    pub fn failing(mut self, group: u64, error: Error) -> Self {
        self.failing.insert(group, error);
        self
    }

    /// Runs `hook` before answering each membership script.
    pub fn on_membership(mut self, hook: impl Fn(GroupId) + 'static) -> Self {
        self.on_membership = Some(Box::new(hook));
        self
    }

    pub fn requests(&self) -> Vec<ScriptKind> {
        self.requests.borrow().iter().map(|s| s.kind()).collect()
    }

    pub fn membership_requests(&self) -> Vec<GroupId> {
        self.requests()
            .into_iter()
            .filter_map(|kind| match kind {
                ScriptKind::Membership { group, .. } => Some(group),
                ScriptKind::Summary => None,
            })
            .collect()
    }

    /// Source code of every script received, in order.
    pub fn codes(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|s| s.code().to_string())
            .collect()
    }

    fn summary(&self) -> Value {
        match &self.user {
            FakeUser::Missing => json!({
                "user": [],
                "groups": {"count": 0, "items": []},
                "friends": {"count": 0, "items": []},
            }),
            FakeUser::Deactivated { id, reason } => json!({
                "user": [{"id": id, "first_name": "DELETED", "last_name": "", "deactivated": reason}],
                "groups": {"count": 0, "items": []},
                "friends": {"count": 0, "items": []},
            }),
            FakeUser::Active { id, first, last } => {
                let group_ids: Vec<u64> = self.groups.iter().map(|g| g.id).collect();
                json!({
                    "user": [{"id": id, "first_name": first, "last_name": last}],
                    "groups": {"count": group_ids.len(), "items": group_ids},
                    "friends": {"count": self.friends.len(), "items": self.friends},
                })
            }
        }
    }

    fn membership(&self, group: GroupId, threshold: u32, code: &str) -> Result<Value> {
        if let Some(hook) = &self.on_membership {
            hook(group);
        }
        if let Some(error) = self.failing.get(&group.get()) {
            return Err(clone_error(error));
        }
        let fake = self
            .groups
            .iter()
            .find(|g| g.id == group.get())
            .ok_or_else(|| Error::RemoteApplication {
                code: 100,
                message: format!("group {} not found", group),
            })?;

        let member_step = script_literal(code, r"var member_step = (\d+);") as usize;
        let rendered_threshold = script_literal(code, r#""unshared": sum <= (\d+)"#);
        assert_eq!(
            rendered_threshold,
            u64::from(threshold),
            "script threshold disagrees with its kind"
        );

        let slices: Vec<u64> = Pagination::new(self.friends.len(), member_step)
            .pages()
            .map(|range| {
                self.friends[range]
                    .iter()
                    .filter(|friend| fake.members.contains(friend))
                    .count() as u64
            })
            .collect();
        let total: u64 = slices.iter().sum();

        Ok(json!({
            "friends_in_group": total,
            "slices": slices,
            "unshared": total <= rendered_threshold,
            "group": [{
                "id": fake.id,
                "name": fake.name,
                "screen_name": format!("club{}", fake.id),
                "members_count": fake.members_count,
            }],
        }))
    }
}

impl BatchExecutor for FakeService {
    fn execute(&self, script: &BatchScript) -> Result<Value> {
        self.requests.borrow_mut().push(script.clone());
        match script.kind() {
            ScriptKind::Summary => Ok(self.summary()),
            ScriptKind::Membership { group, threshold } => {
                self.membership(group, threshold, script.code())
            }
        }
    }
}

/// The first capture of `pattern` in a rendered script, as an integer.
fn script_literal(code: &str, pattern: &str) -> u64 {
    let captures = Regex::new(pattern)
        .expect("valid pattern")
        .captures(code)
        .unwrap_or_else(|| panic!("{} not found in script:\n{}", pattern, code));
    captures[1].parse().expect("integer literal")
}

fn clone_error(error: &Error) -> Error {
    match error {
        Error::Transport { message } => Error::Transport {
            message: message.clone(),
        },
        Error::RemoteApplication { code, message } => Error::RemoteApplication {
            code: *code,
            message: message.clone(),
        },
        other => Error::ProtocolViolation {
            message: other.to_string(),
        },
    }
}

/// Progress sink that keeps every reported value.
#[derive(Default)]
pub struct ProgressRecorder {
    values: RefCell<Vec<f64>>,
}

#[allow(dead_code)]
impl ProgressRecorder {
    pub fn values(&self) -> Vec<f64> {
        self.values.borrow().clone()
    }
}

impl ProgressSink for ProgressRecorder {
    fn report(&self, percent: f64) {
        self.values.borrow_mut().push(percent);
    }
}
