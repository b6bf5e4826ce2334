//! # Orchestrator
//!
//! Drives one run for one user:
//!
//! ```text
//! Start -> ResolvingUser -> UserMissing      -> (notice or error)
//!                        -> UserDeactivated  -> (notice or error)
//!                        -> AnalyzingGroups  -> Done
//! ```
//!
//! 1. **Start**: validate the configuration, report progress 0.
//! 2. **ResolvingUser**: submit the summary script. A transport failure
//!    after retries ends the run.
//! 3. **UserMissing / UserDeactivated**: report 100 and either return the
//!    matching error or an empty outcome carrying a [`RunNotice`], depending
//!    on `RunConfig::raise_on_missing_user`.
//! 4. **AnalyzingGroups**: one membership script per group, strictly in the
//!    order the summary listed them and one at a time. With
//!    [`FailurePolicy::Abort`] the first group that fails ends the run; with
//!    [`FailurePolicy::Isolate`] the failure is recorded and the run goes on.
//!    A [`CancelToken`] is checked before every group.
//! 5. **Done**: report 100 and return the accumulated records.

use crate::analyzer::{self, UnsharedGroupRecord, UserLookup, UserSummary};
use crate::config::{FailurePolicy, RunConfig};
use crate::error::{Error, Result};
use crate::identifier::{GroupId, UserRef};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::script::{MembershipScript, SummaryScript};
use crate::transport::{BatchExecutor, Transport};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stops a run between two groups.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    ResolvingUser,
    UserMissing,
    UserDeactivated,
    AnalyzingGroups,
    Done,
}

/// Why a run finished early with an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunNotice {
    UserMissing { user: String },
    UserDeactivated { user: String, reason: String },
}

impl fmt::Display for RunNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunNotice::UserMissing { user } => write!(f, "User {} does not exist", user),
            RunNotice::UserDeactivated { user, reason } => {
                write!(f, "User {} is deactivated ({})", user, reason)
            }
        }
    }
}

impl RunNotice {
    fn into_error(self) -> Error {
        match self {
            RunNotice::UserMissing { user } => Error::UserNotFound { user },
            RunNotice::UserDeactivated { user, reason } => Error::UserDeactivated { user, reason },
        }
    }
}

/// A group skipped under [`FailurePolicy::Isolate`].
#[derive(Debug)]
pub struct GroupFailure {
    pub gid: GroupId,
    pub error: Error,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Unshared groups, in the order they were checked.
    pub records: Vec<UnsharedGroupRecord>,
    /// The resolved user; `None` when the user is missing or deactivated.
    pub user: Option<UserSummary>,
    pub notice: Option<RunNotice>,
    /// Groups processed, including failed ones.
    pub groups_checked: usize,
    pub failures: Vec<GroupFailure>,
    pub cancelled: bool,
}

pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    executor: &'a dyn BatchExecutor,
    cancel: CancelToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a RunConfig, executor: &'a dyn BatchExecutor) -> Self {
        Self {
            config,
            executor,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self, sink: &dyn ProgressSink) -> Result<RunOutcome> {
        let mut state = RunState::Start;
        self.config.validate()?;
        let mut progress = ProgressTracker::new(sink);
        progress.start();

        transition(&mut state, RunState::ResolvingUser);
        let user = &self.config.user;
        let summary_script = SummaryScript {
            user,
            group_page: self.config.pages.group,
            friend_page: self.config.pages.friend,
        };
        let value = self.executor.execute(&summary_script.render()?)?;

        let summary = match analyzer::interpret_summary(user, &value)? {
            UserLookup::Missing => {
                transition(&mut state, RunState::UserMissing);
                progress.finish();
                return self.user_not_analyzable(RunNotice::UserMissing {
                    user: user.to_string(),
                });
            }
            UserLookup::Deactivated { reason, .. } => {
                transition(&mut state, RunState::UserDeactivated);
                progress.finish();
                return self.user_not_analyzable(RunNotice::UserDeactivated {
                    user: user.to_string(),
                    reason,
                });
            }
            UserLookup::Active(summary) => summary,
        };

        debug!(
            "summary script used {} calls",
            summary_script.call_count(summary.group_count, summary.friend_count)
        );
        info!(
            "user {}: {} {} (id {}), {} groups, {} friends",
            user,
            summary.last_name,
            summary.first_name,
            summary.id,
            summary.group_count,
            summary.friend_count
        );

        transition(&mut state, RunState::AnalyzingGroups);
        let total_units = summary.group_ids.len() + 1;
        progress.advance(1, total_units);

        let mut outcome = self.analyze_groups(&summary, &mut progress, total_units)?;
        outcome.user = Some(summary);

        transition(&mut state, RunState::Done);
        progress.finish();
        info!(
            "{} of {} groups checked, {} unshared",
            outcome.groups_checked,
            total_units - 1,
            outcome.records.len()
        );
        Ok(outcome)
    }

    fn analyze_groups(
        &self,
        summary: &UserSummary,
        progress: &mut ProgressTracker<'_>,
        total_units: usize,
    ) -> Result<RunOutcome> {
        // Later scripts address the user by the resolved numeric id.
        let resolved = UserRef::from_id(summary.id)?;
        let threshold = self.config.threshold;
        let template = |group: GroupId| MembershipScript {
            user: &resolved,
            group,
            friend_load_page: self.config.pages.friend_load,
            is_member_page: self.config.pages.is_member,
            threshold,
        };

        let mut outcome = RunOutcome::default();
        if let Some(&first) = summary.group_ids.first() {
            template(first).check_budget(summary.friend_count)?;
        }

        for (index, &gid) in summary.group_ids.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    "run cancelled after {} of {} groups",
                    index,
                    summary.group_ids.len()
                );
                outcome.cancelled = true;
                break;
            }

            let checked = template(gid)
                .render()
                .and_then(|script| self.executor.execute(&script))
                .and_then(|value| analyzer::evaluate(gid, threshold, &value));

            match checked {
                Ok(result) => {
                    debug!(
                        "group {}: {} friends, unshared: {}",
                        gid, result.friends_in_group, result.is_unshared
                    );
                    if let Some(record) = result.to_record() {
                        info!(
                            "unshared group {} ({}, id {}): {} members, {} friends",
                            result.group.name,
                            result.group.screen_name,
                            gid,
                            result
                                .group
                                .members_count
                                .map(|count| count.to_string())
                                .unwrap_or_else(|| "?".to_string()),
                            result.friends_in_group
                        );
                        outcome.records.push(record);
                    }
                }
                Err(error) => match self.config.failure_policy {
                    FailurePolicy::Abort => return Err(error),
                    FailurePolicy::Isolate => {
                        warn!("group {} skipped: {}", gid, error);
                        outcome.failures.push(GroupFailure { gid, error });
                    }
                },
            }

            outcome.groups_checked += 1;
            progress.advance(index + 2, total_units);
        }

        Ok(outcome)
    }

    fn user_not_analyzable(&self, notice: RunNotice) -> Result<RunOutcome> {
        if self.config.raise_on_missing_user {
            return Err(notice.into_error());
        }
        warn!("{}", notice);
        Ok(RunOutcome {
            notice: Some(notice),
            ..RunOutcome::default()
        })
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!("run state {:?} -> {:?}", state, next);
    *state = next;
}

/// Runs the analysis for `config.user` over HTTP.
pub fn find_unshared_groups(
    config: &RunConfig,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<RunOutcome> {
    config.validate()?;
    let transport = Transport::from_config(config)?;
    Orchestrator::new(config, &transport)
        .with_cancel(cancel.clone())
        .run(sink)
}
