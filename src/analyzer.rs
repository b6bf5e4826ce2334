//! # Membership Analyzer
//!
//! Interprets the values returned by the two batch scripts.
//!
//! - [`interpret_summary`] turns the summary value into a [`UserLookup`]:
//!   the user is missing, deactivated, or active with a [`UserSummary`].
//!   A group or friend list shorter than its reported count is a protocol
//!   violation.
//! - [`evaluate`] turns one membership value into a
//!   [`MembershipCheckResult`]. The friends-in-group count and the unshared
//!   flag are computed server-side; the per-slice counts the script returns
//!   are re-tallied here and any disagreement between slices, sum and flag is
//!   reported as a protocol violation.
//! - [`check_response`] runs the same decoding on a borrowed value so that
//!   the transport can reject and retry malformed responses.

use crate::error::{Error, Result};
use crate::identifier::{GroupId, UserRef};
use crate::script::ScriptKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The user resolved by the summary script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub friend_count: usize,
    pub group_count: usize,
    /// Groups in the order the service listed them.
    pub group_ids: Vec<GroupId>,
}

/// Outcome of resolving a user reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Missing,
    Deactivated { id: u64, reason: String },
    Active(UserSummary),
}

/// Display data of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub name: String,
    pub screen_name: String,
    /// Absent for groups that hide their member count.
    pub members_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipCheckResult {
    pub group_id: GroupId,
    pub is_unshared: bool,
    pub friends_in_group: u64,
    pub group: GroupSummary,
}

impl MembershipCheckResult {
    /// The output record, present only for unshared groups.
    pub fn to_record(&self) -> Option<UnsharedGroupRecord> {
        self.is_unshared.then(|| UnsharedGroupRecord {
            name: self.group.name.clone(),
            gid: self.group_id,
            members_count: self.group.members_count,
        })
    }
}

/// One entry of the result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsharedGroupRecord {
    pub name: String,
    pub gid: GroupId,
    pub members_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: u64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    deactivated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawList<T> {
    count: usize,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug)]
struct RawSummary {
    user: Option<RawUser>,
    groups: Option<RawList<GroupId>>,
    friends: Option<RawList<u64>>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    id: GroupId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    screen_name: String,
    #[serde(default)]
    members_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawMembership {
    friends_in_group: u64,
    slices: Vec<u64>,
    unshared: bool,
    group: Value,
}

/// `null`, `false` and a missing field all mean "the sub-call returned
/// nothing".
fn optional<T: DeserializeOwned>(field: &str, value: Option<&Value>) -> Result<Option<T>> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| Error::protocol(format!("unexpected `{}` value: {}", field, e))),
    }
}

fn decode_summary(value: &Value) -> Result<RawSummary> {
    if !value.is_object() {
        return Err(Error::protocol("summary result is not an object"));
    }
    let users: Option<Vec<RawUser>> = optional("user", value.get("user"))?;
    let summary = RawSummary {
        user: users.and_then(|users| users.into_iter().next()),
        groups: optional("groups", value.get("groups"))?,
        friends: optional("friends", value.get("friends"))?,
    };
    if let Some(groups) = &summary.groups {
        check_complete("groups", groups)?;
    }
    if let Some(friends) = &summary.friends {
        check_complete("friends", friends)?;
    }
    Ok(summary)
}

/// The paged loop must have collected every item the service counted.
fn check_complete<T>(field: &str, list: &RawList<T>) -> Result<()> {
    if list.items.len() != list.count {
        return Err(Error::protocol(format!(
            "`{}` lists {} of {} items",
            field,
            list.items.len(),
            list.count
        )));
    }
    Ok(())
}

/// Interprets the summary script's value for `user`.
pub fn interpret_summary(user: &UserRef, value: &Value) -> Result<UserLookup> {
    let raw = decode_summary(value)?;

    let Some(found) = raw.user else {
        return Ok(UserLookup::Missing);
    };
    if let Some(reason) = found.deactivated {
        return Ok(UserLookup::Deactivated {
            id: found.id,
            reason,
        });
    }

    let groups = raw.groups.ok_or_else(|| Error::UserUnavailable {
        user: user.to_string(),
        what: "groups".to_string(),
    })?;
    let friends = raw.friends.ok_or_else(|| Error::UserUnavailable {
        user: user.to_string(),
        what: "friends".to_string(),
    })?;

    Ok(UserLookup::Active(UserSummary {
        id: found.id,
        first_name: found.first_name,
        last_name: found.last_name,
        friend_count: friends.count,
        group_count: groups.count,
        group_ids: groups.items,
    }))
}

/// Friends-in-group count from per-slice counts.
pub fn tally(slices: &[u64]) -> u64 {
    slices.iter().sum()
}

pub fn is_unshared(friends_in_group: u64, threshold: u32) -> bool {
    friends_in_group <= u64::from(threshold)
}

/// Interprets the membership script's value for `group`.
pub fn evaluate(group: GroupId, threshold: u32, value: &Value) -> Result<MembershipCheckResult> {
    let raw: RawMembership = serde_json::from_value(value.clone())
        .map_err(|e| Error::protocol(format!("unexpected membership result: {}", e)))?;

    let counted = tally(&raw.slices);
    if counted != raw.friends_in_group {
        return Err(Error::protocol(format!(
            "group {}: slices sum to {} but the total is {}",
            group, counted, raw.friends_in_group
        )));
    }
    if raw.unshared != is_unshared(raw.friends_in_group, threshold) {
        return Err(Error::protocol(format!(
            "group {}: unshared flag {} does not match {} friends at threshold {}",
            group, raw.unshared, raw.friends_in_group, threshold
        )));
    }

    let details: Option<Vec<RawGroup>> = optional("group", Some(&raw.group))?;
    let details = details
        .and_then(|groups| groups.into_iter().next())
        .ok_or_else(|| Error::protocol(format!("group {}: no group details returned", group)))?;
    if details.id != group {
        return Err(Error::protocol(format!(
            "asked for group {} but got details of group {}",
            group, details.id
        )));
    }

    Ok(MembershipCheckResult {
        group_id: group,
        is_unshared: raw.unshared,
        friends_in_group: raw.friends_in_group,
        group: GroupSummary {
            name: details.name,
            screen_name: details.screen_name,
            members_count: details.members_count,
        },
    })
}

/// Checks that `value` has the shape the script of `kind` returns.
pub fn check_response(kind: ScriptKind, value: &Value) -> Result<()> {
    match kind {
        ScriptKind::Summary => decode_summary(value).map(|_| ()),
        ScriptKind::Membership { group, threshold } => {
            evaluate(group, threshold, value).map(|_| ())
        }
    }
}
