//! # Batch Script Builder
//!
//! The remote service runs short scripts server-side and returns one
//! aggregated JSON value, which turns dozens of paginated calls into a single
//! HTTP request. This module renders the two scripts the tool needs:
//!
//! - **`SummaryScript`**: resolves the user, then pages through their groups
//!   and friends. Returns `{user, groups, friends}`.
//! - **`MembershipScript`**: resolves the user, loads the full friend list,
//!   asks "is-member" for consecutive slices of it and sums the positive
//!   flags. Returns `{friends_in_group, slices, unshared, group}`.
//!
//! Both scripts page the same way: the first call is issued at offset 0 and
//! reports the total count, then further calls follow at `page_size` steps
//! while the offset is below that count. [`Pagination`] is the local model of
//! that loop and is what the call budget is computed from.
//!
//! Identifiers are embedded as JSON string literals after validation in
//! [`crate::identifier`]; page sizes and thresholds are plain integers.

use crate::defaults;
use crate::error::{Error, Result};
use crate::identifier::{GroupId, UserRef};
use std::ops::Range;

/// The server-side paging loop for one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    total: usize,
    page_size: usize,
}

impl Pagination {
    /// `page_size` of 0 is treated as 1.
    pub fn new(total: usize, page_size: usize) -> Self {
        Self {
            total,
            page_size: page_size.max(1),
        }
    }

    /// Item ranges of the pages that carry data, in request order.
    pub fn pages(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.total)
            .step_by(self.page_size)
            .map(|start| start..(start + self.page_size).min(self.total))
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }

    /// Calls the loop issues. The first call always happens because it is the
    /// one that reports the total.
    pub fn call_count(&self) -> usize {
        self.page_count().max(1)
    }
}

/// Which operation a rendered script performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Summary,
    Membership { group: GroupId, threshold: u32 },
}

/// A rendered batch script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchScript {
    kind: ScriptKind,
    code: String,
}

impl BatchScript {
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Parameters of the user/groups/friends summary script.
#[derive(Debug, Clone, Copy)]
pub struct SummaryScript<'a> {
    pub user: &'a UserRef,
    pub group_page: usize,
    pub friend_page: usize,
}

impl SummaryScript<'_> {
    pub fn render(&self) -> Result<BatchScript> {
        let group_step = page_size("group", self.group_page, defaults::MAX_GROUPS_PER_CALL)?;
        let friend_step = page_size("friend", self.friend_page, defaults::MAX_FRIENDS_PER_CALL)?;
        let user = string_literal(self.user.as_str())?;

        let code = format!(
            r#"var user = API.users.get({{"user_ids": {user}}});
if (!user || user.length == 0 || user[0].deactivated) {{
  return {{"user": user, "groups": {{"count": 0, "items": []}}, "friends": {{"count": 0, "items": []}}}};
}}
var uid = user[0].id;

var group_step = {group_step};
var groups = API.groups.get({{"user_id": uid, "count": group_step}});
var offset = group_step;
while (groups && offset < groups.count) {{
  groups.items = groups.items + API.groups.get({{"user_id": uid, "count": group_step, "offset": offset}}).items;
  offset = offset + group_step;
}}

var friend_step = {friend_step};
var friends = API.friends.get({{"user_id": uid, "count": friend_step}});
offset = friend_step;
while (friends && offset < friends.count) {{
  friends.items = friends.items + API.friends.get({{"user_id": uid, "count": friend_step, "offset": offset}}).items;
  offset = offset + friend_step;
}}

return {{"user": user, "groups": groups, "friends": friends}};
"#
        );

        Ok(BatchScript {
            kind: ScriptKind::Summary,
            code,
        })
    }

    /// Sub-operations the script issues for a user with the given counts.
    pub fn call_count(&self, group_total: usize, friend_total: usize) -> usize {
        1 + Pagination::new(group_total, self.group_page).call_count()
            + Pagination::new(friend_total, self.friend_page).call_count()
    }

    /// Fails when the script could exceed the per-batch call limit for a user
    /// with the given counts.
    pub fn check_budget(&self, group_total: usize, friend_total: usize) -> Result<()> {
        let calls = self.call_count(group_total, friend_total);
        if calls > defaults::MAX_CALLS_PER_BATCH {
            return Err(Error::CallBudgetExceeded {
                target: format!("the summary of {}", self.user),
                calls,
                limit: defaults::MAX_CALLS_PER_BATCH,
            });
        }
        Ok(())
    }
}

/// Parameters of the per-group friend membership script.
#[derive(Debug, Clone, Copy)]
pub struct MembershipScript<'a> {
    pub user: &'a UserRef,
    pub group: GroupId,
    pub friend_load_page: usize,
    pub is_member_page: usize,
    pub threshold: u32,
}

impl MembershipScript<'_> {
    pub fn render(&self) -> Result<BatchScript> {
        let load_step = page_size(
            "friend load",
            self.friend_load_page,
            defaults::MAX_FRIENDS_PER_CALL,
        )?;
        let member_step = page_size(
            "is-member",
            self.is_member_page,
            defaults::MAX_IS_MEMBER_PER_CALL,
        )?;
        let user = string_literal(self.user.as_str())?;
        let group_id = self.group.get();
        let threshold = self.threshold;

        // The flags come back as e.g. [1,0,1]; the split/join pair counts the
        // ones without a per-element loop, which would cost one operation each.
        let code = format!(
            r#"var user = API.users.get({{"user_ids": {user}}});
var uid = user[0].id;
var group_id = {group_id};

var load_step = {load_step};
var friends = API.friends.get({{"user_id": uid, "count": load_step}});
var offset = load_step;
while (offset < friends.count) {{
  friends.items = friends.items + API.friends.get({{"user_id": uid, "count": load_step, "offset": offset}}).items;
  offset = offset + load_step;
}}

var member_step = {member_step};
var total = friends.items.length;
var slices = [];
var sum = 0;
var start = 0;
while (start < total) {{
  var flags = API.groups.isMember({{"group_id": group_id, "user_ids": friends.items.slice(start, start + member_step)}})@.member;
  var hits = ((flags + "").split(0) + "").split(1).length - 1;
  slices.push(hits);
  sum = sum + hits;
  start = start + member_step;
}}

return {{"friends_in_group": sum, "slices": slices, "unshared": sum <= {threshold}, "group": API.groups.getById({{"group_id": group_id, "fields": "members_count"}})}};
"#
        );

        Ok(BatchScript {
            kind: ScriptKind::Membership {
                group: self.group,
                threshold: self.threshold,
            },
            code,
        })
    }

    /// Sub-operations the script issues for a user with `friend_total`
    /// friends: user lookup, friend pages, one is-member call per slice, group
    /// lookup.
    pub fn call_count(&self, friend_total: usize) -> usize {
        1 + Pagination::new(friend_total, self.friend_load_page).call_count()
            + Pagination::new(friend_total, self.is_member_page).page_count()
            + 1
    }

    /// Fails when the script would exceed the per-batch call limit.
    pub fn check_budget(&self, friend_total: usize) -> Result<()> {
        let calls = self.call_count(friend_total);
        if calls > defaults::MAX_CALLS_PER_BATCH {
            return Err(Error::CallBudgetExceeded {
                target: format!("group {}", self.group),
                calls,
                limit: defaults::MAX_CALLS_PER_BATCH,
            });
        }
        Ok(())
    }
}

fn page_size(name: &str, value: usize, ceiling: usize) -> Result<usize> {
    if value == 0 || value > ceiling {
        return Err(Error::config(
            format!("{} page size {} is out of range", name, value),
            Some(&format!("use a value in 1..={}", ceiling)),
        ));
    }
    Ok(value)
}

/// Renders `value` as a quoted, escaped string literal.
fn string_literal(value: &str) -> Result<String> {
    let literal = serde_json::to_string(value)?;
    // serde_json leaves U+2028/U+2029 unescaped; they end a line in JS-like
    // grammars.
    Ok(literal
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}
