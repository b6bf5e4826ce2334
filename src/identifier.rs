//! # Identifiers
//!
//! User and group identifiers end up as literals inside batch scripts, so
//! they are validated here once and carried around as typed values.
//!
//! A user can be addressed in several ways which all refer to the same
//! account:
//!
//! | Input | Canonical form |
//! |---|---|
//! | `169845376` (number) | `169845376` |
//! | `"169845376"` | `169845376` |
//! | `"id169845376"` | `169845376` |
//! | `"A_Medvedev_01"` | `a_medvedev_01` |
//!
//! Handles cannot be mapped to numeric ids locally; the service resolves
//! them inside the summary script.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const NUMERIC_PREFIX: &str = "id";

static HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.]{1,64}$").expect("handle pattern is valid")
});

/// A validated reference to a user, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRef {
    canonical: String,
}

impl UserRef {
    /// Parses any accepted encoding of a user reference.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "empty user reference"));
        }

        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Self::from_digits(input, trimmed);
        }

        if let Some(rest) = strip_prefix_ignore_case(trimmed, NUMERIC_PREFIX) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return Self::from_digits(input, rest);
            }
        }

        if !HANDLE.is_match(trimmed) {
            return Err(invalid(
                input,
                "a handle may only contain latin letters, digits, '_' and '.' (at most 64)",
            ));
        }

        Ok(Self {
            canonical: trimmed.to_ascii_lowercase(),
        })
    }

    /// Builds a reference from a numeric user id.
    pub fn from_id(id: u64) -> Result<Self> {
        if id == 0 {
            return Err(invalid("0", "user id must be positive"));
        }
        Ok(Self {
            canonical: id.to_string(),
        })
    }

    fn from_digits(input: &str, digits: &str) -> Result<Self> {
        let id: u64 = digits
            .parse()
            .map_err(|_| invalid(input, "numeric id does not fit in 64 bits"))?;
        Self::from_id(id).map_err(|_| invalid(input, "user id must be positive"))
    }

    /// The canonical string embedded into batch scripts.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// The numeric id, when the reference was given as one.
    pub fn numeric_id(&self) -> Option<u64> {
        self.canonical.parse().ok()
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for UserRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<u64> for UserRef {
    type Error = Error;

    fn try_from(id: u64) -> Result<Self> {
        Self::from_id(id)
    }
}

/// Community identifier, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct GroupId(u64);

impl GroupId {
    pub fn new(id: u64) -> Result<Self> {
        if id == 0 {
            return Err(invalid("0", "group id must be positive"));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for GroupId {
    type Error = Error;

    fn try_from(id: u64) -> Result<Self> {
        Self::new(id)
    }
}

impl From<GroupId> for u64 {
    fn from(id: GroupId) -> u64 {
        id.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

fn invalid(value: &str, reason: &str) -> Error {
    Error::InvalidIdentifier {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_encodings_share_canonical_form() {
        let expected = "169845376";
        assert_eq!(UserRef::parse("169845376").unwrap().as_str(), expected);
        assert_eq!(UserRef::parse("id169845376").unwrap().as_str(), expected);
        assert_eq!(UserRef::parse("ID169845376").unwrap().as_str(), expected);
        assert_eq!(UserRef::parse("  169845376 ").unwrap().as_str(), expected);
        assert_eq!(UserRef::from_id(169845376).unwrap().as_str(), expected);
        assert_eq!(UserRef::try_from(169845376u64).unwrap().as_str(), expected);
    }

    #[test]
    fn test_leading_zeros_are_dropped() {
        assert_eq!(UserRef::parse("id000042").unwrap().as_str(), "42");
    }

    #[test]
    fn test_handle_is_lowercased() {
        let user = UserRef::parse("A_Medvedev_01").unwrap();
        assert_eq!(user.as_str(), "a_medvedev_01");
        assert_eq!(user.numeric_id(), None);
    }

    #[test]
    fn test_id_prefix_without_digits_is_a_handle() {
        assert_eq!(UserRef::parse("idiot").unwrap().as_str(), "idiot");
        assert_eq!(UserRef::parse("id").unwrap().as_str(), "id");
    }

    #[test]
    fn test_rejects_script_breaking_characters() {
        for input in ["durov\"", "a b", "x;API.wall.post()", "name\\", "}", "имя"] {
            let err = UserRef::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidIdentifier { .. }),
                "expected rejection of {:?}",
                input
            );
        }
    }

    #[test]
    fn test_rejects_empty_and_zero() {
        assert!(UserRef::parse("").is_err());
        assert!(UserRef::parse("   ").is_err());
        assert!(UserRef::parse("0").is_err());
        assert!(UserRef::parse("id0").is_err());
        assert!(UserRef::from_id(0).is_err());
    }

    #[test]
    fn test_rejects_overflowing_numeric_id() {
        assert!(UserRef::parse("99999999999999999999999").is_err());
    }

    #[test]
    fn test_rejects_overlong_handle() {
        let handle = "a".repeat(65);
        assert!(UserRef::parse(&handle).is_err());
        assert!(UserRef::parse(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_group_id_serde() {
        let gid: GroupId = serde_json::from_str("42").unwrap();
        assert_eq!(gid.get(), 42);
        assert_eq!(serde_json::to_string(&gid).unwrap(), "42");
        assert!(serde_json::from_str::<GroupId>("0").is_err());
        assert!(serde_json::from_str::<GroupId>("-3").is_err());
    }
}
