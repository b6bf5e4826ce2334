//! # Unshared Groups Library
//!
//! This library finds the communities ("groups") a user of a social network
//! belongs to that contain few or none of the user's friends. It is designed
//! to be used by the `unshared-groups` command-line tool but can also be
//! embedded in other applications that supply a configuration and consume the
//! result list plus progress updates.
//!
//! ## Quick Example
//!
//! ```
//! use unshared_groups::config::{Credential, RunConfig};
//! use unshared_groups::identifier::UserRef;
//! use unshared_groups::script::MembershipScript;
//!
//! let user = UserRef::parse("id169845376").unwrap();
//! assert_eq!(user.as_str(), "169845376");
//!
//! let config = RunConfig::new(user, Credential::new("token"));
//! assert!(config.validate().is_ok());
//!
//! // 10 000 friends fit one membership batch with the default page sizes
//! let script = MembershipScript {
//!     user: &config.user,
//!     group: unshared_groups::identifier::GroupId::new(1).unwrap(),
//!     friend_load_page: config.pages.friend_load,
//!     is_member_page: config.pages.is_member,
//!     threshold: config.threshold,
//! };
//! assert!(script.check_budget(10_000).is_ok());
//! ```
//!
//! ## Core Concepts
//!
//! The remote service offers a batch-execution primitive: the client submits
//! a short script, the server runs several dependent calls and returns one
//! aggregated JSON value. Every run is built from two such scripts.
//!
//! - **Identifiers (`identifier`)**: validated user and group ids that are
//!   safe to embed in a script.
//! - **Configuration (`config`)**: the immutable `RunConfig` for one run and
//!   the optional TOML settings file.
//! - **Scripts (`script`)**: rendering of the summary and membership scripts
//!   within the service's per-call ceilings.
//! - **Transport (`transport`)**: one HTTP request per attempt, a bounded
//!   retry loop and a rate gate.
//! - **Analysis (`analyzer`)**: interpretation of the script results.
//! - **Progress (`progress`)**: a monotonic 0-100 progress value forwarded to
//!   a pluggable sink.
//! - **Orchestration (`orchestrator`)**: the run itself.
//! - **Output (`sink`)**: serialization of the result list.
//!
//! ## Execution Flow
//!
//! 1.  **Summary**: resolve the user and list their groups and friends.
//! 2.  **Membership checks**: for each group, count the friends who are
//!     members and compare the count with the threshold.
//! 3.  **Result**: the groups at or below the threshold, as
//!     `{name, gid, members_count}` records.

pub mod analyzer;
pub mod config;
pub mod defaults;
pub mod error;
pub mod identifier;
pub mod orchestrator;
pub mod progress;
pub mod script;
pub mod sink;
pub mod transport;

pub use orchestrator::find_unshared_groups;

#[cfg(test)]
mod script_proptest;
