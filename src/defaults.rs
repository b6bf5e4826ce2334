//! Default values and service limits.
//!
//! This module centralizes the constants used across the library and the
//! command-line tool: the batch endpoint, the hard per-call ceilings imposed
//! by the remote service, and the default tunables of a run.

use std::path::PathBuf;
use std::time::Duration;

/// Batch-execution endpoint of the remote service.
pub const EXECUTE_ENDPOINT: &str = "https://api.vk.com/method/execute";

/// API version sent with every request. The batch scripts are written against
/// the response shapes of this version.
pub const API_VERSION: &str = "5.80";

/// Maximum items per "list friends" call.
pub const MAX_FRIENDS_PER_CALL: usize = 5000;

/// Maximum items per "list groups" call.
pub const MAX_GROUPS_PER_CALL: usize = 1000;

/// Maximum user ids per "is-member" call.
pub const MAX_IS_MEMBER_PER_CALL: usize = 500;

/// Most communities one user can be a member of.
pub const MAX_GROUPS_PER_USER: usize = 5000;

/// Most friends one user can have.
pub const MAX_FRIENDS_PER_USER: usize = 10_000;

/// Maximum sub-operations inside one batch execution.
pub const MAX_CALLS_PER_BATCH: usize = 25;

/// Requests per second allowed for a user access token.
pub const MAX_REQUESTS_PER_SECOND: f64 = 3.0;

pub const GROUP_PAGE_SIZE: usize = MAX_GROUPS_PER_CALL;
pub const FRIEND_PAGE_SIZE: usize = MAX_FRIENDS_PER_CALL;
pub const FRIEND_LOAD_PAGE_SIZE: usize = MAX_FRIENDS_PER_CALL;
pub const IS_MEMBER_PAGE_SIZE: usize = MAX_IS_MEMBER_PER_CALL;

/// Attempts per request before the last failure is surfaced.
pub const RETRY_ATTEMPTS: u32 = 10;

/// Pause after a failed attempt.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(7);
pub const READ_TIMEOUT: Duration = Duration::from_secs(7);

/// Largest friends-in-group count for which a group is still unshared.
pub const THRESHOLD: u32 = 0;

pub const LOCALE: &str = "ru";

/// Default file the command-line tool writes the result list to.
pub const OUTPUT_FILE: &str = "groups.json";

/// Returns the default location of the settings file.
///
/// Uses the platform configuration directory:
/// - Linux: `~/.config/unshared-groups/config.toml`
/// - macOS: `~/Library/Application Support/unshared-groups/config.toml`
/// - Windows: `{FOLDERID_RoamingAppData}\unshared-groups\config.toml`
///
/// Returns `None` when the platform directory cannot be determined.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("unshared-groups").join("config.toml"))
}
