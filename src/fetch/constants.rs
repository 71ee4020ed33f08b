//! Constants for the fetch module (headers, timeouts, pauses).

use std::time::Duration;

/// Header carrying the Scopus API key.
pub const API_KEY_HEADER: &str = "X-ELS-APIKey";

/// Header selecting the current Scopus response format.
pub const RESOURCE_VERSION_HEADER: &str = "X-ELS-ResourceVersion";

/// Per-request timeout (90 seconds; deep cursor pages can be slow).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;

/// Connect timeout for the Scopus API.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Pause after switching credentials before hitting the API again.
pub const DEFAULT_ROTATION_PAUSE: Duration = Duration::from_secs(1);

/// Remaining/limit quota value when the header is absent or unparseable.
pub const UNKNOWN_QUOTA: i64 = -1;
