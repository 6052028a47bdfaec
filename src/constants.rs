//! # Constants
//!
//! Shared defaults used throughout the sync engine.
//!
//! These values represent reasonable defaults and can be overridden via
//! [`SyncOptions`](crate::sync::SyncOptions) where applicable.

/// Default number of retries for version-conflicted commits
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default timeout for a full sync run (seconds)
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts for idempotent GETs on connection errors
pub const DEFAULT_GET_ATTEMPTS: u32 = 3;

/// Exponential backoff starting value for GET retries (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 250;

/// Exponential backoff maximum value for GET retries (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;

/// Bound on concurrent content fetches during auxiliary file comparison
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Default directory for map files on the target host
pub const DEFAULT_MAPS_DIR: &str = "/etc/haproxy/maps";

/// Default directory for SSL certificates on the target host
pub const DEFAULT_SSL_DIR: &str = "/etc/haproxy/ssl";

/// Default directory for general files on the target host
pub const DEFAULT_GENERAL_DIR: &str = "/etc/haproxy/general";

/// Default HAProxy configuration file path on the target host
pub const DEFAULT_CONFIG_FILE: &str = "/etc/haproxy/haproxy.cfg";

/// Name of the HAProxy binary used for semantic validation
pub const HAPROXY_BINARY: &str = "haproxy";

/// Number of context lines captured around a validation alert
pub const ALERT_CONTEXT_LINES: usize = 3;

/// Length of the snippet attached to parse errors (bytes)
pub const PARSE_ERROR_SNIPPET_LEN: usize = 200;
