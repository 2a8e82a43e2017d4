//! Defaults and protocol constants used throughout the matchmaker core crate.

/// Header carrying the shared secret a partner server presents.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Path appended to a partner's base URL for match queries.
pub const MATCH_ENDPOINT: &str = "match";

/// Default REST listen address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Number of top-ranked candidate genes included per patient in replies.
pub const DEFAULT_REPLY_TOP_GENES: usize = 5;

/// Number of top-ranked candidate genes included in outgoing queries (`0` means all).
pub const DEFAULT_QUERY_TOP_GENES: usize = 0;

/// Timeout applied to outgoing match requests.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Support identity published when a patient has no usable contact.
pub const DEFAULT_SUPPORT_NAME: &str = "Matchmaker Support";
pub const DEFAULT_SUPPORT_INSTITUTION: &str = "Matchmaker Node";
pub const DEFAULT_SUPPORT_EMAIL: &str = "support@matchmaker.invalid";
