pub const PING_INTERVAL_MS: &str = "PING_INTERVAL_MS";

pub const CONCURRENCY: &str = "CONCURRENCY";

pub const REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Reads a variable from the process environment.
///
/// This is the lookup the binary hands to [`crate::config::load_config`];
/// tests pass their own closure instead of mutating the environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parses an override value, ignoring surrounding whitespace.
pub fn parse_override<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}
