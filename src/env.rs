//! Environment variable names used by this crate to configure the capture
//! layer without code changes.
//!
//! These are purely helpers; the sink and layer types never read the
//! environment themselves.

/// Stack a `fmt` layer next to the capture layer (`1`/`true`/`yes`/`on`).
pub const TRACING_MEMORY_SINK_STDOUT_ENV: &str = "TRACING_MEMORY_SINK_STDOUT";

/// Attach span scopes to captured entries (`0`/`false`/`no`/`off` disables).
pub const TRACING_MEMORY_SINK_SCOPES_ENV: &str = "TRACING_MEMORY_SINK_SCOPES";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag; unset or unrecognized values yield `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    parse_flag(&env_or(key, "")).unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
