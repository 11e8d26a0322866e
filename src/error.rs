//! Shared error plumbing.
//!
//! DESIGN
//! ======
//! Every service owns its own `thiserror` enum. They all implement
//! `ErrorCode` so a caller (UI toast, agent transcript, log line) can branch
//! on a stable grepable code and on whether the failure is worth retrying,
//! without matching on each concrete type.

/// Grepable error code and retryable flag for structured error reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Transient failures (remote write rejected or timed out) are retryable.
    /// Validation failures and lock conflicts are not.
    fn retryable(&self) -> bool {
        false
    }
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
