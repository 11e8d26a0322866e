//! Engine configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Every tunable has a compiled-in default and an env override, parsed with
//! `env_parse`. Unparseable values fall back to the default rather than
//! failing startup; none of these knobs are worth refusing to run over.

const DEFAULT_LOCK_TTL_MS: i64 = 5_000;
const DEFAULT_LOCK_SWEEP_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HISTORY_MAX_ENTRIES: usize = 50;
const DEFAULT_SNAP_RADIUS: f64 = 18.0;
const DEFAULT_PASTE_OFFSET_STEP: f64 = 20.0;
const DEFAULT_DUPLICATE_OFFSET: f64 = 20.0;
const DEFAULT_CLIPBOARD_MAX_AGE_MS: i64 = 3_600_000;
const DEFAULT_PRESENCE_STALE_MS: i64 = 300_000;
const DEFAULT_PRESENCE_SWEEP_INTERVAL_MS: u64 = 60_000;
const DEFAULT_CANVAS_WIDTH: f64 = 5_000.0;
const DEFAULT_CANVAS_HEIGHT: f64 = 5_000.0;

/// Tuning knobs shared by every service in a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Lock age (ms) after which the sweeper reclaims it regardless of owner.
    pub lock_ttl_ms: i64,
    /// Period of the lock sweeper, in milliseconds.
    pub lock_sweep_interval_ms: u64,
    /// Maximum number of undo entries kept; oldest are evicted first.
    pub history_max_entries: usize,
    /// Maximum distance at which a dragged connector end snaps to an anchor.
    pub snap_radius: f64,
    /// Diagonal increment applied per paste from the same capture.
    pub paste_offset_step: f64,
    /// Offset applied to duplicated groups.
    pub duplicate_offset: f64,
    /// Clipboard captures older than this are refused on paste.
    pub clipboard_max_age_ms: i64,
    /// Presence entries not seen for this long are evicted.
    pub presence_stale_ms: i64,
    /// Period of the presence sweeper, in milliseconds.
    pub presence_sweep_interval_ms: u64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl EngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            lock_ttl_ms: env_parse("LOCK_TTL_MS", DEFAULT_LOCK_TTL_MS),
            lock_sweep_interval_ms: env_parse("LOCK_SWEEP_INTERVAL_MS", DEFAULT_LOCK_SWEEP_INTERVAL_MS),
            history_max_entries: env_parse("HISTORY_MAX_ENTRIES", DEFAULT_HISTORY_MAX_ENTRIES),
            snap_radius: env_parse("SNAP_RADIUS", DEFAULT_SNAP_RADIUS),
            paste_offset_step: env_parse("PASTE_OFFSET_STEP", DEFAULT_PASTE_OFFSET_STEP),
            duplicate_offset: env_parse("DUPLICATE_OFFSET", DEFAULT_DUPLICATE_OFFSET),
            clipboard_max_age_ms: env_parse("CLIPBOARD_MAX_AGE_MS", DEFAULT_CLIPBOARD_MAX_AGE_MS),
            presence_stale_ms: env_parse("PRESENCE_STALE_MS", DEFAULT_PRESENCE_STALE_MS),
            presence_sweep_interval_ms: env_parse("PRESENCE_SWEEP_INTERVAL_MS", DEFAULT_PRESENCE_SWEEP_INTERVAL_MS),
            canvas_width: env_parse("CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH),
            canvas_height: env_parse("CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_ttl_ms: DEFAULT_LOCK_TTL_MS,
            lock_sweep_interval_ms: DEFAULT_LOCK_SWEEP_INTERVAL_MS,
            history_max_entries: DEFAULT_HISTORY_MAX_ENTRIES,
            snap_radius: DEFAULT_SNAP_RADIUS,
            paste_offset_step: DEFAULT_PASTE_OFFSET_STEP,
            duplicate_offset: DEFAULT_DUPLICATE_OFFSET,
            clipboard_max_age_ms: DEFAULT_CLIPBOARD_MAX_AGE_MS,
            presence_stale_ms: DEFAULT_PRESENCE_STALE_MS,
            presence_sweep_interval_ms: DEFAULT_PRESENCE_SWEEP_INTERVAL_MS,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
