use super::*;

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__SCENESYNC_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__SCENESYNC_TEST_VALID__", "99") };
    let val: i64 = env_parse("__SCENESYNC_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__SCENESYNC_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__SCENESYNC_TEST_INVALID__", "five seconds") };
    let val: i64 = env_parse("__SCENESYNC_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__SCENESYNC_TEST_INVALID__") };
}

#[test]
fn env_parse_float() {
    unsafe { std::env::set_var("__SCENESYNC_TEST_FLOAT__", "12.5") };
    let val: f64 = env_parse("__SCENESYNC_TEST_FLOAT__", 1.0);
    assert!((val - 12.5).abs() < f64::EPSILON);
    unsafe { std::env::remove_var("__SCENESYNC_TEST_FLOAT__") };
}

#[test]
fn defaults_match_constants() {
    let config = EngineConfig::default();
    assert_eq!(config.lock_ttl_ms, DEFAULT_LOCK_TTL_MS);
    assert_eq!(config.history_max_entries, DEFAULT_HISTORY_MAX_ENTRIES);
    assert!((config.snap_radius - 18.0).abs() < f64::EPSILON);
    assert!((config.paste_offset_step - 20.0).abs() < f64::EPSILON);
    assert_eq!(config.presence_stale_ms, 300_000);
}
