//! Tests for constants module.
//!
//! Validates load-bearing deployment constants and that they agree with
//! each other.

use std::time::Duration;
use vaultrun::*;

// =============================================================================
// Scaling Tests
// =============================================================================

#[test]
fn test_single_writer_bounds() {
    assert_eq!(MIN_INSTANCE_COUNT, 0, "scale-to-zero must stay enabled");
    assert_eq!(MAX_INSTANCE_COUNT, 1, "storage backend is single-writer");
}

// =============================================================================
// Networking Tests
// =============================================================================

#[test]
fn test_listener_matches_port() {
    assert!(VAULT_LISTEN_ADDRESS.ends_with(&format!(":{}", VAULT_PORT)));
    assert!(VAULT_LOCAL_ADDR.ends_with(&format!(":{}", VAULT_PORT)));
    assert_eq!(VAULT_PORT_NAME, "http1");
}

#[test]
fn test_startup_probe_timing() {
    assert!(
        STARTUP_PROBE_TIMEOUT <= STARTUP_PROBE_PERIOD,
        "probe timeout must not exceed period"
    );
    assert!(STARTUP_PROBE_FAILURE_THRESHOLD >= 1);
}

// =============================================================================
// Key Management Tests
// =============================================================================

#[test]
fn test_rotation_period_defaults() {
    assert_eq!(DEFAULT_ROTATION_PERIOD, Duration::from_secs(100_000));
    assert!(DEFAULT_ROTATION_PERIOD >= MIN_ROTATION_PERIOD);
    assert_eq!(MIN_ROTATION_PERIOD, Duration::from_secs(24 * 60 * 60));
}

#[test]
fn test_locations() {
    assert_eq!(BUCKET_LOCATION, "US");
    assert_eq!(KEY_RING_LOCATION, "global");
    assert_eq!(DEFAULT_REGION, "us-east1");
}

// =============================================================================
// Image Tests
// =============================================================================

#[test]
fn test_image_is_pinned() {
    assert!(!VAULT_IMAGE.ends_with(":latest"));
    assert!(VAULT_IMAGE.rsplit('/').next().unwrap().contains(':'));
    assert!(VAULT_IMAGE.len() <= MAX_IMAGE_REF_LEN);
}

// =============================================================================
// Naming Tests
// =============================================================================

#[test]
fn test_default_names_leave_room_for_suffix() {
    for name in [
        DEFAULT_BUCKET_NAME,
        DEFAULT_KEY_RING_NAME,
        DEFAULT_CRYPTO_KEY_NAME,
        DEFAULT_SERVICE_NAME,
    ] {
        assert!(name.len() + 1 + AUTONAME_SUFFIX_LEN <= 63, "{}", name);
    }
}
