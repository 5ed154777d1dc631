//! Tests for error types.
//!
//! Validates display formatting and the helpers callers rely on.

use vaultrun::Error;

// =============================================================================
// Identity Error Tests
// =============================================================================

#[test]
fn test_identity_resolution_display() {
    let err = Error::IdentityResolution("no project configured".to_string());
    let msg = format!("{}", err);

    assert!(msg.contains("identity"), "should name the failing stage");
    assert!(msg.contains("no project configured"), "should include reason");
}

// =============================================================================
// Resource Lifecycle Error Tests
// =============================================================================

#[test]
fn test_resource_creation_failed_display() {
    let err = Error::ResourceCreationFailed {
        resource: "bucket::vault-data".to_string(),
        reason: "quota exceeded".to_string(),
    };
    let msg = format!("{}", err);

    assert!(msg.contains("bucket::vault-data"), "should include resource");
    assert!(msg.contains("quota exceeded"), "provider reason verbatim");
}

#[test]
fn test_policy_binding_failed_display() {
    let err = Error::PolicyBindingFailed {
        resource: "key-iam-policy::seal".to_string(),
        reason: "permission denied".to_string(),
    };
    let msg = format!("{}", err);

    assert!(msg.contains("IAM policy"));
    assert!(msg.contains("key-iam-policy::seal"));
    assert!(msg.contains("permission denied"));
}

#[test]
fn test_aborted_display_and_helper() {
    let err = Error::Aborted {
        resource: "service::vault".to_string(),
    };
    assert!(err.is_aborted());
    assert!(err.to_string().contains("service::vault"));

    let root = Error::ResourceNotFound("bucket::vault-data".to_string());
    assert!(!root.is_aborted());
}

// =============================================================================
// Composition Error Tests
// =============================================================================

#[test]
fn test_unresolved_value_display() {
    let err = Error::UnresolvedValue {
        field: "seal.gcpckms.crypto_key".to_string(),
        reason: "value is empty".to_string(),
    };
    let msg = format!("{}", err);

    assert!(msg.contains("seal.gcpckms.crypto_key"));
    assert!(msg.contains("value is empty"));
}

// =============================================================================
// Conversion Tests
// =============================================================================

#[test]
fn test_io_error_conversion_is_clone() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "state dir");
    let err: Error = io.into();
    let copy = err.clone();

    assert!(matches!(copy, Error::Io(_)));
    assert!(copy.to_string().contains("state dir"));
}

#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Serialization(_)));
}
