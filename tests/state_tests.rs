//! Tests for persisted provider state.
//!
//! Validates that a deployment recorded in `state.json` is adopted by a
//! fresh provider, that destroy removes resources dependents-first, and
//! that published outputs round-trip through `outputs.json`.

use std::sync::Arc;

use tempfile::TempDir;
use vaultrun::vault::{publish_outputs, read_outputs, write_outputs};
use vaultrun::{
    DeployConfig, LocalProvider, OUTPUTS_FILE_NAME, ProviderOperation, ResourceKind,
    ResourceProvider, STATE_FILE_NAME, StepOutcome,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn test_config(dir: &TempDir) -> DeployConfig {
    DeployConfig {
        project: Some("acme-vault".to_string()),
        vault_domain: Some("vault.example.com".to_string()),
        state_dir: Some(dir.path().to_path_buf()),
        ..DeployConfig::default()
    }
}

fn open(config: &DeployConfig) -> Arc<LocalProvider> {
    Arc::new(LocalProvider::open(config.state_dir().join(STATE_FILE_NAME)).unwrap())
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[tokio::test]
async fn test_state_survives_provider_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let first = vaultrun::provision(&config, open(&config)).await.unwrap();
    assert!(dir.path().join(STATE_FILE_NAME).exists());

    let reopened = open(&config);
    assert_eq!(reopened.list().await.unwrap().len(), 6);

    let second = vaultrun::provision(&config, reopened.clone()).await.unwrap();
    assert!(second.report.is_noop());
    assert!(reopened.calls().is_empty());
    assert_eq!(first.vault_url, second.vault_url);
}

#[tokio::test]
async fn test_state_file_is_versioned_json() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    vaultrun::provision(&config, open(&config)).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join(STATE_FILE_NAME)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["resources"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_corrupt_state_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(STATE_FILE_NAME);
    std::fs::write(&path, "{ not json").unwrap();

    assert!(LocalProvider::open(&path).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_state_dir_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("nested");
    let config = DeployConfig {
        state_dir: Some(state_dir.clone()),
        ..test_config(&dir)
    };
    vaultrun::provision(&config, open(&config)).await.unwrap();

    let mode = std::fs::metadata(&state_dir).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

// =============================================================================
// Destroy Tests
// =============================================================================

#[tokio::test]
async fn test_destroy_reverse_dependency_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let provider = open(&config);
    vaultrun::provision(&config, provider.clone()).await.unwrap();

    let deleted = vaultrun::destroy(provider.as_ref()).await.unwrap();
    let kinds: Vec<ResourceKind> = deleted.iter().map(|id| id.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::DomainMapping,
            ResourceKind::Service,
            ResourceKind::KeyIamPolicy,
            ResourceKind::CryptoKey,
            ResourceKind::KeyRing,
            ResourceKind::Bucket,
        ]
    );
    assert!(open(&config).list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_destroy_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let provider = open(&config);
    vaultrun::provision(&config, provider.clone()).await.unwrap();

    provider.reject(ProviderOperation::Delete, ResourceKind::CryptoKey, "key has versions");
    let err = vaultrun::destroy(provider.as_ref()).await.unwrap_err();
    assert!(err.to_string().contains("key has versions"));

    let remaining: Vec<ResourceKind> = provider
        .list()
        .await
        .unwrap()
        .iter()
        .map(|r| r.id.kind)
        .collect();
    assert!(remaining.contains(&ResourceKind::CryptoKey));
    assert!(remaining.contains(&ResourceKind::Bucket));
    assert!(!remaining.contains(&ResourceKind::Service));
}

#[tokio::test]
async fn test_provision_after_destroy_recreates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let provider = open(&config);
    vaultrun::provision(&config, provider.clone()).await.unwrap();
    vaultrun::destroy(provider.as_ref()).await.unwrap();

    let outputs = vaultrun::provision(&config, provider.clone()).await.unwrap();
    assert_eq!(outputs.report.count(&StepOutcome::Created), 6);
}

// =============================================================================
// Published Outputs Tests
// =============================================================================

#[tokio::test]
async fn test_outputs_file() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let path = dir.path().join(OUTPUTS_FILE_NAME);

    assert!(read_outputs(&path).unwrap().is_empty());

    let outputs = vaultrun::provision(&config, open(&config)).await.unwrap();
    write_outputs(&path, &outputs.report.outputs).unwrap();

    let published = read_outputs(&path).unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published.get("vaultUrl").map(String::as_str),
        Some("https://vault.example.com")
    );
}

#[tokio::test]
async fn test_failed_run_clears_published_outputs() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let path = dir.path().join(OUTPUTS_FILE_NAME);
    let provider = open(&config);

    let report = vaultrun::deploy(&config, provider.clone()).await.unwrap();
    publish_outputs(&path, &report).unwrap();
    assert_eq!(read_outputs(&path).unwrap().len(), 1);

    provider.reject(ProviderOperation::Update, ResourceKind::CryptoKey, "key is disabled");
    let rotated = DeployConfig {
        rotation_period_secs: 200_000,
        ..config
    };
    let report = vaultrun::deploy(&rotated, provider.clone()).await.unwrap();
    assert!(report.failure.is_some());

    publish_outputs(&path, &report).unwrap();
    assert!(!path.exists());
    assert!(read_outputs(&path).unwrap().is_empty());
}
