//! # Vault Composition
//!
//! Wires the stages of a KMS auto-unsealed Vault deployment into one
//! [`Deployment`]:
//!
//! ```text
//!   ┌──────────────┐
//!   │   identity   │ project, default compute identity
//!   └──────┬───────┘
//!          ├──────────────────┐
//!          ▼                  ▼
//!   ┌──────────────┐   ┌──────────────┐
//!   │   storage    │   │     kms      │ key ring, key, IAM binding
//!   └──────┬───────┘   └──────┬───────┘
//!          └────────┬─────────┘
//!                   ▼
//!          ┌────────────────┐
//!          │ server_config  │ VAULT_LOCAL_CONFIG
//!          └────────┬───────┘
//!                   ▼
//!          ┌────────────────┐
//!          │    service     │ (after the IAM binding)
//!          └────────┬───────┘
//!                   ▼
//!          ┌────────────────┐
//!          │     domain     │ only with a configured domain
//!          └────────┬───────┘
//!                   ▼
//!               vaultUrl
//! ```
//!
//! Stages only build requests from other stages' outputs; the engine runs
//! them as soon as their inputs resolve.

pub mod domain;
pub mod identity;
pub mod kms;
pub mod server_config;
pub mod service;
pub mod storage;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DeployConfig;
use crate::constants::VAULT_URL_OUTPUT;
use crate::engine::{Deployment, RunReport};
use crate::error::{Error, Result};
use crate::providers::local::create_private_dir;
use crate::resources::ResourceProvider;

pub use self::domain::DomainBinding;
pub use self::kms::KeyCoordinates;
pub use self::server_config::VaultServerConfig;

/// Published result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct StackOutputs {
    /// Effective externally reachable URL.
    pub vault_url: String,
    /// Per-resource outcomes.
    pub report: RunReport,
}

/// Provisions the full Vault deployment against `provider`.
///
/// # Errors
///
/// Configuration errors are returned before any resource is touched.
/// Otherwise the first fatal failure of the run is returned; resources
/// created before it stay in place.
pub async fn provision(
    config: &DeployConfig,
    provider: Arc<dyn ResourceProvider>,
) -> Result<StackOutputs> {
    let report = deploy(config, provider).await?.into_result()?;
    let vault_url = report
        .outputs
        .get(VAULT_URL_OUTPUT)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("output {VAULT_URL_OUTPUT} missing")))?;

    info!(url = %vault_url, "Vault deployment ready");
    Ok(StackOutputs { vault_url, report })
}

/// Runs the Vault deployment and returns its report, failed or not.
///
/// # Errors
///
/// Only configuration errors, which are returned before any resource is
/// touched. A failed run is reported through [`RunReport::failure`].
pub async fn deploy(config: &DeployConfig, provider: Arc<dyn ResourceProvider>) -> Result<RunReport> {
    config.validate()?;
    info!(provider = provider.name(), "Provisioning Vault deployment");

    let deployment = Deployment::new(provider);
    let identity = identity::resolve(&deployment, config);
    let bucket = storage::provision(&deployment, config, &identity);
    let kms = kms::provision(&deployment, config, &identity);
    let blob = server_config::compose(&bucket, &kms.coordinates, config.ui);
    let service = service::provision(&deployment, config, &identity, &blob, &kms.binding);
    let binding = domain::bind(&deployment, config, &identity, &service);

    deployment.export(VAULT_URL_OUTPUT, binding.map(|b| b.published_url()));

    let report = deployment.settle().await;
    if let Some(err) = &report.failure {
        warn!(error = %err, "Vault deployment failed");
    }
    Ok(report)
}

// =============================================================================
// Published Outputs
// =============================================================================

/// Writes published outputs as JSON (temp file, then rename).
pub fn write_outputs(path: &Path, outputs: &BTreeMap<String, String>) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_private_dir(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(outputs)?)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "Wrote published outputs");
    Ok(())
}

/// Records the outputs of a finished run. A failed run removes the
/// previously published outputs, which may no longer describe the
/// deployment.
pub fn publish_outputs(path: &Path, report: &RunReport) -> Result<()> {
    if report.failure.is_none() {
        return write_outputs(path, &report.outputs);
    }
    if path.exists() {
        fs::remove_file(path)?;
        debug!(path = %path.display(), "Removed stale published outputs");
    }
    Ok(())
}

/// Reads outputs written by [`write_outputs`]. A missing file means no run
/// has completed yet.
pub fn read_outputs(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
