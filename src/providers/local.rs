//! Local resource provider.
//!
//! `LocalProvider` reproduces the provider behaviors the deployment depends
//! on, without talking to a cloud API:
//!
//! - **Auto-naming**: buckets, key rings, keys and services get a random
//!   suffix appended to their logical name on first creation
//!   (`vault-data` → `vault-data-3f9a2c1`). Re-reads return the same name.
//! - **Generated endpoints**: services get a deterministic
//!   `https://<name>-<project-number>.<region>.run.app` URI.
//! - **Reference checks**: a key must name an existing key ring, an IAM
//!   policy an existing key, a domain mapping an existing service endpoint.
//! - **Ambient identity**: the project comes from the caller or from the
//!   ambient project the provider was configured with.
//!
//! # Persistence
//!
//! With [`LocalProvider::open`], every mutation is written to a JSON state
//! file (temp file + rename), so a later run adopts what an earlier run
//! created:
//!
//! ```text
//! <state_dir>/
//! └── state.json   { "version": 1, "resources": [ ...records ] }
//! ```
//!
//! # Fault Injection
//!
//! [`LocalProvider::reject`] makes the provider refuse an operation on a
//! kind of resource, the way a real provider refuses on quota or missing
//! permission.

use crate::constants::{AUTONAME_SUFFIX_LEN, DEFAULT_COMPUTE_SA_SUFFIX};
use crate::error::{Error, Result};
use crate::resources::{
    BucketState, CryptoKeyState, DnsRecord, DomainMappingState, KeyIamPolicyState, KeyRingState,
    ProjectInfo, ResourceId, ResourceKind, ResourceOutputs, ResourceProvider, ResourceRecord,
    ResourceRequest, ServiceAccount, ServiceState, validate_name,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Version of the state file format.
const STATE_VERSION: u32 = 1;

/// Maximum service name length accepted by the platform.
const MAX_SERVICE_NAME_LEN: usize = 49;

/// Target of the CNAME record for mapped domains.
const DOMAIN_MAPPING_CNAME: &str = "ghs.googlehosted.com.";

// =============================================================================
// Journal
// =============================================================================

/// Mutating operation issued to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOperation {
    /// `create`.
    Create,
    /// `update`.
    Update,
    /// `delete`.
    Delete,
}

/// One mutating call received by the provider, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    /// Operation.
    pub operation: ProviderOperation,
    /// Target resource.
    pub id: ResourceId,
}

/// On-disk state document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    resources: Vec<ResourceRecord>,
}

// =============================================================================
// Local Provider
// =============================================================================

/// In-process provider with optional on-disk state.
pub struct LocalProvider {
    /// Project used when the caller does not request one.
    ambient_project: Option<String>,
    /// State file, if persistent.
    state_path: Option<PathBuf>,
    /// Recorded resources.
    resources: RwLock<BTreeMap<ResourceId, ResourceRecord>>,
    /// Mutating calls, in arrival order.
    calls: Mutex<Vec<ProviderCall>>,
    /// Injected rejections.
    rejections: RwLock<HashMap<(ProviderOperation, ResourceKind), String>>,
}

impl LocalProvider {
    /// Creates a provider that keeps state in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            ambient_project: None,
            state_path: None,
            resources: RwLock::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            rejections: RwLock::new(HashMap::new()),
        }
    }

    /// Opens (or initializes) a provider persisted at `state_path`.
    ///
    /// # Errors
    ///
    /// Returns error if the state file exists but cannot be read or parsed.
    pub fn open(state_path: impl Into<PathBuf>) -> Result<Self> {
        let state_path = state_path.into();
        let mut resources = BTreeMap::new();

        if state_path.exists() {
            let content = fs::read_to_string(&state_path)?;
            let doc: StateDocument = serde_json::from_str(&content)?;
            if doc.version != STATE_VERSION {
                return Err(Error::Serialization(format!(
                    "unsupported state version {} in {}",
                    doc.version,
                    state_path.display()
                )));
            }
            for record in doc.resources {
                resources.insert(record.id.clone(), record);
            }
            info!(
                path = %state_path.display(),
                resources = resources.len(),
                "Loaded local provider state"
            );
        } else {
            debug!(path = %state_path.display(), "Starting with empty local provider state");
        }

        Ok(Self {
            ambient_project: None,
            state_path: Some(state_path),
            resources: RwLock::new(resources),
            calls: Mutex::new(Vec::new()),
            rejections: RwLock::new(HashMap::new()),
        })
    }

    /// Sets the ambient project.
    #[must_use]
    pub fn with_ambient_project(mut self, project: impl Into<String>) -> Self {
        self.ambient_project = Some(project.into());
        self
    }

    /// Returns the state file path, if persistent.
    #[must_use]
    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Makes every future `operation` on `kind` fail with `reason`.
    pub fn reject(&self, operation: ProviderOperation, kind: ResourceKind, reason: impl Into<String>) {
        if let Ok(mut rejections) = self.rejections.write() {
            rejections.insert((operation, kind), reason.into());
        }
    }

    /// Removes all injected rejections.
    pub fn clear_rejections(&self) {
        if let Ok(mut rejections) = self.rejections.write() {
            rejections.clear();
        }
    }

    /// Returns the mutating calls received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls of `operation` on `kind`.
    #[must_use]
    pub fn count(&self, operation: ProviderOperation, kind: ResourceKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation == operation && c.id.kind == kind)
            .count()
    }

    fn record_call(&self, operation: ProviderOperation, id: &ResourceId) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ProviderCall {
                operation,
                id: id.clone(),
            });
        }
    }

    fn check_rejection(&self, operation: ProviderOperation, id: &ResourceId) -> Result<()> {
        let rejections = self
            .rejections
            .read()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;

        let Some(reason) = rejections.get(&(operation, id.kind)) else {
            return Ok(());
        };

        let resource = id.to_string();
        let reason = reason.clone();
        Err(match (operation, id.kind) {
            (ProviderOperation::Delete, _) => Error::ResourceDeleteFailed { resource, reason },
            (_, ResourceKind::KeyIamPolicy) => Error::PolicyBindingFailed { resource, reason },
            (ProviderOperation::Create, _) => Error::ResourceCreationFailed { resource, reason },
            (ProviderOperation::Update, _) => Error::ResourceUpdateFailed { resource, reason },
        })
    }

    /// Writes the state file. Caller holds the resources lock.
    fn persist(&self, resources: &BTreeMap<ResourceId, ResourceRecord>) -> Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            create_private_dir(dir)?;
        }

        let doc = StateDocument {
            version: STATE_VERSION,
            resources: resources.values().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&doc)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Computes outputs for a request, validating references against
    /// already recorded resources.
    fn build_outputs(
        &self,
        id: &ResourceId,
        physical_name: &str,
        request: &ResourceRequest,
        resources: &BTreeMap<ResourceId, ResourceRecord>,
        previous: Option<&ResourceOutputs>,
    ) -> Result<ResourceOutputs> {
        let rejected = |reason: String| Error::ResourceCreationFailed {
            resource: id.to_string(),
            reason,
        };

        let outputs = match request {
            ResourceRequest::Bucket(args) => {
                if physical_name.len() < 3 || physical_name.len() > 63 {
                    return Err(rejected(format!(
                        "bucket name '{}' must be 3-63 characters",
                        physical_name
                    )));
                }
                ResourceOutputs::Bucket(BucketState {
                    name: physical_name.to_string(),
                    url: format!("gs://{}", physical_name),
                    location: args.location.clone(),
                })
            }
            ResourceRequest::KeyRing(args) => ResourceOutputs::KeyRing(KeyRingState {
                id: format!(
                    "projects/{}/locations/{}/keyRings/{}",
                    args.project, args.location, physical_name
                ),
                name: physical_name.to_string(),
                project: args.project.clone(),
                location: args.location.clone(),
            }),
            ResourceRequest::CryptoKey(args) => {
                let ring_exists = resources.values().any(|r| {
                    matches!(&r.outputs, ResourceOutputs::KeyRing(ring) if ring.id == args.key_ring)
                });
                if !ring_exists {
                    return Err(rejected(format!("key ring {} not found", args.key_ring)));
                }
                ResourceOutputs::CryptoKey(CryptoKeyState {
                    id: format!("{}/cryptoKeys/{}", args.key_ring, physical_name),
                    name: physical_name.to_string(),
                    key_ring: args.key_ring.clone(),
                    rotation_period: args.rotation_period.clone(),
                })
            }
            ResourceRequest::KeyIamPolicy(args) => {
                let key_exists = resources.values().any(|r| {
                    matches!(&r.outputs, ResourceOutputs::CryptoKey(key) if key.id == args.crypto_key_id)
                });
                if !key_exists {
                    return Err(Error::PolicyBindingFailed {
                        resource: id.to_string(),
                        reason: format!("crypto key {} not found", args.crypto_key_id),
                    });
                }
                let policy_json = serde_json::to_vec(&args.policy)?;
                ResourceOutputs::KeyIamPolicy(KeyIamPolicyState {
                    crypto_key_id: args.crypto_key_id.clone(),
                    etag: short_hash(&policy_json, 16),
                    policy: args.policy.clone(),
                })
            }
            ResourceRequest::Service(spec) => {
                validate_name(physical_name, MAX_SERVICE_NAME_LEN).map_err(|e| rejected(e.to_string()))?;
                let generation = match previous {
                    Some(ResourceOutputs::Service(prev)) => revision_generation(&prev.latest_ready_revision) + 1,
                    _ => 1,
                };
                let spec_json = serde_json::to_vec(spec)?;
                ResourceOutputs::Service(ServiceState {
                    name: physical_name.to_string(),
                    uri: format!(
                        "https://{}-{}.{}.run.app",
                        physical_name,
                        project_number(&spec.project),
                        spec.location
                    ),
                    location: spec.location.clone(),
                    latest_ready_revision: format!(
                        "{}-{:05}-{}",
                        physical_name,
                        generation,
                        short_hash(&spec_json, 3)
                    ),
                })
            }
            ResourceRequest::DomainMapping(args) => {
                let target_exists = resources.values().any(|r| {
                    matches!(&r.outputs, ResourceOutputs::Service(svc)
                        if svc.uri.strip_prefix("https://") == Some(args.route_target.as_str()))
                });
                if !target_exists {
                    return Err(rejected(format!(
                        "no service serves {}",
                        args.route_target
                    )));
                }
                ResourceOutputs::DomainMapping(DomainMappingState {
                    domain: args.domain.clone(),
                    route_target: args.route_target.clone(),
                    records: vec![DnsRecord {
                        rrtype: "CNAME".to_string(),
                        rrdata: DOMAIN_MAPPING_CNAME.to_string(),
                    }],
                })
            }
        };

        Ok(outputs)
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait]
impl ResourceProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn project(&self, requested: Option<&str>) -> Result<ProjectInfo> {
        let project_id = requested
            .map(str::to_string)
            .or_else(|| self.ambient_project.clone())
            .ok_or_else(|| {
                Error::IdentityResolution(
                    "no project configured (set GOOGLE_CLOUD_PROJECT or VAULTRUN_PROJECT)"
                        .to_string(),
                )
            })?;

        validate_project_id(&project_id)?;

        Ok(ProjectInfo {
            project_number: project_number(&project_id),
            self_link: format!(
                "https://cloudresourcemanager.googleapis.com/v1/projects/{}",
                project_id
            ),
            project_id,
        })
    }

    async fn default_service_account(&self, project: &ProjectInfo) -> Result<ServiceAccount> {
        if project.project_number.is_empty() {
            return Err(Error::IdentityResolution(format!(
                "project {} has no project number",
                project.project_id
            )));
        }
        Ok(ServiceAccount {
            email: format!("{}{}", project.project_number, DEFAULT_COMPUTE_SA_SUFFIX),
        })
    }

    async fn read(&self, id: &ResourceId) -> Result<Option<ResourceRecord>> {
        let resources = self
            .resources
            .read()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;
        Ok(resources.get(id).cloned())
    }

    async fn create(&self, id: &ResourceId, request: &ResourceRequest) -> Result<ResourceRecord> {
        self.record_call(ProviderOperation::Create, id);
        self.check_rejection(ProviderOperation::Create, id)?;

        if request.kind() != id.kind {
            return Err(Error::Internal(format!(
                "request of kind {} submitted for {}",
                request.kind(),
                id
            )));
        }

        let mut resources = self
            .resources
            .write()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;

        if resources.contains_key(id) {
            return Err(Error::ResourceCreationFailed {
                resource: id.to_string(),
                reason: "already exists".to_string(),
            });
        }

        let physical_name = match request {
            ResourceRequest::DomainMapping(args) => args.domain.clone(),
            ResourceRequest::KeyIamPolicy(args) => args.crypto_key_id.clone(),
            _ if id.kind.is_autonamed() => autoname(&id.name),
            _ => id.name.clone(),
        };

        let outputs = self.build_outputs(id, &physical_name, request, &resources, None)?;
        let now = chrono::Utc::now();
        let record = ResourceRecord {
            id: id.clone(),
            physical_name,
            request: request.clone(),
            outputs,
            created_at: now,
            updated_at: now,
        };

        resources.insert(id.clone(), record.clone());
        self.persist(&resources)?;

        debug!(resource = %id, physical = %record.physical_name, "Created resource");
        Ok(record)
    }

    async fn update(&self, id: &ResourceId, request: &ResourceRequest) -> Result<ResourceRecord> {
        self.record_call(ProviderOperation::Update, id);
        self.check_rejection(ProviderOperation::Update, id)?;

        let mut resources = self
            .resources
            .write()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;

        let existing = resources
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound(id.to_string()))?;

        let fixed = request.immutable_changes(&existing.request);
        if !fixed.is_empty() {
            return Err(Error::ResourceUpdateFailed {
                resource: id.to_string(),
                reason: format!("{} cannot change after creation", fixed.join(", ")),
            });
        }

        let outputs = self
            .build_outputs(
                id,
                &existing.physical_name,
                request,
                &resources,
                Some(&existing.outputs),
            )
            .map_err(|e| match e {
                Error::ResourceCreationFailed { resource, reason } => {
                    Error::ResourceUpdateFailed { resource, reason }
                }
                other => other,
            })?;

        let record = ResourceRecord {
            request: request.clone(),
            outputs,
            updated_at: chrono::Utc::now(),
            ..existing
        };

        resources.insert(id.clone(), record.clone());
        self.persist(&resources)?;

        debug!(resource = %id, "Updated resource");
        Ok(record)
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.record_call(ProviderOperation::Delete, id);
        self.check_rejection(ProviderOperation::Delete, id)?;

        let mut resources = self
            .resources
            .write()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;

        if resources.remove(id).is_none() {
            return Err(Error::ResourceNotFound(id.to_string()));
        }
        self.persist(&resources)?;

        debug!(resource = %id, "Deleted resource");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResourceRecord>> {
        let resources = self
            .resources
            .read()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;
        Ok(resources.values().cloned().collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Appends a random suffix to a logical name.
fn autoname(logical: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", logical, &suffix[..AUTONAME_SUFFIX_LEN])
}

/// Deterministic 12-digit project number derived from the project id.
fn project_number(project_id: &str) -> String {
    let hash = Sha256::digest(project_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    let n = u64::from_be_bytes(bytes) % 900_000_000_000 + 100_000_000_000;
    n.to_string()
}

/// First `len` hex characters of the SHA-256 of `data`.
fn short_hash(data: &[u8], len: usize) -> String {
    let hex = hex::encode(Sha256::digest(data));
    hex[..len.min(hex.len())].to_string()
}

/// Parses the generation out of `<name>-00001-abc`.
fn revision_generation(revision: &str) -> u32 {
    revision
        .rsplit('-')
        .nth(1)
        .and_then(|g| g.parse().ok())
        .unwrap_or(0)
}

/// Validates a project id: 6-30 chars, lowercase letters, digits, hyphens,
/// starting with a letter.
fn validate_project_id(project_id: &str) -> Result<()> {
    let valid_len = (6..=30).contains(&project_id.len());
    let starts_with_letter = project_id
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase());
    let valid_chars = project_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !(valid_len && starts_with_letter && valid_chars) || project_id.ends_with('-') {
        return Err(Error::IdentityResolution(format!(
            "project '{}' is not a valid project id",
            project_id
        )));
    }
    Ok(())
}

/// Creates a directory with owner-only permissions.
pub(crate) fn create_private_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)?;
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
