//! Resource state types.
//!
//! This module defines what a provider reports back once a resource
//! exists:
//! - `ResourceKind`/`ResourceId`: what a resource is and its logical name
//! - `ResourceOutputs`: the typed output attributes per kind
//! - `ResourceRecord`: the last applied request plus outputs
//! - `ProjectInfo`/`ServiceAccount`: results of the identity lookups

use super::spec::{IamPolicy, ResourceRequest};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Resource Kind
// =============================================================================

/// Kind of a provisioned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Object-storage bucket.
    Bucket,
    /// KMS key ring.
    KeyRing,
    /// KMS crypto key.
    CryptoKey,
    /// IAM policy on a crypto key.
    KeyIamPolicy,
    /// Managed compute service.
    Service,
    /// Custom domain mapping.
    DomainMapping,
}

/// What to do when a recorded resource's request differs from the desired one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Apply the new request to the existing resource.
    UpdateInPlace,
    /// Delete the existing resource, then create a new one.
    DeleteBeforeReplace,
}

impl ResourceKind {
    /// All kinds in creation (dependency) order.
    pub const CREATION_ORDER: [ResourceKind; 6] = [
        ResourceKind::Bucket,
        ResourceKind::KeyRing,
        ResourceKind::CryptoKey,
        ResourceKind::KeyIamPolicy,
        ResourceKind::Service,
        ResourceKind::DomainMapping,
    ];

    /// Short name used in resource ids and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::KeyRing => "key-ring",
            Self::CryptoKey => "crypto-key",
            Self::KeyIamPolicy => "key-iam-policy",
            Self::Service => "service",
            Self::DomainMapping => "domain-mapping",
        }
    }

    /// Replacement policy for requests whose mutable fields changed.
    ///
    /// The service is replaced delete-first so that two revisions never
    /// claim the same storage backend at once. A change to a field fixed at
    /// creation replaces any kind (see
    /// [`ResourceRequest::immutable_changes`]).
    #[must_use]
    pub const fn replace_policy(&self) -> ReplacePolicy {
        match self {
            Self::Service => ReplacePolicy::DeleteBeforeReplace,
            _ => ReplacePolicy::UpdateInPlace,
        }
    }

    /// Whether the provider appends a random suffix to the logical name.
    #[must_use]
    pub const fn is_autonamed(&self) -> bool {
        matches!(
            self,
            Self::Bucket | Self::KeyRing | Self::CryptoKey | Self::Service
        )
    }

    /// Position in [`ResourceKind::CREATION_ORDER`].
    #[must_use]
    pub fn creation_rank(&self) -> usize {
        Self::CREATION_ORDER
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::CREATION_ORDER.len())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Resource ID
// =============================================================================

/// Identifier of a registered resource: kind plus logical name.
///
/// The logical name is stable across runs; the physical name is chosen by
/// the provider and reported in the resource's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Logical name.
    pub name: String,
}

impl ResourceId {
    /// Creates a resource id.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.kind, self.name)
    }
}

// =============================================================================
// Resource Outputs
// =============================================================================

/// Outputs of a storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketState {
    /// Assigned bucket name.
    pub name: String,
    /// Bucket URL (`gs://<name>`).
    pub url: String,
    /// Bucket location.
    pub location: String,
}

/// Outputs of a key ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRingState {
    /// Full id: `projects/<p>/locations/<l>/keyRings/<name>`.
    pub id: String,
    /// Assigned key ring name.
    pub name: String,
    /// Owning project id.
    pub project: String,
    /// Key ring location.
    pub location: String,
}

/// Outputs of a crypto key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoKeyState {
    /// Full id: `<key ring id>/cryptoKeys/<name>`.
    pub id: String,
    /// Assigned key name.
    pub name: String,
    /// Full id of the owning key ring.
    pub key_ring: String,
    /// Rotation period in `"<seconds>s"` form.
    pub rotation_period: String,
}

/// Outputs of an applied IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIamPolicyState {
    /// Key the policy is attached to.
    pub crypto_key_id: String,
    /// Policy version tag.
    pub etag: String,
    /// Effective policy.
    pub policy: IamPolicy,
}

/// Outputs of the compute service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Assigned service name.
    pub name: String,
    /// Generated routable URI (`https://...`).
    pub uri: String,
    /// Region.
    pub location: String,
    /// Name of the latest ready revision.
    pub latest_ready_revision: String,
}

/// DNS record the operator must publish for a domain mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record type (`CNAME`, `A`, `AAAA`).
    pub rrtype: String,
    /// Record data.
    pub rrdata: String,
}

/// Outputs of a domain mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMappingState {
    /// Mapped domain.
    pub domain: String,
    /// Service endpoint host the domain routes to.
    pub route_target: String,
    /// DNS records to publish.
    pub records: Vec<DnsRecord>,
}

/// Typed outputs of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "outputs", rename_all = "snake_case")]
pub enum ResourceOutputs {
    /// Bucket outputs.
    Bucket(BucketState),
    /// Key ring outputs.
    KeyRing(KeyRingState),
    /// Crypto key outputs.
    CryptoKey(CryptoKeyState),
    /// IAM policy outputs.
    KeyIamPolicy(KeyIamPolicyState),
    /// Service outputs.
    Service(ServiceState),
    /// Domain mapping outputs.
    DomainMapping(DomainMappingState),
}

// =============================================================================
// Resource Record
// =============================================================================

/// What a provider knows about an existing resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Logical identity.
    pub id: ResourceId,
    /// Provider-assigned name.
    pub physical_name: String,
    /// Last applied request.
    pub request: ResourceRequest,
    /// Output attributes.
    pub outputs: ResourceOutputs,
    /// When the resource was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When the resource was last updated.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

macro_rules! impl_outputs_conversion {
    ($state:ty, $variant:ident) => {
        impl TryFrom<ResourceRecord> for $state {
            type Error = Error;

            fn try_from(record: ResourceRecord) -> Result<Self, Self::Error> {
                match record.outputs {
                    ResourceOutputs::$variant(state) => Ok(state),
                    _ => Err(Error::UnexpectedOutputs {
                        resource: record.id.to_string(),
                        expected: stringify!($variant).to_string(),
                    }),
                }
            }
        }
    };
}

impl_outputs_conversion!(BucketState, Bucket);
impl_outputs_conversion!(KeyRingState, KeyRing);
impl_outputs_conversion!(CryptoKeyState, CryptoKey);
impl_outputs_conversion!(KeyIamPolicyState, KeyIamPolicy);
impl_outputs_conversion!(ServiceState, Service);
impl_outputs_conversion!(DomainMappingState, DomainMapping);

// =============================================================================
// Identity
// =============================================================================

/// Resolved project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project id, e.g. `my-project`.
    pub project_id: String,
    /// Numeric project number.
    pub project_number: String,
    /// Self link of the project resource.
    pub self_link: String,
}

/// Resolved service identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    /// Service account email.
    pub email: String,
}

impl ServiceAccount {
    /// IAM member string for this account.
    #[must_use]
    pub fn member(&self) -> String {
        format!("serviceAccount:{}", self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BucketArgs, ResourceRequest};

    fn bucket_record() -> ResourceRecord {
        let now = chrono::Utc::now();
        ResourceRecord {
            id: ResourceId::new(ResourceKind::Bucket, "vault-data"),
            physical_name: "vault-data-3f9a2c1".to_string(),
            request: ResourceRequest::Bucket(BucketArgs {
                project: "acme-vault".to_string(),
                location: "US".to_string(),
                uniform_bucket_level_access: true,
            }),
            outputs: ResourceOutputs::Bucket(BucketState {
                name: "vault-data-3f9a2c1".to_string(),
                url: "gs://vault-data-3f9a2c1".to_string(),
                location: "US".to_string(),
            }),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_creation_rank_follows_dependencies() {
        let ranks: Vec<usize> = ResourceKind::CREATION_ORDER
            .iter()
            .map(ResourceKind::creation_rank)
            .collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
        assert!(ResourceKind::KeyIamPolicy.creation_rank() > ResourceKind::CryptoKey.creation_rank());
        assert!(ResourceKind::Service.creation_rank() > ResourceKind::KeyIamPolicy.creation_rank());
    }

    #[test]
    fn test_only_service_replaced_delete_first() {
        for kind in ResourceKind::CREATION_ORDER {
            let expected = if kind == ResourceKind::Service {
                ReplacePolicy::DeleteBeforeReplace
            } else {
                ReplacePolicy::UpdateInPlace
            };
            assert_eq!(kind.replace_policy(), expected, "{}", kind);
        }
    }

    #[test]
    fn test_resource_id_display() {
        let id = ResourceId::new(ResourceKind::KeyIamPolicy, "seal");
        assert_eq!(id.to_string(), "key-iam-policy::seal");
    }

    #[test]
    fn test_typed_outputs_conversion() {
        let state = BucketState::try_from(bucket_record()).unwrap();
        assert_eq!(state.name, "vault-data-3f9a2c1");

        let err = ServiceState::try_from(bucket_record()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedOutputs { .. }));
    }

    #[test]
    fn test_record_serialization_keeps_request() {
        let record = bucket_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ResourceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_service_account_member() {
        let account = ServiceAccount {
            email: "123-compute@developer.gserviceaccount.com".to_string(),
        };
        assert_eq!(
            account.member(),
            "serviceAccount:123-compute@developer.gserviceaccount.com"
        );
    }
}
