//! # Key Management
//!
//! Key ring, unseal key, and the IAM policy that lets the service identity
//! use the key.
//!
//! ```text
//!   project ──▶ key ring ──▶ crypto key ──┬──▶ IAM policy (binding)
//!   service account ──────────────────────┘
//!                    key ring + crypto key ──▶ KeyCoordinates
//! ```
//!
//! The policy request is built from the key's resolved id, so the binding
//! is never submitted before the key exists. A rejected policy aborts the
//! run: without it the server cannot unseal.

use serde::{Deserialize, Serialize};

use crate::config::DeployConfig;
use crate::constants::{KEY_RING_LOCATION, KMS_ENCRYPTER_DECRYPTER_ROLE};
use crate::engine::Deployment;
use crate::output::Output;
use crate::resources::{
    CryptoKeyArgs, CryptoKeyState, IamPolicy, KeyIamPolicyArgs, KeyIamPolicyState, KeyPurpose,
    KeyRingArgs, KeyRingState, ResourceId, ResourceKind, ResourceRequest, format_duration_secs,
};

use super::identity::IdentityHandles;

/// Everything the server's KMS seal needs to locate the unseal key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCoordinates {
    /// Project owning the key ring.
    pub project: String,
    /// Key ring location.
    pub region: String,
    /// Key ring name.
    pub key_ring: String,
    /// Crypto key name.
    pub crypto_key: String,
}

impl KeyCoordinates {
    /// Derives coordinates from the key ring and key outputs.
    #[must_use]
    pub fn from_states(ring: &KeyRingState, key: &CryptoKeyState) -> Self {
        Self {
            project: ring.project.clone(),
            region: ring.location.clone(),
            key_ring: ring.name.clone(),
            crypto_key: key.name.clone(),
        }
    }
}

/// Handles produced by the key management stage.
#[derive(Debug, Clone)]
pub struct KmsHandles {
    /// Key ring.
    pub key_ring: Output<KeyRingState>,
    /// Unseal key.
    pub crypto_key: Output<CryptoKeyState>,
    /// Applied IAM policy. Resolves only once the binding succeeded.
    pub binding: Output<KeyIamPolicyState>,
    /// Seal coordinates.
    pub coordinates: Output<KeyCoordinates>,
}

/// Creates the key ring and key and grants the service identity
/// encrypt/decrypt on the key.
pub fn provision(
    deployment: &Deployment,
    config: &DeployConfig,
    identity: &IdentityHandles,
) -> KmsHandles {
    let key_ring: Output<KeyRingState> = deployment.register(
        ResourceId::new(ResourceKind::KeyRing, &config.key_ring_name),
        identity.project.map(|project| {
            ResourceRequest::KeyRing(KeyRingArgs {
                project: project.project_id,
                location: KEY_RING_LOCATION.to_string(),
            })
        }),
    );

    let rotation_period = format_duration_secs(config.rotation_period());
    let crypto_key: Output<CryptoKeyState> = deployment.register(
        ResourceId::new(ResourceKind::CryptoKey, &config.crypto_key_name),
        key_ring.map(move |ring| {
            ResourceRequest::CryptoKey(CryptoKeyArgs {
                key_ring: ring.id,
                rotation_period,
                purpose: KeyPurpose::EncryptDecrypt,
            })
        }),
    );

    let binding: Output<KeyIamPolicyState> = deployment.register(
        ResourceId::new(ResourceKind::KeyIamPolicy, &config.crypto_key_name),
        crypto_key
            .zip(&identity.service_account)
            .map(|(key, account)| {
                ResourceRequest::KeyIamPolicy(KeyIamPolicyArgs {
                    crypto_key_id: key.id,
                    policy: IamPolicy::single(KMS_ENCRYPTER_DECRYPTER_ROLE, account.member()),
                })
            }),
    );

    let coordinates = key_ring
        .zip(&crypto_key)
        .map(|(ring, key)| KeyCoordinates::from_states(&ring, &key));

    KmsHandles {
        key_ring,
        crypto_key,
        binding,
        coordinates,
    }
}
