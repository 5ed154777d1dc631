//! Vault server configuration document.
//!
//! Encoded with `serde_json` and handed to the container verbatim through
//! `VAULT_LOCAL_CONFIG`. Built only from resolved handles; every required
//! value is checked before encoding.

use serde::{Deserialize, Serialize};

use crate::constants::VAULT_LISTEN_ADDRESS;
use crate::error::{Error, Result};
use crate::output::Output;
use crate::resources::BucketState;

use super::kms::KeyCoordinates;

/// Vault server configuration (`VAULT_LOCAL_CONFIG`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultServerConfig {
    /// Storage backend.
    pub storage: StorageStanza,
    /// Auto-unseal.
    pub seal: SealStanza,
    /// Serve the web UI.
    pub ui: bool,
    /// The managed runtime does not grant `CAP_IPC_LOCK`.
    pub disable_mlock: bool,
    /// Single instance, no HA clustering.
    pub disable_clustering: bool,
    /// Listener.
    pub listener: ListenerStanza,
}

/// `storage` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStanza {
    /// GCS backend.
    pub gcs: GcsStorage,
}

/// `storage.gcs` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsStorage {
    /// Bucket name.
    pub bucket: String,
}

/// `seal` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealStanza {
    /// Cloud KMS seal.
    pub gcpckms: KeyCoordinates,
}

/// `listener` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStanza {
    /// TCP listener.
    pub tcp: TcpListener,
}

/// `listener.tcp` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpListener {
    /// Bind address.
    pub address: String,
    /// TLS is terminated by the platform.
    pub tls_disable: bool,
}

impl VaultServerConfig {
    /// Builds the configuration from the resolved bucket and key coordinates.
    #[must_use]
    pub fn new(bucket: &BucketState, coordinates: &KeyCoordinates, ui: bool) -> Self {
        Self {
            storage: StorageStanza {
                gcs: GcsStorage {
                    bucket: bucket.name.clone(),
                },
            },
            seal: SealStanza {
                gcpckms: coordinates.clone(),
            },
            ui,
            disable_mlock: true,
            disable_clustering: true,
            listener: ListenerStanza {
                tcp: TcpListener {
                    address: VAULT_LISTEN_ADDRESS.to_string(),
                    tls_disable: true,
                },
            },
        }
    }

    /// Checks that every required value is present.
    pub fn validate(&self) -> Result<()> {
        let seal = &self.seal.gcpckms;
        for (field, value) in [
            ("storage.gcs.bucket", &self.storage.gcs.bucket),
            ("seal.gcpckms.project", &seal.project),
            ("seal.gcpckms.region", &seal.region),
            ("seal.gcpckms.key_ring", &seal.key_ring),
            ("seal.gcpckms.crypto_key", &seal.crypto_key),
            ("listener.tcp.address", &self.listener.tcp.address),
        ] {
            if value.trim().is_empty() {
                return Err(Error::UnresolvedValue {
                    field: field.to_string(),
                    reason: "value is empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates and encodes the document as JSON.
    pub fn to_json(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds the encoded configuration once the bucket and key coordinates
/// have resolved.
pub fn compose(
    bucket: &Output<BucketState>,
    coordinates: &Output<KeyCoordinates>,
    ui: bool,
) -> Output<String> {
    bucket
        .zip(coordinates)
        .try_map(move |(bucket, coordinates)| VaultServerConfig::new(&bucket, &coordinates, ui).to_json())
}
