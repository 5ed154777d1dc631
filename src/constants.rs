//! # Deployment Constants
//!
//! Fixed values for the Vault deployment: the pinned server image, the
//! container port, the single-writer scaling bounds, resource locations,
//! and the default logical names of every resource in the graph.
//!
//! ## Modification Guidelines
//!
//! Several of these values are load-bearing for the deployed server:
//!
//! 1. `MIN_INSTANCE_COUNT`/`MAX_INSTANCE_COUNT` encode the single-writer
//!    assumption of the GCS storage backend. They are not configurable.
//! 2. `VAULT_PORT` must match `listener.tcp.address` in the generated
//!    server configuration and the startup probe port.
//! 3. `KMS_ENCRYPTER_DECRYPTER_ROLE` is the minimum role that lets the
//!    server unseal itself.
//!
//! ## Cross-References
//!
//! - [`crate::vault::service`]: image, port, probe, limits, scaling
//! - [`crate::vault::kms`]: key ring location, rotation, IAM role
//! - [`crate::vault::server_config`]: listener address

use std::time::Duration;

// =============================================================================
// Server Image
// =============================================================================

/// Version-pinned Vault server image.
///
/// Pinned rather than `latest` so that a re-run never silently upgrades the
/// server and triggers a replacement of the service.
pub const VAULT_IMAGE: &str = "hashicorp/vault:1.15.4";

/// Maximum image reference length in bytes.
pub const MAX_IMAGE_REF_LEN: usize = 512;

/// Image entrypoint. The entrypoint script materializes `VAULT_LOCAL_CONFIG`
/// into a config file before exec'ing the server.
pub const VAULT_ENTRYPOINT: &str = "docker-entrypoint.sh";

/// Arguments passed to the entrypoint.
pub const VAULT_ARGS: &[&str] = &["server"];

// =============================================================================
// Networking
// =============================================================================

/// Container port the Vault listener binds to.
pub const VAULT_PORT: u16 = 8200;

/// Port name used by the platform for protocol identification.
pub const VAULT_PORT_NAME: &str = "http1";

/// Listener bind address written into the server configuration.
pub const VAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8200";

/// Path probed by the startup probe.
pub const STARTUP_PROBE_PATH: &str = "/";

/// Delay before the first startup probe.
pub const STARTUP_PROBE_INITIAL_DELAY: Duration = Duration::from_secs(0);

/// Interval between startup probes.
pub const STARTUP_PROBE_PERIOD: Duration = Duration::from_secs(10);

/// Timeout of a single startup probe.
pub const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive probe failures before the revision is marked failed.
pub const STARTUP_PROBE_FAILURE_THRESHOLD: u32 = 3;

// =============================================================================
// Scaling
// =============================================================================

/// Minimum instance count. Zero permits scale-to-zero.
pub const MIN_INSTANCE_COUNT: u32 = 0;

/// Maximum instance count.
///
/// The GCS storage backend assumes a single writer. Two live instances
/// would both claim the backend, so the ceiling is fixed at one.
pub const MAX_INSTANCE_COUNT: u32 = 1;

// =============================================================================
// Resource Limits
// =============================================================================

/// Default CPU ceiling for the server container.
pub const DEFAULT_CPU_LIMIT: &str = "1";

/// Default memory ceiling for the server container.
pub const DEFAULT_MEMORY_LIMIT: &str = "512Mi";

/// Upper bound on configured memory (32 GiB, the platform maximum).
pub const MAX_MEMORY_BYTES: u64 = 32 * 1024 * 1024 * 1024;

/// Upper bound on configured CPU in millicores.
pub const MAX_CPU_MILLIS: u64 = 8000;

// =============================================================================
// Locations
// =============================================================================

/// Default region for the compute service and domain mapping.
pub const DEFAULT_REGION: &str = "us-east1";

/// Bucket location (multi-region).
pub const BUCKET_LOCATION: &str = "US";

/// Key ring location.
pub const KEY_RING_LOCATION: &str = "global";

// =============================================================================
// Key Management
// =============================================================================

/// Default key rotation period (100000 seconds, about 27.8 hours).
pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(100_000);

/// Shortest rotation period the KMS API accepts.
pub const MIN_ROTATION_PERIOD: Duration = Duration::from_secs(86_400);

/// Role granting encrypt/decrypt on a crypto key.
pub const KMS_ENCRYPTER_DECRYPTER_ROLE: &str = "roles/cloudkms.cryptoKeyEncrypterDecrypter";

/// Suffix of the default compute service account email.
pub const DEFAULT_COMPUTE_SA_SUFFIX: &str = "-compute@developer.gserviceaccount.com";

// =============================================================================
// Default Logical Names
// =============================================================================

/// Logical name of the storage bucket.
pub const DEFAULT_BUCKET_NAME: &str = "vault-data";

/// Logical name of the key ring.
pub const DEFAULT_KEY_RING_NAME: &str = "vault-server";

/// Logical name of the unseal key.
pub const DEFAULT_CRYPTO_KEY_NAME: &str = "seal";

/// Logical name of the compute service.
pub const DEFAULT_SERVICE_NAME: &str = "vault";

/// Name of the single container in the service template.
pub const VAULT_CONTAINER_NAME: &str = "vault";

// =============================================================================
// Container Environment
// =============================================================================

/// Env var carrying the project id.
pub const ENV_GOOGLE_PROJECT: &str = "GOOGLE_PROJECT";

/// Env var that makes the entrypoint skip `setcap` on the vault binary.
/// The managed runtime does not grant `CAP_IPC_LOCK`.
pub const ENV_SKIP_SETCAP: &str = "SKIP_SETCAP";

/// Env var with the address the CLI inside the container talks to.
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";

/// Value of `VAULT_ADDR` inside the container.
pub const VAULT_LOCAL_ADDR: &str = "http://0.0.0.0:8200";

/// Env var carrying the generated server configuration.
pub const ENV_VAULT_LOCAL_CONFIG: &str = "VAULT_LOCAL_CONFIG";

// =============================================================================
// Local State
// =============================================================================

/// File name of the local provider's state document.
pub const STATE_FILE_NAME: &str = "state.json";

/// File name of the last published outputs.
pub const OUTPUTS_FILE_NAME: &str = "outputs.json";

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "vaultrun.toml";

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "VAULTRUN_";

/// Ambient project variable set by the cloud SDK.
pub const ENV_GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";

/// Name under which the effective service URL is published.
pub const VAULT_URL_OUTPUT: &str = "vaultUrl";

/// Length of the random suffix appended to auto-named resources.
pub const AUTONAME_SUFFIX_LEN: usize = 7;
