//! Configuration for vaultrun.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTONAME_SUFFIX_LEN, CONFIG_FILE_NAME, DEFAULT_BUCKET_NAME, DEFAULT_CPU_LIMIT,
    DEFAULT_CRYPTO_KEY_NAME, DEFAULT_KEY_RING_NAME, DEFAULT_MEMORY_LIMIT, DEFAULT_REGION,
    DEFAULT_ROTATION_PERIOD, DEFAULT_SERVICE_NAME, ENV_GOOGLE_CLOUD_PROJECT, ENV_PREFIX,
    MIN_ROTATION_PERIOD, VAULT_IMAGE,
};
use crate::error::{Error, Result};
use crate::resources::{
    MAX_NAME_LEN, ResourceLimits, validate_domain, validate_image_ref, validate_name,
};

/// Top-level deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Target project id. Falls back to the provider's ambient project.
    #[serde(default)]
    pub project: Option<String>,

    /// Region of the compute service and domain mapping.
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom domain to map onto the service.
    #[serde(default, alias = "vaultDomain")]
    pub vault_domain: Option<String>,

    /// Pinned Vault container image.
    #[serde(default = "default_image")]
    pub image: String,

    /// Logical name of the storage bucket.
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,

    /// Logical name of the key ring.
    #[serde(default = "default_key_ring_name")]
    pub key_ring_name: String,

    /// Logical name of the unseal key.
    #[serde(default = "default_crypto_key_name")]
    pub crypto_key_name: String,

    /// Logical name of the compute service.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Key rotation period in seconds.
    #[serde(default = "default_rotation_period_secs")]
    pub rotation_period_secs: u64,

    /// Container resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Serve the Vault web UI.
    #[serde(default = "default_ui")]
    pub ui: bool,

    /// Directory holding local state and published outputs.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

fn default_image() -> String {
    VAULT_IMAGE.to_owned()
}

fn default_bucket_name() -> String {
    DEFAULT_BUCKET_NAME.to_owned()
}

fn default_key_ring_name() -> String {
    DEFAULT_KEY_RING_NAME.to_owned()
}

fn default_crypto_key_name() -> String {
    DEFAULT_CRYPTO_KEY_NAME.to_owned()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_owned()
}

const fn default_rotation_period_secs() -> u64 {
    DEFAULT_ROTATION_PERIOD.as_secs()
}

const fn default_ui() -> bool {
    true
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: default_region(),
            vault_domain: None,
            image: default_image(),
            bucket_name: default_bucket_name(),
            key_ring_name: default_key_ring_name(),
            crypto_key_name: default_crypto_key_name(),
            service_name: default_service_name(),
            rotation_period_secs: default_rotation_period_secs(),
            limits: LimitsConfig::default(),
            ui: default_ui(),
            state_dir: None,
        }
    }
}

impl DeployConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `vaultrun.toml` in the current directory (if present)
    /// 3. `GOOGLE_CLOUD_PROJECT` as `project`
    /// 4. Environment variables with `VAULTRUN_` prefix
    pub fn load() -> Result<Self> {
        Self::figment(Path::new(CONFIG_FILE_NAME))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Self::figment(path)
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(
                Env::raw()
                    .only(&[ENV_GOOGLE_CLOUD_PROJECT])
                    .map(|_| "project".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Returns the custom domain, treating an empty value as absent.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.vault_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Returns the key rotation period.
    #[must_use]
    pub fn rotation_period(&self) -> Duration {
        Duration::from_secs(self.rotation_period_secs)
    }

    /// Returns the state directory, defaulting to the user's local data dir.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    /// Container resource limits as a request fragment.
    #[must_use]
    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            cpu: self.limits.cpu.clone(),
            memory: self.limits.memory.clone(),
            cpu_idle: self.limits.cpu_idle,
        }
    }

    /// Validates the configuration before any resource is created.
    pub fn validate(&self) -> Result<()> {
        if let Some(project) = &self.project {
            if project.trim().is_empty() {
                return Err(Error::InvalidInput("project cannot be empty".to_string()));
            }
        }

        validate_name(&self.region, MAX_NAME_LEN)
            .map_err(|e| Error::InvalidInput(format!("region: {e}")))?;

        // Auto-named resources get '-' plus a random suffix appended.
        let max_logical = MAX_NAME_LEN - AUTONAME_SUFFIX_LEN - 1;
        for (field, name) in [
            ("bucket_name", &self.bucket_name),
            ("key_ring_name", &self.key_ring_name),
            ("crypto_key_name", &self.crypto_key_name),
            ("service_name", &self.service_name),
        ] {
            validate_name(name, max_logical)
                .map_err(|e| Error::InvalidInput(format!("{field}: {e}")))?;
        }

        if let Some(domain) = self.domain() {
            validate_domain(domain)?;
        }

        validate_image_ref(&self.image)?;

        if self.rotation_period() < MIN_ROTATION_PERIOD {
            return Err(Error::InvalidInput(format!(
                "rotation period {}s is shorter than the minimum of {}s",
                self.rotation_period_secs,
                MIN_ROTATION_PERIOD.as_secs()
            )));
        }

        self.resource_limits().validate()
    }
}

/// Container resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// CPU limit ("1", "500m").
    #[serde(default = "default_cpu")]
    pub cpu: String,

    /// Memory limit ("512Mi").
    #[serde(default = "default_memory")]
    pub memory: String,

    /// Throttle CPU outside of requests.
    #[serde(default = "default_cpu_idle")]
    pub cpu_idle: bool,
}

fn default_cpu() -> String {
    DEFAULT_CPU_LIMIT.to_owned()
}

fn default_memory() -> String {
    DEFAULT_MEMORY_LIMIT.to_owned()
}

const fn default_cpu_idle() -> bool {
    true
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
            cpu_idle: default_cpu_idle(),
        }
    }
}

/// Default state directory: `<local data dir>/vaultrun`, or `.vaultrun`
/// when no data dir is known.
#[must_use]
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vaultrun"))
        .unwrap_or_else(|| PathBuf::from(".vaultrun"))
}
