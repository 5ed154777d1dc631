//! Typed create-requests.
//!
//! Every resource the deployment creates is described by one of the
//! argument types in this module, wrapped in a [`ResourceRequest`]. The
//! requests are plain data: they are compared against the last applied
//! request to decide between adopt, update and replace, and persisted by
//! providers that keep state.
//!
//! All requests are validated before submission; see
//! [`ResourceRequest::validate`].

use crate::constants::{
    MAX_CPU_MILLIS, MAX_IMAGE_REF_LEN, MAX_INSTANCE_COUNT, MAX_MEMORY_BYTES, MIN_INSTANCE_COUNT,
};
use crate::error::{Error, Result};
use crate::resources::ResourceKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Constants for Request Validation
// =============================================================================

/// Maximum length of a resource name (RFC 1123 DNS label).
pub const MAX_NAME_LEN: usize = 63;

/// Maximum length of a fully qualified domain name.
pub const MAX_DOMAIN_LEN: usize = 253;

/// Maximum number of environment variables per container.
pub const MAX_ENV_VARS_PER_CONTAINER: usize = 256;

/// Maximum length of an environment variable value (32 KiB).
pub const MAX_ENV_VALUE_LEN: usize = 32 * 1024;

// =============================================================================
// Validation Helpers
// =============================================================================

/// Validates a resource name (RFC 1123 DNS label).
pub fn validate_name(name: &str, max_len: usize) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_string()));
    }

    if name.len() > max_len {
        return Err(Error::InvalidInput(format!(
            "name '{}' exceeds maximum length of {}",
            name, max_len
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::InvalidInput(format!(
            "name '{}' must contain only lowercase alphanumeric characters or '-'",
            name
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::InvalidInput(format!(
            "name '{}' cannot start or end with '-'",
            name
        )));
    }

    Ok(())
}

/// Validates a fully qualified domain name such as `vault.example.com`.
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(Error::InvalidInput(format!(
            "domain '{}' exceeds maximum length of {}",
            domain, MAX_DOMAIN_LEN
        )));
    }

    if domain.contains("://") {
        return Err(Error::InvalidInput(format!(
            "domain '{}' must not include a scheme",
            domain
        )));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "domain '{}' must have at least two labels",
            domain
        )));
    }

    for label in labels {
        validate_name(label, MAX_NAME_LEN)
            .map_err(|e| Error::InvalidInput(format!("domain '{}': {}", domain, e)))?;
    }

    Ok(())
}

/// Validates a container image reference.
pub fn validate_image_ref(image: &str) -> Result<()> {
    if image.is_empty() {
        return Err(Error::InvalidInput("image reference is empty".to_string()));
    }

    if image.len() > MAX_IMAGE_REF_LEN {
        return Err(Error::InvalidInput(format!(
            "image reference exceeds {} bytes",
            MAX_IMAGE_REF_LEN
        )));
    }

    if !image
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/:.-_@".contains(c))
    {
        return Err(Error::InvalidInput(format!(
            "image reference '{}' contains invalid characters",
            image
        )));
    }

    // Tag or digest required. The registry host may carry a port.
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    if !last_segment.contains(':') && !image.contains('@') {
        return Err(Error::InvalidInput(format!(
            "image reference '{}' must be pinned to a tag or digest",
            image
        )));
    }

    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Renders a duration in the `"<seconds>s"` form used by the KMS API.
#[must_use]
pub fn format_duration_secs(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

// =============================================================================
// Resource Request
// =============================================================================

/// A typed create-request for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "snake_case")]
pub enum ResourceRequest {
    /// Object-storage bucket.
    Bucket(BucketArgs),
    /// KMS key ring.
    KeyRing(KeyRingArgs),
    /// KMS crypto key.
    CryptoKey(CryptoKeyArgs),
    /// IAM policy on a crypto key.
    KeyIamPolicy(KeyIamPolicyArgs),
    /// Managed compute service.
    Service(ServiceSpec),
    /// Custom domain mapping.
    DomainMapping(DomainMappingArgs),
}

impl ResourceRequest {
    /// Returns the kind of resource this request creates.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Bucket(_) => ResourceKind::Bucket,
            Self::KeyRing(_) => ResourceKind::KeyRing,
            Self::CryptoKey(_) => ResourceKind::CryptoKey,
            Self::KeyIamPolicy(_) => ResourceKind::KeyIamPolicy,
            Self::Service(_) => ResourceKind::Service,
            Self::DomainMapping(_) => ResourceKind::DomainMapping,
        }
    }

    /// Validates the request before it is submitted to a provider.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Bucket(args) => args.validate(),
            Self::KeyRing(args) => args.validate(),
            Self::CryptoKey(args) => args.validate(),
            Self::KeyIamPolicy(args) => args.validate(),
            Self::Service(spec) => spec.validate(),
            Self::DomainMapping(args) => args.validate(),
        }
    }

    /// Fields that differ from `previous` and cannot be changed on an
    /// existing resource. A non-empty result means the resource must be
    /// replaced rather than updated.
    ///
    /// | Kind | Fixed at creation |
    /// |------|-------------------|
    /// | bucket | `project`, `location` |
    /// | key ring | `project`, `location` |
    /// | crypto key | `key_ring`, `purpose` |
    /// | key IAM policy | `crypto_key_id` |
    /// | service | `project`, `location` |
    /// | domain mapping | `project`, `location`, `domain`, `route_target` |
    #[must_use]
    pub fn immutable_changes(&self, previous: &ResourceRequest) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let mut check = |field: &'static str, differs: bool| {
            if differs {
                changed.push(field);
            }
        };

        match (self, previous) {
            (Self::Bucket(new), Self::Bucket(old)) => {
                check("project", new.project != old.project);
                check("location", new.location != old.location);
            }
            (Self::KeyRing(new), Self::KeyRing(old)) => {
                check("project", new.project != old.project);
                check("location", new.location != old.location);
            }
            (Self::CryptoKey(new), Self::CryptoKey(old)) => {
                check("key_ring", new.key_ring != old.key_ring);
                check("purpose", new.purpose != old.purpose);
            }
            (Self::KeyIamPolicy(new), Self::KeyIamPolicy(old)) => {
                check("crypto_key_id", new.crypto_key_id != old.crypto_key_id);
            }
            (Self::Service(new), Self::Service(old)) => {
                check("project", new.project != old.project);
                check("location", new.location != old.location);
            }
            (Self::DomainMapping(new), Self::DomainMapping(old)) => {
                check("project", new.project != old.project);
                check("location", new.location != old.location);
                check("domain", new.domain != old.domain);
                check("route_target", new.route_target != old.route_target);
            }
            _ => check("type", true),
        }

        changed
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Arguments for the storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketArgs {
    /// Owning project id.
    pub project: String,
    /// Location policy (e.g. multi-region "US").
    pub location: String,
    /// Enforce uniform bucket-level access (no object ACLs).
    pub uniform_bucket_level_access: bool,
}

impl BucketArgs {
    fn validate(&self) -> Result<()> {
        require_non_empty("bucket project", &self.project)?;
        require_non_empty("bucket location", &self.location)
    }
}

// =============================================================================
// Key Management
// =============================================================================

/// Arguments for the key ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRingArgs {
    /// Owning project id.
    pub project: String,
    /// Key ring location (e.g. "global").
    pub location: String,
}

impl KeyRingArgs {
    fn validate(&self) -> Result<()> {
        require_non_empty("key ring project", &self.project)?;
        require_non_empty("key ring location", &self.location)
    }
}

/// Purpose of a crypto key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyPurpose {
    /// Symmetric encryption and decryption.
    #[default]
    EncryptDecrypt,
}

/// Arguments for the crypto key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoKeyArgs {
    /// Full id of the owning key ring.
    pub key_ring: String,
    /// Rotation period in `"<seconds>s"` form.
    pub rotation_period: String,
    /// Key purpose.
    pub purpose: KeyPurpose,
}

impl CryptoKeyArgs {
    fn validate(&self) -> Result<()> {
        require_non_empty("crypto key ring", &self.key_ring)?;
        let secs = self
            .rotation_period
            .strip_suffix('s')
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "rotation period '{}' must be '<seconds>s'",
                    self.rotation_period
                ))
            })?;
        if secs == 0 {
            return Err(Error::InvalidInput(
                "rotation period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One role binding inside an IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamBinding {
    /// Role granted, e.g. `roles/cloudkms.cryptoKeyEncrypterDecrypter`.
    pub role: String,
    /// Members, e.g. `serviceAccount:123-compute@developer.gserviceaccount.com`.
    pub members: Vec<String>,
}

/// IAM policy document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IamPolicy {
    /// Role bindings.
    pub bindings: Vec<IamBinding>,
}

impl IamPolicy {
    /// Policy granting a single role to a single member.
    #[must_use]
    pub fn single(role: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            bindings: vec![IamBinding {
                role: role.into(),
                members: vec![member.into()],
            }],
        }
    }

    /// Returns true if `member` holds `role`.
    #[must_use]
    pub fn grants(&self, role: &str, member: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.role == role && b.members.iter().any(|m| m == member))
    }
}

/// Arguments for applying an IAM policy to a crypto key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIamPolicyArgs {
    /// Full id of the crypto key.
    pub crypto_key_id: String,
    /// Policy to apply.
    pub policy: IamPolicy,
}

impl KeyIamPolicyArgs {
    fn validate(&self) -> Result<()> {
        require_non_empty("policy crypto key id", &self.crypto_key_id)?;
        if self.policy.bindings.is_empty() {
            return Err(Error::InvalidInput("IAM policy has no bindings".to_string()));
        }
        for binding in &self.policy.bindings {
            require_non_empty("IAM role", &binding.role)?;
            if binding.members.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "IAM binding for {} has no members",
                    binding.role
                )));
            }
            for member in &binding.members {
                let (kind, identity) = member.split_once(':').ok_or_else(|| {
                    Error::InvalidInput(format!("IAM member '{}' must be '<type>:<id>'", member))
                })?;
                require_non_empty("IAM member type", kind)?;
                require_non_empty("IAM member identity", identity)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Service Specification
// =============================================================================

/// Specification of the managed compute service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Owning project id.
    pub project: String,
    /// Region the service runs in.
    pub location: String,
    /// Revision template.
    pub template: RevisionTemplate,
    /// Traffic split.
    pub traffic: Vec<TrafficTarget>,
}

impl ServiceSpec {
    /// Validates the service specification.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("service project", &self.project)?;
        require_non_empty("service location", &self.location)?;
        self.template.validate()?;

        if self.traffic.is_empty() {
            return Err(Error::InvalidInput(
                "service has no traffic targets".to_string(),
            ));
        }
        let total: u32 = self.traffic.iter().map(|t| u32::from(t.percent)).sum();
        if total != 100 {
            return Err(Error::InvalidInput(format!(
                "traffic percentages sum to {}, expected 100",
                total
            )));
        }
        Ok(())
    }

    /// Returns the (single) server container.
    #[must_use]
    pub fn container(&self) -> Option<&ContainerSpec> {
        self.template.containers.first()
    }
}

/// Revision template of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionTemplate {
    /// Identity the revision runs as.
    pub service_account: String,
    /// Instance count bounds.
    pub scaling: ScalingBounds,
    /// Containers (exactly one).
    pub containers: Vec<ContainerSpec>,
}

impl RevisionTemplate {
    fn validate(&self) -> Result<()> {
        require_non_empty("service account", &self.service_account)?;
        self.scaling.validate()?;

        if self.containers.len() != 1 {
            return Err(Error::InvalidInput(format!(
                "service template must have exactly one container, found {}",
                self.containers.len()
            )));
        }
        self.containers.iter().try_for_each(ContainerSpec::validate)
    }
}

/// Instance count bounds.
///
/// Only [`ScalingBounds::single_writer`] constructs a value; the storage
/// backend tolerates exactly one writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingBounds {
    min_instance_count: u32,
    max_instance_count: u32,
}

impl ScalingBounds {
    /// Scale-to-zero with at most one instance.
    #[must_use]
    pub const fn single_writer() -> Self {
        Self {
            min_instance_count: MIN_INSTANCE_COUNT,
            max_instance_count: MAX_INSTANCE_COUNT,
        }
    }

    /// Minimum instance count.
    #[must_use]
    pub const fn min_instance_count(&self) -> u32 {
        self.min_instance_count
    }

    /// Maximum instance count.
    #[must_use]
    pub const fn max_instance_count(&self) -> u32 {
        self.max_instance_count
    }

    fn validate(&self) -> Result<()> {
        if *self != Self::single_writer() {
            return Err(Error::InvalidInput(format!(
                "scaling bounds must be min={} max={}, got min={} max={}",
                MIN_INSTANCE_COUNT,
                MAX_INSTANCE_COUNT,
                self.min_instance_count,
                self.max_instance_count
            )));
        }
        Ok(())
    }
}

impl Default for ScalingBounds {
    fn default() -> Self {
        Self::single_writer()
    }
}

/// Traffic routing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTarget {
    /// Percentage of traffic (0-100).
    pub percent: u8,
    /// Route to the latest ready revision.
    pub latest_revision: bool,
}

impl TrafficTarget {
    /// All traffic to the latest revision.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            percent: 100,
            latest_revision: true,
        }
    }
}

// =============================================================================
// Container Specification
// =============================================================================

/// Container inside the revision template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name (RFC 1123 label).
    pub name: String,
    /// Pinned image reference.
    pub image: String,
    /// Entrypoint override.
    pub command: Vec<String>,
    /// Arguments to the entrypoint.
    pub args: Vec<String>,
    /// Environment variables, in declaration order.
    pub env: Vec<EnvVar>,
    /// Exposed ports.
    pub ports: Vec<ContainerPort>,
    /// Resource limits.
    pub resources: ResourceLimits,
    /// Startup probe.
    pub startup_probe: Option<Probe>,
}

impl ContainerSpec {
    fn validate(&self) -> Result<()> {
        validate_name(&self.name, MAX_NAME_LEN)?;
        validate_image_ref(&self.image)?;

        if self.env.len() > MAX_ENV_VARS_PER_CONTAINER {
            return Err(Error::InvalidInput(format!(
                "too many environment variables in container {}: {} (max {})",
                self.name,
                self.env.len(),
                MAX_ENV_VARS_PER_CONTAINER
            )));
        }

        for (i, var) in self.env.iter().enumerate() {
            require_non_empty("env name", &var.name)?;
            if var.value.len() > MAX_ENV_VALUE_LEN {
                return Err(Error::InvalidInput(format!(
                    "env variable {} value exceeds limit of {} bytes",
                    var.name, MAX_ENV_VALUE_LEN
                )));
            }
            if self.env[..i].iter().any(|other| other.name == var.name) {
                return Err(Error::InvalidInput(format!(
                    "duplicate env variable {}",
                    var.name
                )));
            }
        }

        // The platform routes to exactly one port per container.
        if self.ports.len() != 1 {
            return Err(Error::InvalidInput(format!(
                "container {} must expose exactly one port, found {}",
                self.name,
                self.ports.len()
            )));
        }
        let port = &self.ports[0];
        if port.container_port == 0 {
            return Err(Error::InvalidInput("container port cannot be 0".to_string()));
        }

        if let Some(probe) = &self.startup_probe {
            if probe.http_get.port != port.container_port {
                return Err(Error::InvalidInput(format!(
                    "startup probe port {} does not match container port {}",
                    probe.http_get.port, port.container_port
                )));
            }
            if !probe.http_get.path.starts_with('/') {
                return Err(Error::InvalidInput(format!(
                    "startup probe path '{}' must be absolute",
                    probe.http_get.path
                )));
            }
        }

        self.resources.validate()
    }

    /// Returns the value of an environment variable.
    #[must_use]
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }
}

/// Environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Literal value.
    pub value: String,
}

impl EnvVar {
    /// Creates an environment variable.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Container port definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    /// Port name used for protocol identification (`http1` or `h2c`).
    pub name: String,
    /// Port number inside the container.
    pub container_port: u16,
}

/// CPU and memory ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU limit ("1", "2", "500m").
    pub cpu: String,
    /// Memory limit ("512Mi", "1Gi").
    pub memory: String,
    /// Allow CPU throttling when no request is in flight.
    pub cpu_idle: bool,
}

impl ResourceLimits {
    /// Memory limit in bytes (0 if unparseable).
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        parse_memory_string(&self.memory)
    }

    /// CPU limit in millicores (0 if unparseable).
    #[must_use]
    pub fn cpu_millis(&self) -> u64 {
        parse_cpu_string(&self.cpu)
    }

    /// Validates that both limits parse and are within platform bounds.
    pub fn validate(&self) -> Result<()> {
        let memory = self.memory_bytes();
        if memory == 0 || memory > MAX_MEMORY_BYTES {
            return Err(Error::InvalidInput(format!(
                "memory limit '{}' must be between 1 byte and {} bytes",
                self.memory, MAX_MEMORY_BYTES
            )));
        }
        let cpu = self.cpu_millis();
        if cpu == 0 || cpu > MAX_CPU_MILLIS {
            return Err(Error::InvalidInput(format!(
                "cpu limit '{}' must be between 1m and {}m",
                self.cpu, MAX_CPU_MILLIS
            )));
        }
        Ok(())
    }
}

/// Startup probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// HTTP GET action.
    pub http_get: HttpGetAction,
    /// Seconds before the first probe.
    pub initial_delay_seconds: u32,
    /// Seconds between probes.
    pub period_seconds: u32,
    /// Seconds before a probe times out.
    pub timeout_seconds: u32,
    /// Consecutive failures before giving up.
    pub failure_threshold: u32,
}

/// HTTP GET probe action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGetAction {
    /// Request path.
    pub path: String,
    /// Container port.
    pub port: u16,
}

// =============================================================================
// Domain Mapping
// =============================================================================

/// Arguments for mapping a custom domain to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainMappingArgs {
    /// Owning project id.
    pub project: String,
    /// Region of the mapped service.
    pub location: String,
    /// Custom domain, e.g. `vault.example.com`.
    pub domain: String,
    /// Service endpoint host (URI without scheme).
    pub route_target: String,
}

impl DomainMappingArgs {
    fn validate(&self) -> Result<()> {
        require_non_empty("domain mapping project", &self.project)?;
        require_non_empty("domain mapping location", &self.location)?;
        validate_domain(&self.domain)?;
        require_non_empty("domain mapping route target", &self.route_target)?;
        if self.route_target.contains("://") {
            return Err(Error::InvalidInput(format!(
                "route target '{}' must not include a scheme",
                self.route_target
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Resource Parsing Helpers
// =============================================================================

/// Parses Kubernetes-style memory strings to bytes.
fn parse_memory_string(s: &str) -> u64 {
    let s = s.trim();
    if let Some(val) = s.strip_suffix("Gi") {
        val.parse::<u64>()
            .unwrap_or(0)
            .saturating_mul(1024 * 1024 * 1024)
    } else if let Some(val) = s.strip_suffix("Mi") {
        val.parse::<u64>().unwrap_or(0).saturating_mul(1024 * 1024)
    } else if let Some(val) = s.strip_suffix("Ki") {
        val.parse::<u64>().unwrap_or(0).saturating_mul(1024)
    } else if let Some(val) = s.strip_suffix('G') {
        val.parse::<u64>()
            .unwrap_or(0)
            .saturating_mul(1_000_000_000)
    } else if let Some(val) = s.strip_suffix('M') {
        val.parse::<u64>().unwrap_or(0).saturating_mul(1_000_000)
    } else if let Some(val) = s.strip_suffix('K') {
        val.parse::<u64>().unwrap_or(0).saturating_mul(1_000)
    } else {
        s.parse::<u64>().unwrap_or(0)
    }
}

/// Parses Kubernetes-style CPU strings to millicores.
fn parse_cpu_string(s: &str) -> u64 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }
    if let Some(val) = s.strip_suffix('m') {
        val.parse::<u64>().unwrap_or(0)
    } else if let Ok(cores) = s.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millicores = (cores * 1000.0) as u64;
        millicores
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(cpu: &str, memory: &str) -> ResourceLimits {
        ResourceLimits {
            cpu: cpu.to_string(),
            memory: memory.to_string(),
            cpu_idle: true,
        }
    }

    #[test]
    fn test_parse_memory_units() {
        assert_eq!(parse_memory_string("512Mi"), 512 * 1024 * 1024);
        assert_eq!(parse_memory_string("1Gi"), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_string("2G"), 2_000_000_000);
        assert_eq!(parse_memory_string("garbage"), 0);
    }

    #[test]
    fn test_parse_cpu_units() {
        assert_eq!(parse_cpu_string("1"), 1000);
        assert_eq!(parse_cpu_string("500m"), 500);
        assert_eq!(parse_cpu_string("0.5"), 500);
        assert_eq!(parse_cpu_string(""), 0);
    }

    #[test]
    fn test_immutable_changes() {
        let bucket = |location: &str, uniform: bool| {
            ResourceRequest::Bucket(BucketArgs {
                project: "acme-vault".to_string(),
                location: location.to_string(),
                uniform_bucket_level_access: uniform,
            })
        };
        assert!(bucket("US", false).immutable_changes(&bucket("US", true)).is_empty());
        assert_eq!(bucket("EU", true).immutable_changes(&bucket("US", true)), vec!["location"]);

        let key = |ring: &str, rotation: &str| {
            ResourceRequest::CryptoKey(CryptoKeyArgs {
                key_ring: ring.to_string(),
                rotation_period: rotation.to_string(),
                purpose: KeyPurpose::EncryptDecrypt,
            })
        };
        assert!(key("ring-a", "100000s").immutable_changes(&key("ring-a", "200000s")).is_empty());
        assert_eq!(
            key("ring-b", "100000s").immutable_changes(&key("ring-a", "100000s")),
            vec!["key_ring"]
        );

        assert_eq!(
            bucket("US", true).immutable_changes(&key("ring-a", "100000s")),
            vec!["type"]
        );
    }

    #[test]
    fn test_limits_validation() {
        assert!(limits("1", "512Mi").validate().is_ok());
        assert!(limits("0", "512Mi").validate().is_err());
        assert!(limits("1", "lots").validate().is_err());
        assert!(limits("16", "512Mi").validate().is_err());
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("vault.example.com").is_ok());
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("https://vault.example.com").is_err());
        assert!(validate_domain("Vault.example.com").is_err());
        assert!(validate_domain("vault..example.com").is_err());
    }

    #[test]
    fn test_validate_image_ref_requires_pin() {
        assert!(validate_image_ref("hashicorp/vault:1.15.4").is_ok());
        assert!(validate_image_ref("registry:5000/vault@sha256:abc").is_ok());
        assert!(validate_image_ref("hashicorp/vault").is_err());
        assert!(validate_image_ref("registry:5000/vault").is_err());
        assert!(validate_image_ref("vault;rm -rf /:1").is_err());
    }

    #[test]
    fn test_rotation_period_format() {
        assert_eq!(
            format_duration_secs(Duration::from_secs(100_000)),
            "100000s"
        );

        let mut args = CryptoKeyArgs {
            key_ring: "projects/p/locations/global/keyRings/r".to_string(),
            rotation_period: "100000s".to_string(),
            purpose: KeyPurpose::EncryptDecrypt,
        };
        assert!(args.validate().is_ok());
        args.rotation_period = "100000".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_iam_policy_validation() {
        let args = KeyIamPolicyArgs {
            crypto_key_id: "key".to_string(),
            policy: IamPolicy::single("roles/x", "serviceAccount:a@b"),
        };
        assert!(args.validate().is_ok());
        assert!(args.policy.grants("roles/x", "serviceAccount:a@b"));

        let bad = KeyIamPolicyArgs {
            crypto_key_id: "key".to_string(),
            policy: IamPolicy::single("roles/x", "a@b"),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_scaling_bounds_single_writer() {
        let bounds = ScalingBounds::default();
        assert_eq!(bounds.min_instance_count(), 0);
        assert_eq!(bounds.max_instance_count(), 1);
        assert!(bounds.validate().is_ok());
    }

    #[test]
    fn test_deserialized_scaling_bounds_rejected() {
        let bounds: ScalingBounds =
            serde_json::from_str(r#"{"min_instance_count":0,"max_instance_count":3}"#).unwrap();
        assert!(bounds.validate().is_err());
    }
}
