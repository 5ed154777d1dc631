//! # Resource Model
//!
//! Typed create-requests, resource records, and the provider seam.
//!
//! ```text
//!   ResourceRequest ──▶ ResourceProvider ──▶ ResourceRecord
//!   (desired inputs)     create / update      (applied inputs
//!                        delete / read         + typed outputs)
//! ```
//!
//! A record keeps the request it was created from. Comparing that request
//! with the desired one is how a re-run decides between adopting the
//! resource unchanged, updating it in place, or replacing it.

mod spec;
mod state;
mod traits;

pub use spec::{
    BucketArgs,
    ContainerPort,
    ContainerSpec,
    CryptoKeyArgs,
    DomainMappingArgs,
    EnvVar,
    HttpGetAction,
    IamBinding,
    IamPolicy,
    KeyIamPolicyArgs,
    KeyPurpose,
    KeyRingArgs,
    // Constants
    MAX_DOMAIN_LEN,
    MAX_ENV_VALUE_LEN,
    MAX_ENV_VARS_PER_CONTAINER,
    MAX_NAME_LEN,
    Probe,
    ResourceLimits,
    ResourceRequest,
    RevisionTemplate,
    ScalingBounds,
    ServiceSpec,
    TrafficTarget,
    format_duration_secs,
    validate_domain,
    validate_image_ref,
    validate_name,
};
pub use state::{
    BucketState, CryptoKeyState, DnsRecord, DomainMappingState, KeyIamPolicyState, KeyRingState,
    ProjectInfo, ReplacePolicy, ResourceId, ResourceKind, ResourceOutputs, ResourceRecord,
    ServiceAccount, ServiceState,
};
pub use traits::ResourceProvider;
