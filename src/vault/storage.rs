//! Storage bucket for the Vault backend.

use crate::config::DeployConfig;
use crate::constants::BUCKET_LOCATION;
use crate::engine::Deployment;
use crate::output::Output;
use crate::resources::{BucketArgs, BucketState, ResourceId, ResourceKind, ResourceRequest};

use super::identity::IdentityHandles;

/// Creates (or adopts) the single bucket holding Vault's data.
pub fn provision(
    deployment: &Deployment,
    config: &DeployConfig,
    identity: &IdentityHandles,
) -> Output<BucketState> {
    let request = identity.project.map(|project| {
        ResourceRequest::Bucket(BucketArgs {
            project: project.project_id,
            location: BUCKET_LOCATION.to_string(),
            uniform_bucket_level_access: true,
        })
    });

    deployment.register(ResourceId::new(ResourceKind::Bucket, &config.bucket_name), request)
}
