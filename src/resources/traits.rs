//! Resource provider trait definition.
//!
//! This module defines the `ResourceProvider` trait - the typed request
//! surface toward the cloud provider.

use super::{ProjectInfo, ResourceId, ResourceRecord, ResourceRequest, ServiceAccount};
use crate::error::Result;
use async_trait::async_trait;

/// Typed create/read/update/delete surface of a cloud provider.
///
/// The provider owns resource lifecycle; the deployment engine decides
/// *which* call to make by comparing the desired request with
/// [`ResourceProvider::read`]:
///
/// | Recorded | Request changed | Call |
/// |----------|-----------------|------|
/// | no | - | `create` |
/// | yes | no | none (adopt) |
/// | yes | yes, update-in-place kind | `update` |
/// | yes | yes, delete-before-replace kind | `delete` then `create` |
///
/// # Errors
///
/// Rejections are reported verbatim in the error's `reason`. The engine
/// does not retry; retry and backoff, if any, belong to the provider.
///
/// # Thread Safety
///
/// Independent resources are provisioned concurrently, so implementations
/// must be `Send + Sync` and tolerate concurrent calls for different ids.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns the provider name (for logs).
    fn name(&self) -> &str;

    /// Resolves the target project.
    ///
    /// With `requested = None` the provider's ambient project is used.
    ///
    /// # Errors
    ///
    /// `Error::IdentityResolution` if no project is configured or the
    /// project is not accessible.
    async fn project(&self, requested: Option<&str>) -> Result<ProjectInfo>;

    /// Resolves the default compute identity of a project.
    async fn default_service_account(&self, project: &ProjectInfo) -> Result<ServiceAccount>;

    /// Returns the record of an existing resource, if any.
    async fn read(&self, id: &ResourceId) -> Result<Option<ResourceRecord>>;

    /// Creates a resource.
    ///
    /// # Errors
    ///
    /// - `Error::ResourceCreationFailed` on rejection (quota, naming
    ///   conflict, permission)
    /// - `Error::PolicyBindingFailed` when an IAM policy is rejected
    async fn create(&self, id: &ResourceId, request: &ResourceRequest) -> Result<ResourceRecord>;

    /// Applies a changed request to an existing resource.
    async fn update(&self, id: &ResourceId, request: &ResourceRequest) -> Result<ResourceRecord>;

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// - `Error::ResourceNotFound` if the resource does not exist
    /// - `Error::ResourceDeleteFailed` on rejection
    async fn delete(&self, id: &ResourceId) -> Result<()>;

    /// Lists every resource the provider has recorded.
    async fn list(&self) -> Result<Vec<ResourceRecord>>;
}
