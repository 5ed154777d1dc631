//! Project and default compute identity lookup.

use crate::config::DeployConfig;
use crate::engine::Deployment;
use crate::output::Output;
use crate::resources::{ProjectInfo, ServiceAccount};

/// Handles to the resolved project and service identity.
///
/// Read-only: later stages reference these attributes but never mutate
/// them.
#[derive(Debug, Clone)]
pub struct IdentityHandles {
    /// Resolved project.
    pub project: Output<ProjectInfo>,
    /// Default compute identity of the project.
    pub service_account: Output<ServiceAccount>,
}

/// Resolves the target project and its default compute identity.
///
/// Fails with `Error::IdentityResolution` when no project is configured
/// and the provider has no ambient project. There is no retry.
pub fn resolve(deployment: &Deployment, config: &DeployConfig) -> IdentityHandles {
    let requested = config.project.clone();
    let project = deployment.invoke("project", move |provider| async move {
        provider.project(requested.as_deref()).await
    });

    let lookup = project.clone();
    let service_account = deployment.invoke("service-account", move |provider| async move {
        let project = lookup.resolve().await?;
        provider.default_service_account(&project).await
    });

    IdentityHandles {
        project,
        service_account,
    }
}
