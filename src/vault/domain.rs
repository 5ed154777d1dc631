//! Optional custom domain mapping and the published URL.

use serde::{Deserialize, Serialize};

use crate::config::DeployConfig;
use crate::engine::Deployment;
use crate::output::Output;
use crate::resources::{
    DnsRecord, DomainMappingArgs, DomainMappingState, ResourceId, ResourceKind, ResourceRequest,
    ServiceState,
};

use super::identity::IdentityHandles;

/// Terminal state of the domain binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DomainBinding {
    /// No domain configured; the service is reached on its generated URI.
    Unmapped {
        /// Generated service URI.
        url: String,
    },
    /// Domain mapped onto the service.
    Mapped {
        /// Custom domain.
        domain: String,
        /// DNS records the operator must publish.
        records: Vec<DnsRecord>,
    },
}

impl DomainBinding {
    /// The externally reachable URL.
    #[must_use]
    pub fn published_url(&self) -> String {
        match self {
            Self::Mapped { domain, .. } => format!("https://{domain}"),
            Self::Unmapped { url } => url.clone(),
        }
    }
}

/// Strips the scheme from a URI: `https://host/path` becomes `host/path`.
#[must_use]
pub fn strip_scheme(uri: &str) -> &str {
    uri.split_once("://").map_or(uri, |(_, rest)| rest)
}

/// Maps the configured domain onto the service. Creates nothing when no
/// domain is configured.
pub fn bind(
    deployment: &Deployment,
    config: &DeployConfig,
    identity: &IdentityHandles,
    service: &Output<ServiceState>,
) -> Output<DomainBinding> {
    let Some(domain) = config.domain().map(str::to_string) else {
        return service.map(|service| DomainBinding::Unmapped { url: service.uri });
    };

    let region = config.region.clone();
    let id = ResourceId::new(ResourceKind::DomainMapping, &domain);
    let request = identity.project.zip(service).map(move |(project, service)| {
        ResourceRequest::DomainMapping(DomainMappingArgs {
            project: project.project_id,
            location: region,
            domain,
            route_target: strip_scheme(&service.uri).trim_end_matches('/').to_string(),
        })
    });

    let mapping: Output<DomainMappingState> = deployment.register(id, request);
    mapping.map(|mapping| DomainBinding::Mapped {
        domain: mapping.domain,
        records: mapping.records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("https://vault-abc.a.run.app"), "vault-abc.a.run.app");
        assert_eq!(strip_scheme("http://host:8200"), "host:8200");
        assert_eq!(strip_scheme("vault-abc.a.run.app"), "vault-abc.a.run.app");
    }

    #[test]
    fn test_published_url() {
        let mapped = DomainBinding::Mapped {
            domain: "vault.example.com".to_string(),
            records: Vec::new(),
        };
        assert_eq!(mapped.published_url(), "https://vault.example.com");

        let unmapped = DomainBinding::Unmapped {
            url: "https://vault-abc-123.us-east1.run.app".to_string(),
        };
        assert_eq!(unmapped.published_url(), "https://vault-abc-123.us-east1.run.app");
    }
}
