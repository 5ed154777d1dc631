//! Managed compute service running the Vault server.

use crate::config::DeployConfig;
use crate::constants::{
    ENV_GOOGLE_PROJECT, ENV_SKIP_SETCAP, ENV_VAULT_ADDR, ENV_VAULT_LOCAL_CONFIG,
    STARTUP_PROBE_FAILURE_THRESHOLD, STARTUP_PROBE_INITIAL_DELAY, STARTUP_PROBE_PATH,
    STARTUP_PROBE_PERIOD, STARTUP_PROBE_TIMEOUT, VAULT_ARGS, VAULT_CONTAINER_NAME,
    VAULT_ENTRYPOINT, VAULT_LOCAL_ADDR, VAULT_PORT, VAULT_PORT_NAME,
};
use crate::engine::Deployment;
use crate::output::Output;
use crate::resources::{
    ContainerPort, ContainerSpec, EnvVar, HttpGetAction, KeyIamPolicyState, Probe, ProjectInfo,
    ResourceId, ResourceKind, ResourceRequest, RevisionTemplate, ScalingBounds, ServiceAccount,
    ServiceSpec, ServiceState, TrafficTarget,
};

use super::identity::IdentityHandles;

#[allow(clippy::cast_possible_truncation)]
fn secs(duration: std::time::Duration) -> u32 {
    duration.as_secs() as u32
}

/// Builds the service specification.
///
/// Scaling is always [`ScalingBounds::single_writer`]; the configuration
/// has no knob for it.
#[must_use]
pub fn build_spec(
    config: &DeployConfig,
    project: &ProjectInfo,
    account: &ServiceAccount,
    server_config: String,
) -> ServiceSpec {
    let container = ContainerSpec {
        name: VAULT_CONTAINER_NAME.to_string(),
        image: config.image.clone(),
        command: vec![VAULT_ENTRYPOINT.to_string()],
        args: VAULT_ARGS.iter().map(|a| (*a).to_string()).collect(),
        env: vec![
            EnvVar::new(ENV_GOOGLE_PROJECT, &project.project_id),
            EnvVar::new(ENV_SKIP_SETCAP, "true"),
            EnvVar::new(ENV_VAULT_ADDR, VAULT_LOCAL_ADDR),
            EnvVar::new(ENV_VAULT_LOCAL_CONFIG, server_config),
        ],
        ports: vec![ContainerPort {
            name: VAULT_PORT_NAME.to_string(),
            container_port: VAULT_PORT,
        }],
        resources: config.resource_limits(),
        startup_probe: Some(Probe {
            http_get: HttpGetAction {
                path: STARTUP_PROBE_PATH.to_string(),
                port: VAULT_PORT,
            },
            initial_delay_seconds: secs(STARTUP_PROBE_INITIAL_DELAY),
            period_seconds: secs(STARTUP_PROBE_PERIOD),
            timeout_seconds: secs(STARTUP_PROBE_TIMEOUT),
            failure_threshold: STARTUP_PROBE_FAILURE_THRESHOLD,
        }),
    };

    ServiceSpec {
        project: project.project_id.clone(),
        location: config.region.clone(),
        template: RevisionTemplate {
            service_account: account.email.clone(),
            scaling: ScalingBounds::single_writer(),
            containers: vec![container],
        },
        traffic: vec![TrafficTarget::latest()],
    }
}

/// Submits the service once the configuration blob is ready and the key
/// binding has been applied.
pub fn provision(
    deployment: &Deployment,
    config: &DeployConfig,
    identity: &IdentityHandles,
    server_config: &Output<String>,
    binding: &Output<KeyIamPolicyState>,
) -> Output<ServiceState> {
    let id = ResourceId::new(ResourceKind::Service, &config.service_name);
    let config = config.clone();
    let request = identity
        .project
        .zip(&identity.service_account)
        .zip(server_config)
        .after(binding)
        .map(move |((project, account), blob)| {
            ResourceRequest::Service(build_spec(&config, &project, &account, blob))
        });

    deployment.register(id, request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectInfo {
        ProjectInfo {
            project_id: "acme-vault".to_string(),
            project_number: "123456789012".to_string(),
            self_link: "https://cloudresourcemanager.googleapis.com/v1/projects/acme-vault"
                .to_string(),
        }
    }

    fn account() -> ServiceAccount {
        ServiceAccount {
            email: "123456789012-compute@developer.gserviceaccount.com".to_string(),
        }
    }

    #[test]
    fn test_spec_shape() {
        let spec = build_spec(&DeployConfig::default(), &project(), &account(), "{}".to_string());
        spec.validate().unwrap();

        assert_eq!(spec.location, "us-east1");
        assert_eq!(spec.template.scaling.min_instance_count(), 0);
        assert_eq!(spec.template.scaling.max_instance_count(), 1);
        assert_eq!(spec.template.service_account, account().email);
        assert_eq!(spec.traffic, vec![TrafficTarget::latest()]);

        let container = spec.container().unwrap();
        assert_eq!(container.image, "hashicorp/vault:1.15.4");
        assert_eq!(container.command, vec!["docker-entrypoint.sh"]);
        assert_eq!(container.args, vec!["server"]);
        assert_eq!(container.ports[0].name, "http1");
        assert_eq!(container.ports[0].container_port, 8200);
        assert_eq!(container.resources.cpu, "1");
        assert_eq!(container.resources.memory, "512Mi");
        assert!(container.resources.cpu_idle);

        let probe = container.startup_probe.as_ref().unwrap();
        assert_eq!(probe.http_get.path, "/");
        assert_eq!(probe.http_get.port, 8200);
    }

    #[test]
    fn test_env_order_and_values() {
        let spec = build_spec(
            &DeployConfig::default(),
            &project(),
            &account(),
            r#"{"ui":true}"#.to_string(),
        );
        let container = spec.container().unwrap();
        let names: Vec<&str> = container.env.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["GOOGLE_PROJECT", "SKIP_SETCAP", "VAULT_ADDR", "VAULT_LOCAL_CONFIG"]
        );
        assert_eq!(container.env_value("GOOGLE_PROJECT"), Some("acme-vault"));
        assert_eq!(container.env_value("SKIP_SETCAP"), Some("true"));
        assert_eq!(container.env_value("VAULT_LOCAL_CONFIG"), Some(r#"{"ui":true}"#));
    }

    #[test]
    fn test_configured_limits_flow_into_spec() {
        let mut config = DeployConfig::default();
        config.limits.memory = "1Gi".to_string();
        config.limits.cpu_idle = false;
        let spec = build_spec(&config, &project(), &account(), "{}".to_string());
        let container = spec.container().unwrap();
        assert_eq!(container.resources.memory, "1Gi");
        assert!(!container.resources.cpu_idle);
    }
}
