//! Kubernetes service configuration.
//!
//! Builds the internal ClusterIP service and the external LoadBalancer.

use crate::core::Labels;
use crate::k8s::resource::{ObjectMeta, ResourceBody, ResourceRef, ResourceSpec};
use crate::k8s::{
    EXTERNAL_LOGICAL_NAME, EXTERNAL_PORT, EXTERNAL_SERVICE_NAME, HTTP_PORT, SERVICE_NAME,
};
use serde::{Deserialize, Serialize};

/// Service type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    /// Cluster-internal IP
    ClusterIP,
    /// Node port
    NodePort,
    /// Cloud load balancer
    LoadBalancer,
}

impl ServiceType {
    /// Whether the backend allocates a node port for this type.
    pub fn allocates_node_port(&self) -> bool {
        matches!(self, ServiceType::NodePort | ServiceType::LoadBalancer)
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ClusterIP => write!(f, "ClusterIP"),
            ServiceType::NodePort => write!(f, "NodePort"),
            ServiceType::LoadBalancer => write!(f, "LoadBalancer"),
        }
    }
}

/// Service port configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    /// Port name
    pub name: String,
    /// Service port
    pub port: u16,
    /// Target port on pods
    pub target_port: u16,
    /// Protocol
    pub protocol: String,
}

impl ServicePort {
    /// TCP port named `http`.
    pub fn http(port: u16, target_port: u16) -> Self {
        Self {
            name: "http".to_string(),
            port,
            target_port,
            protocol: "TCP".to_string(),
        }
    }
}

/// Service spec block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service type
    pub service_type: ServiceType,
    /// Selector labels
    pub selector: Labels,
    /// Service ports
    pub ports: Vec<ServicePort>,
}

impl ServiceSpec {
    /// Render the `spec` block of the manifest.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.service_type.to_string(),
            "selector": self.selector,
            "ports": self.ports.iter().map(|p| serde_json::json!({
                "name": p.name,
                "port": p.port,
                "targetPort": p.target_port,
                "protocol": p.protocol,
            })).collect::<Vec<_>>(),
        })
    }
}

fn service(
    logical_name: &str,
    name: &str,
    service_type: ServiceType,
    port: ServicePort,
    namespace: &ResourceRef,
    deployment: &ResourceRef,
) -> ResourceSpec {
    ResourceSpec {
        logical_name: logical_name.to_string(),
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: Some(namespace.name.clone()),
            labels: deployment.labels.clone(),
        },
        body: ResourceBody::Service(ServiceSpec {
            service_type,
            selector: deployment.labels.clone(),
            ports: vec![port],
        }),
        depends_on: vec![deployment.logical_name.clone()],
    }
}

/// Build the internal ClusterIP service selecting the deployment's pods.
pub fn build_service_spec(namespace: &ResourceRef, deployment: &ResourceRef) -> ResourceSpec {
    service(
        SERVICE_NAME,
        SERVICE_NAME,
        ServiceType::ClusterIP,
        ServicePort::http(HTTP_PORT, HTTP_PORT),
        namespace,
        deployment,
    )
}

/// Build the LoadBalancer service that exposes the emulator on 8081.
pub fn build_external_service_spec(
    namespace: &ResourceRef,
    deployment: &ResourceRef,
) -> ResourceSpec {
    service(
        EXTERNAL_LOGICAL_NAME,
        EXTERNAL_SERVICE_NAME,
        ServiceType::LoadBalancer,
        ServicePort::http(EXTERNAL_PORT, HTTP_PORT),
        namespace,
        deployment,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulatorConfig;
    use crate::k8s::deployment::build_deployment_spec;
    use crate::k8s::namespace::build_namespace_spec;

    fn refs() -> (ResourceRef, ResourceRef) {
        let ns = build_namespace_spec().reference();
        let deploy = build_deployment_spec(&EmulatorConfig::default(), &ns).reference();
        (ns, deploy)
    }

    #[test]
    fn test_cluster_ip_service() {
        let (ns, deploy) = refs();
        let spec = build_service_spec(&ns, &deploy);
        let svc = spec.as_service().unwrap();

        assert_eq!(spec.metadata.name, "snowflake-emulator-service");
        assert_eq!(svc.service_type, ServiceType::ClusterIP);
        assert_eq!(svc.ports, vec![ServicePort::http(8080, 8080)]);
        assert_eq!(svc.selector, deploy.labels);
        assert_eq!(spec.depends_on, vec![deploy.logical_name.clone()]);
    }

    #[test]
    fn test_load_balancer_service() {
        let (ns, deploy) = refs();
        let spec = build_external_service_spec(&ns, &deploy);
        let svc = spec.as_service().unwrap();

        assert_eq!(spec.logical_name, "snowflake-emulator-lb");
        assert_eq!(spec.metadata.name, "snowflake-emulator-external");
        assert_eq!(svc.service_type, ServiceType::LoadBalancer);
        assert_eq!(svc.ports[0].port, 8081);
        assert_eq!(svc.ports[0].target_port, 8080);
        assert_eq!(spec.depends_on, vec!["snowflake-emulator-deployment".to_string()]);
    }

    #[test]
    fn test_manifest() {
        let (ns, deploy) = refs();
        let manifest = build_external_service_spec(&ns, &deploy).to_manifest();
        assert_eq!(manifest["apiVersion"], "v1");
        assert_eq!(manifest["kind"], "Service");
        assert_eq!(manifest["metadata"]["namespace"], "snowflake-emulator");
        assert_eq!(manifest["spec"]["type"], "LoadBalancer");
        assert_eq!(manifest["spec"]["ports"][0]["protocol"], "TCP");
        assert_eq!(manifest["spec"]["selector"]["app"], "snowflake-emulator");
    }

    #[test]
    fn test_node_port_allocation() {
        assert!(!ServiceType::ClusterIP.allocates_node_port());
        assert!(ServiceType::LoadBalancer.allocates_node_port());
    }
}
