//! Kubernetes deployment configuration.
//!
//! Builds the emulator's Deployment spec.

use crate::config::EmulatorConfig;
use crate::core::Labels;
use crate::k8s::resource::{ObjectMeta, ResourceBody, ResourceRef, ResourceSpec};
use crate::k8s::{app_labels, APP_NAME, DEPLOYMENT_NAME, HEALTH_PATH, HTTP_PORT};
use serde::{Deserialize, Serialize};

/// Container specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,
    /// Container image
    pub image: String,
    /// Image pull policy, passed through uninterpreted
    pub image_pull_policy: String,
    /// Ports to expose
    pub ports: Vec<ContainerPort>,
    /// Environment variables, in declaration order
    pub env: Vec<EnvVar>,
    /// Resource requests and limits
    pub resources: ResourceRequirements,
    /// Liveness probe
    pub liveness_probe: Option<Probe>,
    /// Readiness probe
    pub readiness_probe: Option<Probe>,
}

impl ContainerSpec {
    /// The emulator container for a given configuration.
    pub fn emulator(config: &EmulatorConfig) -> Self {
        Self {
            name: APP_NAME.to_string(),
            image: config.image_name.clone(),
            image_pull_policy: config.image_pull_policy.clone(),
            ports: vec![ContainerPort {
                name: "http".to_string(),
                container_port: HTTP_PORT,
            }],
            env: vec![
                EnvVar::new("PORT", &HTTP_PORT.to_string()),
                EnvVar::new("DB_PATH", ":memory:"),
                EnvVar::new("STAGE_DIR", "/app/stages"),
            ],
            resources: ResourceRequirements::default(),
            liveness_probe: Some(Probe::http(HEALTH_PATH, HTTP_PORT, 30, 10)),
            readiness_probe: Some(Probe::http(HEALTH_PATH, HTTP_PORT, 5, 5)),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut container = serde_json::json!({
            "name": self.name,
            "image": self.image,
            "imagePullPolicy": self.image_pull_policy,
            "ports": self.ports.iter().map(|p| serde_json::json!({
                "containerPort": p.container_port,
                "name": p.name,
            })).collect::<Vec<_>>(),
            "env": self.env.iter()
                .map(|e| serde_json::json!({"name": e.name, "value": e.value}))
                .collect::<Vec<_>>(),
            "resources": {
                "requests": {
                    "cpu": self.resources.cpu_request,
                    "memory": self.resources.memory_request,
                },
                "limits": {
                    "cpu": self.resources.cpu_limit,
                    "memory": self.resources.memory_limit,
                },
            },
        });
        if let Some(probe) = &self.liveness_probe {
            container["livenessProbe"] = probe.to_json();
        }
        if let Some(probe) = &self.readiness_probe {
            container["readinessProbe"] = probe.to_json();
        }
        container
    }
}

/// Environment variable with a literal value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    /// Create an environment variable.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Resource requirements for a container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// CPU request (e.g., "100m")
    pub cpu_request: String,
    /// CPU limit
    pub cpu_limit: String,
    /// Memory request (e.g., "128Mi")
    pub memory_request: String,
    /// Memory limit
    pub memory_limit: String,
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            cpu_limit: "500m".to_string(),
            memory_request: "128Mi".to_string(),
            memory_limit: "512Mi".to_string(),
        }
    }
}

/// Container port configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    /// Port name
    pub name: String,
    /// Port number
    pub container_port: u16,
}

/// HTTP GET health probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Request path
    pub path: String,
    /// Port for probe
    pub port: u16,
    /// Initial delay seconds
    pub initial_delay_seconds: u32,
    /// Period seconds
    pub period_seconds: u32,
}

impl Probe {
    /// Create an HTTP probe.
    pub fn http(path: &str, port: u16, initial_delay: u32, period: u32) -> Self {
        Self {
            path: path.to_string(),
            port,
            initial_delay_seconds: initial_delay,
            period_seconds: period,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "httpGet": {
                "path": self.path,
                "port": self.port,
            },
            "initialDelaySeconds": self.initial_delay_seconds,
            "periodSeconds": self.period_seconds,
        })
    }
}

/// Deployment spec block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Number of replicas
    pub replicas: u32,
    /// Selector match labels
    pub selector: Labels,
    /// Pod template labels
    pub template_labels: Labels,
    /// Pod containers
    pub containers: Vec<ContainerSpec>,
}

impl DeploymentSpec {
    /// Render the `spec` block of the manifest.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "replicas": self.replicas,
            "selector": {
                "matchLabels": self.selector,
            },
            "template": {
                "metadata": {
                    "labels": self.template_labels,
                },
                "spec": {
                    "containers": self.containers.iter()
                        .map(ContainerSpec::to_json)
                        .collect::<Vec<_>>(),
                },
            },
        })
    }
}

/// Build the emulator Deployment inside `namespace`.
pub fn build_deployment_spec(config: &EmulatorConfig, namespace: &ResourceRef) -> ResourceSpec {
    let labels = app_labels();
    ResourceSpec {
        logical_name: DEPLOYMENT_NAME.to_string(),
        metadata: ObjectMeta {
            name: DEPLOYMENT_NAME.to_string(),
            namespace: Some(namespace.name.clone()),
            labels: labels.clone(),
        },
        body: ResourceBody::Deployment(DeploymentSpec {
            replicas: 1,
            selector: labels.clone(),
            template_labels: labels,
            containers: vec![ContainerSpec::emulator(config)],
        }),
        depends_on: vec![namespace.logical_name.clone()],
    }
}
