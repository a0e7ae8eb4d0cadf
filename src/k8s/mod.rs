//! Kubernetes Module
//!
//! Resource specifications for the emulator:
//! - Namespace
//! - Deployment
//! - ClusterIP and LoadBalancer services

pub mod deployment;
pub mod namespace;
pub mod resource;
pub mod service;

use crate::core::{labels, Labels};

pub use deployment::{build_deployment_spec, ContainerSpec, DeploymentSpec, Probe};
pub use namespace::build_namespace_spec;
pub use resource::{ObjectMeta, ResourceBody, ResourceKind, ResourceRef, ResourceSpec};
pub use service::{build_external_service_spec, build_service_spec, ServiceSpec, ServiceType};

/// Application name, used for labels and the container name.
pub const APP_NAME: &str = "snowflake-emulator";

pub const NAMESPACE_LOGICAL_NAME: &str = "snowflake-emulator-ns";
pub const NAMESPACE_NAME: &str = "snowflake-emulator";
pub const DEPLOYMENT_NAME: &str = "snowflake-emulator-deployment";
pub const SERVICE_NAME: &str = "snowflake-emulator-service";
pub const EXTERNAL_LOGICAL_NAME: &str = "snowflake-emulator-lb";
pub const EXTERNAL_SERVICE_NAME: &str = "snowflake-emulator-external";

/// Port the emulator listens on inside the pod.
pub const HTTP_PORT: u16 = 8080;
/// Port exposed by the LoadBalancer service.
pub const EXTERNAL_PORT: u16 = 8081;
pub const HEALTH_PATH: &str = "/health";

/// Labels shared by the deployment, its pods and both services.
pub fn app_labels() -> Labels {
    labels([("app", APP_NAME)])
}
