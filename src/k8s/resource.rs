//! Resource specifications.
//!
//! A `ResourceSpec` is the desired state of one cluster object. It is built
//! once by the descriptor and never mutated afterwards.

use crate::core::Labels;
use crate::k8s::deployment::DeploymentSpec;
use crate::k8s::service::ServiceSpec;
use serde::{Deserialize, Serialize};

/// Kind of cluster object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Namespace,
    Deployment,
    Service,
}

impl ResourceKind {
    /// API group/version the kind is served under.
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::Namespace | ResourceKind::Service => "v1",
            ResourceKind::Deployment => "apps/v1",
        }
    }

    /// Whether objects of this kind live inside a namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::Namespace)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Namespace => write!(f, "Namespace"),
            ResourceKind::Deployment => write!(f, "Deployment"),
            ResourceKind::Service => write!(f, "Service"),
        }
    }
}

/// Object metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name
    pub name: String,
    /// Namespace (None for cluster-scoped kinds)
    pub namespace: Option<String>,
    /// Labels
    pub labels: Labels,
}

impl ObjectMeta {
    fn to_json(&self) -> serde_json::Value {
        let mut meta = serde_json::json!({ "name": self.name });
        if let Some(ns) = &self.namespace {
            meta["namespace"] = serde_json::json!(ns);
        }
        if !self.labels.is_empty() {
            meta["labels"] = serde_json::json!(self.labels);
        }
        meta
    }
}

/// Handle to a built spec, passed to builders of dependent resources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    pub labels: Labels,
}

/// Kind-specific body of a spec.
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceBody {
    Namespace,
    Deployment(DeploymentSpec),
    Service(ServiceSpec),
}

/// Desired state of a single cluster object.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSpec {
    /// Identity of the resource within a run
    pub logical_name: String,
    /// Object metadata
    pub metadata: ObjectMeta,
    /// Kind-specific spec block
    pub body: ResourceBody,
    /// Logical names of resources that must be ready first
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    /// Get the object kind.
    pub fn kind(&self) -> ResourceKind {
        match self.body {
            ResourceBody::Namespace => ResourceKind::Namespace,
            ResourceBody::Deployment(_) => ResourceKind::Deployment,
            ResourceBody::Service(_) => ResourceKind::Service,
        }
    }

    /// Get a reference for use by dependent builders.
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            logical_name: self.logical_name.clone(),
            kind: self.kind(),
            name: self.metadata.name.clone(),
            namespace: self.metadata.namespace.clone(),
            labels: self.metadata.labels.clone(),
        }
    }

    /// Get the deployment body, if this is a deployment.
    pub fn as_deployment(&self) -> Option<&DeploymentSpec> {
        match &self.body {
            ResourceBody::Deployment(d) => Some(d),
            _ => None,
        }
    }

    /// Get the service body, if this is a service.
    pub fn as_service(&self) -> Option<&ServiceSpec> {
        match &self.body {
            ResourceBody::Service(s) => Some(s),
            _ => None,
        }
    }

    /// Render the Kubernetes manifest.
    pub fn to_manifest(&self) -> serde_json::Value {
        let kind = self.kind();
        let mut manifest = serde_json::json!({
            "apiVersion": kind.api_version(),
            "kind": kind.to_string(),
            "metadata": self.metadata.to_json(),
        });
        match &self.body {
            ResourceBody::Namespace => {}
            ResourceBody::Deployment(d) => manifest["spec"] = d.to_json(),
            ResourceBody::Service(s) => manifest["spec"] = s.to_json(),
        }
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels;

    fn namespace_spec() -> ResourceSpec {
        ResourceSpec {
            logical_name: "ns".to_string(),
            metadata: ObjectMeta {
                name: "demo".to_string(),
                namespace: None,
                labels: Labels::new(),
            },
            body: ResourceBody::Namespace,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn test_kind_api_version() {
        assert_eq!(ResourceKind::Namespace.api_version(), "v1");
        assert_eq!(ResourceKind::Deployment.api_version(), "apps/v1");
        assert!(!ResourceKind::Namespace.is_namespaced());
        assert!(ResourceKind::Service.is_namespaced());
    }

    #[test]
    fn test_namespace_manifest_omits_empty_fields() {
        let manifest = namespace_spec().to_manifest();
        assert_eq!(manifest["kind"], "Namespace");
        assert_eq!(manifest["metadata"]["name"], "demo");
        assert!(manifest["metadata"].get("namespace").is_none());
        assert!(manifest["metadata"].get("labels").is_none());
        assert!(manifest.get("spec").is_none());
    }

    #[test]
    fn test_reference_carries_labels() {
        let mut spec = namespace_spec();
        spec.metadata.labels = labels([("app", "demo")]);
        let r = spec.reference();
        assert_eq!(r.kind, ResourceKind::Namespace);
        assert_eq!(r.labels, labels([("app", "demo")]));
    }
}
