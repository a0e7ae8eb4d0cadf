//! Cluster backends.
//!
//! A backend applies resource specs to a cluster and reports the live
//! objects it materialized. Ordering along dependency edges is enforced by
//! the caller; backends only guarantee idempotent convergence of a single
//! object.

pub mod memory;
#[cfg(feature = "cluster")]
pub mod cluster;

pub use memory::{BackendEvent, EventAction, MemoryBackend};

use crate::config::BackendConfig;
use crate::core::{Labels, Result, Timestamp};
use crate::k8s::{ResourceKind, ResourceSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Backend type identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Simulated API server held in process memory
    Memory,
    /// Kubernetes API server via kubeconfig
    Cluster,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Memory => write!(f, "memory"),
            BackendType::Cluster => write!(f, "cluster"),
        }
    }
}

/// Identity of an object inside the cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of the object a spec describes.
    pub fn of(spec: &ResourceSpec) -> Self {
        Self {
            kind: spec.kind(),
            namespace: spec.metadata.namespace.clone(),
            name: spec.metadata.name.clone(),
        }
    }

    /// Key of a namespace object.
    pub fn namespace(name: &str) -> Self {
        Self {
            kind: ResourceKind::Namespace,
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// What an apply call did to the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOutcome::Created => write!(f, "created"),
            ApplyOutcome::Updated => write!(f, "updated"),
            ApplyOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Server-side view of an object after reconciliation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveObject {
    /// Logical name of the spec this object was applied from
    pub logical_name: String,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    /// Server-assigned uid
    pub uid: String,
    pub resource_version: String,
    pub generation: i64,
    pub created_at: Option<Timestamp>,
    pub labels: Labels,
    pub annotations: BTreeMap<String, String>,
    /// `spec` block with server defaults filled in (null for namespaces)
    pub spec: serde_json::Value,
    /// `status` block
    pub status: serde_json::Value,
}

impl LiveObject {
    /// Key of this object.
    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.kind,
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// Port number of the service port at `index`.
    pub fn service_port(&self, index: usize) -> Option<u16> {
        self.spec
            .get("ports")?
            .get(index)?
            .get("port")?
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
    }

    /// Whether the object has converged far enough for dependents to start.
    ///
    /// - Namespace: phase `Active`
    /// - Deployment: every desired replica updated to the latest template and
    ///   available, for the latest generation
    /// - Service: always, once it exists
    pub fn is_ready(&self) -> bool {
        match self.kind {
            ResourceKind::Namespace => {
                self.status.get("phase").and_then(|p| p.as_str()) == Some("Active")
            }
            ResourceKind::Deployment => {
                let desired = self
                    .spec
                    .get("replicas")
                    .and_then(|r| r.as_i64())
                    .unwrap_or(1);
                let available = self
                    .status
                    .get("availableReplicas")
                    .and_then(|r| r.as_i64())
                    .unwrap_or(0);
                let updated = self
                    .status
                    .get("updatedReplicas")
                    .and_then(|r| r.as_i64())
                    .unwrap_or(0);
                let observed = self
                    .status
                    .get("observedGeneration")
                    .and_then(|g| g.as_i64())
                    .unwrap_or(0);
                available >= desired && updated >= desired && observed >= self.generation
            }
            ResourceKind::Service => true,
        }
    }
}

/// Result of a single apply call.
#[derive(Clone, Debug, PartialEq)]
pub struct Applied {
    pub object: LiveObject,
    pub outcome: ApplyOutcome,
}

/// Core trait for cluster backends.
///
/// Reapplying an identical spec must not create a duplicate object; a
/// changed spec updates the existing object in place.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Create or update the object described by `spec`.
    async fn apply(&self, spec: &ResourceSpec) -> Result<Applied>;

    /// Wait until the object is ready and return its latest state.
    async fn await_ready(&self, object: &LiveObject) -> Result<LiveObject>;

    /// Read an object. Returns None if it does not exist.
    ///
    /// The returned object carries the logical name it was applied under;
    /// objects applied by other tools fall back to their metadata name.
    async fn get(&self, key: &ObjectKey) -> Result<Option<LiveObject>>;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Health check for the backend.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Create a cluster backend from configuration.
pub async fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ClusterBackend>> {
    match config.backend {
        BackendType::Memory => {
            let backend = MemoryBackend::new(config.clone());
            Ok(Arc::new(backend) as Arc<dyn ClusterBackend>)
        }
        BackendType::Cluster => cluster_backend(config).await,
    }
}

#[cfg(feature = "cluster")]
async fn cluster_backend(config: &BackendConfig) -> Result<Arc<dyn ClusterBackend>> {
    let backend = cluster::KubeBackend::connect(config.clone()).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "cluster"))]
async fn cluster_backend(_config: &BackendConfig) -> Result<Arc<dyn ClusterBackend>> {
    Err(crate::core::Error::BackendUnavailable(
        "built without the `cluster` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(kind: ResourceKind, spec: serde_json::Value, status: serde_json::Value) -> LiveObject {
        LiveObject {
            logical_name: "x".to_string(),
            kind,
            name: "x".to_string(),
            namespace: None,
            uid: "uid".to_string(),
            resource_version: "1".to_string(),
            generation: 1,
            created_at: None,
            labels: Labels::new(),
            annotations: BTreeMap::new(),
            spec,
            status,
        }
    }

    #[test]
    fn test_backend_type_display() {
        assert_eq!(BackendType::Memory.to_string(), "memory");
        assert_eq!(BackendType::Cluster.to_string(), "cluster");
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::namespace("demo").to_string(), "Namespace/demo");
    }

    #[test]
    fn test_service_port() {
        let obj = live(
            ResourceKind::Service,
            serde_json::json!({"ports": [{"port": 8081, "targetPort": 8080}]}),
            serde_json::Value::Null,
        );
        assert_eq!(obj.service_port(0), Some(8081));
        assert_eq!(obj.service_port(1), None);
    }

    #[test]
    fn test_deployment_readiness() {
        let spec = serde_json::json!({"replicas": 1});
        let pending = live(
            ResourceKind::Deployment,
            spec.clone(),
            serde_json::json!({"observedGeneration": 1, "availableReplicas": 0}),
        );
        assert!(!pending.is_ready());

        let stale = live(
            ResourceKind::Deployment,
            spec.clone(),
            serde_json::json!({
                "observedGeneration": 0,
                "availableReplicas": 1,
                "updatedReplicas": 1
            }),
        );
        assert!(!stale.is_ready());

        // rolling update: old pods still available, new template not rolled out
        let rolling = live(
            ResourceKind::Deployment,
            spec.clone(),
            serde_json::json!({
                "observedGeneration": 1,
                "availableReplicas": 1,
                "updatedReplicas": 0
            }),
        );
        assert!(!rolling.is_ready());

        let ready = live(
            ResourceKind::Deployment,
            spec,
            serde_json::json!({
                "observedGeneration": 1,
                "availableReplicas": 1,
                "updatedReplicas": 1
            }),
        );
        assert!(ready.is_ready());
    }

    #[test]
    fn test_namespace_readiness() {
        let obj = live(
            ResourceKind::Namespace,
            serde_json::Value::Null,
            serde_json::json!({"phase": "Terminating"}),
        );
        assert!(!obj.is_ready());
    }

    #[tokio::test]
    async fn test_factory_memory() {
        let backend = create_backend(&BackendConfig::memory()).await.unwrap();
        assert_eq!(backend.backend_type(), BackendType::Memory);
        assert!(backend.health_check().await.unwrap());
    }

    #[cfg(not(feature = "cluster"))]
    #[tokio::test]
    async fn test_factory_cluster_without_feature() {
        let err = create_backend(&BackendConfig::cluster()).await.err().unwrap();
        assert!(matches!(err, crate::core::Error::BackendUnavailable(_)));
    }
}
