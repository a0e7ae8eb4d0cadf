//! Kubernetes API backend.
//!
//! Applies manifests with server-side apply and polls objects until they
//! report ready. Connection settings come from the ambient kubeconfig or
//! in-cluster service account.

use crate::backend::{Applied, ApplyOutcome, BackendType, ClusterBackend, LiveObject, ObjectKey};
use crate::config::BackendConfig;
use crate::core::{Error, Result};
use crate::k8s::{ResourceKind, ResourceSpec};
use ::kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use ::kube::Client;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};

/// Backend talking to a real API server.
pub struct KubeBackend {
    client: Client,
    config: BackendConfig,
}

impl KubeBackend {
    /// Connect using the default client configuration.
    pub async fn connect(config: BackendConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        tracing::info!(field_manager = %config.field_manager, "connected to Kubernetes API");
        Ok(Self { client, config })
    }

    fn api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = api_resource(kind);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn api_for(&self, key: &ObjectKey) -> Api<DynamicObject> {
        self.api(key.kind, key.namespace.as_deref())
    }
}

/// Annotation recording the logical name an object was applied under.
pub const LOGICAL_NAME_ANNOTATION: &str = "snowflake-emulator/logical-name";

fn api_resource(kind: ResourceKind) -> ApiResource {
    match kind {
        ResourceKind::Namespace => ApiResource::erase::<Namespace>(&()),
        ResourceKind::Deployment => ApiResource::erase::<Deployment>(&()),
        ResourceKind::Service => ApiResource::erase::<Service>(&()),
    }
}

/// Manifest sent with server-side apply, tagged with the logical name.
fn apply_manifest(spec: &ResourceSpec) -> serde_json::Value {
    let mut manifest = spec.to_manifest();
    manifest["metadata"]["annotations"][LOGICAL_NAME_ANNOTATION] =
        serde_json::json!(spec.logical_name);
    manifest
}

/// Server-side apply bumps resourceVersion only when the object changed.
fn apply_outcome(before: Option<&DynamicObject>, after: &DynamicObject) -> ApplyOutcome {
    match before {
        None => ApplyOutcome::Created,
        Some(b) if b.metadata.resource_version == after.metadata.resource_version => {
            ApplyOutcome::Unchanged
        }
        Some(_) => ApplyOutcome::Updated,
    }
}

fn logical_name_of(obj: &DynamicObject) -> Option<String> {
    obj.metadata
        .annotations
        .as_ref()?
        .get(LOGICAL_NAME_ANNOTATION)
        .cloned()
}

fn to_live(logical_name: &str, kind: ResourceKind, obj: DynamicObject) -> LiveObject {
    let meta = obj.metadata;
    LiveObject {
        logical_name: logical_name.to_string(),
        kind,
        name: meta.name.unwrap_or_default(),
        namespace: meta.namespace,
        uid: meta.uid.unwrap_or_default(),
        resource_version: meta.resource_version.unwrap_or_default(),
        generation: meta.generation.unwrap_or(0),
        created_at: meta.creation_timestamp.map(|t| t.0),
        labels: meta.labels.unwrap_or_default(),
        annotations: meta.annotations.unwrap_or_default(),
        spec: obj
            .data
            .get("spec")
            .cloned()
            .unwrap_or(serde_json::Value::Null),
        status: obj
            .data
            .get("status")
            .cloned()
            .unwrap_or(serde_json::Value::Null),
    }
}

fn rejected(resource: &str, err: ::kube::Error) -> Error {
    Error::ResourceRejected {
        resource: resource.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn apply(&self, spec: &ResourceSpec) -> Result<Applied> {
        let key = ObjectKey::of(spec);
        let api = self.api_for(&key);
        let params = PatchParams::apply(&self.config.field_manager).force();

        let before = api
            .get_opt(&key.name)
            .await
            .map_err(|e| rejected(&spec.logical_name, e))?;
        let after = api
            .patch(&key.name, &params, &Patch::Apply(&apply_manifest(spec)))
            .await
            .map_err(|e| rejected(&spec.logical_name, e))?;

        let outcome = apply_outcome(before.as_ref(), &after);
        tracing::debug!(object = %key, %outcome, "server-side apply complete");

        Ok(Applied {
            object: to_live(&spec.logical_name, key.kind, after),
            outcome,
        })
    }

    async fn await_ready(&self, object: &LiveObject) -> Result<LiveObject> {
        if object.is_ready() {
            return Ok(object.clone());
        }

        let api = self.api_for(&object.key());
        let poll = async {
            loop {
                tokio::time::sleep(self.config.poll_interval()).await;
                let current = api.get(&object.name).await?;
                let live = to_live(&object.logical_name, object.kind, current);
                if live.is_ready() {
                    return Ok::<_, Error>(live);
                }
                tracing::debug!(object = %live.key(), status = %live.status, "waiting for readiness");
            }
        };

        match tokio::time::timeout(self.config.readiness_timeout(), poll).await {
            Ok(result) => result,
            Err(_) => Err(Error::ReadinessTimeout {
                resource: object.logical_name.clone(),
                seconds: self.config.readiness_timeout_secs,
            }),
        }
    }

    async fn get(&self, key: &ObjectKey) -> Result<Option<LiveObject>> {
        let obj = self.api_for(key).get_opt(&key.name).await?;
        Ok(obj.map(|o| {
            let logical_name = logical_name_of(&o).unwrap_or_else(|| key.name.clone());
            to_live(&logical_name, key.kind, o)
        }))
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Cluster
    }

    async fn health_check(&self) -> Result<bool> {
        let version = self.client.apiserver_version().await?;
        tracing::debug!(version = %version.git_version, "API server reachable");
        Ok(true)
    }
}
