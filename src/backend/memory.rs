//! In-memory cluster backend.
//!
//! Simulates the parts of an API server the descriptor relies on:
//! namespace existence checks, server-assigned fields, spec-digest based
//! idempotency and readiness. Every apply and readiness report is recorded
//! in an ordered event log.

use crate::backend::{
    Applied, ApplyOutcome, BackendType, ClusterBackend, LiveObject, ObjectKey,
};
use crate::config::BackendConfig;
use crate::core::{now, Error, Result, SpecDigest, Timestamp};
use crate::k8s::{ResourceKind, ResourceSpec};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use tokio::sync::RwLock;

/// Annotation holding the digest of the last applied manifest.
pub const DIGEST_ANNOTATION: &str = "snowflake-emulator/spec-digest";

const NODE_PORT_RANGE: std::ops::RangeInclusive<u16> = 30000..=32767;
/// First address handed out for cluster IPs (10.96.0.10).
const CLUSTER_IP_BASE: u32 = 0x0A60_000A;

/// Kind of backend event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventAction {
    /// An apply call completed
    Applied(ApplyOutcome),
    /// The object reported ready
    Ready,
}

/// Entry in the backend's event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEvent {
    /// Position in the log
    pub seq: u64,
    pub action: EventAction,
    pub logical_name: String,
    pub kind: ResourceKind,
    pub at: Timestamp,
}

#[derive(Default)]
struct ClusterState {
    objects: BTreeMap<ObjectKey, LiveObject>,
    events: Vec<BackendEvent>,
    next_ip: u32,
    node_ports: BTreeSet<u16>,
    rejections: BTreeMap<ResourceKind, String>,
    never_ready: BTreeSet<String>,
}

impl ClusterState {
    fn record(&mut self, action: EventAction, object: &LiveObject) {
        let seq = self.events.len() as u64;
        self.events.push(BackendEvent {
            seq,
            action,
            logical_name: object.logical_name.clone(),
            kind: object.kind,
            at: now(),
        });
    }

    fn allocate_cluster_ip(&mut self) -> String {
        let ip = Ipv4Addr::from(CLUSTER_IP_BASE + self.next_ip);
        self.next_ip += 1;
        ip.to_string()
    }

    fn allocate_node_port(&mut self) -> Result<u16> {
        let capacity = usize::from(NODE_PORT_RANGE.end() - NODE_PORT_RANGE.start()) + 1;
        if self.node_ports.len() >= capacity {
            return Err(Error::Internal("node port range exhausted".to_string()));
        }
        let mut rng = rand::thread_rng();
        loop {
            let port = rng.gen_range(NODE_PORT_RANGE);
            if self.node_ports.insert(port) {
                return Ok(port);
            }
        }
    }

    /// Fill in server-assigned spec fields, keeping those already assigned.
    fn materialize_spec(
        &mut self,
        kind: ResourceKind,
        desired: &serde_json::Value,
        previous: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut spec = desired.clone();
        if kind != ResourceKind::Service {
            return Ok(spec);
        }

        let cluster_ip = match previous.and_then(|p| p.get("clusterIP")) {
            Some(ip) => ip.clone(),
            None => serde_json::json!(self.allocate_cluster_ip()),
        };
        spec["clusterIP"] = cluster_ip;

        let allocates = matches!(
            spec.get("type").and_then(|t| t.as_str()),
            Some("NodePort") | Some("LoadBalancer")
        );
        if allocates {
            if let Some(ports) = spec.get_mut("ports").and_then(|p| p.as_array_mut()) {
                for (i, port) in ports.iter_mut().enumerate() {
                    let existing = previous
                        .and_then(|p| p.get("ports"))
                        .and_then(|p| p.get(i))
                        .and_then(|p| p.get("nodePort"))
                        .cloned();
                    let node_port = match existing {
                        Some(np) => np,
                        None => serde_json::json!(self.allocate_node_port()?),
                    };
                    port["nodePort"] = node_port;
                }
            }
        }
        Ok(spec)
    }
}

fn initial_status(kind: ResourceKind, spec: &serde_json::Value, generation: i64) -> serde_json::Value {
    match kind {
        ResourceKind::Namespace => serde_json::json!({ "phase": "Active" }),
        ResourceKind::Deployment => serde_json::json!({
            "observedGeneration": generation,
            "replicas": spec.get("replicas").cloned().unwrap_or(serde_json::json!(1)),
            "readyReplicas": 0,
            "availableReplicas": 0,
        }),
        ResourceKind::Service => {
            if spec.get("type").and_then(|t| t.as_str()) == Some("LoadBalancer") {
                serde_json::json!({ "loadBalancer": { "ingress": [{ "hostname": "localhost" }] } })
            } else {
                serde_json::json!({ "loadBalancer": {} })
            }
        }
    }
}

/// Simulated API server held in process memory.
pub struct MemoryBackend {
    /// Configuration
    config: BackendConfig,
    /// Objects, event log and injected faults
    state: RwLock<ClusterState>,
}

impl MemoryBackend {
    /// Create an empty in-memory cluster.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ClusterState::default()),
        }
    }

    /// Reject every subsequent apply of `kind` with `message`.
    pub async fn reject(&self, kind: ResourceKind, message: &str) {
        let mut state = self.state.write().await;
        state.rejections.insert(kind, message.to_string());
    }

    /// Never report the object with this logical name as ready.
    pub async fn never_ready(&self, logical_name: &str) {
        let mut state = self.state.write().await;
        state.never_ready.insert(logical_name.to_string());
    }

    /// Remove all injected faults.
    pub async fn clear_faults(&self) {
        let mut state = self.state.write().await;
        state.rejections.clear();
        state.never_ready.clear();
    }

    /// Snapshot of the event log.
    pub async fn events(&self) -> Vec<BackendEvent> {
        self.state.read().await.events.clone()
    }

    /// Number of objects stored.
    pub async fn object_count(&self) -> usize {
        self.state.read().await.objects.len()
    }
}

#[async_trait]
impl ClusterBackend for MemoryBackend {
    async fn apply(&self, spec: &ResourceSpec) -> Result<Applied> {
        let kind = spec.kind();
        let key = ObjectKey::of(spec);
        let mut state = self.state.write().await;

        if let Some(message) = state.rejections.get(&kind) {
            return Err(Error::ResourceRejected {
                resource: spec.logical_name.clone(),
                message: message.clone(),
            });
        }
        if let Some(ns) = &spec.metadata.namespace {
            if !state.objects.contains_key(&ObjectKey::namespace(ns)) {
                return Err(Error::ResourceRejected {
                    resource: spec.logical_name.clone(),
                    message: format!("namespaces \"{}\" not found", ns),
                });
            }
        }

        let manifest = spec.to_manifest();
        let digest = SpecDigest::of(&manifest).to_hex();
        let desired = manifest
            .get("spec")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let previous = state.objects.get(&key).cloned();
        let (object, outcome) = match previous {
            Some(existing) if existing.annotations.get(DIGEST_ANNOTATION) == Some(&digest) => {
                (existing, ApplyOutcome::Unchanged)
            }
            Some(existing) => {
                let generation = existing.generation + 1;
                let live_spec = state.materialize_spec(kind, &desired, Some(&existing.spec))?;
                let version = existing.resource_version.parse::<u64>().unwrap_or(0) + 1;
                let mut annotations = existing.annotations.clone();
                annotations.insert(DIGEST_ANNOTATION.to_string(), digest);
                let object = LiveObject {
                    resource_version: version.to_string(),
                    generation,
                    labels: spec.metadata.labels.clone(),
                    annotations,
                    status: initial_status(kind, &live_spec, generation),
                    spec: live_spec,
                    logical_name: spec.logical_name.clone(),
                    ..existing
                };
                (object, ApplyOutcome::Updated)
            }
            None => {
                let live_spec = state.materialize_spec(kind, &desired, None)?;
                let object = LiveObject {
                    logical_name: spec.logical_name.clone(),
                    kind,
                    name: spec.metadata.name.clone(),
                    namespace: spec.metadata.namespace.clone(),
                    uid: uuid::Uuid::new_v4().to_string(),
                    resource_version: "1".to_string(),
                    generation: 1,
                    created_at: Some(now()),
                    labels: spec.metadata.labels.clone(),
                    annotations: BTreeMap::from([(DIGEST_ANNOTATION.to_string(), digest)]),
                    status: initial_status(kind, &live_spec, 1),
                    spec: live_spec,
                };
                (object, ApplyOutcome::Created)
            }
        };

        state.objects.insert(key, object.clone());
        state.record(EventAction::Applied(outcome), &object);
        tracing::debug!(object = %object.key(), %outcome, "memory backend applied object");

        Ok(Applied { object, outcome })
    }

    async fn await_ready(&self, object: &LiveObject) -> Result<LiveObject> {
        let mut state = self.state.write().await;

        if state.never_ready.contains(&object.logical_name) {
            return Err(Error::ReadinessTimeout {
                resource: object.logical_name.clone(),
                seconds: self.config.readiness_timeout_secs,
            });
        }

        let key = object.key();
        let current = state.objects.get_mut(&key).ok_or_else(|| Error::ResourceRejected {
            resource: object.logical_name.clone(),
            message: format!("{} no longer exists", key),
        })?;

        if current.kind == ResourceKind::Deployment {
            let replicas = current
                .spec
                .get("replicas")
                .cloned()
                .unwrap_or(serde_json::json!(1));
            current.status["readyReplicas"] = replicas.clone();
            current.status["availableReplicas"] = replicas.clone();
            current.status["updatedReplicas"] = replicas;
        }
        let ready = current.clone();

        state.record(EventAction::Ready, &ready);
        Ok(ready)
    }

    async fn get(&self, key: &ObjectKey) -> Result<Option<LiveObject>> {
        let state = self.state.read().await;
        Ok(state.objects.get(key).cloned())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
