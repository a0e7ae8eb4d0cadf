//! Evaluated plan and dependency-ordered submission.

use crate::backend::{ApplyOutcome, ClusterBackend, LiveObject};
use crate::core::{Error, Result};
use crate::graph::{DependencyEdge, DependencyGraph};
use crate::k8s::ResourceSpec;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use tracing::Instrument;

/// Immutable set of resource specs plus their dependency graph.
#[derive(Clone, Debug)]
pub struct Plan {
    specs: Vec<ResourceSpec>,
    graph: DependencyGraph,
}

impl Plan {
    /// Validate the dependency graph of `specs` and build a plan.
    pub fn new(specs: Vec<ResourceSpec>) -> Result<Self> {
        let graph = DependencyGraph::from_specs(&specs)?;
        Ok(Self { specs, graph })
    }

    /// Specs in declaration order.
    pub fn specs(&self) -> &[ResourceSpec] {
        &self.specs
    }

    /// Look up a spec by logical name.
    pub fn spec(&self, logical_name: &str) -> Option<&ResourceSpec> {
        self.specs.iter().find(|s| s.logical_name == logical_name)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Dependency edges.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.graph.edges()
    }

    /// Specs in apply order.
    pub fn ordered(&self) -> Vec<&ResourceSpec> {
        self.graph
            .order()
            .into_iter()
            .filter_map(|name| self.spec(name))
            .collect()
    }

    /// Render every manifest in apply order.
    pub fn render(&self) -> Vec<serde_json::Value> {
        self.ordered().into_iter().map(ResourceSpec::to_manifest).collect()
    }

    /// Apply the plan level by level.
    ///
    /// Resources within a level are applied concurrently; a level starts only
    /// after every resource of the previous level is applied and ready. The
    /// first failure aborts the run. Resources already applied stay in the
    /// cluster.
    pub async fn submit(&self, backend: &dyn ClusterBackend) -> Result<LiveObjects> {
        let span = tracing::info_span!(
            "submit",
            backend = %backend.backend_type(),
            resources = self.specs.len()
        );
        async move {
            let mut live = LiveObjects::default();
            for (depth, level) in self.graph.levels().iter().enumerate() {
                tracing::debug!(depth, resources = ?level, "applying level");
                let applied = try_join_all(level.iter().map(|name| self.apply_one(backend, name)))
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, depth, "submission aborted");
                        e
                    })?;
                for (object, outcome) in applied {
                    live.insert(object, outcome);
                }
            }
            tracing::info!(resources = live.len(), "plan reconciled");
            Ok(live)
        }
        .instrument(span)
        .await
    }

    async fn apply_one(
        &self,
        backend: &dyn ClusterBackend,
        logical_name: &str,
    ) -> Result<(LiveObject, ApplyOutcome)> {
        let spec = self
            .spec(logical_name)
            .ok_or_else(|| Error::Internal(format!("no spec for {}", logical_name)))?;

        let applied = backend.apply(spec).await?;
        tracing::info!(
            resource = %spec.logical_name,
            kind = %spec.kind(),
            outcome = %applied.outcome,
            "applied"
        );

        let ready = backend.await_ready(&applied.object).await?;
        tracing::debug!(resource = %spec.logical_name, "ready");
        Ok((ready, applied.outcome))
    }
}

/// Reconciled objects of a run, keyed by logical name.
#[derive(Clone, Debug, Default)]
pub struct LiveObjects {
    objects: BTreeMap<String, LiveObject>,
    outcomes: BTreeMap<String, ApplyOutcome>,
    /// Logical names in the order they became ready
    order: Vec<String>,
}

impl LiveObjects {
    /// Record a reconciled object.
    pub fn insert(&mut self, object: LiveObject, outcome: ApplyOutcome) {
        let name = object.logical_name.clone();
        if !self.objects.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.outcomes.insert(name.clone(), outcome);
        self.objects.insert(name, object);
    }

    /// Get an object by logical name.
    pub fn get(&self, logical_name: &str) -> Option<&LiveObject> {
        self.objects.get(logical_name)
    }

    /// Apply outcome of an object.
    pub fn outcome(&self, logical_name: &str) -> Option<ApplyOutcome> {
        self.outcomes.get(logical_name).copied()
    }

    /// Objects with their outcomes, in apply order.
    pub fn iter(&self) -> impl Iterator<Item = (&LiveObject, ApplyOutcome)> + '_ {
        self.order.iter().filter_map(|name| {
            let object = self.objects.get(name)?;
            let outcome = self.outcomes.get(name).copied()?;
            Some((object, outcome))
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
