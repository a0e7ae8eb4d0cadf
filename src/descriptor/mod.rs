//! Deployment descriptor evaluator.
//!
//! Two phases: [`Descriptor::evaluate`] builds an immutable [`Plan`] from
//! configuration without touching the cluster; [`Plan::submit`] applies it
//! through a backend and yields the live objects outputs are read from.

pub mod plan;

pub use plan::{LiveObjects, Plan};

use crate::backend::{BackendType, ClusterBackend};
use crate::config::{resolve_config, EmulatorConfig, SettingsStore};
use crate::core::Result;
use crate::k8s::{
    build_deployment_spec, build_external_service_spec, build_namespace_spec, build_service_spec,
};
use crate::outputs::{export_outputs, Outputs, RunState, StateStore};

/// The snowflake-emulator deployment descriptor.
#[derive(Clone, Debug, Default)]
pub struct Descriptor {
    config: EmulatorConfig,
}

impl Descriptor {
    /// Create a descriptor for a resolved configuration.
    pub fn new(config: EmulatorConfig) -> Self {
        Self { config }
    }

    /// Resolve configuration from a settings store.
    pub fn from_store(store: &dyn SettingsStore) -> Result<Self> {
        Ok(Self::new(resolve_config(store)?))
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Build the namespace, deployment and both services.
    pub fn evaluate(&self) -> Result<Plan> {
        let namespace = build_namespace_spec();
        let ns_ref = namespace.reference();

        let deployment = build_deployment_spec(&self.config, &ns_ref);
        let deploy_ref = deployment.reference();

        let service = build_service_spec(&ns_ref, &deploy_ref);
        let external = build_external_service_spec(&ns_ref, &deploy_ref);

        let plan = Plan::new(vec![namespace, deployment, service, external])?;
        tracing::debug!(
            image = %self.config.image_name,
            edges = plan.edges().len(),
            "descriptor evaluated"
        );
        Ok(plan)
    }

    /// Evaluate, submit and export outputs in one call.
    ///
    /// Outputs are produced only if every resource was reconciled.
    pub async fn run(&self, backend: &dyn ClusterBackend) -> Result<(Outputs, LiveObjects)> {
        let plan = self.evaluate()?;
        let live = plan.submit(backend).await?;
        let outputs = export_outputs(&live)?;
        Ok((outputs, live))
    }

    /// Run against `backend` and record the result as the state of `stack`.
    ///
    /// State is written only after every resource reconciled and all outputs
    /// were exported; a failed run leaves any earlier state file untouched.
    pub async fn up(
        &self,
        backend: &dyn ClusterBackend,
        state: &StateStore,
        stack: &str,
    ) -> Result<RunState> {
        let backend_type = backend.backend_type();
        if backend_type == BackendType::Memory {
            tracing::warn!(stack, "in-memory backend selected, nothing is deployed to Kubernetes");
        }

        let (outputs, live) = self.run(backend).await?;
        let run = RunState::new(stack, backend_type, outputs, &live);
        let path = state.save(&run)?;
        tracing::info!(stack, backend = %backend_type, path = %path.display(), "run state recorded");
        Ok(run)
    }
}
