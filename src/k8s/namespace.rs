//! Namespace that holds every emulator resource.

use crate::core::Labels;
use crate::k8s::resource::{ObjectMeta, ResourceBody, ResourceSpec};
use crate::k8s::{NAMESPACE_LOGICAL_NAME, NAMESPACE_NAME};

/// Build the `snowflake-emulator` namespace. It has no dependencies.
pub fn build_namespace_spec() -> ResourceSpec {
    ResourceSpec {
        logical_name: NAMESPACE_LOGICAL_NAME.to_string(),
        metadata: ObjectMeta {
            name: NAMESPACE_NAME.to_string(),
            namespace: None,
            labels: Labels::new(),
        },
        body: ResourceBody::Namespace,
        depends_on: Vec::new(),
    }
}
