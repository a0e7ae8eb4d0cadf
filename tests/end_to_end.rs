//! End-to-end runs against the in-memory backend.

use pretty_assertions::assert_eq;
use snowflake_emulator_deploy::backend::{
    ApplyOutcome, BackendType, ClusterBackend, MemoryBackend, ObjectKey,
};
use snowflake_emulator_deploy::config::{BackendConfig, LayeredStore, MapStore, StackSettings};
use snowflake_emulator_deploy::descriptor::Descriptor;
use snowflake_emulator_deploy::k8s::ResourceKind;
use snowflake_emulator_deploy::outputs::StateStore;
use snowflake_emulator_deploy::Error;
use std::collections::BTreeMap;

fn backend() -> MemoryBackend {
    MemoryBackend::new(BackendConfig::memory())
}

#[tokio::test]
async fn default_run_exports_expected_outputs() {
    let backend = backend();
    let descriptor = Descriptor::from_store(&MapStore::new()).unwrap();

    let (outputs, _live) = descriptor.run(&backend).await.unwrap();

    let expected: BTreeMap<String, serde_json::Value> = serde_json::from_value(serde_json::json!({
        "namespace": "snowflake-emulator",
        "deployment_name": "snowflake-emulator-deployment",
        "service_name": "snowflake-emulator-service",
        "service_port": 8080,
        "external_service_name": "snowflake-emulator-external",
        "external_port": 8081,
        "access_url": "http://localhost:8081",
        "health_check_url": "http://localhost:8081/health",
    }))
    .unwrap();
    assert_eq!(outputs.to_map().unwrap(), expected);
}

#[tokio::test]
async fn image_override_reaches_the_cluster() {
    let backend = backend();
    let store = MapStore::new().with("image_name", "registry.example/emulator:1.0");
    let descriptor = Descriptor::from_store(&store).unwrap();

    let (outputs, _) = descriptor.run(&backend).await.unwrap();
    assert_eq!(outputs.service_port, 8080);
    assert_eq!(outputs.external_port, 8081);

    let key = ObjectKey {
        kind: ResourceKind::Deployment,
        namespace: Some("snowflake-emulator".to_string()),
        name: "snowflake-emulator-deployment".to_string(),
    };
    let deployment = backend.get(&key).await.unwrap().unwrap();
    let container = &deployment.spec["template"]["spec"]["containers"][0];
    assert_eq!(container["image"], "registry.example/emulator:1.0");
    assert_eq!(container["imagePullPolicy"], "Never");
    assert_eq!(deployment.spec["replicas"], 1);
}

#[tokio::test]
async fn settings_file_and_overrides_layer() {
    let settings = StackSettings::parse(
        r#"
        [config]
        image_name = "from-file:1"
        image_pull_policy = "IfNotPresent"
        "#,
    )
    .unwrap();
    let store = LayeredStore::new()
        .push(MapStore::new().with("image_name", "from-cli:2"))
        .push(settings);

    let descriptor = Descriptor::from_store(&store).unwrap();
    assert_eq!(descriptor.config().image_name, "from-cli:2");
    assert_eq!(descriptor.config().image_pull_policy, "IfNotPresent");
}

#[tokio::test]
async fn rerun_updates_only_what_changed() {
    let backend = backend();
    Descriptor::default().run(&backend).await.unwrap();

    let store = MapStore::new().with("image_pull_policy", "IfNotPresent");
    let (_, live) = Descriptor::from_store(&store)
        .unwrap()
        .run(&backend)
        .await
        .unwrap();

    assert_eq!(live.outcome("snowflake-emulator-ns"), Some(ApplyOutcome::Unchanged));
    assert_eq!(
        live.outcome("snowflake-emulator-deployment"),
        Some(ApplyOutcome::Updated)
    );
    assert_eq!(live.outcome("snowflake-emulator-service"), Some(ApplyOutcome::Unchanged));
    assert_eq!(live.outcome("snowflake-emulator-lb"), Some(ApplyOutcome::Unchanged));
}

#[tokio::test]
async fn up_records_state_for_successful_runs() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateStore::new(dir.path());
    let backend = backend();

    let run = Descriptor::default().up(&backend, &state, "dev").await.unwrap();
    assert_eq!(run.backend, BackendType::Memory);

    let loaded = state.load("dev").unwrap();
    assert_eq!(loaded, run);
    let kinds: Vec<ResourceKind> = loaded.resources.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Namespace,
            ResourceKind::Deployment,
            ResourceKind::Service,
            ResourceKind::Service
        ]
    );
}

#[tokio::test]
async fn rejected_service_leaves_no_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateStore::new(dir.path());

    let failing = backend();
    failing.reject(ResourceKind::Service, "quota exceeded").await;
    let err = Descriptor::default()
        .up(&failing, &state, "dev")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ResourceRejected { .. }));
    assert!(!state.path("dev").exists());
    assert!(matches!(state.load("dev"), Err(Error::StateNotFound(_))));
}

#[tokio::test]
async fn failed_run_keeps_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateStore::new(dir.path());

    let good = backend();
    let first = Descriptor::default().up(&good, &state, "dev").await.unwrap();
    let before = std::fs::read_to_string(state.path("dev")).unwrap();

    let failing = backend();
    failing.never_ready("snowflake-emulator-deployment").await;
    let store = MapStore::new().with("image_name", "snowflake-emulator:next");
    let err = Descriptor::from_store(&store)
        .unwrap()
        .up(&failing, &state, "dev")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReadinessTimeout { .. }));

    assert_eq!(std::fs::read_to_string(state.path("dev")).unwrap(), before);
    assert_eq!(state.load("dev").unwrap(), first);
}
