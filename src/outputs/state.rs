//! Run state persistence.
//!
//! A successful run writes `<dir>/<stack>.json`; failed runs write nothing.

use crate::backend::{ApplyOutcome, BackendType};
use crate::core::{now, Error, Result, Timestamp};
use crate::descriptor::LiveObjects;
use crate::k8s::ResourceKind;
use crate::outputs::Outputs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Summary of one reconciled resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    pub uid: String,
    pub outcome: ApplyOutcome,
}

/// Persisted result of the last successful run of a stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Stack name
    pub stack: String,
    /// Backend the run was applied to
    pub backend: BackendType,
    /// When the run finished
    pub updated_at: Timestamp,
    /// Exported outputs
    pub outputs: Outputs,
    /// Resources in apply order
    pub resources: Vec<ResourceRecord>,
}

impl RunState {
    /// Build the state for a finished run.
    pub fn new(stack: &str, backend: BackendType, outputs: Outputs, live: &LiveObjects) -> Self {
        let resources = live
            .iter()
            .map(|(object, outcome)| ResourceRecord {
                logical_name: object.logical_name.clone(),
                kind: object.kind,
                name: object.name.clone(),
                namespace: object.namespace.clone(),
                uid: object.uid.clone(),
                outcome,
            })
            .collect();
        Self {
            stack: stack.to_string(),
            backend,
            updated_at: now(),
            outputs,
            resources,
        }
    }
}

/// Directory of per-stack state files.
#[derive(Clone, Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// State directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a stack's state file.
    pub fn path(&self, stack: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stack))
    }

    /// Write the state, replacing any previous state of the stack.
    pub fn save(&self, state: &RunState) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(&state.stack);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), "state saved");
        Ok(path)
    }

    /// Read the state of a stack.
    ///
    /// # Errors
    /// `StateNotFound` if the stack has never completed a run.
    pub fn load(&self, stack: &str) -> Result<RunState> {
        let path = self.path(stack);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::StateNotFound(stack.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::{access_url, health_check_url};

    fn outputs() -> Outputs {
        Outputs {
            namespace: "ns".to_string(),
            deployment_name: "deploy".to_string(),
            service_name: "svc".to_string(),
            service_port: 8080,
            external_service_name: "lb".to_string(),
            external_port: 8081,
            access_url: access_url(),
            health_check_url: health_check_url(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        let state = RunState::new("dev", BackendType::Cluster, outputs(), &LiveObjects::default());

        let path = store.save(&state).unwrap();
        assert!(path.ends_with("dev.json"));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = store.load("dev").unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_missing_stack() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let err = store.load("prod").unwrap_err();
        assert!(matches!(err, Error::StateNotFound(stack) if stack == "prod"));
    }

    #[test]
    fn test_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        std::fs::write(store.path("dev"), "{not json").unwrap();
        assert!(matches!(store.load("dev"), Err(Error::Serialization(_))));
    }
}
