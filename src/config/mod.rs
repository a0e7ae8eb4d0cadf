//! Descriptor configuration.
//!
//! Settings are read once at the start of a run from a `SettingsStore` and
//! resolved into an immutable `EmulatorConfig`.

pub mod settings;

pub use settings::{BackendConfig, StackSettings};

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project name used to qualify setting keys (`snowflake-emulator:image_name`).
pub const PROJECT: &str = "snowflake-emulator";

pub const DEFAULT_IMAGE_NAME: &str = "snowflake-emulator:local";
/// The image has to be preloaded on every node (kind, minikube, Docker Desktop).
pub const DEFAULT_IMAGE_PULL_POLICY: &str = "Never";

/// Source of string-valued settings.
pub trait SettingsStore: Send + Sync {
    /// Look up a setting. `Ok(None)` means the key is not set.
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// In-memory settings, used for `--set` overrides and tests.
#[derive(Clone, Debug, Default)]
pub struct MapStore {
    values: BTreeMap<String, String>,
}

impl MapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, builder style.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Parse `key=value` assignments.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self> {
        let mut store = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (key, value) = assignment.split_once('=').ok_or_else(|| {
                Error::ConfigParse(format!("expected key=value, got '{}'", assignment))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::ConfigParse(format!(
                    "empty key in assignment '{}'",
                    assignment
                )));
            }
            store.set(key, value);
        }
        Ok(store)
    }
}

impl SettingsStore for MapStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// Stack of stores; the first store holding a key wins.
#[derive(Default)]
pub struct LayeredStore {
    layers: Vec<Box<dyn SettingsStore>>,
}

impl LayeredStore {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lower-precedence layer.
    pub fn push(mut self, layer: impl SettingsStore + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }
}

impl SettingsStore for LayeredStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        for layer in &self.layers {
            if let Some(value) = layer.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// Resolved emulator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Container image reference
    pub image_name: String,
    /// Kubernetes imagePullPolicy
    pub image_pull_policy: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            image_pull_policy: DEFAULT_IMAGE_PULL_POLICY.to_string(),
        }
    }
}

/// Read `image_name` and `image_pull_policy`, falling back to defaults.
///
/// Empty values count as unset. Values are not validated; the cluster
/// rejects bad image references or pull policies at apply time.
///
/// # Errors
/// Returns the store's error if it cannot be read.
pub fn resolve_config(store: &dyn SettingsStore) -> Result<EmulatorConfig> {
    let image_name = lookup(store, "image_name")?;
    let image_pull_policy = lookup(store, "image_pull_policy")?;

    let config = EmulatorConfig {
        image_name: image_name.unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()),
        image_pull_policy: image_pull_policy
            .unwrap_or_else(|| DEFAULT_IMAGE_PULL_POLICY.to_string()),
    };
    tracing::debug!(
        image = %config.image_name,
        pull_policy = %config.image_pull_policy,
        "resolved configuration"
    );
    Ok(config)
}

fn lookup(store: &dyn SettingsStore, key: &str) -> Result<Option<String>> {
    let value = match store.get(key)? {
        Some(v) => Some(v),
        None => store.get(&format!("{}:{}", PROJECT, key))?,
    };
    Ok(value.filter(|v| !v.is_empty()))
}
