//! Stack settings file.
//!
//! ```toml
//! [config]
//! image_name = "snowflake-emulator:local"
//! image_pull_policy = "Never"
//!
//! [backend]
//! type = "cluster"
//! readiness_timeout_secs = 300
//! ```
//!
//! `type` defaults to `cluster`; `memory` selects the in-process simulator.

use crate::backend::BackendType;
use crate::config::SettingsStore;
use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Contents of a stack settings file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// Descriptor settings (`image_name`, `image_pull_policy`)
    pub config: BTreeMap<String, String>,
    /// Backend selection
    pub backend: BackendConfig,
}

impl StackSettings {
    /// Load settings from `path`. A missing file yields empty settings.
    ///
    /// # Errors
    /// `ConfigRead` if the file exists but cannot be read, `ConfigParse` if
    /// it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::ConfigRead(format!("{}: {}", path.display(), e))),
        }
    }

    /// Parse settings from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl SettingsStore for StackSettings {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.config.get(key).cloned())
    }
}

/// Backend configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend type to use
    #[serde(rename = "type")]
    pub backend: BackendType,
    /// How long to wait for a resource to report ready
    pub readiness_timeout_secs: u64,
    /// Interval between readiness polls
    pub poll_interval_ms: u64,
    /// Field manager for server-side apply
    pub field_manager: String,
}

impl BackendConfig {
    /// In-memory backend config, for dry runs and tests.
    pub fn memory() -> Self {
        Self {
            backend: BackendType::Memory,
            ..Self::default()
        }
    }

    /// Kubernetes API backend config.
    pub fn cluster() -> Self {
        Self::default()
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Cluster,
            readiness_timeout_secs: 300,
            poll_interval_ms: 2000,
            field_manager: "snowflake-emulator".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full() {
        let settings = StackSettings::parse(
            r#"
            [config]
            image_name = "emu:dev"

            [backend]
            type = "cluster"
            readiness_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(settings.get("image_name").unwrap().as_deref(), Some("emu:dev"));
        assert_eq!(settings.backend.backend, BackendType::Cluster);
        assert_eq!(settings.backend.readiness_timeout(), Duration::from_secs(60));
        assert_eq!(settings.backend.field_manager, "snowflake-emulator");
    }

    #[test]
    fn test_parse_empty() {
        let settings = StackSettings::parse("").unwrap();
        assert!(settings.config.is_empty());
        assert_eq!(settings.backend, BackendConfig::cluster());
    }

    #[test]
    fn test_default_backend_is_cluster() {
        assert_eq!(StackSettings::default().backend.backend, BackendType::Cluster);

        let settings = StackSettings::parse("[backend]\ntype = \"memory\"").unwrap();
        assert_eq!(settings.backend.backend, BackendType::Memory);
        assert_eq!(settings.backend, BackendConfig::memory());
    }

    #[test]
    fn test_parse_invalid() {
        let err = StackSettings::parse("[config\nimage_name =").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StackSettings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, StackSettings::default());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[config]\nimage_pull_policy = \"IfNotPresent\"").unwrap();

        let settings = StackSettings::load(file.path()).unwrap();
        assert_eq!(
            settings.get("image_pull_policy").unwrap().as_deref(),
            Some("IfNotPresent")
        );
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StackSettings::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigRead(_)));
    }
}
