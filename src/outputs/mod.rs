//! Exported run outputs.
//!
//! Six outputs are read back from live objects; the two URLs are literal
//! strings describing the local port-forwarded endpoint.

pub mod state;

pub use state::{ResourceRecord, RunState, StateStore};

use crate::backend::LiveObject;
use crate::core::{Error, Result};
use crate::descriptor::LiveObjects;
use crate::k8s::{
    DEPLOYMENT_NAME, EXTERNAL_LOGICAL_NAME, EXTERNAL_PORT, HEALTH_PATH, NAMESPACE_LOGICAL_NAME,
    SERVICE_NAME,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output names in export order.
pub const OUTPUT_NAMES: [&str; 8] = [
    "namespace",
    "deployment_name",
    "service_name",
    "service_port",
    "external_service_name",
    "external_port",
    "access_url",
    "health_check_url",
];

/// The named values exported by a successful run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outputs {
    pub namespace: String,
    pub deployment_name: String,
    pub service_name: String,
    pub service_port: u16,
    pub external_service_name: String,
    pub external_port: u16,
    pub access_url: String,
    pub health_check_url: String,
}

impl Outputs {
    /// Outputs as a name -> value map.
    pub fn to_map(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(Error::Serialization(format!(
                "outputs serialized to {} instead of an object",
                other
            ))),
        }
    }

    /// Look up a single output by name.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        let value = match name {
            "namespace" => serde_json::json!(self.namespace),
            "deployment_name" => serde_json::json!(self.deployment_name),
            "service_name" => serde_json::json!(self.service_name),
            "service_port" => serde_json::json!(self.service_port),
            "external_service_name" => serde_json::json!(self.external_service_name),
            "external_port" => serde_json::json!(self.external_port),
            "access_url" => serde_json::json!(self.access_url),
            "health_check_url" => serde_json::json!(self.health_check_url),
            _ => return None,
        };
        Some(value)
    }
}

/// Local URL of the external service.
pub fn access_url() -> String {
    format!("http://localhost:{}", EXTERNAL_PORT)
}

/// Local URL of the emulator health endpoint.
pub fn health_check_url() -> String {
    format!("{}{}", access_url(), HEALTH_PATH)
}

fn require<'a>(live: &'a LiveObjects, logical_name: &str, output: &str) -> Result<&'a LiveObject> {
    live.get(logical_name)
        .ok_or_else(|| Error::MissingOutput(output.to_string()))
}

/// Extract the exported outputs from reconciled objects.
///
/// # Errors
/// `MissingOutput` if an object or field an output is read from is absent.
pub fn export_outputs(live: &LiveObjects) -> Result<Outputs> {
    let namespace = require(live, NAMESPACE_LOGICAL_NAME, "namespace")?;
    let deployment = require(live, DEPLOYMENT_NAME, "deployment_name")?;
    let service = require(live, SERVICE_NAME, "service_name")?;
    let external = require(live, EXTERNAL_LOGICAL_NAME, "external_service_name")?;

    let outputs = Outputs {
        namespace: namespace.name.clone(),
        deployment_name: deployment.name.clone(),
        service_name: service.name.clone(),
        service_port: service
            .service_port(0)
            .ok_or_else(|| Error::MissingOutput("service_port".to_string()))?,
        external_service_name: external.name.clone(),
        external_port: external
            .service_port(0)
            .ok_or_else(|| Error::MissingOutput("external_port".to_string()))?,
        access_url: access_url(),
        health_check_url: health_check_url(),
    };
    tracing::info!(
        namespace = %outputs.namespace,
        access_url = %outputs.access_url,
        "outputs exported"
    );
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Outputs {
        Outputs {
            namespace: "snowflake-emulator".to_string(),
            deployment_name: "snowflake-emulator-deployment".to_string(),
            service_name: "snowflake-emulator-service".to_string(),
            service_port: 8080,
            external_service_name: "snowflake-emulator-external".to_string(),
            external_port: 8081,
            access_url: access_url(),
            health_check_url: health_check_url(),
        }
    }

    #[test]
    fn test_literal_urls() {
        assert_eq!(access_url(), "http://localhost:8081");
        assert_eq!(health_check_url(), "http://localhost:8081/health");
    }

    #[test]
    fn test_map_has_every_output() {
        let map = sample().to_map().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        let mut expected = OUTPUT_NAMES.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert_eq!(map["service_port"], 8080);
    }

    #[test]
    fn test_get_matches_map() {
        let outputs = sample();
        let map = outputs.to_map().unwrap();
        for name in OUTPUT_NAMES {
            assert_eq!(outputs.get(name).as_ref(), map.get(name), "output {name}");
        }
        assert!(outputs.get("nope").is_none());
    }

    #[test]
    fn test_export_requires_every_object() {
        let err = export_outputs(&LiveObjects::default()).unwrap_err();
        assert!(matches!(err, Error::MissingOutput(name) if name == "namespace"));
    }
}
