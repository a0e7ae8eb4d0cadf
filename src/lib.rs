//! # snowflake-emulator-deploy
//!
//! Deployment descriptor for the snowflake-emulator on Kubernetes:
//! - **k8s**: Namespace, Deployment and Service specs
//! - **graph**: dependency DAG and apply ordering
//! - **backend**: in-memory and Kubernetes API backends
//! - **descriptor**: evaluate-then-submit pipeline
//! - **outputs**: exported values and run state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snowflake_emulator_deploy::backend::MemoryBackend;
//! use snowflake_emulator_deploy::config::{BackendConfig, MapStore};
//! use snowflake_emulator_deploy::descriptor::Descriptor;
//!
//! #[tokio::main]
//! async fn main() {
//!     let descriptor = Descriptor::from_store(&MapStore::new()).unwrap();
//!     let backend = MemoryBackend::new(BackendConfig::memory());
//!     let (outputs, _live) = descriptor.run(&backend).await.unwrap();
//!     println!("Emulator reachable at {}", outputs.access_url);
//! }
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod descriptor;
pub mod graph;
pub mod k8s;
pub mod monitoring;
pub mod outputs;

pub use crate::core::error::{Error, Result};
