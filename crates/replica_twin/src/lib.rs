//! Digital twins of workflow graphs.
//!
//! A twin is an isolated, immutable copy of a workflow graph that can be
//! executed synthetically any number of times without side effects.
//!
//! This crate provides:
//! - Twin lifecycle (create, look up, delete)
//! - Simulated execution in dependency order with fault hooks before,
//!   during and after each node
//! - Bounded per-twin simulation history
//! - Comparison of a stored simulation against a real execution, and
//!   divergence tracking across syncs
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_twin::{DigitalTwinConfig, DigitalTwinManager, SimulationOptions};
//!
//! let manager = DigitalTwinManager::new(DigitalTwinConfig::default(), faults, rng);
//! let twin = manager.create_twin(&workflow).await;
//! let result = manager
//!     .simulate(&twin.id, json!({"order": 42}), SimulationOptions::default())
//!     .await?;
//! assert!(result.is_success());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod comparison;
pub mod config;
pub mod error;
mod executor;
pub mod manager;
pub mod result;
pub mod twin;

pub use comparison::{
    compare_results, ComparisonResult, ComparisonStatus, Difference, DifferenceSeverity,
};
pub use config::{DigitalTwinConfig, SimulationConfig, SimulationMode, SimulationOptions};
pub use error::{Error, Result};
pub use manager::DigitalTwinManager;
pub use result::{SimulatedNodeResult, SimulationMetrics, SimulationResult, SimulationStatus};
pub use twin::VirtualWorkflow;
