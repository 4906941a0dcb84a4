//! Fault model for Replica workflow simulations.
//!
//! This crate provides:
//! - A catalog of fault templates (network, API, auth, resource, data and
//!   cascading failures)
//! - Fault scenarios bound to a node and a timing phase
//! - The injection decision (enabled gate, exact timing gate, deterministic
//!   threshold, chaos-amplified probability)
//! - Fault synthesis with bounded simulated latency
//! - Impact classification and recovery simulation
//! - Per-scenario injection statistics
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_faults::{FaultInjectionConfig, FaultInjectionEngine, FaultOverrides};
//!
//! let engine = FaultInjectionEngine::new(FaultInjectionConfig::default(), rng);
//! let scenario = engine
//!     .create_from_template("api_error_5xx", "fetch", FaultOverrides::default())
//!     .await?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod templates;

pub use config::FaultInjectionConfig;
pub use engine::{FaultInjectionEngine, RecoveryOutcome, SynthesizedFault};
pub use error::{Error, Result};
pub use model::{
    FaultInjectionResult, FaultScenario, FaultStatistics, FaultTiming, FaultType, Impact,
    InjectionContext,
};
pub use templates::{builtin_templates, FaultOverrides, FaultTemplate};
