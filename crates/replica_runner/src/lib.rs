//! Batch simulation runner for Replica.
//!
//! This crate provides:
//! - Single pass-through simulations
//! - Parallel batches under a hard concurrency ceiling
//! - Load runs at a fixed issue rate with optional ramp-up
//! - Stress runs with doubling concurrency and breaking-point detection
//! - Chaos runs with amplified, type-filtered fault sets
//! - Performance runs measuring latency percentiles and throughput
//! - Graceful cancellation: no new work, in-flight runs drain
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_runner::{LoadTestConfig, SimulationEngine};
//!
//! let runner = SimulationEngine::new(twins);
//! let report = runner
//!     .run_load_test(&twin_id, json!({}), Default::default(), &LoadTestConfig::new(4, 20.0, 5_000))
//!     .await?;
//! println!("success rate: {:.1}%", report.success_rate * 100.0);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;

pub use batch::{BatchItem, BatchResult, SimulationRequest};
pub use config::{ChaosTestConfig, LoadTestConfig, PerformanceTestConfig, StressTestConfig};
pub use engine::SimulationEngine;
pub use error::{Error, Result};
pub use report::{
    ChaosTestResult, LoadTestResult, PerformanceMetrics, PerformanceTestResult, StressTestResult,
    StressWave, TargetsMet,
};
