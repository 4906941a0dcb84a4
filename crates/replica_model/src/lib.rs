//! Workflow graph model and shared primitives for Replica.
//!
//! This crate provides:
//! - The inbound workflow model (`Workflow`, `Node`, `Edge`) and the
//!   real-execution record used for twin comparison
//! - Execution ordering over a workflow graph with cycle rejection
//! - An injectable random source so simulations can be replayed
//! - A bounded FIFO store used for simulation history retention
//! - Duration statistics (percentiles, averages)
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_model::{ExecutionPlan, Node, Workflow};
//!
//! let workflow = Workflow::new("wf-1", "orders")
//!     .with_node(Node::new("start", "trigger"))
//!     .with_node(Node::new("fetch", "httpRequest"))
//!     .with_edge("start", "fetch");
//!
//! let plan = ExecutionPlan::build(&workflow)?;
//! assert_eq!(plan.order_ids(&workflow), vec!["start", "fetch"]);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod graph;
pub mod random;
pub mod stats;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
pub use graph::ExecutionPlan;
pub use random::{FixedRandom, RandomSource, SeededRandom};
pub use stats::{percentile, DurationSummary};
pub use store::{BoundedStore, StoreStats};
pub use workflow::{Edge, Node, NodeData, Workflow, WorkflowExecution};
