//! Deep update-or-create engine for Deepgraph.
//!
//! This crate provides:
//! - [`DeepWriter`] - Reconciles nested documents against an entity store
//! - [`EngineConfig`] - Sweep policy, key mutation, depth limit, use case
//! - [`ProfileRegistry`] - Write restrictions per entity type and use case
//! - [`OperationReport`] - Per-node results and sweep outcomes
//!
//! A deep write resolves every node of a document to one entity, in
//! pre-order, inside a single store transaction. Node failures are
//! collected rather than raised; any failure rolls the whole write back.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod collector;
mod config;
mod operation;
mod profile;
mod resolver;
mod result;
mod sweeper;
mod tracker;
mod walker;
mod writer;

pub use collector::{ResultCollector, Slot};
pub use config::{EngineConfig, SweepPolicy};
pub use profile::{Profile, ProfileRegistry};
pub use result::{
    Action, DeletionResult, ErrorCode, NodeError, NodeResult, OperationReport, Outcome,
    ResolutionResult,
};
pub use tracker::{SweepCandidates, TouchedSet};
pub use writer::DeepWriter;
