//! Deepgraph - Deep update-or-create over a typed entity graph
//!
//! This crate re-exports all layers of the Deepgraph system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: deepgraph_runtime    — Schema files, snapshots, reports, CLI
//! Layer 2: deepgraph_engine     — Node resolver, relationship walker, sweeper
//! Layer 1: deepgraph_storage    — Schema registry, store adapter, world state
//! Layer 0: deepgraph_foundation — Core types (Value, EntityId, Document, Error)
//! ```

pub use deepgraph_engine as engine;
pub use deepgraph_foundation as foundation;
pub use deepgraph_runtime as runtime;
pub use deepgraph_storage as storage;
