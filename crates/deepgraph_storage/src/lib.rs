//! Schema registry, entity store adapter, and world state for Deepgraph.
//!
//! This crate provides:
//! - [`SchemaRegistry`] - Validated entity types with derived reverse views
//! - [`EntityStoreAdapter`] - The persistence boundary the engine writes through
//! - [`MemoryStore`] - An in-memory adapter with nested transactions
//! - [`World`] - Immutable stored state with structural sharing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod adapter;
mod entity;
mod memory;
mod registry;
mod relationship;
mod schema;
mod world;

pub use adapter::EntityStoreAdapter;
pub use entity::EntityStore;
pub use memory::MemoryStore;
pub use registry::{edge_key, Edge, RegistryBuilder, SchemaRegistry};
pub use relationship::RelationshipStore;
pub use schema::{
    Cardinality, EntityType, FieldSchema, Member, OnDelete, RelationKind, RelationshipDescriptor,
};
pub use world::{Fields, World, WorldSnapshot};
