//! Core values, entity identities, documents, and errors for Deepgraph.
//!
//! This crate provides:
//! - [`Value`] - Scalar values stored on entities
//! - [`EntityId`] - Store-assigned entity identities
//! - [`Type`] - Field type descriptors for schema validation
//! - [`Document`] - The untyped nested input being resolved
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod document;
mod entity;
mod error;
mod types;
mod value;

pub use document::{Document, Field};
pub use entity::EntityId;
pub use error::{Error, ErrorContext, ErrorKind};
pub use types::Type;
pub use value::Value;

/// Result alias used throughout Deepgraph.
pub type Result<T> = std::result::Result<T, Error>;
