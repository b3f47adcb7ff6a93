//! Schema files, snapshots, and reports for Deepgraph.
//!
//! This crate provides:
//! - [`Schema`] - Entity types and write profiles loaded from JSON
//! - Store snapshots in `MessagePack` ([`serialize`])
//! - JSON rendering of operation reports ([`report`])
//! - The `deepgraph` command-line tool

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod report;
pub mod schema;
pub mod serialize;

pub use report::{ReportStyle, render, render_entities};
pub use schema::Schema;
pub use serialize::{from_bytes, load_from_file, save_to_file, to_bytes};
