//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, EntityId, Document, and Error.

mod documents;
