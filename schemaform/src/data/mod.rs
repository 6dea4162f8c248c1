//! Form data structures.
//!
//! This module holds the passive models shared by the flattener, the
//! nested creation controller and renderers:
//!
//! - [`schema`] - Schema nodes, fingerprints and parse errors
//! - [`field`] - Flattened field records
//! - [`source`] - Catalogue of created objects
//! - [`item`] - Renderer-facing controls and value checks
//! - [`app_data`] - Top-level session owner

/// Top-level session owner.
pub mod app_data;

/// Flattened field records.
pub mod field;

/// Renderer-facing controls and value checks.
pub mod item;

/// Schema node model and parsing.
pub mod schema;

/// Catalogue of created objects, shared across nested contexts.
pub mod source;

pub use app_data::AppData;
