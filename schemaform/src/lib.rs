//! # schemaform
//!
//! Turns JSON Schema documents into editable forms.
//!
//! A schema is flattened into an ordered list of fields. Internal `$ref`s
//! and named definitions are resolved against the root schema, cycles are
//! detected, and object properties are kept out of the top-level form: they
//! are filled through nested creation contexts that build objects bottom-up
//! and hand them back to the form below.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schemaform::{FormConfig, data::AppData};
//!
//! let mut app = AppData::with_config(FormConfig::default());
//! app.generate_form(r#"{"properties": {"home": {"properties": {"city": {"type": "string"}}}}}"#)
//!     .unwrap();
//!
//! let form = app.form_mut().unwrap();
//! form.request_create("home").unwrap();
//! form.set_value("city", "Oslo".into()).unwrap();
//! form.save().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Schema, field and data-source models
//! - [`flatten`] - Schema flattening
//! - [`resolver`] - `$ref` resolution
//! - [`rank`] - Field priorities
//! - [`form`] - Values and errors of one form
//! - [`nested`] - Nested object creation
//! - [`config`] - Settings
//! - [`run`] - Text rendering used by the command line

#[macro_use]
extern crate log;

/// Settings loaded from TOML or JSON.
pub mod config;

/// Schema, field and data-source models.
pub mod data;

/// Schema flattening into ordered fields.
pub mod flatten;

/// Values and errors of one form.
pub mod form;

/// Nested object creation state machine.
pub mod nested;

/// Field priority ranking.
pub mod rank;

/// `$ref` resolution against the root schema.
pub mod resolver;

/// Text rendering of a form.
pub mod run;

pub use config::FormConfig;
pub use data::{
    field::{FieldGroup, FieldKind, FieldModel},
    schema::{SchemaError, SchemaNode},
    source::{ObjectDataSource, ObjectEntry, SharedDataSource},
};
pub use flatten::{FlattenOutput, Flattener, flatten};
pub use nested::{CreationError, CreationState, NestedCreationController};
pub use serde_json::Value;
