//! Nested object creation.
//!
//! A user filling in an `object`-kind field can ask to create a new object
//! for it. That opens a [`CreationContext`] holding its own flattened form;
//! the new context can in turn open a child, up to a configured depth. Saving
//! a context appends the payload to the shared [`ObjectDataSource`] and fills
//! the field in the form below it.
//!
//! The contexts form a stack: each context has at most one open child, so
//! the open chain is kept as a `Vec` with the innermost context last.
//!
//! [`ObjectDataSource`]: crate::data::source::ObjectDataSource

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::{
    config::FormConfig,
    data::{
        field::{FieldKind, FieldModel},
        item::Control,
        schema::{SchemaError, SchemaNode},
        source::{ObjectEntry, SharedDataSource},
    },
    flatten::Flattener,
    form::{FormState, FormValues, ValidationErrors},
};

/// Rejected or failed nested creation transitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CreationError {
    #[error(
        "Maximum nesting depth reached ({max_depth} levels). Please create this object separately."
    )]
    DepthLimitExceeded { max_depth: usize },
    #[error("Field {0} is not an object field")]
    NotCreatable(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("No object with id {0}")]
    UnknownEntry(String),
    #[error("No nested creation context is open")]
    NotOpen,
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

/// Where the controller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationState {
    /// Only the root form is active.
    Closed,
    /// A context is open; `depth` is the innermost context's depth.
    Open { depth: usize },
}

/// One level of nested creation.
#[derive(Debug, Clone)]
pub struct CreationContext {
    /// Field in the form below this context that a save will fill.
    pub parent_field_path: String,
    /// The sub-schema being edited.
    pub schema: Arc<SchemaNode>,
    /// Top-level schema, kept for definition lookups.
    pub root_schema: Arc<SchemaNode>,
    /// Display title and data-source type key.
    pub title: String,
    /// 1 when opened from the root form.
    pub depth: usize,
    pub form: FormState,
}

impl CreationContext {
    fn open(
        field: &FieldModel,
        root_schema: Arc<SchemaNode>,
        depth: usize,
        flattener: &Flattener,
    ) -> Self {
        let merged = field.schema.with_root_definitions(&root_schema);
        let form = FormState::from_schema(&merged, flattener);
        Self {
            parent_field_path: field.name.clone(),
            schema: Arc::clone(&field.schema),
            root_schema,
            title: field.object_type_name(),
            depth,
            form,
        }
    }

    pub fn values(&self) -> &FormValues {
        &self.form.values
    }

    fn id_prefix(&self) -> &'static str {
        if self.depth <= 1 { "custom" } else { "nested" }
    }

    /// Data-source label for a saved payload.
    fn label(&self, payload: &Value) -> String {
        let first = payload
            .as_object()
            .and_then(|m| m.values().next())
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            });
        match (first, self.depth) {
            (Some(v), 0 | 1) => format!("{v} (Custom)"),
            (Some(v), depth) => format!("{v} (Nested L{depth})"),
            (None, 0 | 1) => format!("Custom {}", self.title),
            (None, depth) => format!("Nested {} L{depth}", self.title),
        }
    }
}

/// Drives the root form and the stack of nested creation contexts above it.
#[derive(Debug)]
pub struct NestedCreationController {
    root_schema: Arc<SchemaNode>,
    root: FormState,
    stack: Vec<CreationContext>,
    data_source: SharedDataSource,
    flattener: Flattener,
    max_depth: usize,
    link_reference: bool,
}

impl NestedCreationController {
    /// Flatten `schema` into the root form.
    pub fn new(schema: &SchemaNode, config: &FormConfig, data_source: SharedDataSource) -> Self {
        let flattener = Flattener::from_config(config);
        let root = FormState::from_schema(schema, &flattener);
        Self {
            root_schema: Arc::clone(&root.output.root),
            root,
            stack: Vec::new(),
            data_source,
            flattener,
            max_depth: config.max_depth,
            link_reference: config.link_reference,
        }
    }

    pub fn state(&self) -> CreationState {
        match self.stack.last() {
            None => CreationState::Closed,
            Some(ctx) => CreationState::Open { depth: ctx.depth },
        }
    }

    /// Depth of the active form; 0 for the root form.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn root_schema(&self) -> &Arc<SchemaNode> {
        &self.root_schema
    }

    pub fn root_form(&self) -> &FormState {
        &self.root
    }

    pub fn root_form_mut(&mut self) -> &mut FormState {
        &mut self.root
    }

    /// Open contexts, outermost first.
    pub fn contexts(&self) -> &[CreationContext] {
        &self.stack
    }

    pub fn active_context(&self) -> Option<&CreationContext> {
        self.stack.last()
    }

    /// The form currently receiving input.
    pub fn active_form(&self) -> &FormState {
        self.stack.last().map(|c| &c.form).unwrap_or(&self.root)
    }

    pub fn active_form_mut(&mut self) -> &mut FormState {
        match self.stack.last_mut() {
            Some(ctx) => &mut ctx.form,
            None => &mut self.root,
        }
    }

    pub fn data_source(&self) -> &SharedDataSource {
        &self.data_source
    }

    /// Set a value in the active form.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), SchemaError> {
        self.active_form_mut().set_value(name, value)
    }

    /// References offered to reference-kind fields of the active form.
    pub fn available_refs(&self) -> Vec<String> {
        self.active_form().output.available_refs()
    }

    /// Controls for every field of the active form, in display order.
    pub fn controls(&self) -> Vec<(&FieldModel, Control)> {
        let form = self.active_form();
        let refs = form.output.available_refs();
        self.data_source.with(|ds| {
            form.fields()
                .iter()
                .map(|f| (f, Control::for_field(f, ds, &refs)))
                .collect()
        })
    }

    /// Open a creation context for the active form's field `name`.
    pub fn request_create(&mut self, name: &str) -> Result<usize, CreationError> {
        self.check_depth(name)?;
        let field = self
            .active_form()
            .field(name)
            .cloned()
            .ok_or_else(|| CreationError::UnknownField(name.to_string()))?;
        self.request_create_field(&field)
    }

    /// Open a creation context for `field`, returning the new depth.
    ///
    /// Rejected without any state change when the active form is already at
    /// the maximum depth. The depth is checked before anything else.
    pub fn request_create_field(&mut self, field: &FieldModel) -> Result<usize, CreationError> {
        let depth = self.check_depth(&field.name)?;
        if field.kind != FieldKind::Object {
            return Err(CreationError::NotCreatable(field.name.clone()));
        }

        let root_schema = self
            .stack
            .last()
            .map(|c| Arc::clone(&c.root_schema))
            .unwrap_or_else(|| Arc::clone(&self.root_schema));
        let ctx = CreationContext::open(field, root_schema, depth + 1, &self.flattener);
        debug!(
            "open creation context {:?} for {:?} at depth {}",
            ctx.title, ctx.parent_field_path, ctx.depth
        );
        self.stack.push(ctx);
        Ok(depth + 1)
    }

    fn check_depth(&self, name: &str) -> Result<usize, CreationError> {
        let depth = self.depth();
        if depth >= self.max_depth {
            warn!(
                "create {name:?} rejected: depth {depth} reached limit {}",
                self.max_depth
            );
            return Err(CreationError::DepthLimitExceeded {
                max_depth: self.max_depth,
            });
        }
        Ok(depth)
    }

    /// Value stored in a parent field for `entry`.
    fn field_value(&self, entry: &ObjectEntry) -> Value {
        if self.link_reference {
            entry.as_reference()
        } else {
            entry.data.clone()
        }
    }

    /// Fill the active form's object field `name` with an existing entry.
    pub fn select_existing(&mut self, name: &str, id: &str) -> Result<ObjectEntry, CreationError> {
        let field = self
            .active_form()
            .field(name)
            .ok_or_else(|| CreationError::UnknownField(name.to_string()))?;
        if field.kind != FieldKind::Object {
            return Err(CreationError::NotCreatable(name.to_string()));
        }
        let entry = self
            .data_source
            .with(|ds| ds.find(id).cloned())
            .ok_or_else(|| CreationError::UnknownEntry(id.to_string()))?;
        let value = self.field_value(&entry);
        self.active_form_mut().assign(name, value);
        Ok(entry)
    }

    /// Save the innermost context.
    ///
    /// On missing required fields the context stays open and its errors are
    /// recorded. Otherwise the payload is appended to the data source, the
    /// parent field is filled and the context is closed.
    pub fn save(&mut self) -> Result<ObjectEntry, CreationError> {
        let ctx = self.stack.last_mut().ok_or(CreationError::NotOpen)?;
        ctx.form.validate()?;
        let ctx = self.stack.pop().ok_or(CreationError::NotOpen)?;

        let payload = ctx.form.payload();
        let label = ctx.label(&payload);
        let entry = self
            .data_source
            .append(&ctx.title, ctx.id_prefix(), label, payload);

        let value = self.field_value(&entry);
        self.active_form_mut().assign(&ctx.parent_field_path, value);
        debug!(
            "saved {} into {:?}, back at depth {}",
            entry.id,
            ctx.parent_field_path,
            self.depth()
        );
        Ok(entry)
    }

    /// Discard the innermost context.
    pub fn cancel(&mut self) -> Result<(), CreationError> {
        let ctx = self.stack.pop().ok_or(CreationError::NotOpen)?;
        debug!("cancel creation context {:?} at depth {}", ctx.title, ctx.depth);
        Ok(())
    }

    /// Discard every open context at once.
    pub fn close_all(&mut self) {
        if !self.stack.is_empty() {
            debug!("close all {} creation contexts", self.stack.len());
        }
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config(max_depth: usize) -> FormConfig {
        FormConfig {
            max_depth,
            ..Default::default()
        }
    }

    fn recursive() -> SchemaNode {
        SchemaNode::from_value(json!({
            "title": "node",
            "properties": {
                "name": {"type": "string"},
                "child": {"$ref": "#"}
            },
            "required": ["name"]
        }))
        .unwrap()
    }

    #[test]
    fn test_depth_guard() {
        let mut ctl = NestedCreationController::new(&recursive(), &config(2), SharedDataSource::new());
        assert_eq!(ctl.state(), CreationState::Closed);

        assert_eq!(ctl.request_create("child"), Ok(1));
        assert_eq!(ctl.request_create("child"), Ok(2));
        assert_eq!(
            ctl.request_create("child"),
            Err(CreationError::DepthLimitExceeded { max_depth: 2 })
        );
        assert_eq!(ctl.state(), CreationState::Open { depth: 2 });
        assert_eq!(ctl.contexts().len(), 2);
    }

    #[test]
    fn test_context_fields() {
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), SharedDataSource::new());
        ctl.request_create("child").unwrap();
        let ctx = ctl.active_context().unwrap();
        assert_eq!(ctx.parent_field_path, "child");
        assert_eq!(ctx.title, "node");
        assert!(ctx.values().is_empty());
        assert!(ctl.active_form().field("name").is_some());
        assert!(ctl.active_form().field("child").is_some());
    }

    #[test]
    fn test_definitions_spliced_into_context() {
        let schema = SchemaNode::from_value(json!({
            "definitions": {"color": {"type": "string", "enum": ["red", "blue"]}},
            "properties": {
                "car": {
                    "type": "object",
                    "properties": {"paint": {"$ref": "#/definitions/color"}}
                }
            }
        }))
        .unwrap();
        let mut ctl = NestedCreationController::new(&schema, &config(5), SharedDataSource::new());
        ctl.request_create("car").unwrap();

        let color = ctl.active_form().field("color").unwrap();
        assert_eq!(color.kind, FieldKind::String);
        assert_eq!(color.schema.enum_values, Some(vec![json!("red"), json!("blue")]));
        assert!(ctl.active_context().unwrap().schema.definitions.is_none());
    }

    #[test]
    fn test_non_object_field_not_creatable() {
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), SharedDataSource::new());
        assert_eq!(
            ctl.request_create("name"),
            Err(CreationError::NotCreatable("name".into()))
        );
        assert_eq!(
            ctl.request_create("nope"),
            Err(CreationError::UnknownField("nope".into()))
        );
        assert_eq!(ctl.state(), CreationState::Closed);
    }

    #[test]
    fn test_save_requires_fields() {
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), SharedDataSource::new());
        ctl.request_create("child").unwrap();
        let err = ctl.save().unwrap_err();
        assert!(matches!(err, CreationError::Validation(_)));
        assert_eq!(ctl.state(), CreationState::Open { depth: 1 });
        assert!(ctl.active_form().errors.contains_key("name"));
        assert!(ctl.data_source().with(|ds| ds.is_empty()));
    }

    #[test]
    fn test_save_fills_parent() {
        let ds = SharedDataSource::new();
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), ds.clone());
        ctl.request_create("child").unwrap();
        ctl.set_value("name", json!("x")).unwrap();

        let entry = ctl.save().unwrap();
        assert_eq!(entry.label, "x (Custom)");
        assert_eq!(entry.data, json!({"name": "x"}));
        assert_eq!(ctl.state(), CreationState::Closed);
        assert_eq!(ctl.root_form().value("child"), Some(&json!({"name": "x"})));
        assert_eq!(ds.with(|ds| ds.entries("node").to_vec()), vec![entry]);
    }

    #[test]
    fn test_nested_save_propagates_one_level() {
        let ds = SharedDataSource::new();
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), ds.clone());
        ctl.request_create("child").unwrap();
        ctl.request_create("child").unwrap();
        ctl.set_value("name", json!("inner")).unwrap();

        let inner = ctl.save().unwrap();
        assert_eq!(inner.label, "inner (Nested L2)");
        assert!(inner.id.starts_with("nested_"));
        assert_eq!(ctl.state(), CreationState::Open { depth: 1 });
        assert_eq!(ctl.active_form().value("child"), Some(&json!({"name": "inner"})));
        assert!(ctl.root_form().value("child").is_none());

        ctl.set_value("name", json!("outer")).unwrap();
        let outer = ctl.save().unwrap();
        assert_eq!(
            ctl.root_form().value("child"),
            Some(&json!({"name": "outer", "child": {"name": "inner"}}))
        );
        assert_ne!(inner.id, outer.id);
        assert_eq!(ds.with(|ds| ds.entries("node").len()), 2);
    }

    #[test]
    fn test_link_reference() {
        let cfg = FormConfig {
            link_reference: true,
            ..Default::default()
        };
        let mut ctl = NestedCreationController::new(&recursive(), &cfg, SharedDataSource::new());
        ctl.request_create("child").unwrap();
        ctl.set_value("name", json!("x")).unwrap();
        let entry = ctl.save().unwrap();
        assert_eq!(ctl.root_form().value("child"), Some(&entry.as_reference()));
    }

    #[test]
    fn test_cancel_and_close_all() {
        let ds = SharedDataSource::new();
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), ds.clone());
        assert_eq!(ctl.cancel(), Err(CreationError::NotOpen));

        ctl.request_create("child").unwrap();
        ctl.request_create("child").unwrap();
        ctl.set_value("name", json!("dropped")).unwrap();
        ctl.cancel().unwrap();
        assert_eq!(ctl.state(), CreationState::Open { depth: 1 });

        ctl.request_create("child").unwrap();
        ctl.request_create("child").unwrap();
        ctl.close_all();
        assert_eq!(ctl.state(), CreationState::Closed);
        assert!(ds.with(|ds| ds.is_empty()));
        assert!(ctl.root_form().values.is_empty());
    }

    #[test]
    fn test_label_fallback() {
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), SharedDataSource::new());
        ctl.request_create("child").unwrap();
        let ctx = ctl.active_context().unwrap();
        assert_eq!(ctx.label(&json!({})), "Custom node");
        assert_eq!(ctx.label(&json!({"n": 3})), "3 (Custom)");
        ctl.request_create("child").unwrap();
        let ctx = ctl.active_context().unwrap();
        assert_eq!(ctx.label(&json!({"n": {"deep": 1}})), "Nested node L2");
    }

    #[test]
    fn test_depth_checked_before_field_lookup() {
        let mut ctl = NestedCreationController::new(&recursive(), &config(1), SharedDataSource::new());
        ctl.request_create("child").unwrap();
        assert_eq!(
            ctl.request_create("nope"),
            Err(CreationError::DepthLimitExceeded { max_depth: 1 })
        );
        assert_eq!(
            ctl.request_create("name"),
            Err(CreationError::DepthLimitExceeded { max_depth: 1 })
        );
        assert_eq!(ctl.state(), CreationState::Open { depth: 1 });
    }

    #[test]
    fn test_select_existing() {
        let ds = SharedDataSource::new();
        let entry = ds.append("node", "custom", "kept (Custom)".into(), json!({"name": "kept"}));
        let mut ctl = NestedCreationController::new(&recursive(), &config(5), ds.clone());

        assert_eq!(ctl.select_existing("child", &entry.id), Ok(entry.clone()));
        assert_eq!(ctl.root_form().value("child"), Some(&json!({"name": "kept"})));
        assert_eq!(
            ctl.select_existing("child", "custom_99"),
            Err(CreationError::UnknownEntry("custom_99".into()))
        );
        assert_eq!(
            ctl.select_existing("name", &entry.id),
            Err(CreationError::NotCreatable("name".into()))
        );
        assert_eq!(ds.with(|ds| ds.len()), 1);

        let cfg = FormConfig {
            link_reference: true,
            ..Default::default()
        };
        let mut linked = NestedCreationController::new(&recursive(), &cfg, ds);
        linked.select_existing("child", &entry.id).unwrap();
        assert_eq!(linked.root_form().value("child"), Some(&entry.as_reference()));
    }
}

