use std::fmt::Write as _;

use serde_json::Value;

use crate::{
    data::{
        field::FieldModel,
        item::{Control, FormRenderer},
        source::ObjectDataSource,
    },
    flatten::FlattenOutput,
    nested::NestedCreationController,
};

/// Plain-text [`FormRenderer`], one line per field.
#[derive(Debug, Default)]
pub struct TextRenderer {
    out: String,
    indent: usize,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent every line by `indent` levels of two spaces.
    pub fn with_indent(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl FormRenderer for TextRenderer {
    fn render_field(&mut self, field: &FieldModel, value: Option<&Value>, control: &Control) {
        let marker = if field.required { "*" } else { " " };
        let value = value.map(Value::to_string).unwrap_or_else(|| "-".into());
        let _ = writeln!(
            self.out,
            "{:indent$}{marker} {:<24} {:<9} {:>5}  {}  = {value}",
            "",
            field.name,
            field.kind,
            field.priority,
            describe_control(control),
            indent = self.indent * 2,
        );
    }
}

/// Short human description of a control.
pub fn describe_control(control: &Control) -> String {
    match control {
        Control::Text => "text".into(),
        Control::Choice(variants) => {
            let names: Vec<String> = variants.iter().map(Value::to_string).collect();
            format!("one of [{}]", names.join(", "))
        }
        Control::Number => "number".into(),
        Control::Integer => "integer".into(),
        Control::Toggle => "toggle".into(),
        Control::List => "list".into(),
        Control::ObjectSelect {
            type_name,
            options,
            can_create,
        } => {
            let create = if *can_create { ", can create" } else { "" };
            format!("select {type_name} ({} existing{create})", options.len())
        }
        Control::ReferenceChooser { refs, circular, .. } => {
            let cycle = if *circular { " (circular)" } else { "" };
            format!("reference to [{}]{cycle}", refs.join(", "))
        }
    }
}

/// Draw every field of the controller's active form with `renderer`.
pub fn render_with(ctl: &NestedCreationController, renderer: &mut impl FormRenderer) {
    let form = ctl.active_form();
    for (field, control) in ctl.controls() {
        renderer.render_field(field, form.value(&field.name), &control);
    }
}

/// Render the active form as text, indented by its nesting depth.
pub fn render_fields(ctl: &NestedCreationController) -> String {
    let mut renderer = TextRenderer::with_indent(ctl.depth());
    render_with(ctl, &mut renderer);
    renderer.finish()
}

/// List the reference map, the nested objects and the offered references.
pub fn describe_refs(output: &FlattenOutput) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "references:");
    if output.refs.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (path, target) in &output.refs {
        let note = if path == target { "  (cycle)" } else { "" };
        let _ = writeln!(out, "  {path} -> {target}{note}");
    }

    let _ = writeln!(out, "nested objects:");
    if output.nested_objects.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (path, schema) in &output.nested_objects {
        let props = schema.properties.as_ref().map_or(0, |p| p.len());
        let _ = writeln!(out, "  {path} ({props} properties)");
    }

    let _ = writeln!(out, "available: {}", output.available_refs().join(", "));
    out
}

/// List the created objects by type.
pub fn describe_data_source(data_source: &ObjectDataSource) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "available object data:");
    if data_source.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for type_name in data_source.type_names() {
        let _ = writeln!(out, "  {type_name}:");
        for entry in data_source.entries(type_name) {
            let _ = writeln!(out, "    {} {}", entry.id, entry.label);
        }
    }
    out
}
