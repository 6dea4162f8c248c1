use serde_json::Value;

use crate::data::{
    field::{FieldKind, FieldModel},
    schema::SchemaError,
    source::{ObjectDataSource, ObjectEntry},
};

/// Warning shown next to reference-kind fields.
pub const REFERENCE_WARNING: &str =
    "This field is a reference; pick an existing object to continue.";

/// The control a renderer must draw for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Free text input.
    Text,
    /// Closed choice list built from `enum`.
    Choice(Vec<Value>),
    /// Floating-point input.
    Number,
    /// Integer input.
    Integer,
    /// Boolean toggle.
    Toggle,
    /// List of scalar values.
    List,
    /// Pick an existing object of `type_name` or create a new one.
    ObjectSelect {
        type_name: String,
        options: Vec<ObjectEntry>,
        can_create: bool,
    },
    /// Pick one of the available references.
    ReferenceChooser {
        refs: Vec<String>,
        warning: &'static str,
        circular: bool,
    },
}

impl Control {
    /// Describe the control for `field`.
    ///
    /// Object fields list the entries already created for the field's type;
    /// reference fields list `refs`.
    pub fn for_field(field: &FieldModel, data_source: &ObjectDataSource, refs: &[String]) -> Self {
        if let Some(variants) = &field.schema.enum_values
            && field.kind != FieldKind::Object
            && field.kind != FieldKind::Reference
        {
            return Control::Choice(variants.clone());
        }
        match field.kind {
            FieldKind::String => Control::Text,
            FieldKind::Number => Control::Number,
            FieldKind::Integer => Control::Integer,
            FieldKind::Boolean => Control::Toggle,
            FieldKind::Array => Control::List,
            FieldKind::Object => {
                let type_name = field.object_type_name();
                Control::ObjectSelect {
                    options: data_source.entries(&type_name).to_vec(),
                    type_name,
                    can_create: true,
                }
            }
            FieldKind::Reference => Control::ReferenceChooser {
                refs: refs.to_vec(),
                warning: REFERENCE_WARNING,
                circular: field.is_cycle(),
            },
        }
    }
}

/// Renders one field at a time.
///
/// Implementations live outside the core; the core only decides which
/// [`Control`] each field needs.
pub trait FormRenderer {
    fn render_field(&mut self, field: &FieldModel, value: Option<&Value>, control: &Control);
}

fn mismatch(path: &str, expected: impl Into<String>, value: &Value) -> SchemaError {
    SchemaError::TypeMismatch {
        path: path.to_string(),
        expected: expected.into(),
        actual: format!("{value}"),
    }
}

/// Check that `value` may be stored in `field`.
pub fn check_value(field: &FieldModel, value: &Value) -> Result<(), SchemaError> {
    let path = field.name.as_str();
    let type_ok = match field.kind {
        FieldKind::String => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Array => value.as_array().is_some_and(|arr| {
            arr.iter()
                .all(|v| v.is_string() || v.is_number() || v.is_boolean())
        }),
        // an object payload, or the id of an existing entry
        FieldKind::Object | FieldKind::Reference => value.is_object() || value.is_string(),
    };
    if !type_ok {
        let expected = match field.kind {
            FieldKind::Array => "array of string, number, or boolean".to_string(),
            FieldKind::Object | FieldKind::Reference => "object or object id".to_string(),
            kind => kind.to_string(),
        };
        return Err(mismatch(path, expected, value));
    }

    if let Some(variants) = &field.schema.enum_values
        && !variants.contains(value)
        && field.kind != FieldKind::Object
        && field.kind != FieldKind::Reference
    {
        return Err(mismatch(path, format!("one of: {variants:?}"), value));
    }
    Ok(())
}

/// Whether `value` counts as missing for a required field.
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
