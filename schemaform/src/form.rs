//! Values and errors of one form.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::{
    data::{
        field::FieldModel,
        item::{check_value, is_missing},
        schema::{SchemaError, SchemaNode},
    },
    flatten::{FlattenOutput, Flattener},
};

/// Field name → entered value, in entry order.
pub type FormValues = IndexMap<String, Value>;

/// Field name → error message.
pub type FormErrors = IndexMap<String, String>;

pub const REQUIRED_MESSAGE: &str = "This field is required";

/// Required fields missing at save or submit time.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} required field(s) missing", .0.len())]
pub struct ValidationErrors(pub FormErrors);

/// One flattened form with its entered values.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub output: FlattenOutput,
    pub values: FormValues,
    pub errors: FormErrors,
}

impl FormState {
    /// Flatten `schema` into a fresh, empty form.
    pub fn from_schema(schema: &SchemaNode, flattener: &Flattener) -> Self {
        Self {
            output: flattener.flatten(schema),
            values: FormValues::new(),
            errors: FormErrors::new(),
        }
    }

    pub fn fields(&self) -> &[FieldModel] {
        &self.output.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.output.field(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set a field's value after checking it against the field.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), SchemaError> {
        let field = self
            .field(name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))?;
        check_value(field, &value)?;
        self.assign(name, value);
        Ok(())
    }

    /// Set a value without checks and clear its pending error.
    pub(crate) fn assign(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
        self.errors.shift_remove(name);
    }

    /// Check required fields, recording one error per missing field.
    pub fn validate(&mut self) -> Result<(), ValidationErrors> {
        let errors: FormErrors = self
            .output
            .fields
            .iter()
            .filter(|f| f.required && is_missing(self.values.get(&f.name)))
            .map(|f| (f.name.clone(), REQUIRED_MESSAGE.to_string()))
            .collect();
        self.errors = errors.clone();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// The entered values as a JSON object.
    pub fn payload(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect())
    }
}
