use std::{fmt, sync::Arc};

use serde::Serialize;

use crate::data::schema::{SchemaNode, SchemaType};

/// Semantic type of a flattened field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// A `$ref` that points at a cycle or could not be resolved.
    Reference,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Reference => "reference",
        }
    }
}

impl From<SchemaType> for FieldKind {
    fn from(ty: SchemaType) -> Self {
        match ty {
            SchemaType::String => FieldKind::String,
            SchemaType::Number => FieldKind::Number,
            SchemaType::Integer => FieldKind::Integer,
            SchemaType::Boolean => FieldKind::Boolean,
            SchemaType::Array => FieldKind::Array,
            SchemaType::Object => FieldKind::Object,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Ranking bucket of a field, ordered object > reference > definition > primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldGroup {
    Object,
    Reference,
    Definition,
    Primitive,
}

/// One flattened, renderable field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldModel {
    /// Dotted path, or the definition key for definition-backed fields.
    /// Unique within one flattening pass; a definition key already in use
    /// gives way to the property path.
    pub name: String,
    pub kind: FieldKind,
    pub group: FieldGroup,
    pub required: bool,
    /// Nesting depth; root fields are at depth 0.
    pub depth: usize,
    /// Originating schema fragment.
    pub schema: Arc<SchemaNode>,
    /// Set on reference-kind fields: the cycle path or the unresolved `$ref`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circular_ref_path: Option<String>,
    /// Higher sorts first.
    pub priority: i32,
}

impl FieldModel {
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        group: FieldGroup,
        required: bool,
        depth: usize,
        schema: Arc<SchemaNode>,
    ) -> Self {
        let priority = crate::rank::rank(depth, group, required);
        Self {
            name: name.into(),
            kind,
            group,
            required,
            depth,
            schema,
            circular_ref_path: None,
            priority,
        }
    }

    pub fn with_circular_ref(mut self, path: impl Into<String>) -> Self {
        self.circular_ref_path = Some(path.into());
        self
    }

    /// Trailing segment of the dotted name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Type key used for data-source lookups and creation titles.
    ///
    /// Schema `title`, else the trailing path segment, else `Object`.
    pub fn object_type_name(&self) -> String {
        if let Some(title) = self.schema.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        match self.short_name() {
            "" => "Object".to_string(),
            s => s.to_string(),
        }
    }

    /// Whether this field points at a cycle on its own path rather than
    /// an unresolved or external `$ref`.
    pub fn is_cycle(&self) -> bool {
        self.kind == FieldKind::Reference
            && self.circular_ref_path.as_deref() == Some(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_name() {
        let titled = FieldModel::new(
            "a.b",
            FieldKind::Object,
            FieldGroup::Object,
            false,
            1,
            Arc::new(SchemaNode::titled("Address")),
        );
        assert_eq!(titled.object_type_name(), "Address");

        let untitled = FieldModel::new(
            "user.profile",
            FieldKind::Object,
            FieldGroup::Object,
            false,
            1,
            Arc::new(SchemaNode::default()),
        );
        assert_eq!(untitled.object_type_name(), "profile");

        let empty = FieldModel::new(
            "",
            FieldKind::Object,
            FieldGroup::Object,
            false,
            0,
            Arc::new(SchemaNode::default()),
        );
        assert_eq!(empty.object_type_name(), "Object");
    }

    #[test]
    fn test_priority_assigned_on_creation() {
        let f = FieldModel::new(
            "x",
            FieldKind::String,
            FieldGroup::Primitive,
            true,
            0,
            Arc::new(SchemaNode::default()),
        );
        assert_eq!(f.priority, 1030);
    }
}
