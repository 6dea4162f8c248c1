//! Schema node model and parsing.
//!
//! [`SchemaNode`] is a deliberately small subset of JSON Schema (draft-07):
//! `type`, `properties`, `items`, `definitions`, `required`, `title`,
//! `description`, `enum` and `$ref`. Unknown keywords are ignored on input.
//!
//! Parsing is lenient about well-formed documents the model does not fully
//! cover: boolean subschemas become empty nodes, a `type` array keeps its
//! first non-`null` member, unknown types are dropped and tuple `items` keep
//! their first entry. Only malformed text is a parse error.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while parsing schemas or assigning field values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// The schema text could not be parsed.
    #[error("Invalid JSON: {message}")]
    Parse { message: String },
    /// A value does not fit the field it was assigned to.
    #[error("Type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    /// No field with this name exists in the form.
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

impl SchemaError {
    /// Name of the form field the error is reported against.
    pub fn field(&self) -> &str {
        match self {
            SchemaError::Parse { .. } => "schema",
            SchemaError::TypeMismatch { path, .. } => path,
            SchemaError::UnknownField(name) => name,
        }
    }
}

/// Primitive and structural types understood by the flattener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    /// Type named by a JSON Schema `type` keyword; `None` for `null` and
    /// unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SchemaType::String),
            "number" => Some(SchemaType::Number),
            "integer" => Some(SchemaType::Integer),
            "boolean" => Some(SchemaType::Boolean),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }
}

/// One JSON-Schema-like fragment.
///
/// A node with `reference` set is a reference node; its other structural
/// fields are ignored when it is resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_type: Option<SchemaType>,

    /// Declared properties, in declaration order.
    #[serde(
        default,
        deserialize_with = "subschema_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub properties: Option<IndexMap<String, SchemaNode>>,

    #[serde(
        default,
        deserialize_with = "item_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub items: Option<Box<SchemaNode>>,

    /// Named reusable fragments, looked up through `#/definitions/<name>`.
    #[serde(
        default,
        deserialize_with = "subschema_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub definitions: Option<IndexMap<String, SchemaNode>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// A subschema as written: a node, or `true`/`false`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Subschema {
    Flag(bool),
    Node(Box<SchemaNode>),
}

impl From<Subschema> for SchemaNode {
    fn from(sub: Subschema) -> Self {
        match sub {
            Subschema::Flag(_) => SchemaNode::default(),
            Subschema::Node(node) => *node,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Items {
    Tuple(Vec<Subschema>),
    Single(Subschema),
}

fn lenient_type<'de, D>(deserializer: D) -> Result<Option<SchemaType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(name)) => SchemaType::from_name(&name),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .find_map(SchemaType::from_name),
        _ => None,
    })
}

fn subschema_map<'de, D>(deserializer: D) -> Result<Option<IndexMap<String, SchemaNode>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, Subschema>>::deserialize(deserializer)?;
    Ok(raw.map(|map| map.into_iter().map(|(k, v)| (k, v.into())).collect()))
}

fn item_schema<'de, D>(deserializer: D) -> Result<Option<Box<SchemaNode>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Items>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Items::Single(sub)) => Some(Box::new(sub.into())),
        Some(Items::Tuple(subs)) => subs.into_iter().next().map(|sub| Box::new(sub.into())),
        None => None,
    })
}

impl SchemaNode {
    /// Parse a schema document from JSON text.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(text).map_err(|e| SchemaError::Parse {
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Build a schema node from an already parsed JSON value.
    ///
    /// A boolean document is the empty schema.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        if value.is_boolean() {
            return Ok(SchemaNode::default());
        }
        serde_json::from_value(value).map_err(|e| SchemaError::Parse {
            message: e.to_string(),
        })
    }

    /// A bare node carrying only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Whether this node is a `$ref` node.
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Whether this node describes an object, either by type or by shape.
    ///
    /// Reference nodes are never objects themselves.
    pub fn is_object(&self) -> bool {
        !self.is_reference()
            && (self.schema_type == Some(SchemaType::Object) || self.properties.is_some())
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.required.iter().any(|r| r == key)
    }

    /// Look up a named definition.
    pub fn definition(&self, name: &str) -> Option<&SchemaNode> {
        self.definitions.as_ref().and_then(|defs| defs.get(name))
    }

    /// Copy of this node with `definitions` taken from `root`.
    ///
    /// Sub-schemas copied out of a parent generally lack their own
    /// `definitions`; splicing the root's back in keeps definition lookups
    /// working inside nested creation contexts. When `root` has none, the
    /// node keeps its own.
    pub fn with_root_definitions(&self, root: &SchemaNode) -> SchemaNode {
        let mut merged = self.clone();
        if root.definitions.is_some() {
            merged.definitions = root.definitions.clone();
        }
        merged
    }
}

impl FromStr for SchemaNode {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Structural identity of a schema fragment.
///
/// The fingerprint is the canonical JSON serialization of the node. Property
/// and definition maps keep declaration order, so two fragments share a
/// fingerprint exactly when they are structurally equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(node: &SchemaNode) -> Self {
        let canonical = serde_json::to_string(node).unwrap_or_else(|_| format!("{node:?}"));
        Fingerprint(canonical)
    }
}
