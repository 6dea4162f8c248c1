//! `$ref` resolution against a retained root schema.
//!
//! Only two reference forms are understood: `#` (the root itself) and
//! `#/definitions/<name>`. Everything else is reported as unresolved rather
//! than treated as an error.

use crate::data::schema::SchemaNode;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Syntactic form of a `$ref` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTarget<'r> {
    /// `#`
    Root,
    /// `#/definitions/<name>`
    Definition(&'r str),
    /// Any other form, including external documents.
    External,
}

impl<'r> RefTarget<'r> {
    pub fn parse(reference: &'r str) -> Self {
        if reference == "#" {
            RefTarget::Root
        } else if let Some(name) = reference.strip_prefix(DEFINITIONS_PREFIX) {
            RefTarget::Definition(name)
        } else {
            RefTarget::External
        }
    }
}

/// Outcome of [`resolve_ref`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Resolved(&'a SchemaNode),
    Unresolved(&'a str),
}

/// Resolve `reference` against `root`.
pub fn resolve_ref<'a>(reference: &'a str, root: &'a SchemaNode) -> Resolution<'a> {
    match RefTarget::parse(reference) {
        RefTarget::Root => Resolution::Resolved(root),
        RefTarget::Definition(name) => match root.definition(name) {
            Some(def) => Resolution::Resolved(def),
            None => Resolution::Unresolved(reference),
        },
        RefTarget::External => Resolution::Unresolved(reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> SchemaNode {
        SchemaNode::from_value(json!({
            "title": "root",
            "definitions": {
                "name": {"type": "string"}
            },
            "properties": {}
        }))
        .unwrap()
    }

    #[test]
    fn test_root_reference() {
        let root = root();
        assert_eq!(resolve_ref("#", &root), Resolution::Resolved(&root));
    }

    #[test]
    fn test_definition_reference() {
        let root = root();
        let Resolution::Resolved(resolved) = resolve_ref("#/definitions/name", &root) else {
            panic!("definition not resolved");
        };
        assert_eq!(resolved.schema_type, Some(crate::data::schema::SchemaType::String));
    }

    #[test]
    fn test_missing_definition() {
        let root = root();
        assert_eq!(
            resolve_ref("#/definitions/missing", &root),
            Resolution::Unresolved("#/definitions/missing")
        );
    }

    #[test]
    fn test_other_forms_unresolved() {
        let root = root();
        for r in ["http://example.com/s.json", "#/$defs/name", "other.json#/definitions/name", ""] {
            assert_eq!(resolve_ref(r, &root), Resolution::Unresolved(r));
        }
    }

    #[test]
    fn test_ref_target_parse() {
        assert_eq!(RefTarget::parse("#"), RefTarget::Root);
        assert_eq!(RefTarget::parse("#/definitions/a"), RefTarget::Definition("a"));
        assert_eq!(RefTarget::parse("#/properties/a"), RefTarget::External);
    }
}
