//! Schema flattening.
//!
//! A flattening pass walks a schema depth-first and produces the ordered
//! list of fields shown in one form, together with the nested object
//! schemas and internal references discovered on the way.
//!
//! Only the root object is expanded. Object properties become single
//! `object`-kind fields that are edited in their own nested creation
//! context, so a form never shows more than one level.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use indexmap::IndexMap;

use crate::{
    config::FormConfig,
    data::{
        field::{FieldGroup, FieldKind, FieldModel},
        schema::{Fingerprint, SchemaNode},
    },
    rank::{self, PriorityStrategy},
    resolver::{RefTarget, Resolution, resolve_ref},
};

/// Nested object schemas keyed by dotted path.
pub type NestedObjectMap = IndexMap<String, Arc<SchemaNode>>;

/// Internal `$ref` strings keyed by dotted path.
pub type ReferenceMap = IndexMap<String, String>;

/// Result of one flattening pass.
#[derive(Debug, Clone, Default)]
pub struct FlattenOutput {
    /// Fields in display order.
    pub fields: Vec<FieldModel>,
    pub nested_objects: NestedObjectMap,
    pub refs: ReferenceMap,
    /// The pass's own copy of the input schema.
    pub root: Arc<SchemaNode>,
}

impl FlattenOutput {
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// References a user can choose from: discovered ref paths, then root
    /// definition keys, then the `root`, `parent` and `self` tokens.
    pub fn available_refs(&self) -> Vec<String> {
        let mut out: Vec<String> = self.refs.keys().cloned().collect();
        if let Some(defs) = &self.root.definitions {
            for key in defs.keys() {
                if !out.contains(key) {
                    out.push(key.clone());
                }
            }
        }
        out.extend(["root", "parent", "self"].map(String::from));
        out
    }
}

/// Flattening entry point with an optional bulk ranking strategy.
#[derive(Clone, Default)]
pub struct Flattener {
    strategy: Option<Arc<dyn PriorityStrategy>>,
}

impl Flattener {
    /// A flattener using only the serial ranking.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn PriorityStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Build a flattener as configured.
    pub fn from_config(config: &FormConfig) -> Self {
        let flattener = Self::new();
        #[cfg(feature = "parallel")]
        if config.accelerated_ranking {
            return flattener.with_strategy(Arc::new(rank::ParallelRanker));
        }
        #[cfg(not(feature = "parallel"))]
        if config.accelerated_ranking {
            debug!("accelerated ranking requested but the `parallel` feature is disabled");
        }
        flattener
    }

    /// Run one flattening pass over `schema`.
    pub fn flatten(&self, schema: &SchemaNode) -> FlattenOutput {
        let root = Arc::new(schema.clone());
        let mut pass = Pass::default();
        pass.visit_node(&root, &root, "", 0, false);

        let mut fields = pass.fields;
        rank::sort_by_priority(&mut fields);
        if let Some(strategy) = &self.strategy {
            fields = rank::rerank(fields, strategy.as_ref());
        }

        debug!(
            "flattened {:?}: {} fields, {} nested objects, {} refs",
            root.title.as_deref().unwrap_or("<untitled>"),
            fields.len(),
            pass.nested_objects.len(),
            pass.refs.len()
        );

        FlattenOutput {
            fields,
            nested_objects: pass.nested_objects,
            refs: pass.refs,
            root,
        }
    }
}

impl std::fmt::Debug for Flattener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flattener")
            .field("strategy", &self.strategy.as_ref().map(|s| s.name()))
            .finish()
    }
}

/// Flatten with the serial ranking only.
pub fn flatten(schema: &SchemaNode) -> FlattenOutput {
    Flattener::new().flatten(schema)
}

/// State scoped to a single pass.
#[derive(Default)]
struct Pass {
    fields: Vec<FieldModel>,
    nested_objects: NestedObjectMap,
    refs: ReferenceMap,
    /// Fingerprints of the nodes on the active recursion path.
    visited: HashSet<Fingerprint>,
    /// Shallowest depth at which each sub-schema was recorded as nested.
    lowest_depth: HashMap<Fingerprint, usize>,
}

impl Pass {
    fn visit_node(
        &mut self,
        node: &SchemaNode,
        root: &Arc<SchemaNode>,
        path: &str,
        depth: usize,
        required: bool,
    ) {
        let fingerprint = Fingerprint::of(node);
        trace!("visit {path:?} at depth {depth}");

        if self.visited.contains(&fingerprint) {
            debug!("circular reference at {path:?}");
            let title = match path.rsplit('.').next() {
                Some(last) if !last.is_empty() => last,
                _ => "root",
            };
            self.refs.insert(path.to_string(), path.to_string());
            self.fields.push(
                FieldModel::new(
                    path,
                    FieldKind::Reference,
                    FieldGroup::Reference,
                    false,
                    depth,
                    Arc::new(SchemaNode::titled(title)),
                )
                .with_circular_ref(path),
            );
            return;
        }

        if !node.is_object() {
            return;
        }

        if depth > 0 {
            let schema = Arc::new(node.clone());
            self.record_nested(path, fingerprint, depth, &schema);
            self.fields.push(FieldModel::new(
                path,
                FieldKind::Object,
                FieldGroup::Object,
                required,
                depth,
                schema,
            ));
            return;
        }

        self.visited.insert(fingerprint.clone());
        if let Some(properties) = &node.properties {
            for (key, prop) in properties {
                let field_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let required = node.is_required(key);

                if let Some(reference) = &prop.reference {
                    self.visit_reference(reference, prop, root, &field_path, depth, required);
                } else if prop.is_object() {
                    self.visit_node(prop, root, &field_path, depth + 1, required);
                } else {
                    let kind = prop.schema_type.map(FieldKind::from).unwrap_or(FieldKind::String);
                    self.fields.push(FieldModel::new(
                        field_path,
                        kind,
                        FieldGroup::Primitive,
                        required,
                        depth,
                        Arc::new(prop.clone()),
                    ));
                }
            }
        }
        self.visited.remove(&fingerprint);
    }

    fn visit_reference(
        &mut self,
        reference: &str,
        prop: &SchemaNode,
        root: &Arc<SchemaNode>,
        field_path: &str,
        depth: usize,
        required: bool,
    ) {
        let key = field_path.rsplit('.').next().unwrap_or(field_path);
        match RefTarget::parse(reference) {
            RefTarget::Root => {
                self.refs.insert(field_path.to_string(), reference.to_string());
                self.record_nested(field_path, Fingerprint::of(root), depth, root);
                self.fields.push(FieldModel::new(
                    key,
                    FieldKind::Object,
                    FieldGroup::Object,
                    required,
                    depth,
                    Arc::clone(root),
                ));
            }
            RefTarget::Definition(name) => {
                let field_name = self.definition_field_name(name, field_path);
                match resolve_ref(reference, root) {
                    Resolution::Resolved(def) if def.properties.is_some() => {
                        let schema = Arc::new(def.clone());
                        self.record_nested(field_path, Fingerprint::of(def), depth, &schema);
                        self.fields.push(FieldModel::new(
                            field_name,
                            FieldKind::Object,
                            FieldGroup::Definition,
                            required,
                            depth,
                            schema,
                        ));
                    }
                    Resolution::Resolved(def) => {
                        let kind = def.schema_type.map(FieldKind::from).unwrap_or(FieldKind::String);
                        self.fields.push(FieldModel::new(
                            field_name,
                            kind,
                            FieldGroup::Primitive,
                            required,
                            depth,
                            Arc::new(def.clone()),
                        ));
                    }
                    Resolution::Unresolved(_) => {
                        debug!("unresolved definition {reference:?} at {field_path:?}");
                        self.refs.insert(field_path.to_string(), reference.to_string());
                        self.fields.push(
                            FieldModel::new(
                                field_name,
                                FieldKind::Reference,
                                FieldGroup::Reference,
                                required,
                                depth,
                                Arc::new(SchemaNode::titled(name)),
                            )
                            .with_circular_ref(reference),
                        );
                    }
                }
            }
            RefTarget::External => {
                debug!("unsupported reference {reference:?} at {field_path:?}");
                self.refs.insert(field_path.to_string(), reference.to_string());
                self.fields.push(
                    FieldModel::new(
                        key,
                        FieldKind::Reference,
                        FieldGroup::Reference,
                        required,
                        depth,
                        Arc::new(prop.clone()),
                    )
                    .with_circular_ref(reference),
                );
            }
        }
    }

    /// Definition-backed fields are named after the definition. When that
    /// name is already taken in this pass, the property path is used so
    /// every field stays addressable.
    fn definition_field_name(&self, name: &str, field_path: &str) -> String {
        if self.fields.iter().any(|f| f.name == name) {
            debug!("field name {name:?} taken, using {field_path:?}");
            field_path.to_string()
        } else {
            name.to_string()
        }
    }

    /// Record `schema` as the nested object at `path` unless the same
    /// sub-schema was already recorded at the same or a shallower depth.
    fn record_nested(
        &mut self,
        path: &str,
        fingerprint: Fingerprint,
        depth: usize,
        schema: &Arc<SchemaNode>,
    ) {
        let shallower = self
            .lowest_depth
            .get(&fingerprint)
            .is_none_or(|&seen| depth < seen);
        if shallower {
            self.nested_objects.insert(path.to_string(), Arc::clone(schema));
            self.lowest_depth.insert(fingerprint, depth);
        }
    }
}
