//! Schema Model
//!
//! The compile-time description of "what can appear here". A [`Schema`] is a
//! root [`SchemaNode`] plus a [`SchemaCatalog`] of named records. Records are
//! referenced by name, so self-referential and mutually recursive schemas are
//! plain finite values.
//!
//! Schemas come from:
//! - Rust types deriving `schemars::JsonSchema` ([`Schema::of`])
//! - JSON Schema documents ([`Schema::from_json_schema`])
//! - Hand-built catalogs ([`Schema::new`])

pub mod analysis;
pub mod reflect;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ExtractError, Result};

pub use analysis::{analyze_catalog, CatalogAnalysis};

// =============================================================================
// Schema Node
// =============================================================================

/// Scalar leaf kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "boolean",
        }
    }
}

/// Shape of a value in the schema.
///
/// Hashable so that `(node, depth)` can key the fragment cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaNode {
    Scalar(ScalarKind),
    /// Declared values, each already rendered as a YAML scalar
    Enumeration(Vec<String>),
    /// Reference to a record in the catalog
    Record(String),
    ListOf(Box<SchemaNode>),
    /// String-keyed mapping
    MappingOf(Box<SchemaNode>),
    Optional(Box<SchemaNode>),
    /// One of several non-null alternatives
    Union(Vec<SchemaNode>),
}

impl SchemaNode {
    pub fn string() -> Self {
        Self::Scalar(ScalarKind::String)
    }

    pub fn integer() -> Self {
        Self::Scalar(ScalarKind::Integer)
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarKind::Float)
    }

    pub fn boolean() -> Self {
        Self::Scalar(ScalarKind::Boolean)
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::Record(name.into())
    }

    pub fn list_of(element: SchemaNode) -> Self {
        Self::ListOf(Box::new(element))
    }

    pub fn mapping_of(value: SchemaNode) -> Self {
        Self::MappingOf(Box::new(value))
    }

    /// Wrap in `Optional`, unless already optional
    pub fn optional(inner: SchemaNode) -> Self {
        match inner {
            SchemaNode::Optional(_) => inner,
            other => Self::Optional(Box::new(other)),
        }
    }

    /// Build an enumeration from declared string values
    pub fn enumeration<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<Value> = values
            .into_iter()
            .map(|v| Value::String(v.as_ref().to_string()))
            .collect();
        Self::enumeration_from_json(&values)
    }

    /// Build an enumeration from declared JSON values (strings, numbers, booleans)
    pub fn enumeration_from_json(values: &[Value]) -> Result<Self> {
        if values.is_empty() {
            return Err(ExtractError::unsupported("enum", "enumeration declares no values"));
        }
        let mut choices = Vec::with_capacity(values.len());
        for value in values {
            let rendered = yaml_scalar(value)?;
            if !choices.contains(&rendered) {
                choices.push(rendered);
            }
        }
        Ok(Self::Enumeration(choices))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, SchemaNode::Optional(_))
    }

    /// The node with one layer of `Optional` removed
    pub fn strip_optional(&self) -> &SchemaNode {
        match self {
            SchemaNode::Optional(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaNode::Scalar(kind) => write!(f, "{}", kind.as_str()),
            SchemaNode::Enumeration(choices) => write!(f, "enum{{{}}}", choices.join(",")),
            SchemaNode::Record(name) => write!(f, "{}", name),
            SchemaNode::ListOf(element) => write!(f, "list<{}>", element),
            SchemaNode::MappingOf(value) => write!(f, "map<string, {}>", value),
            SchemaNode::Optional(inner) => write!(f, "optional<{}>", inner),
            SchemaNode::Union(alternatives) => {
                let parts: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
                write!(f, "union<{}>", parts.join(" | "))
            }
        }
    }
}

/// Render a plain value as a single-line YAML scalar.
///
/// Plain when the text reads back as the same string, quoted otherwise.
pub fn yaml_scalar(value: &Value) -> Result<String> {
    let rendered = serde_yaml::to_string(value)?;
    let rendered = rendered.trim_end_matches('\n');
    if rendered.contains('\n') || rendered.is_empty() {
        return Err(ExtractError::unsupported(
            value.to_string(),
            "value has no single-line YAML rendering",
        ));
    }
    Ok(rendered.to_string())
}

// =============================================================================
// Fields and Records
// =============================================================================

/// A named field of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub node: SchemaNode,
    pub required: bool,
    /// Lines emitted as comments before the field
    pub documentation: Vec<String>,
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            required: true,
            documentation: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            required: false,
            ..Self::required(name, node)
        }
    }

    /// Append documentation, one comment line per text line
    pub fn with_doc(mut self, doc: impl AsRef<str>) -> Self {
        self.documentation
            .extend(doc.as_ref().lines().map(|l| l.trim_end().to_string()));
        self
    }

    /// Whether generation may emit `null` for this field
    pub fn is_nullable(&self) -> bool {
        !self.required || self.node.is_optional()
    }
}

/// A record type: fields in output order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Named records reachable from a schema
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    records: HashMap<String, RecordSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: RecordSchema) -> Self {
        self.insert(record);
        self
    }

    /// Insert or replace a record
    pub fn insert(&mut self, record: RecordSchema) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn get(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    /// Look up a record, failing for dangling references
    pub fn require(&self, name: &str) -> Result<&RecordSchema> {
        self.records
            .get(name)
            .ok_or_else(|| ExtractError::unsupported(name, "record is not defined in the catalog"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordSchema> {
        self.records.values()
    }
}

// =============================================================================
// Schema
// =============================================================================

/// A root node together with the records it can reach
#[derive(Debug, Clone)]
pub struct Schema {
    catalog: Arc<SchemaCatalog>,
    root: SchemaNode,
    /// Source JSON Schema document, when derived from one
    document: Option<Value>,
}

impl Schema {
    pub fn new(catalog: SchemaCatalog, root: SchemaNode) -> Self {
        Self {
            catalog: Arc::new(catalog),
            root,
            document: None,
        }
    }

    /// Schema whose root is the named record of `catalog`
    pub fn record(catalog: SchemaCatalog, name: impl Into<String>) -> Self {
        Self::new(catalog, SchemaNode::Record(name.into()))
    }

    /// Derive the schema of a Rust type from its `JsonSchema` implementation
    pub fn of<T: schemars::JsonSchema>() -> Result<Self> {
        let document = serde_json::to_value(schemars::schema_for!(T))?;
        Self::from_json_schema(document)
    }

    /// Derive a schema from a JSON Schema document
    pub fn from_json_schema(document: Value) -> Result<Self> {
        let (catalog, root) = reflect::reflect_document(&document)?;
        Ok(Self {
            catalog: Arc::new(catalog),
            root,
            document: Some(document),
        })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// The root record, if the root is a record
    pub fn root_record(&self) -> Option<&RecordSchema> {
        match &self.root {
            SchemaNode::Record(name) => self.catalog.get(name),
            _ => None,
        }
    }
}
