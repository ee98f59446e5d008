//! JSON Schema Reflection
//!
//! Derives a [`SchemaCatalog`] and root [`SchemaNode`] from a JSON Schema
//! document. This is pure shape detection: objects with `properties` become
//! catalog records, everything else maps onto the closed set of node shapes.
//! Shapes outside that set are rejected with `UnsupportedType`.
//!
//! Documents produced by `schemars` are the main input, so the patterns it
//! emits are all covered:
//! - `{"$ref": "#/definitions/X"}` and `{"allOf": [{"$ref": ...}], "description": ...}`
//! - `{"type": ["string", "null"]}` and `{"anyOf": [{...}, {"type": "null"}]}`
//! - `{"type": "string", "enum": [...]}` and `{"oneOf": [{"enum": ["a"]}, ...]}`
//! - `{"type": "object", "additionalProperties": {...}}`

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::{FieldDescriptor, RecordSchema, ScalarKind, SchemaCatalog, SchemaNode};
use crate::error::{ExtractError, Result};

/// Root record name when the document has no `title`
pub const DEFAULT_ROOT_NAME: &str = "Root";

/// Derive catalog and root node from a JSON Schema document
pub fn reflect_document(document: &Value) -> Result<(SchemaCatalog, SchemaNode)> {
    let root_name = document
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_ROOT_NAME)
        .to_string();

    let mut reflector = Reflector {
        document,
        root_name,
        catalog: SchemaCatalog::new(),
        in_progress: HashSet::new(),
        resolving: HashSet::new(),
    };

    let root = match document.as_object() {
        Some(object) if is_record_schema(object) => {
            let name = reflector.root_name.clone();
            reflector.register_record(&name, object)?;
            SchemaNode::Record(name)
        }
        _ => {
            let location = reflector.root_name.clone();
            reflector.node(document, &location)?
        }
    };

    debug!(
        root = %root,
        records = reflector.catalog.len(),
        "reflected JSON Schema document"
    );
    Ok((reflector.catalog, root))
}

struct Reflector<'a> {
    document: &'a Value,
    root_name: String,
    catalog: SchemaCatalog,
    /// Records whose fields are being built (self references resolve to these)
    in_progress: HashSet<String>,
    /// Non-record definitions being resolved (guards alias cycles)
    resolving: HashSet<String>,
}

impl<'a> Reflector<'a> {
    fn register_record(&mut self, name: &str, object: &Map<String, Value>) -> Result<()> {
        if self.catalog.contains(name) || !self.in_progress.insert(name.to_string()) {
            return Ok(());
        }

        let required: HashSet<&str> = object
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut record = RecordSchema::new(name);
        if let Some(properties) = object.get("properties").and_then(Value::as_object) {
            for (field_name, field_schema) in properties {
                let location = format!("{}.{}", name, field_name);
                let node = self.node(field_schema, &location)?;
                record.fields.push(FieldDescriptor {
                    name: field_name.clone(),
                    node,
                    required: required.contains(field_name.as_str()),
                    documentation: documentation(field_schema),
                });
            }
        }

        self.in_progress.remove(name);
        self.catalog.insert(record);
        Ok(())
    }

    fn node(&mut self, schema: &Value, location: &str) -> Result<SchemaNode> {
        let Some(object) = schema.as_object() else {
            return Err(ExtractError::unsupported(
                location,
                format!("schema `{}` is not an object", schema),
            ));
        };

        if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
            return self.reference(reference, location);
        }

        let node = self.shape(object, location)?;
        if object.get("nullable").and_then(Value::as_bool).unwrap_or(false) {
            Ok(SchemaNode::optional(node))
        } else {
            Ok(node)
        }
    }

    fn shape(&mut self, object: &Map<String, Value>, location: &str) -> Result<SchemaNode> {
        if let Some(all_of) = object.get("allOf").and_then(Value::as_array) {
            return match all_of.as_slice() {
                [single] => self.node(single, location),
                _ => Err(ExtractError::unsupported(
                    location,
                    "allOf composition of several schemas",
                )),
            };
        }

        for key in ["anyOf", "oneOf"] {
            if let Some(branches) = object.get(key).and_then(Value::as_array) {
                return self.alternatives(branches, location);
            }
        }

        if let Some(values) = object.get("enum").and_then(Value::as_array) {
            return enumeration(values, location);
        }

        if let Some(value) = object.get("const") {
            return enumeration(std::slice::from_ref(value), location);
        }

        match object.get("type") {
            Some(Value::String(json_type)) => self.typed(json_type, object, location),
            Some(Value::Array(json_types)) => {
                let mut nullable = false;
                let mut nodes = Vec::new();
                for json_type in json_types {
                    match json_type.as_str() {
                        Some("null") => nullable = true,
                        Some(json_type) => nodes.push(self.typed(json_type, object, location)?),
                        None => {
                            return Err(ExtractError::unsupported(
                                location,
                                "type array contains a non-string entry",
                            ))
                        }
                    }
                }
                let node = combine(nodes, location)?;
                Ok(if nullable { SchemaNode::optional(node) } else { node })
            }
            None if object.contains_key("properties") => self.typed("object", object, location),
            _ => Err(ExtractError::unsupported(location, "schema declares no type")),
        }
    }

    fn typed(
        &mut self,
        json_type: &str,
        object: &Map<String, Value>,
        location: &str,
    ) -> Result<SchemaNode> {
        match json_type {
            "string" => Ok(SchemaNode::Scalar(ScalarKind::String)),
            "integer" => Ok(SchemaNode::Scalar(ScalarKind::Integer)),
            "number" => Ok(SchemaNode::Scalar(ScalarKind::Float)),
            "boolean" => Ok(SchemaNode::Scalar(ScalarKind::Boolean)),
            "array" => {
                if object.contains_key("prefixItems") {
                    return Err(ExtractError::unsupported(location, "tuple arrays"));
                }
                match object.get("items") {
                    Some(items @ Value::Object(_)) => {
                        let element = self.node(items, &format!("{}[]", location))?;
                        Ok(SchemaNode::list_of(element))
                    }
                    Some(Value::Array(_)) => {
                        Err(ExtractError::unsupported(location, "tuple arrays"))
                    }
                    _ => Err(ExtractError::unsupported(location, "array without an items schema")),
                }
            }
            "object" => {
                if is_record_schema(object) {
                    self.register_record(location, object)?;
                    return Ok(SchemaNode::Record(location.to_string()));
                }
                match object.get("additionalProperties") {
                    Some(value @ Value::Object(_)) => {
                        let value = self.node(value, &format!("{}[*]", location))?;
                        Ok(SchemaNode::mapping_of(value))
                    }
                    _ => Err(ExtractError::unsupported(
                        location,
                        "free-form object without properties or a value schema",
                    )),
                }
            }
            "null" => Err(ExtractError::unsupported(location, "bare null type")),
            other => Err(ExtractError::unsupported(
                location,
                format!("unknown JSON type `{}`", other),
            )),
        }
    }

    fn alternatives(&mut self, branches: &[Value], location: &str) -> Result<SchemaNode> {
        let mut nullable = false;
        let mut nodes = Vec::new();
        for (index, branch) in branches.iter().enumerate() {
            if is_null_schema(branch) {
                nullable = true;
                continue;
            }
            nodes.push(self.node(branch, &format!("{}/{}", location, index))?);
        }

        // oneOf of single-value string enums (documented enum variants)
        let all_enumerations = nodes.len() > 1
            && nodes.iter().all(|n| matches!(n, SchemaNode::Enumeration(_)));
        let node = if all_enumerations {
            let mut choices: Vec<String> = Vec::new();
            for node in nodes {
                if let SchemaNode::Enumeration(values) = node {
                    for value in values {
                        if !choices.contains(&value) {
                            choices.push(value);
                        }
                    }
                }
            }
            SchemaNode::Enumeration(choices)
        } else {
            combine(nodes, location)?
        };

        Ok(if nullable { SchemaNode::optional(node) } else { node })
    }

    fn reference(&mut self, reference: &str, location: &str) -> Result<SchemaNode> {
        let name = reference
            .strip_prefix("#/definitions/")
            .or_else(|| reference.strip_prefix("#/$defs/"));

        let Some(name) = name else {
            if reference == "#" && self.catalog_has_root() {
                return Ok(SchemaNode::Record(self.root_name.clone()));
            }
            return Err(ExtractError::unsupported(
                location,
                format!("reference `{}` is not a local definition", reference),
            ));
        };

        let document = self.document;
        let definition = document
            .get("definitions")
            .and_then(|d| d.get(name))
            .or_else(|| document.get("$defs").and_then(|d| d.get(name)));

        match definition {
            Some(Value::Object(object)) if is_record_schema(object) => {
                self.register_record(name, object)?;
                Ok(SchemaNode::Record(name.to_string()))
            }
            Some(definition) => {
                if !self.resolving.insert(name.to_string()) {
                    return Err(ExtractError::unsupported(
                        name,
                        "definition refers to itself without a record in between",
                    ));
                }
                let node = self.node(definition, name);
                self.resolving.remove(name);
                node
            }
            None if name == self.root_name && self.catalog_has_root() => {
                Ok(SchemaNode::Record(name.to_string()))
            }
            None => Err(ExtractError::unsupported(
                location,
                format!("definition `{}` not found", reference),
            )),
        }
    }

    fn catalog_has_root(&self) -> bool {
        self.catalog.contains(&self.root_name) || self.in_progress.contains(&self.root_name)
    }
}

fn is_record_schema(object: &Map<String, Value>) -> bool {
    let object_typed = match object.get("type") {
        None => true,
        Some(Value::String(t)) => t == "object",
        Some(_) => false,
    };
    object_typed && object.get("properties").map_or(false, Value::is_object)
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

fn enumeration(values: &[Value], location: &str) -> Result<SchemaNode> {
    let declared: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
    if declared.iter().any(|v| v.is_object() || v.is_array()) {
        return Err(ExtractError::unsupported(
            location,
            "enumeration values must be scalars",
        ));
    }
    let node = SchemaNode::enumeration_from_json(&declared)?;
    if declared.len() < values.len() {
        Ok(SchemaNode::optional(node))
    } else {
        Ok(node)
    }
}

fn combine(mut nodes: Vec<SchemaNode>, location: &str) -> Result<SchemaNode> {
    match nodes.len() {
        0 => Err(ExtractError::unsupported(location, "schema only admits null")),
        1 => Ok(nodes.remove(0)),
        _ => Ok(SchemaNode::Union(nodes)),
    }
}

/// Documentation lines: title, then each line of the description
fn documentation(schema: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(title) = schema.get("title").and_then(Value::as_str) {
        lines.push(title.trim().to_string());
    }
    if let Some(description) = schema.get("description").and_then(Value::as_str) {
        lines.extend(
            description
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_fields_in_order() {
        let document = json!({
            "title": "Person",
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string", "description": "Provide a name."},
                "age": {"type": "integer"},
                "height": {"type": "number"},
                "active": {"type": "boolean"}
            }
        });
        let (catalog, root) = reflect_document(&document).unwrap();
        assert_eq!(root, SchemaNode::record("Person"));

        let person = catalog.get("Person").unwrap();
        let names: Vec<&str> = person.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "height", "active"]);
        assert!(person.fields[0].required);
        assert!(!person.fields[1].required);
        assert_eq!(person.fields[0].documentation, vec!["Provide a name."]);
        assert_eq!(person.fields[2].node, SchemaNode::float());
    }

    #[test]
    fn test_nullable_type_array() {
        let document = json!({"type": ["string", "null"]});
        let (_, root) = reflect_document(&document).unwrap();
        assert_eq!(root, SchemaNode::optional(SchemaNode::string()));
    }

    #[test]
    fn test_any_of_reference_with_null() {
        let document = json!({
            "title": "Basket",
            "type": "object",
            "properties": {
                "fruit": {"anyOf": [{"$ref": "#/definitions/Fruit"}, {"type": "null"}]}
            },
            "definitions": {
                "Fruit": {"type": "string", "enum": ["pear", "banana", "apple"]}
            }
        });
        let (catalog, _) = reflect_document(&document).unwrap();
        let fruit = &catalog.get("Basket").unwrap().fields[0];
        assert_eq!(
            fruit.node,
            SchemaNode::optional(SchemaNode::enumeration(["pear", "banana", "apple"]).unwrap())
        );
        // Enumeration definitions are inlined, not registered as records
        assert!(!catalog.contains("Fruit"));
    }

    #[test]
    fn test_documented_enum_variants_merge() {
        let document = json!({
            "oneOf": [
                {"type": "string", "enum": ["low"], "description": "Low."},
                {"type": "string", "enum": ["high"], "description": "High."}
            ]
        });
        let (_, root) = reflect_document(&document).unwrap();
        assert_eq!(root, SchemaNode::enumeration(["low", "high"]).unwrap());
    }

    #[test]
    fn test_described_reference_unwraps_all_of() {
        let document = json!({
            "title": "Person",
            "type": "object",
            "properties": {
                "story": {
                    "description": "Their story.",
                    "allOf": [{"$ref": "#/definitions/Story"}]
                }
            },
            "definitions": {
                "Story": {
                    "type": "object",
                    "properties": {"summary": {"type": "string"}}
                }
            }
        });
        let (catalog, _) = reflect_document(&document).unwrap();
        let story = &catalog.get("Person").unwrap().fields[0];
        assert_eq!(story.node, SchemaNode::record("Story"));
        assert_eq!(story.documentation, vec!["Their story."]);
        assert!(catalog.contains("Story"));
    }

    #[test]
    fn test_inline_object_registers_record() {
        let document = json!({
            "title": "Order",
            "type": "object",
            "properties": {
                "shipping": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}}
                }
            }
        });
        let (catalog, _) = reflect_document(&document).unwrap();
        assert_eq!(
            catalog.get("Order").unwrap().fields[0].node,
            SchemaNode::record("Order.shipping")
        );
        assert!(catalog.contains("Order.shipping"));
    }

    #[test]
    fn test_mapping() {
        let document = json!({"type": "object", "additionalProperties": {"type": "integer"}});
        let (_, root) = reflect_document(&document).unwrap();
        assert_eq!(root, SchemaNode::mapping_of(SchemaNode::integer()));
    }

    #[test]
    fn test_scalar_union() {
        let document = json!({"type": ["integer", "string"]});
        let (_, root) = reflect_document(&document).unwrap();
        assert_eq!(
            root,
            SchemaNode::Union(vec![SchemaNode::integer(), SchemaNode::string()])
        );
    }

    #[test]
    fn test_unsupported_shapes() {
        for document in [
            json!({"type": "array", "items": [{"type": "string"}, {"type": "integer"}]}),
            json!({"type": "object"}),
            json!({"type": "null"}),
            json!({"description": "anything"}),
            json!({"$ref": "https://example.com/schema.json"}),
            json!(true),
        ] {
            match reflect_document(&document) {
                Err(ExtractError::UnsupportedType { .. }) => {}
                other => panic!("Expected UnsupportedType for {}, got {:?}", document, other),
            }
        }
    }

    #[test]
    fn test_alias_cycle_is_unsupported() {
        let document = json!({
            "$ref": "#/definitions/A",
            "definitions": {
                "A": {"type": "array", "items": {"$ref": "#/definitions/A"}}
            }
        });
        let err = reflect_document(&document).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType { .. }));
    }
}
