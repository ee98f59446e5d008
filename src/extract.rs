//! Orchestrator
//!
//! [`Extractor`] drives one extraction:
//! 1. compile the schema into a grammar bracketed by the start and end markers,
//!    with pre-filled fields written out verbatim instead of generated
//! 2. make a single engine call
//! 3. cut the document out of the transcript, drop comment lines and parse it
//! 4. restore pre-filled values, prune nulls of absent fields and build the result
//!
//! No step is retried; any failure ends the extraction.

use jsonschema::JSONSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::compile::{Compiler, Slot};
use crate::config::{ExtractConfig, ExtractionConfig, MarkerConfig};
use crate::engine::Engine;
use crate::error::{ExtractError, Result};
use crate::grammar::{Fragment, Grammar};
use crate::schema::{
    analyze_catalog, CatalogAnalysis, RecordSchema, ScalarKind, Schema, SchemaNode,
};

/// Caller-supplied values for top-level fields
pub type Prefill = Map<String, Value>;

/// Compiles one schema and extracts values of it from engines
pub struct Extractor {
    schema: Schema,
    compiler: Compiler,
    markers: MarkerConfig,
    extraction: ExtractionConfig,
    analysis: CatalogAnalysis,
    validator: Option<JSONSchema>,
}

impl Extractor {
    pub fn new(schema: Schema, config: &ExtractConfig) -> Result<Self> {
        config.validate()?;
        let analysis = analyze_catalog(schema.catalog(), schema.root())?;
        let compiler = Compiler::new(schema.catalog().clone(), config);

        let validator = match schema.document() {
            Some(document) if config.extraction.validate_documents => Some(
                JSONSchema::compile(document)
                    .map_err(|e| ExtractError::unsupported("schema", e.to_string()))?,
            ),
            _ => None,
        };

        debug!(root = %schema.root(), records = schema.catalog().len(), "created extractor");
        Ok(Self {
            schema,
            compiler,
            markers: config.markers.clone(),
            extraction: config.extraction.clone(),
            analysis,
            validator,
        })
    }

    /// Extractor for a Rust type deriving `JsonSchema`
    pub fn for_type<T: JsonSchema>(config: &ExtractConfig) -> Result<Self> {
        Self::new(Schema::of::<T>()?, config)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn analysis(&self) -> &CatalogAnalysis {
        &self.analysis
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    /// The full grammar handed to the engine, markers included
    pub fn grammar(&self, prefill: &Prefill) -> Result<Grammar<'_>> {
        let body = if prefill.is_empty() {
            self.compiler.compile_node(self.schema.root(), 0, Slot::Inline)?
        } else {
            let record = self.prefill_record(prefill)?;
            let skip: Vec<&str> = prefill.keys().map(String::as_str).collect();
            Fragment::concat([
                Fragment::literal(prefill_yaml(record, prefill)?),
                self.compiler.compile_record(&record.name, 0, &skip)?,
            ])
        };

        Ok(self.compiler.grammar(Fragment::concat([
            Fragment::literal(&self.markers.start),
            body,
            Fragment::literal(&self.markers.end),
        ])))
    }

    /// Root record, after checking every pre-filled key is one of its fields
    fn prefill_record(&self, prefill: &Prefill) -> Result<&RecordSchema> {
        let record = self.schema.root_record();
        for key in prefill.keys() {
            match record {
                Some(record) if record.get_field(key).is_some() => {}
                _ => return Err(ExtractError::PrefillMismatch { field: key.clone() }),
            }
        }
        record.ok_or_else(|| ExtractError::PrefillMismatch {
            field: prefill.keys().next().cloned().unwrap_or_default(),
        })
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Run the engine and return the extracted document as JSON
    pub fn generate_value<E: Engine + ?Sized>(&self, engine: &mut E, prefill: &Prefill) -> Result<Value> {
        let value = self.run(engine, prefill)?;
        if let Some(validator) = &self.validator {
            if let Err(mut errors) = validator.validate(&value) {
                if let Some(error) = errors.next() {
                    let path = error.instance_path.to_string();
                    return Err(ExtractError::ConstructionFailure {
                        path: if path.is_empty() { "/".to_string() } else { path },
                        message: error.to_string(),
                    });
                }
            }
        }
        Ok(value)
    }

    /// Run the engine and construct a `T` from the extracted document
    pub fn generate<T: DeserializeOwned, E: Engine + ?Sized>(&self, engine: &mut E, prefill: &Prefill) -> Result<T> {
        let value = self.run(engine, prefill)?;
        serde_path_to_error::deserialize(value).map_err(|e| ExtractError::ConstructionFailure {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })
    }

    fn run<E: Engine + ?Sized>(&self, engine: &mut E, prefill: &Prefill) -> Result<Value> {
        let grammar = self.grammar(prefill)?;
        engine.run(&grammar)?;

        let document = extract_document(engine.transcript(), &self.markers)?;
        debug!(bytes = document.len(), "extracted document");
        let text = if self.extraction.strip_comments {
            strip_comment_lines(document)
        } else {
            document.to_string()
        };

        let mut value = parse_document(&text)?;
        if let SchemaNode::Record(_) = self.schema.root() {
            if value.is_null() {
                value = Value::Object(Map::new());
            }
            if let Value::Object(map) = &mut value {
                for (key, prefilled) in prefill {
                    map.insert(key.clone(), prefilled.clone());
                }
            }
        }
        self.normalize(self.schema.root(), &mut value);
        Ok(value)
    }

    /// Bring a parsed document in line with the schema before construction:
    /// `null`s of non-required fields are dropped so they read as missing, and
    /// numerals YAML took for strings (leading zeros) become numbers again
    fn normalize(&self, node: &SchemaNode, value: &mut Value) {
        match (node.strip_optional(), value) {
            (SchemaNode::Record(name), Value::Object(map)) => {
                let Some(record) = self.schema.catalog().get(name) else {
                    return;
                };
                for field in &record.fields {
                    let is_null = matches!(map.get(&field.name), Some(Value::Null));
                    if is_null && !field.required {
                        map.remove(&field.name);
                    } else if let Some(inner) = map.get_mut(&field.name) {
                        self.normalize(&field.node, inner);
                    }
                }
            }
            (SchemaNode::ListOf(element), Value::Array(items)) => {
                for item in items {
                    self.normalize(element, item);
                }
            }
            (SchemaNode::MappingOf(inner), Value::Object(map)) => {
                for item in map.values_mut() {
                    self.normalize(inner, item);
                }
            }
            (SchemaNode::Scalar(kind), value) => {
                if let Some(number) = value.as_str().and_then(|text| numeral(*kind, text)) {
                    *value = number;
                }
            }
            _ => {}
        }
    }
}

/// Number spelled by `text`, for numeric kinds whose pattern admits leading zeros
fn numeral(kind: ScalarKind, text: &str) -> Option<Value> {
    match kind {
        ScalarKind::Integer if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            text.parse::<u64>().ok().map(Value::from)
        }
        ScalarKind::Float
            if text.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'-') =>
        {
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

/// Extract a `T` in one call, using its derived schema and default configuration
pub fn generate_object<T, E>(engine: &mut E, prefill: &Prefill) -> Result<T>
where
    T: JsonSchema + DeserializeOwned,
    E: Engine + ?Sized,
{
    Extractor::for_type::<T>(&ExtractConfig::default())?.generate(engine, prefill)
}

// =============================================================================
// Document Helpers
// =============================================================================

/// Text strictly between the last start marker and the last end marker after it
pub fn extract_document<'t>(transcript: &'t str, markers: &MarkerConfig) -> Result<&'t str> {
    let start = transcript
        .rfind(&markers.start)
        .ok_or_else(|| ExtractError::MarkerNotFound {
            marker: markers.start.clone(),
        })?
        + markers.start.len();
    let end = transcript[start..]
        .rfind(&markers.end)
        .ok_or_else(|| ExtractError::MarkerNotFound {
            marker: markers.end.clone(),
        })?;
    Ok(&transcript[start..start + end])
}

/// Remove lines that hold only a comment
pub fn strip_comment_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse YAML text into a plain value; blank text is `null`
pub fn parse_document(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).map_err(|source| ExtractError::ParseFailure {
        text: text.to_string(),
        source,
    })
}

/// Pre-filled values as YAML, in the record's field order
fn prefill_yaml(record: &RecordSchema, prefill: &Prefill) -> Result<String> {
    let mut ordered = Map::new();
    for field in &record.fields {
        if let Some(value) = prefill.get(&field.name) {
            ordered.insert(field.name.clone(), value.clone());
        }
    }
    Ok(serde_yaml::to_string(&Value::Object(ordered))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn markers() -> MarkerConfig {
        MarkerConfig::default()
    }

    #[test]
    fn test_extract_document_uses_last_markers() {
        let transcript = "Use ```yaml\nfoo\n``` blocks.\n```yaml\nold: 1\n```\n```yaml\nname: \"Jack\"\n```";
        assert_eq!(extract_document(transcript, &markers()).unwrap(), "name: \"Jack\"");
    }

    #[test]
    fn test_extract_document_missing_start() {
        let err = extract_document("no block here", &markers()).unwrap_err();
        match err {
            ExtractError::MarkerNotFound { marker } => assert_eq!(marker, "\n```yaml\n"),
            other => panic!("Expected MarkerNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_document_missing_end() {
        let err = extract_document("prompt\n```yaml\nname: \"Jack\"", &markers()).unwrap_err();
        match err {
            ExtractError::MarkerNotFound { marker } => assert_eq!(marker, "\n```"),
            other => panic!("Expected MarkerNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_strip_comment_lines() {
        let text = "# The name\nname: \"a # b\"\nstory:\n  # nested\n  summary: \"x\"";
        assert_eq!(
            strip_comment_lines(text),
            "name: \"a # b\"\nstory:\n  summary: \"x\""
        );
    }

    #[test]
    fn test_parse_document() {
        assert_eq!(parse_document("").unwrap(), Value::Null);
        assert_eq!(
            parse_document("names: \n  - \"Jack\"\n  - \"Jill\"").unwrap(),
            json!({"names": ["Jack", "Jill"]})
        );
        let err = parse_document("key: [unclosed").unwrap_err();
        match err {
            ExtractError::ParseFailure { text, .. } => assert_eq!(text, "key: [unclosed"),
            other => panic!("Expected ParseFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_numeral() {
        assert_eq!(numeral(ScalarKind::Integer, "030"), Some(json!(30)));
        assert_eq!(numeral(ScalarKind::Integer, "0"), Some(json!(0)));
        assert_eq!(numeral(ScalarKind::Integer, ""), None);
        assert_eq!(numeral(ScalarKind::Integer, "3a"), None);
        assert_eq!(numeral(ScalarKind::Float, "-01.50"), Some(json!(-1.5)));
        assert_eq!(numeral(ScalarKind::String, "030"), None);
    }

    #[test]
    fn test_prefill_yaml_field_order() {
        use crate::schema::FieldDescriptor;
        let record = RecordSchema::new("Person")
            .field(FieldDescriptor::required("name", SchemaNode::string()))
            .field(FieldDescriptor::required("age", SchemaNode::integer()));
        let mut prefill = Prefill::new();
        prefill.insert("age".into(), json!(30));
        prefill.insert("name".into(), json!("Jack"));
        assert_eq!(prefill_yaml(&record, &prefill).unwrap(), "name: Jack\nage: 30\n");
    }
}
