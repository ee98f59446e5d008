//! Type Dispatcher
//!
//! [`Compiler`] turns schema nodes into grammar [`Fragment`]s. Dispatch is a
//! closed match over [`SchemaNode`]:
//! - `Scalar` / `Enumeration` -> [`scalar`] strategies
//! - `ListOf` / `MappingOf` -> [`container`] strategies
//! - `Record` -> [`object`] compilation, behind a lazy rule
//! - `Optional` / `Union` -> a choice over the compiled alternatives
//!
//! Depth counts nesting levels; text at depth `d` is indented by
//! `d * indent_width` spaces.

pub mod container;
pub mod object;
pub mod scalar;

use std::sync::Arc;

use tracing::debug;

use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};
use crate::grammar::{Fragment, FragmentCache, Grammar, RuleId, RuleKey, RuleKind};
use crate::schema::{FieldDescriptor, SchemaCatalog, SchemaNode};

/// Literal offered for absent values
pub const NULL_LITERAL: &str = "null";

/// Where a compiled value sits in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// After `key: `; block content starts on a fresh line
    Value,
    /// After `- ` or at the document root; block content starts in place
    Inline,
}

/// Compiles schema nodes of one catalog, memoizing rules in its own cache
#[derive(Debug)]
pub struct Compiler {
    catalog: Arc<SchemaCatalog>,
    string_pattern: Arc<str>,
    indent_width: usize,
    cache: FragmentCache,
}

impl Compiler {
    pub fn new(catalog: Arc<SchemaCatalog>, config: &ExtractConfig) -> Self {
        Self {
            catalog,
            string_pattern: Arc::from(scalar::string_pattern(&config.strings.alphabet)),
            indent_width: config.layout.indent_width,
            cache: FragmentCache::new(),
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    /// Regex used for generated strings and mapping keys
    pub fn string_pattern(&self) -> &str {
        &self.string_pattern
    }

    /// Bundle a root fragment with this compiler for an engine
    pub fn grammar(&self, root: Fragment) -> Grammar<'_> {
        Grammar::new(root, self)
    }

    pub(crate) fn indent(&self, depth: usize) -> String {
        " ".repeat(depth * self.indent_width)
    }

    /// Leading text before block content in `slot` at `depth`
    pub(crate) fn lead(&self, depth: usize, slot: Slot) -> Fragment {
        match slot {
            Slot::Value => Fragment::literal(format!("\n{}", self.indent(depth))),
            Slot::Inline => Fragment::empty(),
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Value of a record field whose key sits at `depth`
    pub fn compile_field(&self, field: &FieldDescriptor, depth: usize) -> Result<Fragment> {
        let value = self.compile_node(field.node.strip_optional(), depth + 1, Slot::Value)?;
        if field.is_nullable() {
            Ok(Fragment::select([value, Fragment::literal(NULL_LITERAL)]))
        } else {
            Ok(value)
        }
    }

    /// Fragment for `node` with its content at `depth`
    pub fn compile_node(&self, node: &SchemaNode, depth: usize, slot: Slot) -> Result<Fragment> {
        match node {
            SchemaNode::Scalar(kind) => Ok(scalar::compile_scalar(*kind, &self.string_pattern)),
            SchemaNode::Enumeration(choices) => scalar::compile_enumeration(choices),
            SchemaNode::ListOf(element) => self.compile_list(element, depth, slot),
            SchemaNode::MappingOf(value) => self.compile_mapping(value, depth, slot),
            SchemaNode::Record(name) => self.compile_record_ref(name, depth, slot),
            SchemaNode::Optional(inner) => {
                let inner = self.compile_node(inner, depth, slot)?;
                Ok(Fragment::select([inner, Fragment::literal(NULL_LITERAL)]))
            }
            SchemaNode::Union(alternatives) => {
                if alternatives.is_empty() {
                    return Err(ExtractError::unsupported(
                        node.to_string(),
                        "union has no alternatives",
                    ));
                }
                let compiled = alternatives
                    .iter()
                    .map(|alternative| self.compile_node(alternative, depth, slot))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Fragment::select(compiled))
            }
        }
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Body of an interned rule, compiled on first request
    pub fn resolve(&self, id: RuleId) -> Result<Fragment> {
        if let Some(body) = self.cache.body(id) {
            return Ok(body);
        }
        let key = self.cache.key(id).ok_or(ExtractError::UnknownRule(id))?;
        let body = self.compile_rule(id, &key)?;
        self.cache.fill(id, body)
    }

    fn compile_rule(&self, id: RuleId, key: &RuleKey) -> Result<Fragment> {
        debug!(rule = %id, key = %key, "compiling rule");
        match (key.kind, &key.node) {
            (RuleKind::ListItems, element) => self.list_items_body(id, element, key.depth),
            (RuleKind::MapEntries, value) => self.map_entries_body(id, value, key.depth),
            (RuleKind::Record, SchemaNode::Record(name)) => {
                self.compile_record(name, key.depth, &[])
            }
            (RuleKind::Record, other) => Err(ExtractError::unsupported(
                other.to_string(),
                "record rule keyed by a non-record node",
            )),
        }
    }
}
