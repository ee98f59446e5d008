//! Catalog Analysis
//!
//! Builds the record reference graph of a catalog and checks it before any
//! compilation happens:
//! - every `Record(name)` reference resolves
//! - recursive records (SCCs with more than one member, or self references) are reported
//! - a cycle made only of mandatory edges has no finite instance and is rejected
//!
//! An edge is mandatory when the field is required, not optional, and the
//! record sits directly in the field (not behind a list, mapping or union,
//! which can all be satisfied without descending).

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::{RecordSchema, SchemaCatalog, SchemaNode};
use crate::error::{ExtractError, Result};

// =============================================================================
// Record Edge
// =============================================================================

/// A reference from one record's field to another record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEdge {
    pub field: String,
    /// Every instance of the source record contains an instance of the target
    pub mandatory: bool,
}

// =============================================================================
// Analysis Result
// =============================================================================

/// Result of analyzing a catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogAnalysis {
    /// Records taking part in a reference cycle
    recursive: BTreeSet<String>,
    /// Groups of mutually recursive records
    groups: Vec<Vec<String>>,
}

impl CatalogAnalysis {
    pub fn recursive(&self) -> &BTreeSet<String> {
        &self.recursive
    }

    pub fn is_recursive(&self, record: &str) -> bool {
        self.recursive.contains(record)
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }
}

// =============================================================================
// Analysis Functions
// =============================================================================

/// Analyze a catalog, starting from the root node
pub fn analyze_catalog(catalog: &SchemaCatalog, root: &SchemaNode) -> Result<CatalogAnalysis> {
    let mut root_refs = Vec::new();
    collect_references(root, true, &mut root_refs);
    for (name, _) in &root_refs {
        catalog.require(name)?;
    }

    let mut graph: DiGraph<String, RecordEdge> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
    let mut records: Vec<&RecordSchema> = catalog.records().collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));

    for record in &records {
        indices.insert(record.name.as_str(), graph.add_node(record.name.clone()));
    }

    for record in &records {
        let from = indices[record.name.as_str()];
        for field in &record.fields {
            let mut refs = Vec::new();
            let direct = field.required && !field.node.is_optional();
            collect_references(&field.node, direct, &mut refs);
            for (target, mandatory) in refs {
                let Some(&to) = indices.get(target.as_str()) else {
                    return Err(ExtractError::unsupported(
                        format!("{}.{}", record.name, field.name),
                        format!("references undefined record `{}`", target),
                    ));
                };
                graph.add_edge(
                    from,
                    to,
                    RecordEdge {
                        field: field.name.clone(),
                        mandatory,
                    },
                );
            }
        }
    }

    let mut analysis = CatalogAnalysis::default();
    for scc in kosaraju_scc(&graph) {
        let cyclic = scc.len() > 1
            || graph
                .edges_directed(scc[0], Direction::Outgoing)
                .any(|e| e.target() == scc[0]);
        if !cyclic {
            continue;
        }

        let mut members: Vec<String> = scc.iter().map(|idx| graph[*idx].clone()).collect();
        members.sort();
        check_productive(&graph, &scc)?;

        analysis.recursive.extend(members.iter().cloned());
        analysis.groups.push(members);
    }

    debug!(
        records = catalog.len(),
        recursive = ?analysis.recursive,
        "analyzed schema catalog"
    );
    Ok(analysis)
}

/// Collect `(record, mandatory)` references reachable inside a node
fn collect_references(node: &SchemaNode, direct: bool, out: &mut Vec<(String, bool)>) {
    match node {
        SchemaNode::Record(name) => out.push((name.clone(), direct)),
        SchemaNode::ListOf(inner) | SchemaNode::MappingOf(inner) | SchemaNode::Optional(inner) => {
            collect_references(inner, false, out)
        }
        SchemaNode::Union(alternatives) => {
            for alternative in alternatives {
                collect_references(alternative, false, out);
            }
        }
        SchemaNode::Scalar(_) | SchemaNode::Enumeration(_) => {}
    }
}

/// Reject an SCC whose members can only be completed by descending forever
fn check_productive(graph: &DiGraph<String, RecordEdge>, scc: &[NodeIndex]) -> Result<()> {
    let mut mandatory: DiGraph<NodeIndex, ()> = DiGraph::new();
    let mut local: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for idx in scc {
        local.insert(*idx, mandatory.add_node(*idx));
    }
    for idx in scc {
        for edge in graph.edges_directed(*idx, Direction::Outgoing) {
            if !edge.weight().mandatory {
                continue;
            }
            if let Some(&target) = local.get(&edge.target()) {
                mandatory.add_edge(local[idx], target, ());
            }
        }
    }

    for cycle in kosaraju_scc(&mandatory) {
        let first = cycle[0];
        let cyclic = cycle.len() > 1
            || mandatory
                .edges_directed(first, Direction::Outgoing)
                .any(|e| e.target() == first);
        if cyclic {
            let mut names: Vec<&String> = cycle.iter().map(|idx| &graph[mandatory[*idx]]).collect();
            names.sort();
            return Err(ExtractError::UnboundedRecursion {
                record: names[0].clone(),
            });
        }
    }
    Ok(())
}
