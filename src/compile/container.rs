//! Container Strategies
//!
//! Lists and mappings choose between the literal empty form and one or more
//! lines. The lines are a rule keyed by `(element, depth)`; each line ends
//! with a choice between stopping and a newline followed by the same rule, so
//! every continuation reuses the indentation of the first line.
//!
//! The item marker is `-` padded to the indent width, so an item's content
//! starts exactly one nesting level deeper than its marker.

use crate::error::Result;
use crate::grammar::{Fragment, RuleId, RuleKey};
use crate::schema::SchemaNode;

use super::{Compiler, Slot};

pub const EMPTY_LIST: &str = "[]";
pub const EMPTY_MAPPING: &str = "{}";

impl Compiler {
    /// `[]` or `- item` lines at `depth`
    pub fn compile_list(&self, element: &SchemaNode, depth: usize, slot: Slot) -> Result<Fragment> {
        let items = self.cache().intern(RuleKey::list_items(element, depth));
        Ok(Fragment::select([
            Fragment::literal(EMPTY_LIST),
            Fragment::concat([self.lead(depth, slot), Fragment::rule(items)]),
        ]))
    }

    /// `{}` or `key: value` lines at `depth`
    pub fn compile_mapping(&self, value: &SchemaNode, depth: usize, slot: Slot) -> Result<Fragment> {
        let entries = self.cache().intern(RuleKey::map_entries(value, depth));
        Ok(Fragment::select([
            Fragment::literal(EMPTY_MAPPING),
            Fragment::concat([self.lead(depth, slot), Fragment::rule(entries)]),
        ]))
    }

    pub(crate) fn list_items_body(&self, id: RuleId, element: &SchemaNode, depth: usize) -> Result<Fragment> {
        let item = self.compile_node(element, depth + 1, Slot::Inline)?;
        Ok(Fragment::concat([
            Fragment::literal(self.item_marker()),
            item,
            self.continuation(id, depth),
        ]))
    }

    pub(crate) fn map_entries_body(&self, id: RuleId, value: &SchemaNode, depth: usize) -> Result<Fragment> {
        let value = self.compile_node(value, depth + 1, Slot::Value)?;
        Ok(Fragment::concat([
            Fragment::regex(self.string_pattern()),
            Fragment::literal(": "),
            value,
            self.continuation(id, depth),
        ]))
    }

    /// `-` followed by enough spaces to reach the next indentation level
    fn item_marker(&self) -> String {
        format!("-{}", " ".repeat(self.indent_width.saturating_sub(1).max(1)))
    }

    /// Stop, or start another line of the same rule
    fn continuation(&self, id: RuleId, depth: usize) -> Fragment {
        Fragment::select([
            Fragment::empty(),
            Fragment::concat([self.lead(depth, Slot::Value), Fragment::rule(id)]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use crate::grammar::RuleKind;
    use crate::schema::SchemaCatalog;
    use std::sync::Arc;

    fn compiler() -> Compiler {
        Compiler::new(Arc::new(SchemaCatalog::new()), &ExtractConfig::default())
    }

    #[test]
    fn test_list_offers_empty_form() {
        let c = compiler();
        let fragment = c.compile_list(&SchemaNode::string(), 1, Slot::Value).unwrap();
        match fragment {
            Fragment::Select(alternatives) => {
                assert_eq!(alternatives[0], Fragment::literal("[]"));
                match &alternatives[1] {
                    Fragment::Concat(parts) => {
                        assert_eq!(parts[0], Fragment::literal("\n  "));
                        assert!(matches!(parts[1], Fragment::Rule(_)));
                    }
                    other => panic!("Expected Concat, got {:?}", other),
                }
            }
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_list_has_no_lead() {
        let c = compiler();
        let fragment = c.compile_list(&SchemaNode::integer(), 0, Slot::Inline).unwrap();
        match fragment {
            Fragment::Select(alternatives) => assert!(matches!(alternatives[1], Fragment::Rule(_))),
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_mapping_offers_empty_form() {
        let c = compiler();
        let fragment = c.compile_mapping(&SchemaNode::integer(), 1, Slot::Value).unwrap();
        match fragment {
            Fragment::Select(alternatives) => assert_eq!(alternatives[0], Fragment::literal("{}")),
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_same_element_same_depth_shares_rule() {
        let c = compiler();
        let a = c.compile_list(&SchemaNode::string(), 1, Slot::Value).unwrap();
        let b = c.compile_list(&SchemaNode::string(), 1, Slot::Value).unwrap();
        let deeper = c.compile_list(&SchemaNode::string(), 2, Slot::Value).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rules(), b.rules());
        assert_ne!(a.rules(), deeper.rules());
    }

    #[test]
    fn test_list_items_rule_recurses_on_itself() {
        let c = compiler();
        let fragment = c.compile_list(&SchemaNode::integer(), 1, Slot::Value).unwrap();
        let id = fragment.rules()[0];
        assert_eq!(c.cache().key(id).map(|k| k.kind), Some(RuleKind::ListItems));

        let body = c.resolve(id).unwrap();
        assert_eq!(
            body.to_string(),
            format!("\"- \" /\\d+/ ( \"\" | \"\\n  \" {} )", id)
        );
    }

    #[test]
    fn test_item_marker_spans_one_level() {
        let mut config = ExtractConfig::default();
        config.layout.indent_width = 4;
        let c = Compiler::new(Arc::new(SchemaCatalog::new()), &config);
        let fragment = c.compile_list(&SchemaNode::integer(), 1, Slot::Value).unwrap();
        let id = fragment.rules()[0];

        let body = c.resolve(id).unwrap();
        assert_eq!(
            body.to_string(),
            format!("\"-   \" /\\d+/ ( \"\" | \"\\n    \" {} )", id)
        );
    }

    #[test]
    fn test_map_entries_rule() {
        let c = compiler();
        let fragment = c.compile_mapping(&SchemaNode::boolean(), 0, Slot::Inline).unwrap();
        let id = fragment.rules()[0];
        let body = c.resolve(id).unwrap();
        match body {
            Fragment::Concat(parts) => {
                assert_eq!(parts[0], Fragment::regex(c.string_pattern()));
                assert_eq!(parts[1], Fragment::literal(": "));
                assert_eq!(parts.last().map(|p| p.rules()), Some(vec![id]));
            }
            other => panic!("Expected Concat, got {:?}", other),
        }
    }
}
