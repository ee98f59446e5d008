//! Object Compiler
//!
//! A record body is its fields in declared order, each as optional comment
//! lines, the escaped key and the field value. Fields are separated by a
//! newline plus the indentation of their depth; the first field carries no
//! prefix since the caller already positioned the cursor.

use serde_json::Value;

use crate::error::Result;
use crate::grammar::{Fragment, RuleKey};
use crate::schema::yaml_scalar;

use super::container::EMPTY_MAPPING;
use super::{Compiler, Slot};

impl Compiler {
    /// Body of record `name` with keys at `depth`, leaving out `skip`ped fields
    pub fn compile_record(&self, name: &str, depth: usize, skip: &[&str]) -> Result<Fragment> {
        let record = self.catalog().require(name)?;
        let separator = format!("\n{}", self.indent(depth));
        let mut parts = Vec::new();

        for field in record.fields.iter().filter(|f| !skip.contains(&f.name.as_str())) {
            if !parts.is_empty() {
                parts.push(Fragment::literal(&separator));
            }
            for line in &field.documentation {
                let comment = if line.is_empty() {
                    "#".to_string()
                } else {
                    format!("# {}", line)
                };
                parts.push(Fragment::literal(format!("{}{}", comment, separator)));
            }
            let key = yaml_scalar(&Value::String(field.name.clone()))?;
            parts.push(Fragment::literal(format!("{}: ", key)));
            parts.push(self.compile_field(field, depth)?);
        }

        Ok(Fragment::concat(parts))
    }

    /// A reference to record `name` whose fields sit at `depth`
    pub(crate) fn compile_record_ref(&self, name: &str, depth: usize, slot: Slot) -> Result<Fragment> {
        let record = self.catalog().require(name)?;
        if record.fields.is_empty() {
            return Ok(Fragment::literal(EMPTY_MAPPING));
        }
        let body = self.cache().intern(RuleKey::record(name, depth));
        Ok(Fragment::concat([self.lead(depth, slot), Fragment::rule(body)]))
    }
}
