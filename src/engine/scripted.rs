//! Scripted engine
//!
//! Forces a grammar against a recorded completion instead of sampling from a
//! model. The fragment tree is walked depth-first with a stack of pending
//! fragments; each `Select` pushes one choice point per alternative, so a
//! failed branch backtracks to the next alternative at the same offset.
//! The run succeeds only when the whole script is consumed.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::Engine;
use crate::error::{ExtractError, Result};
use crate::grammar::{Fragment, Grammar};

/// Deterministic engine replaying a recorded completion
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    transcript: String,
    script: String,
    /// Anchored regexes by source pattern
    patterns: HashMap<Arc<str>, Regex>,
}

impl ScriptedEngine {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            transcript: prompt.into(),
            ..Self::default()
        }
    }

    /// Completion to replay on the next run
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn set_script(&mut self, script: impl Into<String>) {
        self.script = script.into();
    }

    /// Append text to the transcript outside of generation
    pub fn push_prompt(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}

impl Engine for ScriptedEngine {
    fn transcript(&self) -> &str {
        &self.transcript
    }

    fn run(&mut self, grammar: &Grammar<'_>) -> Result<()> {
        match force(grammar, &self.script, &mut self.patterns)? {
            Forced::Matched => {
                debug!(bytes = self.script.len(), "script accepted by grammar");
                self.transcript.push_str(&self.script);
                Ok(())
            }
            Forced::Diverged { offset } => {
                let rest: String = self.script[offset..].chars().take(40).collect();
                Err(ExtractError::Generation(format!(
                    "completion diverges from the grammar at byte {}: {:?}",
                    offset, rest
                )))
            }
        }
    }
}

enum Forced {
    Matched,
    /// Furthest offset any branch reached
    Diverged { offset: usize },
}

fn force(
    grammar: &Grammar<'_>,
    script: &str,
    patterns: &mut HashMap<Arc<str>, Regex>,
) -> Result<Forced> {
    let mut choices: Vec<(Vec<Fragment>, usize)> = vec![(vec![grammar.root().clone()], 0)];
    let mut furthest = 0;

    while let Some((mut stack, mut pos)) = choices.pop() {
        while let Some(fragment) = stack.pop() {
            match fragment {
                Fragment::Literal(text) => {
                    if !script[pos..].starts_with(&*text) {
                        break;
                    }
                    pos += text.len();
                }
                Fragment::Regex(pattern) => {
                    let re = anchored(patterns, &pattern)?;
                    match re.find(&script[pos..]) {
                        Some(m) => pos += m.end(),
                        None => break,
                    }
                }
                Fragment::Concat(parts) => stack.extend(parts.iter().rev().cloned()),
                Fragment::Rule(id) => stack.push(grammar.resolve(id)?),
                Fragment::Select(alternatives) => {
                    // Pushed in reverse so the first alternative is tried first
                    for alternative in alternatives.iter().rev() {
                        let mut branch = stack.clone();
                        branch.push(alternative.clone());
                        choices.push((branch, pos));
                    }
                    break;
                }
            }
            furthest = furthest.max(pos);
            if stack.is_empty() && pos == script.len() {
                return Ok(Forced::Matched);
            }
        }
    }

    Ok(Forced::Diverged { offset: furthest })
}

fn anchored<'p>(patterns: &'p mut HashMap<Arc<str>, Regex>, pattern: &Arc<str>) -> Result<&'p Regex> {
    if !patterns.contains_key(pattern) {
        let re = Regex::new(&format!("^(?:{})", pattern))?;
        patterns.insert(Arc::clone(pattern), re);
    }
    patterns
        .get(pattern)
        .ok_or_else(|| ExtractError::Generation(format!("pattern /{}/ was not cached", pattern)))
}
