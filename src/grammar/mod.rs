//! Grammar Fragments
//!
//! A [`Fragment`] is an engine-agnostic description of the text that may be
//! generated at some point of a document. Building fragments performs no
//! generation; only handing a [`Grammar`] to an engine does.
//!
//! Recursive structure (list continuations, nested record bodies) is expressed
//! through [`Fragment::Rule`] references. Rule bodies are compiled on first
//! resolution and memoized in the compiler's [`FragmentCache`], so a
//! self-referential schema compiles to a finite set of rules.

pub mod cache;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::compile::Compiler;
use crate::error::Result;

pub use cache::{FragmentCache, RuleKey, RuleKind};

// =============================================================================
// Rule Identity
// =============================================================================

/// Identifier of an interned rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(usize);

impl RuleId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

// =============================================================================
// Fragment
// =============================================================================

/// A compiled generation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Exact text
    Literal(Arc<str>),
    /// Text matching a regular expression, anchored at the cursor
    Regex(Arc<str>),
    /// One of several alternatives, tried in order
    Select(Arc<[Fragment]>),
    /// Fragments in sequence
    Concat(Arc<[Fragment]>),
    /// Reference to a lazily compiled rule
    Rule(RuleId),
}

impl Fragment {
    pub fn literal(text: impl AsRef<str>) -> Self {
        Fragment::Literal(Arc::from(text.as_ref()))
    }

    pub fn regex(pattern: impl AsRef<str>) -> Self {
        Fragment::Regex(Arc::from(pattern.as_ref()))
    }

    pub fn rule(id: RuleId) -> Self {
        Fragment::Rule(id)
    }

    /// The empty literal
    pub fn empty() -> Self {
        Fragment::literal("")
    }

    /// Choice among alternatives; a single alternative is returned as is
    pub fn select(alternatives: impl IntoIterator<Item = Fragment>) -> Self {
        let mut flat: Vec<Fragment> = Vec::new();
        for alternative in alternatives {
            match alternative {
                Fragment::Select(inner) => flat.extend(inner.iter().cloned()),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        Fragment::Select(flat.into())
    }

    /// Sequence of parts, flattened with adjacent literals merged
    pub fn concat(parts: impl IntoIterator<Item = Fragment>) -> Self {
        let mut flat: Vec<Fragment> = Vec::new();
        let mut pending = String::new();

        fn push(flat: &mut Vec<Fragment>, pending: &mut String, part: Fragment) {
            match part {
                Fragment::Literal(text) => pending.push_str(&text),
                Fragment::Concat(inner) => {
                    for part in inner.iter() {
                        push(flat, pending, part.clone());
                    }
                }
                other => {
                    if !pending.is_empty() {
                        flat.push(Fragment::literal(pending.as_str()));
                        pending.clear();
                    }
                    flat.push(other);
                }
            }
        }

        for part in parts {
            push(&mut flat, &mut pending, part);
        }
        if !pending.is_empty() {
            flat.push(Fragment::literal(pending));
        }

        match flat.len() {
            0 => Fragment::empty(),
            1 => flat.remove(0),
            _ => Fragment::Concat(flat.into()),
        }
    }

    pub fn is_empty_literal(&self) -> bool {
        matches!(self, Fragment::Literal(text) if text.is_empty())
    }

    /// Rules referenced directly by this fragment, in order of appearance
    pub fn rules(&self) -> Vec<RuleId> {
        let mut found = Vec::new();
        self.collect_rules(&mut found);
        found
    }

    fn collect_rules(&self, found: &mut Vec<RuleId>) {
        match self {
            Fragment::Rule(id) => {
                if !found.contains(id) {
                    found.push(*id);
                }
            }
            Fragment::Select(parts) | Fragment::Concat(parts) => {
                for part in parts.iter() {
                    part.collect_rules(found);
                }
            }
            Fragment::Literal(_) | Fragment::Regex(_) => {}
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Literal(text) => write!(f, "{:?}", text),
            Fragment::Regex(pattern) => write!(f, "/{}/", pattern),
            Fragment::Rule(id) => write!(f, "{}", id),
            Fragment::Select(alternatives) => {
                write!(f, "( ")?;
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", alternative)?;
                }
                write!(f, " )")
            }
            Fragment::Concat(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Grammar
// =============================================================================

/// A root fragment together with the compiler that resolves its rules
#[derive(Clone)]
pub struct Grammar<'c> {
    root: Fragment,
    compiler: &'c Compiler,
}

impl<'c> Grammar<'c> {
    pub fn new(root: Fragment, compiler: &'c Compiler) -> Self {
        Self { root, compiler }
    }

    pub fn root(&self) -> &Fragment {
        &self.root
    }

    /// Body of a rule, compiling it on first use
    pub fn resolve(&self, id: RuleId) -> Result<Fragment> {
        self.compiler.resolve(id)
    }

    /// Human-readable listing of the root and the first `max_rules` reachable rules
    pub fn render(&self, max_rules: usize) -> Result<String> {
        let mut out = format!("root ::= {}\n", self.root);
        let mut queue: VecDeque<RuleId> = self.root.rules().into();
        let mut seen: HashSet<RuleId> = queue.iter().copied().collect();
        let mut shown = 0;

        while let Some(id) = queue.pop_front() {
            if shown == max_rules {
                out.push_str(&format!("... {} more rule(s) not shown\n", queue.len() + 1));
                break;
            }
            let body = self.resolve(id)?;
            let label = self
                .compiler
                .cache()
                .key(id)
                .map(|key| format!(" <{}>", key))
                .unwrap_or_default();
            out.push_str(&format!("{}{} ::= {}\n", id, label, body));
            shown += 1;

            for next in body.rules() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for Grammar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar").field("root", &self.root).finish()
    }
}
