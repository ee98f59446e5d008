//! Rule memoization
//!
//! Rules are interned by [`RuleKey`]: the same `(kind, node, depth)` always
//! yields the same [`RuleId`], and its body is compiled at most once per
//! cache. Compilation happens outside the lock; when two threads race on the
//! same rule the first stored body wins.

use std::collections::HashMap;
use std::fmt;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use super::{Fragment, RuleId};
use crate::error::{ExtractError, Result};
use crate::schema::SchemaNode;

/// What a rule generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// One or more `- item` lines
    ListItems,
    /// One or more `key: value` lines
    MapEntries,
    /// The fields of a record
    Record,
}

/// Memoization key of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub kind: RuleKind,
    /// Element type, value type, or the record reference
    pub node: SchemaNode,
    pub depth: usize,
}

impl RuleKey {
    pub fn list_items(element: &SchemaNode, depth: usize) -> Self {
        Self {
            kind: RuleKind::ListItems,
            node: element.clone(),
            depth,
        }
    }

    pub fn map_entries(value: &SchemaNode, depth: usize) -> Self {
        Self {
            kind: RuleKind::MapEntries,
            node: value.clone(),
            depth,
        }
    }

    pub fn record(name: &str, depth: usize) -> Self {
        Self {
            kind: RuleKind::Record,
            node: SchemaNode::record(name),
            depth,
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RuleKind::ListItems => "items",
            RuleKind::MapEntries => "entries",
            RuleKind::Record => "record",
        };
        write!(f, "{} {} @{}", kind, self.node, self.depth)
    }
}

#[derive(Debug)]
struct Slot {
    key: RuleKey,
    body: Option<Fragment>,
}

#[derive(Debug, Default)]
struct CacheInner {
    index: HashMap<RuleKey, RuleId>,
    slots: Vec<Slot>,
}

/// Thread-safe table of interned rules and their compiled bodies
#[derive(Debug, Default)]
pub struct FragmentCache {
    inner: Mutex<CacheInner>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock()
    }

    /// Id for `key`, allocating a new rule the first time the key is seen
    pub fn intern(&self, key: RuleKey) -> RuleId {
        let mut inner = self.lock();
        if let Some(id) = inner.index.get(&key) {
            return *id;
        }
        let id = RuleId::new(inner.slots.len());
        debug!(rule = %id, key = %key, "interned rule");
        inner.index.insert(key.clone(), id);
        inner.slots.push(Slot { key, body: None });
        id
    }

    pub fn key(&self, id: RuleId) -> Option<RuleKey> {
        self.lock().slots.get(id.index()).map(|slot| slot.key.clone())
    }

    /// Compiled body, if the rule has been resolved before
    pub fn body(&self, id: RuleId) -> Option<Fragment> {
        self.lock()
            .slots
            .get(id.index())
            .and_then(|slot| slot.body.clone())
    }

    /// Store a compiled body and return the one that ends up cached
    pub fn fill(&self, id: RuleId, body: Fragment) -> Result<Fragment> {
        let mut inner = self.lock();
        let slot = inner
            .slots
            .get_mut(id.index())
            .ok_or(ExtractError::UnknownRule(id))?;
        match &slot.body {
            Some(existing) => Ok(existing.clone()),
            None => {
                trace!(rule = %id, body = %body, "compiled rule");
                slot.body = Some(body.clone());
                Ok(body)
            }
        }
    }

    /// Number of interned rules
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rules whose body has been compiled
    pub fn compiled(&self) -> usize {
        self.lock()
            .slots
            .iter()
            .filter(|slot| slot.body.is_some())
            .count()
    }
}
