//! The iterator protocol every operator in a query tree implements.
//!
//! Iteration is pull-based: a driver calls [`GraphIterator::advance`] on the
//! root, each operator pulls from its children and yields one result per
//! call. Errors do not travel through the `bool` returns; an operator that
//! fails records the error, returns `false`, and reports it from
//! [`GraphIterator::err`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::value::{TagMap, Value};

pub type Uid = u64;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique iterator id.
pub fn next_uid() -> Uid {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

pub type BoxIterator = Box<dyn GraphIterator>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterKind {
    Null,
    Fixed,
    All,
    And,
    Or,
    Not,
    Follow,
    Count,
    Variable,
    VariableContainer,
    Recursive,
}

impl fmt::Display for IterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IterKind::Null => "null",
            IterKind::Fixed => "fixed",
            IterKind::All => "all",
            IterKind::And => "and",
            IterKind::Or => "or",
            IterKind::Not => "not",
            IterKind::Follow => "follow",
            IterKind::Count => "count",
            IterKind::Variable => "variable",
            IterKind::VariableContainer => "variable_container",
            IterKind::Recursive => "recursive",
        };
        f.write_str(s)
    }
}

/// Output tags attached to an iterator.
///
/// Plain tags resolve to the iterator's current result; fixed tags always
/// resolve to their constant and win over plain tags of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tagger {
    tags: Vec<String>,
    fixed: BTreeMap<String, Value>,
}

impl Tagger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn add_fixed(&mut self, tag: impl Into<String>, value: Value) {
        self.fixed.insert(tag.into(), value);
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn fixed(&self) -> &BTreeMap<String, Value> {
        &self.fixed
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.fixed.is_empty()
    }

    pub fn copy_from(&mut self, other: &Tagger) {
        for tag in &other.tags {
            self.add(tag.clone());
        }
        for (tag, value) in &other.fixed {
            self.fixed.insert(tag.clone(), value.clone());
        }
    }

    /// Write this tagger's bindings for `result` into `dst`.
    pub fn apply(&self, result: Option<&Value>, dst: &mut TagMap) {
        if let Some(result) = result {
            for tag in &self.tags {
                dst.insert(tag.clone(), result.clone());
            }
        }
        for (tag, value) in &self.fixed {
            dst.insert(tag.clone(), value.clone());
        }
    }

    /// Every tag name this tagger can produce, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tags
            .iter()
            .cloned()
            .chain(self.fixed.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Cost model consumed by an external planner, plus live call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorStats {
    pub contains_cost: i64,
    pub next_cost: i64,
    pub size: i64,
    pub exact_size: bool,
    pub next: i64,
    pub contains: i64,
    pub contains_next: i64,
}

/// Live counters kept by an iterator instance. Never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub next: i64,
    pub contains: i64,
    pub contains_next: i64,
}

impl RunStats {
    pub fn fill(&self, stats: &mut IteratorStats) {
        stats.next = self.next;
        stats.contains = self.contains;
        stats.contains_next = self.contains_next;
    }
}

/// Planner/debugging view of an iterator tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub uid: Uid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub kind: IterKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iterators: Vec<Description>,
}

impl Description {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub trait GraphIterator: fmt::Debug {
    fn uid(&self) -> Uid;

    fn kind(&self) -> IterKind;

    fn tagger(&self) -> &Tagger;

    fn tagger_mut(&mut self) -> &mut Tagger;

    /// Pull the next result. Returns false once exhausted or failed, and keeps
    /// returning false until [`GraphIterator::reset`].
    fn advance(&mut self, ctx: &mut IterationContext) -> bool;

    /// Membership test. On success the iterator's result (and path state) is
    /// set as if `value` had been produced by iteration.
    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool;

    /// Move to the next alternative derivation of the current result.
    fn next_path(&mut self, ctx: &mut IterationContext) -> bool;

    fn result(&self) -> Option<&Value>;

    fn err(&self) -> Option<&IterError>;

    /// Materialize every tag binding implied by this subtree for the current
    /// result. Later subtrees overwrite earlier ones; fixed tags win.
    fn tag_results(&self, dst: &mut TagMap);

    /// A fresh copy with the same configuration and no iteration state.
    fn box_clone(&self) -> BoxIterator;

    fn reset(&mut self);

    /// Rewrite into an equivalent, cheaper iterator if possible.
    fn optimize(self: Box<Self>) -> (BoxIterator, bool);

    fn size(&self) -> (i64, bool);

    fn stats(&self) -> IteratorStats;

    fn describe(&self) -> Description;

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator>;

    /// Release resources. Idempotent: later calls return the first outcome.
    fn close(&mut self) -> IterResult<()>;
}

impl Clone for BoxIterator {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Close every iterator in `its`, continuing past failures, and return the
/// first error encountered.
pub fn close_all<'a>(its: impl IntoIterator<Item = &'a mut BoxIterator>) -> IterResult<()> {
    let mut first = None;
    for it in its {
        if let Err(err) = it.close() {
            tracing::debug!(uid = it.uid(), kind = %it.kind(), error = %err, "close failed");
            first.get_or_insert(err);
        }
    }
    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Default description for leaf-like iterators.
pub fn describe_leaf(it: &dyn GraphIterator, name: String) -> Description {
    Description {
        uid: it.uid(),
        name,
        kind: it.kind(),
        tags: it.tagger().names(),
        size: it.size().0,
        iterators: Vec::new(),
    }
}
