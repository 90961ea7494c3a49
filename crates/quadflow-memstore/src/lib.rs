//! quadflow-memstore: an in-memory quad store for the quadflow iterator core
//!
//! Node and predicate names are interned to u32 ids; adjacency is kept in
//! Roaring bitmaps keyed by `(node, predicate)` in both directions, so a hop
//! in either direction is a single map lookup.
//!
//! The store implements [`QuadStore`] (names and the all-nodes iterator) and
//! hands out edge-following morphisms ([`MemStore::out`], [`MemStore::in_`])
//! for use with `Recursive`.
//!
//! ```text
//! # social graph
//! alice follows bob .
//! bob   follows carol .
//! ```

pub mod interner;
mod iterators;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use roaring::RoaringBitmap;

use quadflow_iter::{BoxIterator, Literal, Morphism, NodeRef, QuadStore, StoreRef, Value};

pub use interner::StringInterner;
pub use iterators::{AllNodes, Follow};

/// Which end of an edge a hop starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// subject -> object
    Out,
    /// object -> subject
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Out => "out",
            Direction::In => "in",
        })
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    interner: Arc<StringInterner>,
    /// Every id that appears as a subject or object.
    nodes: Arc<RoaringBitmap>,
    /// (subject, predicate) -> objects
    forward: AHashMap<(u32, u32), RoaringBitmap>,
    /// (object, predicate) -> subjects
    backward: AHashMap<(u32, u32), RoaringBitmap>,
    predicate_edges: AHashMap<u32, u64>,
    quads: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one edge. Returns false if it was already present.
    pub fn add_quad(&mut self, subject: &str, predicate: &str, object: &str) -> bool {
        let s = self.interner.intern(subject);
        let p = self.interner.intern(predicate);
        let o = self.interner.intern(object);

        if !self.forward.entry((s, p)).or_default().insert(o) {
            return false;
        }
        self.backward.entry((o, p)).or_default().insert(s);
        *self.predicate_edges.entry(p).or_default() += 1;
        let nodes = Arc::make_mut(&mut self.nodes);
        nodes.insert(s);
        nodes.insert(o);
        self.quads += 1;
        true
    }

    /// Parse `subject predicate object .` lines. Blank lines and `#` comments
    /// are skipped. Returns the number of new edges.
    pub fn load_quads(&mut self, text: &str) -> Result<usize> {
        let mut added = 0;
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (subject, predicate, object) =
                parse_quad_line(line).with_context(|| format!("line {}", idx + 1))?;
            if self.add_quad(subject, predicate, object) {
                added += 1;
            }
        }
        tracing::debug!(added, nodes = self.nodes.len(), quads = self.quads, "quads loaded");
        Ok(added)
    }

    pub fn load_quads_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read quads from {}", path.display()))?;
        self.load_quads(&text)
            .with_context(|| format!("failed to load quads from {}", path.display()))
    }

    /// Resolve a node name to a handle carrying its display name.
    pub fn value_of(&self, name: &str) -> Option<Value> {
        let id = self.interner.id_of(name)?;
        self.nodes
            .contains(id)
            .then(|| node_value(&self.interner, id))
    }

    pub fn node_count(&self) -> u64 {
        self.nodes.len()
    }

    pub fn quad_count(&self) -> u64 {
        self.quads
    }

    pub fn predicate_id(&self, predicate: &str) -> Option<u32> {
        self.interner.id_of(predicate)
    }

    pub fn predicate_edges(&self, predicate: u32) -> u64 {
        self.predicate_edges.get(&predicate).copied().unwrap_or(0)
    }

    /// Node id behind `value`, if it names a node in this store.
    pub fn node_id(&self, value: &Value) -> Option<u32> {
        node_id(&self.interner, &self.nodes, value)
    }

    pub fn node_value(&self, id: u32) -> Value {
        node_value(&self.interner, id)
    }

    /// Nodes one hop from `node` along `predicate`.
    pub fn neighbors(&self, node: u32, predicate: u32, direction: Direction) -> Option<&RoaringBitmap> {
        match direction {
            Direction::Out => self.forward.get(&(node, predicate)),
            Direction::In => self.backward.get(&(node, predicate)),
        }
    }

    pub fn follow(self: &Arc<Self>, sub: BoxIterator, predicate: &str, direction: Direction) -> Follow {
        Follow::new(self.clone(), sub, predicate, direction)
    }

    /// Morphism following `predicate` from subject to object.
    pub fn out(self: &Arc<Self>, predicate: &str) -> Morphism {
        self.morphism(predicate, Direction::Out)
    }

    /// Morphism following `predicate` from object to subject.
    pub fn in_(self: &Arc<Self>, predicate: &str) -> Morphism {
        self.morphism(predicate, Direction::In)
    }

    fn morphism(self: &Arc<Self>, predicate: &str, direction: Direction) -> Morphism {
        let store = self.clone();
        let predicate = predicate.to_string();
        Arc::new(move |_: &StoreRef, sub: BoxIterator| -> BoxIterator {
            Box::new(store.follow(sub, &predicate, direction))
        })
    }
}

impl QuadStore for MemStore {
    fn name_of(&self, value: &Value) -> Option<Literal> {
        match value {
            Value::Node(n) => self.interner.lookup(n.id).map(Literal::String),
            Value::Fetched(lit) => Some(lit.clone()),
        }
    }

    fn nodes_all_iterator(&self) -> BoxIterator {
        Box::new(AllNodes::new(self.interner.clone(), self.nodes.clone()))
    }
}

fn parse_quad_line(line: &str) -> Result<(&str, &str, &str)> {
    let Some(body) = line.strip_suffix('.') else {
        bail!("missing terminating `.` in {line:?}");
    };
    let terms: Vec<&str> = body.split_whitespace().collect();
    match terms.as_slice() {
        [s, p, o] => Ok((s, p, o)),
        _ => bail!(
            "expected `subject predicate object .`, found {} terms",
            terms.len()
        ),
    }
}

pub(crate) fn node_id(interner: &StringInterner, nodes: &RoaringBitmap, value: &Value) -> Option<u32> {
    let id = match value {
        Value::Node(n) => n.id,
        Value::Fetched(Literal::String(s) | Literal::Iri(s)) => interner.id_of(s)?,
        Value::Fetched(_) => return None,
    };
    nodes.contains(id).then_some(id)
}

pub(crate) fn node_value(interner: &StringInterner, id: u32) -> Value {
    match interner.lookup(id) {
        Some(name) => Value::Node(NodeRef::named(id, name)),
        None => Value::node(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadflow_iter::primitives::{Fixed, Null};
    use quadflow_iter::{GraphIterator, IterKind, IterationContext, TagMap};

    const SOCIAL: &str = "
        # who follows whom
        alice follows bob .
        bob follows carol .
        carol follows alice .
        alice likes carol .
    ";

    fn social() -> Arc<MemStore> {
        let mut store = MemStore::new();
        assert_eq!(store.load_quads(SOCIAL).unwrap(), 4);
        Arc::new(store)
    }

    fn names(it: &mut dyn GraphIterator, ctx: &mut IterationContext) -> Vec<String> {
        let mut out = Vec::new();
        while it.advance(ctx) {
            out.push(it.result().unwrap().to_string());
        }
        out
    }

    #[test]
    fn loads_and_resolves_names() {
        let store = social();
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.quad_count(), 4);
        let alice = store.value_of("alice").unwrap();
        assert_eq!(alice.to_string(), "alice");
        assert_eq!(store.name_of(&alice), Some(Literal::String("alice".into())));
        // Predicates are interned but are not nodes.
        assert!(store.value_of("follows").is_none());
        assert!(store.value_of("dave").is_none());
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut store = MemStore::new();
        assert!(store.add_quad("a", "p", "b"));
        assert!(!store.add_quad("a", "p", "b"));
        assert_eq!(store.quad_count(), 1);
    }

    #[test]
    fn malformed_lines_report_line_numbers() {
        let mut store = MemStore::new();
        let err = store
            .load_quads("a p b .\n\n a p .\n")
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 3"), "{msg}");
        assert!(msg.contains("found 2 terms"), "{msg}");

        let err = store.load_quads("a p b").unwrap_err();
        assert!(format!("{err:#}").contains("missing terminating"));
    }

    #[test]
    fn all_nodes_in_id_order() {
        let store = social();
        let mut ctx = IterationContext::new();
        let mut all = store.nodes_all_iterator();
        assert_eq!(names(all.as_mut(), &mut ctx), vec!["alice", "bob", "carol"]);
        assert!(all.contains(&mut ctx, &Value::string("carol")));
        assert!(!all.contains(&mut ctx, &Value::string("follows")));
        assert_eq!(all.size(), (3, true));
    }

    #[test]
    fn follow_both_directions() {
        let store = social();
        let mut ctx = IterationContext::new();
        let alice = store.value_of("alice").unwrap();

        let sub = Box::new(Fixed::from_values([alice.clone()]));
        let mut out = store.follow(sub, "follows", Direction::Out);
        assert_eq!(names(&mut out, &mut ctx), vec!["bob"]);

        let sub = Box::new(Fixed::from_values([alice]));
        let mut back = store.follow(sub, "follows", Direction::In);
        assert_eq!(names(&mut back, &mut ctx), vec!["carol"]);

        let sub = Box::new(Fixed::from_values([Value::string("alice")]));
        let mut unknown = store.follow(sub, "knows", Direction::Out);
        assert!(!unknown.advance(&mut ctx));
        assert!(unknown.err().is_none());
    }

    #[test]
    fn follow_contains_checks_the_source() {
        let store = social();
        let mut ctx = IterationContext::new();
        let alice = store.value_of("alice").unwrap();
        let bob = store.value_of("bob").unwrap();
        let carol = store.value_of("carol").unwrap();

        let mut out = store.follow(Box::new(Fixed::from_values([alice])), "follows", Direction::Out);
        assert!(out.contains(&mut ctx, &bob));
        assert!(!out.contains(&mut ctx, &carol));
    }

    #[test]
    fn follow_tags_include_the_source() {
        let store = social();
        let mut ctx = IterationContext::new();
        let mut src = Fixed::from_values([store.value_of("bob").unwrap()]);
        src.tagger_mut().add("from");
        let mut hop = store.follow(Box::new(src), "follows", Direction::Out);
        hop.tagger_mut().add("to");

        assert!(hop.advance(&mut ctx));
        let mut tags = TagMap::new();
        hop.tag_results(&mut tags);
        assert_eq!(tags["from"].to_string(), "bob");
        assert_eq!(tags["to"].to_string(), "carol");
    }

    #[test]
    fn follow_over_null_optimizes_away() {
        let store = social();
        let hop = Box::new(store.follow(Box::new(Null::new()), "follows", Direction::Out));
        let (opt, changed) = hop.optimize();
        assert!(changed);
        assert_eq!(opt.kind(), IterKind::Null);
    }

    #[test]
    fn describe_names_the_hop() {
        let store = social();
        let hop = store.follow(Box::new(Fixed::new()), "likes", Direction::In);
        let desc = hop.describe();
        assert_eq!(desc.kind, IterKind::Follow);
        assert_eq!(desc.name, "in likes");
        assert_eq!(desc.iterators.len(), 1);
    }
}
