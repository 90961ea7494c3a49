//! Test doubles: a tiny store over integer nodes, an adjacency-following
//! iterator, and an iterator that fails on demand.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    describe_leaf, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    Tagger, Uid,
};
use crate::primitives::Fixed;
use crate::store::{Morphism, QuadStore, StoreRef};
use crate::value::{Literal, TagMap, Value};

#[derive(Debug, Default)]
pub struct TestStore {
    nodes: Vec<i64>,
}

impl TestStore {
    pub fn with_nodes(nodes: impl IntoIterator<Item = i64>) -> StoreRef {
        Arc::new(Self {
            nodes: nodes.into_iter().collect(),
        })
    }
}

impl QuadStore for TestStore {
    fn name_of(&self, value: &Value) -> Option<Literal> {
        value.as_literal().cloned()
    }

    fn nodes_all_iterator(&self) -> BoxIterator {
        Box::new(Fixed::from_values(self.nodes.iter().map(|&n| Value::int(n))))
    }
}

/// Directed graph over integer literals.
pub type Graph = Arc<BTreeMap<i64, Vec<i64>>>;

pub fn graph(edges: &[(i64, i64)]) -> Graph {
    let mut adj: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for &(from, to) in edges {
        adj.entry(from).or_default().push(to);
    }
    Arc::new(adj)
}

pub fn follow_morphism(graph: Graph) -> Morphism {
    Arc::new(move |_store: &StoreRef, sub: BoxIterator| -> BoxIterator {
        Box::new(Edges::new(graph.clone(), sub))
    })
}

/// For every result of `sub`, yield its successors in `graph`.
#[derive(Debug)]
pub struct Edges {
    uid: Uid,
    tags: Tagger,
    graph: Graph,
    sub: BoxIterator,
    pending: Vec<i64>,
    result: Option<Value>,
}

impl Edges {
    pub fn new(graph: Graph, sub: BoxIterator) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            graph,
            sub,
            pending: Vec::new(),
            result: None,
        }
    }
}

impl GraphIterator for Edges {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Follow
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, ctx: &mut IterationContext) -> bool {
        loop {
            if let Some(next) = self.pending.pop() {
                self.result = Some(Value::int(next));
                return true;
            }
            if !self.sub.advance(ctx) {
                self.result = None;
                return false;
            }
            let from = self.sub.result().and_then(Value::as_int);
            let mut succ = from
                .and_then(|from| self.graph.get(&from).cloned())
                .unwrap_or_default();
            succ.reverse();
            self.pending = succ;
        }
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        let Some(target) = value.as_int() else {
            return false;
        };
        let sources: Vec<i64> = self
            .graph
            .iter()
            .filter(|(_, succ)| succ.contains(&target))
            .map(|(&from, _)| from)
            .collect();
        for from in sources {
            if self.sub.contains(ctx, &Value::int(from)) {
                self.result = Some(value.clone());
                return true;
            }
        }
        false
    }

    fn next_path(&mut self, ctx: &mut IterationContext) -> bool {
        self.sub.next_path(ctx)
    }

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn err(&self) -> Option<&IterError> {
        self.sub.err()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
        self.tags.apply(self.result.as_ref(), dst);
    }

    fn box_clone(&self) -> BoxIterator {
        Box::new(Edges::new(self.graph.clone(), self.sub.box_clone()))
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.result = None;
        self.sub.reset();
    }

    fn optimize(self: Box<Self>) -> (BoxIterator, bool) {
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        let edges: usize = self.graph.values().map(Vec::len).sum();
        (edges as i64, false)
    }

    fn stats(&self) -> IteratorStats {
        let (size, exact_size) = self.size();
        IteratorStats {
            next_cost: 2,
            contains_cost: 4,
            size,
            exact_size,
            ..IteratorStats::default()
        }
    }

    fn describe(&self) -> Description {
        let mut desc = describe_leaf(self, String::new());
        desc.iterators.push(self.sub.describe());
        desc
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) -> IterResult<()> {
        self.sub.close()
    }
}

/// Never yields; reports an upstream error from `advance` and, optionally,
/// from `close`.
#[derive(Debug, Clone)]
pub struct Failing {
    uid: Uid,
    tags: Tagger,
    advance_err: Option<IterError>,
    close_err: Option<IterError>,
    pub closes: usize,
}

impl Failing {
    pub fn new(message: &str) -> Self {
        let uid = next_uid();
        Self {
            uid,
            tags: Tagger::new(),
            advance_err: Some(IterError::Upstream {
                kind: IterKind::Fixed,
                uid,
                message: message.to_string(),
            }),
            close_err: None,
            closes: 0,
        }
    }

    pub fn closing_with(message: &str) -> Self {
        let uid = next_uid();
        Self {
            uid,
            tags: Tagger::new(),
            advance_err: None,
            close_err: Some(IterError::Close {
                kind: IterKind::Fixed,
                uid,
                message: message.to_string(),
            }),
            closes: 0,
        }
    }
}

impl GraphIterator for Failing {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Fixed
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, _ctx: &mut IterationContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &mut IterationContext, _value: &Value) -> bool {
        false
    }

    fn next_path(&mut self, _ctx: &mut IterationContext) -> bool {
        false
    }

    fn result(&self) -> Option<&Value> {
        None
    }

    fn err(&self) -> Option<&IterError> {
        self.advance_err.as_ref()
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn box_clone(&self) -> BoxIterator {
        Box::new(self.clone())
    }

    fn reset(&mut self) {}

    fn optimize(self: Box<Self>) -> (BoxIterator, bool) {
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        (0, true)
    }

    fn stats(&self) -> IteratorStats {
        IteratorStats::default()
    }

    fn describe(&self) -> Description {
        describe_leaf(self, "failing".to_string())
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        Vec::new()
    }

    fn close(&mut self) -> IterResult<()> {
        self.closes += 1;
        match &self.close_err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
