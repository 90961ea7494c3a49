//! Store-backed iterators: every node, and one-hop edge following.

use std::sync::Arc;

use roaring::RoaringBitmap;

use quadflow_iter::iterator::{describe_leaf, RunStats};
use quadflow_iter::primitives::Null;
use quadflow_iter::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterError, IterKind,
    IterResult, IterationContext, IteratorStats, TagMap, Tagger, Uid, Value,
};

use crate::interner::StringInterner;
use crate::{node_id, node_value, Direction, MemStore};

/// Every node in the store, in ascending id order.
#[derive(Debug)]
pub struct AllNodes {
    uid: Uid,
    tags: Tagger,
    interner: Arc<StringInterner>,
    nodes: Arc<RoaringBitmap>,
    index: u32,
    result: Option<Value>,
    runstats: RunStats,
}

impl AllNodes {
    pub(crate) fn new(interner: Arc<StringInterner>, nodes: Arc<RoaringBitmap>) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            interner,
            nodes,
            index: 0,
            result: None,
            runstats: RunStats::default(),
        }
    }
}

impl GraphIterator for AllNodes {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::All
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, _ctx: &mut IterationContext) -> bool {
        self.runstats.next += 1;
        match self.nodes.select(self.index) {
            Some(id) => {
                self.index += 1;
                self.result = Some(node_value(&self.interner, id));
                true
            }
            None => {
                self.result = None;
                false
            }
        }
    }

    fn contains(&mut self, _ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        match node_id(&self.interner, &self.nodes, value) {
            Some(id) => {
                self.result = Some(node_value(&self.interner, id));
                true
            }
            None => false,
        }
    }

    fn next_path(&mut self, _ctx: &mut IterationContext) -> bool {
        false
    }

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn err(&self) -> Option<&IterError> {
        None
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.tags.apply(self.result.as_ref(), dst);
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = AllNodes::new(self.interner.clone(), self.nodes.clone());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.result = None;
    }

    fn optimize(self: Box<Self>) -> (BoxIterator, bool) {
        if self.nodes.is_empty() && self.tags.is_empty() {
            return (Box::new(Null::new()), true);
        }
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        (self.nodes.len() as i64, true)
    }

    fn stats(&self) -> IteratorStats {
        let mut stats = IteratorStats {
            contains_cost: 1,
            next_cost: 1,
            size: self.nodes.len() as i64,
            exact_size: true,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        describe_leaf(self, String::new())
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        Vec::new()
    }

    fn close(&mut self) -> IterResult<()> {
        Ok(())
    }
}

/// For each result of `sub`, the nodes one hop away along `predicate`.
///
/// Tag materialization includes the sub-iterator's tags, so the node a hop
/// started from stays visible to callers.
#[derive(Debug)]
pub struct Follow {
    uid: Uid,
    tags: Tagger,
    store: Arc<MemStore>,
    sub: BoxIterator,
    predicate_name: String,
    predicate: Option<u32>,
    direction: Direction,
    /// Remaining targets for the current source, last one first.
    pending: Vec<u32>,
    result: Option<Value>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl Follow {
    pub fn new(store: Arc<MemStore>, sub: BoxIterator, predicate: &str, direction: Direction) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            predicate: store.predicate_id(predicate),
            predicate_name: predicate.to_string(),
            store,
            sub,
            direction,
            pending: Vec::new(),
            result: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn reverse(&self) -> Direction {
        match self.direction {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }

    /// Average fan-out of the predicate, rounded up.
    fn fanout(&self) -> i64 {
        let edges = self.predicate.map_or(0, |p| self.store.predicate_edges(p));
        let nodes = self.store.node_count().max(1);
        edges.div_ceil(nodes).max(1) as i64
    }
}

impl GraphIterator for Follow {
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
        self.runstats.next += 1;
        loop {
            if let Some(next) = self.pending.pop() {
                self.result = Some(self.store.node_value(next));
                return true;
            }
            if !self.sub.advance(ctx) {
                self.result = None;
                return false;
            }
            let (Some(predicate), Some(source)) =
                (self.predicate, self.sub.result().and_then(|v| self.store.node_id(v)))
            else {
                continue;
            };
            if let Some(targets) = self.store.neighbors(source, predicate, self.direction) {
                self.pending = targets.iter().collect();
                self.pending.reverse();
            }
        }
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        self.pending.clear();
        let (Some(predicate), Some(target)) = (self.predicate, self.store.node_id(value)) else {
            return false;
        };
        let sources: Vec<u32> = self
            .store
            .neighbors(target, predicate, self.reverse())
            .map(|b| b.iter().collect())
            .unwrap_or_default();
        for source in sources {
            if self.sub.contains(ctx, &self.store.node_value(source)) {
                self.result = Some(self.store.node_value(target));
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
        let mut out = Follow::new(
            self.store.clone(),
            self.sub.box_clone(),
            &self.predicate_name,
            self.direction,
        );
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.result = None;
        self.sub.reset();
    }

    fn optimize(mut self: Box<Self>) -> (BoxIterator, bool) {
        let sub = std::mem::replace(&mut self.sub, Box::new(Null::new()));
        let (sub, changed) = sub.optimize();
        if sub.kind() == IterKind::Null && self.tags.is_empty() {
            return (sub, true);
        }
        self.sub = sub;
        (self, changed)
    }

    fn size(&self) -> (i64, bool) {
        (self.stats().size, false)
    }

    fn stats(&self) -> IteratorStats {
        let sub = self.sub.stats();
        let fanout = self.fanout();
        let mut stats = IteratorStats {
            contains_cost: sub.contains_cost.saturating_mul(fanout),
            next_cost: sub.next_cost.saturating_add(1),
            size: sub.size.saturating_mul(fanout),
            exact_size: false,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        Description {
            uid: self.uid,
            name: format!("{} {}", self.direction, self.predicate_name),
            kind: IterKind::Follow,
            tags: self.tags.names(),
            size: self.size().0,
            iterators: vec![self.sub.describe()],
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) -> IterResult<()> {
        if let Some(done) = &self.closed {
            return done.clone();
        }
        let res = close_all([&mut self.sub]);
        self.closed = Some(res.clone());
        res
    }
}
