//! Count: collapse an upstream iterator into its cardinality.

use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::value::{TagMap, Value};

/// Yields exactly one result: the number of results of `sub`.
#[derive(Debug)]
pub struct Count {
    uid: Uid,
    tags: Tagger,
    sub: BoxIterator,
    result: Option<Value>,
    done: bool,
    err: Option<IterError>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl Count {
    pub fn new(sub: BoxIterator) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            sub,
            result: None,
            done: false,
            err: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }

    fn drain(&mut self, ctx: &mut IterationContext) -> bool {
        let mut n = 0i64;
        while self.sub.advance(ctx) {
            n += 1;
        }
        self.done = true;
        if let Some(err) = self.sub.err() {
            tracing::debug!(uid = self.uid, error = %err, "count upstream failed");
            self.err = Some(err.clone());
            return false;
        }
        tracing::trace!(uid = self.uid, count = n, "count drained upstream");
        self.result = Some(Value::int(n));
        true
    }
}

impl GraphIterator for Count {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Count
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, ctx: &mut IterationContext) -> bool {
        self.runstats.next += 1;
        if self.done {
            return false;
        }
        self.drain(ctx)
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        if !self.done {
            self.runstats.contains_next += 1;
            self.drain(ctx);
        }
        self.result.as_ref() == Some(value)
    }

    fn next_path(&mut self, _ctx: &mut IterationContext) -> bool {
        false
    }

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn err(&self) -> Option<&IterError> {
        self.err.as_ref()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.tags.apply(self.result.as_ref(), dst);
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = Count::new(self.sub.box_clone());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.result = None;
        self.done = false;
        self.err = None;
        self.sub.reset();
    }

    fn optimize(mut self: Box<Self>) -> (BoxIterator, bool) {
        let sub = std::mem::replace(&mut self.sub, Box::new(crate::primitives::Null::new()));
        let (sub, changed) = sub.optimize();
        self.sub = sub;
        (self, changed)
    }

    fn size(&self) -> (i64, bool) {
        (1, true)
    }

    fn stats(&self) -> IteratorStats {
        let sub = self.sub.stats();
        let scan = sub.next_cost.saturating_mul(sub.size);
        let mut stats = IteratorStats {
            next_cost: scan,
            contains_cost: scan,
            size: 1,
            exact_size: true,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        Description {
            uid: self.uid,
            name: String::new(),
            kind: IterKind::Count,
            tags: self.tags.names(),
            size: 1,
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
