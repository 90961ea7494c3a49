use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::primitives::Null;
use crate::value::{TagMap, Value};

/// Intersection. The first sub-iterator drives; every other one is
/// membership-tested against its candidates.
#[derive(Debug)]
pub struct And {
    uid: Uid,
    tags: Tagger,
    subs: Vec<BoxIterator>,
    result: Option<Value>,
    err: Option<IterError>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl And {
    pub fn new(subs: Vec<BoxIterator>) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            subs,
            result: None,
            err: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }

    pub fn add(&mut self, sub: BoxIterator) {
        self.subs.push(sub);
    }

    fn check_rest(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        for sub in self.subs.iter_mut().skip(1) {
            if !sub.contains(ctx, value) {
                if let Some(err) = sub.err() {
                    self.err = Some(err.clone());
                }
                return false;
            }
        }
        true
    }
}

impl GraphIterator for And {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::And
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, ctx: &mut IterationContext) -> bool {
        self.runstats.next += 1;
        if self.err.is_some() || self.subs.is_empty() {
            return false;
        }
        loop {
            if !self.subs[0].advance(ctx) {
                self.err = self.subs[0].err().cloned();
                self.result = None;
                return false;
            }
            let Some(candidate) = self.subs[0].result().cloned() else {
                continue;
            };
            if self.check_rest(ctx, &candidate) {
                self.result = Some(candidate);
                return true;
            }
            if self.err.is_some() {
                return false;
            }
        }
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        if self.err.is_some() || self.subs.is_empty() {
            return false;
        }
        if !self.subs[0].contains(ctx, value) {
            self.err = self.subs[0].err().cloned();
            return false;
        }
        if !self.check_rest(ctx, value) {
            return false;
        }
        self.result = Some(value.clone());
        true
    }

    fn next_path(&mut self, ctx: &mut IterationContext) -> bool {
        self.subs.iter_mut().any(|sub| sub.next_path(ctx))
    }

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn err(&self) -> Option<&IterError> {
        self.err.as_ref()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        for sub in &self.subs {
            sub.tag_results(dst);
        }
        self.tags.apply(self.result.as_ref(), dst);
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = And::new(self.subs.iter().map(|sub| sub.box_clone()).collect());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.result = None;
        self.err = None;
        for sub in &mut self.subs {
            sub.reset();
        }
    }

    fn optimize(mut self: Box<Self>) -> (BoxIterator, bool) {
        let mut changed = false;
        let subs = std::mem::take(&mut self.subs);
        for sub in subs {
            let (sub, sub_changed) = sub.optimize();
            changed |= sub_changed;
            self.subs.push(sub);
        }
        if self.tags.is_empty() {
            if self.subs.iter().any(|sub| sub.kind() == IterKind::Null) {
                return (Box::new(Null::new()), true);
            }
            if self.subs.len() == 1 {
                if let Some(only) = self.subs.pop() {
                    return (only, true);
                }
            }
        }
        (self, changed)
    }

    fn size(&self) -> (i64, bool) {
        match self.subs.iter().map(|sub| sub.size().0).min() {
            Some(size) => (size, self.subs.len() == 1),
            None => (0, true),
        }
    }

    fn stats(&self) -> IteratorStats {
        let (size, exact_size) = self.size();
        let contains_cost: i64 = self.subs.iter().map(|sub| sub.stats().contains_cost).sum();
        let next_cost = match self.subs.first() {
            Some(primary) => {
                let rest: i64 = self
                    .subs
                    .iter()
                    .skip(1)
                    .map(|sub| sub.stats().contains_cost)
                    .sum();
                primary.stats().next_cost + rest
            }
            None => 0,
        };
        let mut stats = IteratorStats {
            contains_cost,
            next_cost,
            size,
            exact_size,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        Description {
            uid: self.uid,
            name: String::new(),
            kind: IterKind::And,
            tags: self.tags.names(),
            size: self.size().0,
            iterators: self.subs.iter().map(|sub| sub.describe()).collect(),
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        self.subs.iter().map(|sub| sub.as_ref()).collect()
    }

    fn close(&mut self) -> IterResult<()> {
        if let Some(done) = &self.closed {
            return done.clone();
        }
        let res = close_all(self.subs.iter_mut());
        self.closed = Some(res.clone());
        res
    }
}
