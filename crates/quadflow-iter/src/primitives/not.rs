use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::value::{TagMap, Value};

/// Complement of `primary` with respect to `all`.
#[derive(Debug)]
pub struct Not {
    uid: Uid,
    tags: Tagger,
    primary: BoxIterator,
    all: BoxIterator,
    result: Option<Value>,
    err: Option<IterError>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl Not {
    pub fn new(primary: BoxIterator, all: BoxIterator) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            primary,
            all,
            result: None,
            err: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }
}

impl GraphIterator for Not {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Not
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, ctx: &mut IterationContext) -> bool {
        self.runstats.next += 1;
        if self.err.is_some() {
            return false;
        }
        while self.all.advance(ctx) {
            let Some(candidate) = self.all.result().cloned() else {
                continue;
            };
            if self.primary.contains(ctx, &candidate) {
                continue;
            }
            if let Some(err) = self.primary.err() {
                self.err = Some(err.clone());
                return false;
            }
            self.result = Some(candidate);
            return true;
        }
        self.err = self.all.err().cloned();
        self.result = None;
        false
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        if self.err.is_some() {
            return false;
        }
        if self.primary.contains(ctx, value) {
            return false;
        }
        if let Some(err) = self.primary.err() {
            self.err = Some(err.clone());
            return false;
        }
        self.result = Some(value.clone());
        true
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
        let mut out = Not::new(self.primary.box_clone(), self.all.box_clone());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.result = None;
        self.err = None;
        self.primary.reset();
        self.all.reset();
    }

    fn optimize(mut self: Box<Self>) -> (BoxIterator, bool) {
        let primary = std::mem::replace(&mut self.primary, Box::new(crate::primitives::Null::new()));
        let (primary, changed) = primary.optimize();
        self.primary = primary;
        (self, changed)
    }

    fn size(&self) -> (i64, bool) {
        let (all, _) = self.all.size();
        let (primary, _) = self.primary.size();
        ((all - primary).max(0), false)
    }

    fn stats(&self) -> IteratorStats {
        let all = self.all.stats();
        let primary = self.primary.stats();
        let mut stats = IteratorStats {
            next_cost: all.next_cost + primary.contains_cost,
            contains_cost: primary.contains_cost,
            size: self.size().0,
            exact_size: false,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        Description {
            uid: self.uid,
            name: String::new(),
            kind: IterKind::Not,
            tags: self.tags.names(),
            size: self.size().0,
            iterators: vec![self.primary.describe(), self.all.describe()],
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        vec![self.primary.as_ref(), self.all.as_ref()]
    }

    fn close(&mut self) -> IterResult<()> {
        if let Some(done) = &self.closed {
            return done.clone();
        }
        let res = close_all([&mut self.primary, &mut self.all]);
        self.closed = Some(res.clone());
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Fixed;

    #[test]
    fn complements_against_all() {
        let mut ctx = IterationContext::new();
        let all = Fixed::from_values((1..=4).map(Value::int));
        let excluded = Fixed::from_values([Value::int(2), Value::int(4)]);
        let mut it = Not::new(Box::new(excluded), Box::new(all));
        let mut out = Vec::new();
        while it.advance(&mut ctx) {
            out.push(it.result().and_then(Value::as_int).unwrap());
        }
        assert_eq!(out, vec![1, 3]);
        assert!(it.contains(&mut ctx, &Value::int(3)));
        assert!(!it.contains(&mut ctx, &Value::int(2)));
    }
}
