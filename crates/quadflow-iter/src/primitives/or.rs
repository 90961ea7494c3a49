use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::primitives::Null;
use crate::value::{TagMap, Value};

/// Union. Sub-iterators are drained in order; duplicates are not removed.
#[derive(Debug)]
pub struct Or {
    uid: Uid,
    tags: Tagger,
    subs: Vec<BoxIterator>,
    current: usize,
    result: Option<Value>,
    err: Option<IterError>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl Or {
    pub fn new(subs: Vec<BoxIterator>) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            subs,
            current: 0,
            result: None,
            err: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }

    pub fn add(&mut self, sub: BoxIterator) {
        self.subs.push(sub);
    }
}

impl GraphIterator for Or {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Or
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
        while let Some(sub) = self.subs.get_mut(self.current) {
            if sub.advance(ctx) {
                self.result = sub.result().cloned();
                return true;
            }
            if let Some(err) = sub.err() {
                self.err = Some(err.clone());
                return false;
            }
            self.current += 1;
        }
        self.result = None;
        false
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        if self.err.is_some() {
            return false;
        }
        for (i, sub) in self.subs.iter_mut().enumerate() {
            if sub.contains(ctx, value) {
                self.current = i;
                self.result = Some(value.clone());
                return true;
            }
            if let Some(err) = sub.err() {
                self.err = Some(err.clone());
                return false;
            }
        }
        false
    }

    fn next_path(&mut self, ctx: &mut IterationContext) -> bool {
        match self.subs.get_mut(self.current) {
            Some(sub) => sub.next_path(ctx),
            None => false,
        }
    }

    fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    fn err(&self) -> Option<&IterError> {
        self.err.as_ref()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(sub) = self.subs.get(self.current) {
            sub.tag_results(dst);
        }
        self.tags.apply(self.result.as_ref(), dst);
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = Or::new(self.subs.iter().map(|sub| sub.box_clone()).collect());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.current = 0;
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
            if sub.kind() == IterKind::Null && sub.tagger().is_empty() {
                changed = true;
                continue;
            }
            self.subs.push(sub);
        }
        if self.tags.is_empty() {
            match self.subs.len() {
                0 => return (Box::new(Null::new()), true),
                1 => {
                    if let Some(only) = self.subs.pop() {
                        return (only, true);
                    }
                }
                _ => {}
            }
        }
        (self, changed)
    }

    fn size(&self) -> (i64, bool) {
        self.subs.iter().fold((0, true), |(size, exact), sub| {
            let (s, e) = sub.size();
            (size + s, exact && e)
        })
    }

    fn stats(&self) -> IteratorStats {
        let (size, exact_size) = self.size();
        let mut stats = IteratorStats {
            size,
            exact_size,
            ..IteratorStats::default()
        };
        for sub in &self.subs {
            let sub_stats = sub.stats();
            stats.next_cost = stats.next_cost.max(sub_stats.next_cost);
            stats.contains_cost += sub_stats.contains_cost;
        }
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        Description {
            uid: self.uid,
            name: String::new(),
            kind: IterKind::Or,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Fixed;

    #[test]
    fn concatenates_and_drops_nulls_on_optimize() {
        let mut ctx = IterationContext::new();
        let it = Box::new(Or::new(vec![
            Box::new(Fixed::from_values([Value::int(1)])),
            Box::new(Null::new()),
            Box::new(Fixed::from_values([Value::int(2), Value::int(1)])),
        ]));
        let (mut it, changed) = it.optimize();
        assert!(changed);
        assert_eq!(it.sub_iterators().len(), 2);

        let mut out = Vec::new();
        while it.advance(&mut ctx) {
            out.push(it.result().and_then(Value::as_int).unwrap());
        }
        assert_eq!(out, vec![1, 2, 1]);
        assert!(it.contains(&mut ctx, &Value::int(2)));
    }
}
