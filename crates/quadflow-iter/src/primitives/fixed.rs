use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    describe_leaf, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::value::{TagMap, Value};

/// A fixed, insertion-ordered set of values.
#[derive(Debug, Clone)]
pub struct Fixed {
    uid: Uid,
    tags: Tagger,
    values: Vec<Value>,
    index: usize,
    result: Option<Value>,
    runstats: RunStats,
}

impl Fixed {
    pub fn new() -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            values: Vec::new(),
            index: 0,
            result: None,
            runstats: RunStats::default(),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut out = Self::new();
        for value in values {
            out.add(value);
        }
        out
    }

    pub fn add(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl Default for Fixed {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphIterator for Fixed {
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
        self.runstats.next += 1;
        match self.values.get(self.index) {
            Some(value) => {
                self.result = Some(value.clone());
                self.index += 1;
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
        match self.values.iter().find(|v| *v == value) {
            Some(found) => {
                self.result = Some(found.clone());
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
        let mut out = Fixed::from_values(self.values.iter().cloned());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.result = None;
    }

    fn optimize(self: Box<Self>) -> (BoxIterator, bool) {
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        (self.values.len() as i64, true)
    }

    fn stats(&self) -> IteratorStats {
        let (size, exact_size) = self.size();
        let mut stats = IteratorStats {
            contains_cost: size.max(1),
            next_cost: 1,
            size,
            exact_size,
            ..IteratorStats::default()
        };
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        describe_leaf(self, format!("{} values", self.values.len()))
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        Vec::new()
    }

    fn close(&mut self) -> IterResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_in_insertion_order_then_stays_exhausted() {
        let mut ctx = IterationContext::new();
        let mut it = Fixed::from_values([Value::int(3), Value::int(1)]);
        assert!(it.advance(&mut ctx));
        assert_eq!(it.result(), Some(&Value::int(3)));
        assert!(it.advance(&mut ctx));
        assert!(!it.advance(&mut ctx));
        assert!(!it.advance(&mut ctx));

        it.reset();
        assert!(it.advance(&mut ctx));
        assert_eq!(it.result(), Some(&Value::int(3)));
    }

    #[test]
    fn contains_sets_result() {
        let mut ctx = IterationContext::new();
        let mut it = Fixed::from_values([Value::string("a"), Value::string("b")]);
        it.tagger_mut().add("x");
        assert!(it.contains(&mut ctx, &Value::string("b")));
        let mut tags = TagMap::new();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("x"), Some(&Value::string("b")));
        assert!(!it.contains(&mut ctx, &Value::string("z")));
    }
}
