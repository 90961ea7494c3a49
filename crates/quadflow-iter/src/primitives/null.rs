use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    describe_leaf, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    Tagger, Uid,
};
use crate::value::{TagMap, Value};

/// An iterator that never produces anything.
#[derive(Debug, Clone)]
pub struct Null {
    uid: Uid,
    tags: Tagger,
}

impl Null {
    pub fn new() -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
        }
    }
}

impl Default for Null {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphIterator for Null {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Null
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
        None
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.tags.apply(None, dst);
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = Null::new();
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {}

    fn optimize(self: Box<Self>) -> (BoxIterator, bool) {
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        (0, true)
    }

    fn stats(&self) -> IteratorStats {
        IteratorStats {
            exact_size: true,
            ..IteratorStats::default()
        }
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
