//! VariableContainer: decides, on first drive, how the variable it wraps
//! takes part in the tree, and reshapes itself accordingly.
//!
//! - name unbound: the container becomes the binder and wraps the variable in
//!   a depth-1 identity [`Recursive`]. Enumeration then runs through the
//!   recursive operator's single-pass, binding-aware machinery, so each value
//!   is bound exactly once even if the container is revisited.
//! - name bound: the container becomes a user and wraps the variable in an
//!   [`And`] with every node in the store, so membership goes through the
//!   variable's own `contains`.
//!
//! The decision is permanent for the life of the instance. `reset` resets the
//! active child but does not re-arm the decision.

use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats, RunStats, Tagger,
    Uid,
};
use crate::primitives::{And, Null};
use crate::recursive::Recursive;
use crate::store::{identity_morphism, StoreRef};
use crate::value::{TagMap, Value};
use crate::variable::VarRole;

#[derive(Debug)]
enum Shape {
    /// Not driven yet; holds the bare variable.
    Undecided(BoxIterator),
    /// Identity recursion over the variable.
    Binder(BoxIterator),
    /// Intersection of all nodes with the variable.
    User(BoxIterator),
}

#[derive(Debug)]
pub struct VariableContainer {
    uid: Uid,
    tags: Tagger,
    name: String,
    store: StoreRef,
    /// Untouched copy of the wrapped variable, used by `box_clone`.
    template: BoxIterator,
    shape: Shape,
    err: Option<IterError>,
    runstats: RunStats,
    closed: Option<IterResult<()>>,
}

impl VariableContainer {
    pub fn new(store: StoreRef, variable: BoxIterator, name: impl Into<String>) -> IterResult<Self> {
        if variable.kind() != IterKind::Variable {
            return Err(IterError::NotAVariable {
                kind: variable.kind(),
            });
        }
        Ok(Self::build(store, variable, name.into()))
    }

    fn build(store: StoreRef, variable: BoxIterator, name: String) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            name,
            store,
            template: variable.box_clone(),
            shape: Shape::Undecided(variable),
            err: None,
            runstats: RunStats::default(),
            closed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> VarRole {
        match self.shape {
            Shape::Undecided(_) => VarRole::Undetermined,
            Shape::Binder(_) => VarRole::Binder,
            Shape::User(_) => VarRole::User,
        }
    }

    fn resolve(&mut self, ctx: &IterationContext) {
        let Shape::Undecided(_) = &self.shape else {
            return;
        };
        let Shape::Undecided(variable) =
            std::mem::replace(&mut self.shape, Shape::Undecided(Box::new(Null::new())))
        else {
            return;
        };

        self.shape = if ctx.is_bound(&self.name) {
            Shape::User(Box::new(And::new(vec![
                self.store.nodes_all_iterator(),
                variable,
            ])))
        } else {
            Shape::Binder(Box::new(Recursive::new(
                self.store.clone(),
                variable,
                identity_morphism(),
                1,
            )))
        };
        tracing::debug!(
            uid = self.uid,
            variable = %self.name,
            role = %self.role(),
            "variable container resolved"
        );
    }

    fn active(&self) -> &dyn GraphIterator {
        match &self.shape {
            Shape::Undecided(it) | Shape::Binder(it) | Shape::User(it) => it.as_ref(),
        }
    }

    fn active_mut(&mut self) -> &mut BoxIterator {
        match &mut self.shape {
            Shape::Undecided(it) | Shape::Binder(it) | Shape::User(it) => it,
        }
    }
}

impl GraphIterator for VariableContainer {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::VariableContainer
    }

    fn tagger(&self) -> &Tagger {
        &self.tags
    }

    fn tagger_mut(&mut self) -> &mut Tagger {
        &mut self.tags
    }

    fn advance(&mut self, ctx: &mut IterationContext) -> bool {
        self.runstats.next += 1;
        self.resolve(ctx);
        self.active_mut().advance(ctx)
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        self.resolve(ctx);
        self.active_mut().contains(ctx, value)
    }

    fn next_path(&mut self, ctx: &mut IterationContext) -> bool {
        if let Shape::Undecided(_) = self.shape {
            let err = IterError::RoleUnresolved {
                name: self.name.clone(),
            };
            tracing::warn!(uid = self.uid, error = %err, "variable container misuse");
            self.err = Some(err);
            return false;
        }
        self.active_mut().next_path(ctx)
    }

    fn result(&self) -> Option<&Value> {
        self.active().result()
    }

    fn err(&self) -> Option<&IterError> {
        self.err.as_ref().or_else(|| self.active().err())
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.active().tag_results(dst);
        self.tags.apply(self.result(), dst);
    }

    fn box_clone(&self) -> BoxIterator {
        let mut out = Self::build(
            self.store.clone(),
            self.template.box_clone(),
            self.name.clone(),
        );
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    fn reset(&mut self) {
        self.err = None;
        self.active_mut().reset();
    }

    /// Optimizes the active child in place; the container itself stays.
    fn optimize(mut self: Box<Self>) -> (BoxIterator, bool) {
        let child = std::mem::replace(self.active_mut(), Box::new(Null::new()));
        let (child, _) = child.optimize();
        *self.active_mut() = child;
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        self.active().size()
    }

    fn stats(&self) -> IteratorStats {
        let mut stats = self.active().stats();
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        Description {
            uid: self.uid,
            name: format!("Container for {} for \"{}\" variable.", self.role(), self.name),
            kind: IterKind::VariableContainer,
            tags: self.tags.names(),
            size: self.size().0,
            iterators: vec![self.active().describe()],
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn GraphIterator> {
        vec![self.active()]
    }

    fn close(&mut self) -> IterResult<()> {
        if let Some(done) = &self.closed {
            return done.clone();
        }
        let res = self.active_mut().close();
        self.closed = Some(res.clone());
        res
    }
}
