//! Variable iterators share one logical variable through the
//! [`IterationContext`].
//!
//! The first instance driven with `advance` while the name is unbound becomes
//! the **binder**: it registers itself with the context and is the only one
//! allowed to move the variable's candidate cursor. Every other instance is a
//! **user** and may only be membership-tested against the current value.
//!
//! Trees containing variables must therefore be shaped so that users are
//! never advanced and binders are never membership-tested. Both mistakes are
//! reported as invariant violations through `err()`.
//!
//! Because a user's answer depends on context state, variables must not sit
//! under iterators that cache membership results.

use std::fmt;

use crate::context::IterationContext;
use crate::error::{IterError, IterResult};
use crate::iterator::{
    describe_leaf, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats,
    RunStats, Tagger, Uid,
};
use crate::store::StoreRef;
use crate::value::{TagMap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRole {
    Undetermined,
    Binder,
    User,
}

impl fmt::Display for VarRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarRole::Undetermined => "Undetermined",
            VarRole::Binder => "Binder",
            VarRole::User => "User",
        })
    }
}

#[derive(Debug)]
pub struct Variable {
    uid: Uid,
    tags: Tagger,
    name: String,
    role: VarRole,
    result: Option<Value>,
    err: Option<IterError>,
    store: StoreRef,
    runstats: RunStats,
}

impl Variable {
    pub fn new(store: StoreRef, name: impl Into<String>) -> Self {
        Self {
            uid: next_uid(),
            tags: Tagger::new(),
            name: name.into(),
            role: VarRole::Undetermined,
            result: None,
            err: None,
            store,
            runstats: RunStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> VarRole {
        self.role
    }

    fn fail(&mut self, err: IterError) -> bool {
        tracing::warn!(uid = self.uid, variable = %self.name, error = %err, "variable misuse");
        self.err = Some(err);
        self.result = None;
        false
    }

    /// Settle the role for an `advance` call.
    fn claim_binder(&mut self, ctx: &mut IterationContext) -> IterResult<()> {
        match ctx.binder_of(&self.name) {
            None => {
                let cursor = self.store.nodes_all_iterator();
                ctx.bind_variable(&self.name, self.uid, cursor)?;
                self.role = VarRole::Binder;
                Ok(())
            }
            Some(binder) if binder == self.uid => {
                self.role = VarRole::Binder;
                Ok(())
            }
            Some(_) => {
                self.role = VarRole::User;
                Err(IterError::UserAdvanced {
                    name: self.name.clone(),
                    uid: self.uid,
                })
            }
        }
    }
}

impl GraphIterator for Variable {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn kind(&self) -> IterKind {
        IterKind::Variable
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
        match self.role {
            VarRole::User => {
                return self.fail(IterError::UserAdvanced {
                    name: self.name.clone(),
                    uid: self.uid,
                })
            }
            VarRole::Undetermined => {
                if let Err(err) = self.claim_binder(ctx) {
                    return self.fail(err);
                }
            }
            VarRole::Binder => {}
        }

        match ctx.advance_variable(&self.name, self.uid) {
            Ok(Some(value)) => {
                tracing::trace!(uid = self.uid, variable = %self.name, value = %value, "variable advanced");
                self.result = Some(value);
                true
            }
            Ok(None) => {
                self.result = None;
                false
            }
            Err(err) => self.fail(err),
        }
    }

    fn contains(&mut self, ctx: &mut IterationContext, value: &Value) -> bool {
        self.runstats.contains += 1;
        if self.err.is_some() {
            return false;
        }
        if self.role == VarRole::Binder {
            return self.fail(IterError::BinderContains {
                name: self.name.clone(),
                uid: self.uid,
            });
        }
        self.role = VarRole::User;

        match ctx.current_value(&self.name) {
            Some(current) if current == value => {
                self.result = Some(current.clone());
                true
            }
            _ => false,
        }
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
        let mut out = Variable::new(self.store.clone(), self.name.clone());
        out.tags.copy_from(&self.tags);
        Box::new(out)
    }

    /// Forget the role and result. The context keeps its binding; an instance
    /// that still owns it becomes the binder again when next advanced.
    fn reset(&mut self) {
        self.role = VarRole::Undetermined;
        self.result = None;
        self.err = None;
    }

    // Nothing to rewrite: the useful state only exists in the context.
    fn optimize(self: Box<Self>) -> (BoxIterator, bool) {
        (self, false)
    }

    fn size(&self) -> (i64, bool) {
        (0, false)
    }

    fn stats(&self) -> IteratorStats {
        let mut stats = IteratorStats::default();
        self.runstats.fill(&mut stats);
        stats
    }

    fn describe(&self) -> Description {
        describe_leaf(
            self,
            format!("{} for \"{}\" variable.", self.role, self.name),
        )
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
    use crate::testutil::TestStore;

    fn check_user_against_binder(ctx: &mut IterationContext, user: &mut Variable, binder: &Variable) {
        let current = binder.result().cloned().unwrap();
        assert!(user.contains(ctx, &current));
        assert_eq!(user.role(), VarRole::User);
    }

    #[test]
    fn binder_visits_every_node_once() {
        let store = TestStore::with_nodes([1, 2, 3, 4]);
        let mut binder = Variable::new(store.clone(), "var1");
        let mut user1 = Variable::new(store.clone(), "var1");
        let mut user2 = Variable::new(store, "var1");
        let mut ctx = IterationContext::new();

        let mut seen = Vec::new();
        while binder.advance(&mut ctx) {
            seen.push(binder.result().and_then(Value::as_int).unwrap());
            check_user_against_binder(&mut ctx, &mut user1, &binder);
            check_user_against_binder(&mut ctx, &mut user2, &binder);
            let other = if seen.len() == 1 { 2 } else { 1 };
            assert!(!user1.contains(&mut ctx, &Value::int(other)));
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(binder.role(), VarRole::Binder);
        assert!(!binder.advance(&mut ctx));
        assert!(binder.err().is_none());
    }

    #[test]
    fn advancing_a_user_is_an_invariant_violation() {
        let store = TestStore::with_nodes([1, 2]);
        let mut binder = Variable::new(store.clone(), "x");
        let mut other = Variable::new(store, "x");
        let mut ctx = IterationContext::new();

        assert!(binder.advance(&mut ctx));
        assert!(!other.advance(&mut ctx));
        let err = other.err().unwrap();
        assert!(matches!(err, IterError::UserAdvanced { .. }));
        assert!(err.is_invariant_violation());
        // The binder is unaffected.
        assert!(binder.advance(&mut ctx));
        assert_eq!(binder.result(), Some(&Value::int(2)));
    }

    #[test]
    fn membership_testing_a_binder_is_an_invariant_violation() {
        let store = TestStore::with_nodes([1]);
        let mut binder = Variable::new(store, "x");
        let mut ctx = IterationContext::new();
        assert!(binder.advance(&mut ctx));
        assert!(!binder.contains(&mut ctx, &Value::int(1)));
        assert!(matches!(binder.err(), Some(IterError::BinderContains { .. })));
    }

    #[test]
    fn user_of_unbound_variable_contains_nothing() {
        let store = TestStore::with_nodes([1]);
        let mut user = Variable::new(store, "x");
        let mut ctx = IterationContext::new();
        assert!(!user.contains(&mut ctx, &Value::int(1)));
        assert!(user.err().is_none());
        assert_eq!(user.role(), VarRole::User);
    }

    #[test]
    fn reset_binder_reclaims_its_binding() {
        let store = TestStore::with_nodes([1, 2, 3]);
        let mut binder = Variable::new(store, "x");
        let mut ctx = IterationContext::new();
        assert!(binder.advance(&mut ctx));
        binder.reset();
        assert_eq!(binder.role(), VarRole::Undetermined);
        assert!(binder.advance(&mut ctx));
        assert_eq!(binder.result(), Some(&Value::int(2)));
        assert_eq!(binder.role(), VarRole::Binder);
    }

    #[test]
    fn size_is_unknown_and_description_names_role() {
        let store = TestStore::with_nodes([1]);
        let mut binder = Variable::new(store, "x");
        assert_eq!(binder.size(), (0, false));
        assert!(!binder.stats().exact_size);
        let mut ctx = IterationContext::new();
        binder.advance(&mut ctx);
        assert_eq!(binder.describe().name, "Binder for \"x\" variable.");
    }
}
