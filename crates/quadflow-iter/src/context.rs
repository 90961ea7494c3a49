//! Per-evaluation state shared by every iterator in a tree.
//!
//! Variables are the only state that crosses iterator boundaries. Each name
//! has exactly one binder (the iterator that registered it) and any number of
//! users. Only the binder may move the cursor; the context checks this on
//! every advance and answers misuse with an [`IterError`].

use std::collections::BTreeMap;

use crate::error::{IterError, IterResult};
use crate::iterator::{BoxIterator, Uid};
use crate::value::{Bindings, Value};

#[derive(Debug)]
struct VarState {
    cursor: Option<BoxIterator>,
    current: Option<Value>,
    binder: Uid,
}

#[derive(Debug, Default)]
pub struct IterationContext {
    vars: BTreeMap<String, VarState>,
}

impl IterationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every binding; used when a fresh evaluation begins.
    pub fn reset(&mut self) {
        self.vars.clear();
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn binder_of(&self, name: &str) -> Option<Uid> {
        self.vars.get(name).map(|state| state.binder)
    }

    /// Register `binder` as the single writer of `name`, enumerating the
    /// candidates produced by `cursor`.
    pub fn bind_variable(
        &mut self,
        name: &str,
        binder: Uid,
        cursor: BoxIterator,
    ) -> IterResult<()> {
        if let Some(state) = self.vars.get(name) {
            return Err(IterError::AlreadyBound {
                name: name.to_string(),
                binder: state.binder,
            });
        }
        tracing::trace!(variable = name, binder, "bound variable");
        self.vars.insert(
            name.to_string(),
            VarState {
                cursor: Some(cursor),
                current: None,
                binder,
            },
        );
        Ok(())
    }

    /// Move the candidate cursor of `name`. `Ok(None)` means exhausted.
    pub fn advance_variable(&mut self, name: &str, caller: Uid) -> IterResult<Option<Value>> {
        let state = self.vars.get_mut(name).ok_or_else(|| IterError::Unbound {
            name: name.to_string(),
        })?;
        if state.binder != caller {
            return Err(IterError::NotBinder {
                name: name.to_string(),
                binder: state.binder,
                caller,
            });
        }

        // The cursor is driven with this context, so lift it out while it runs.
        let Some(mut cursor) = state.cursor.take() else {
            state.current = None;
            return Ok(None);
        };
        let advanced = cursor.advance(self);
        let next = if advanced { cursor.result().cloned() } else { None };
        let upstream = cursor.err().cloned();

        let state = self.vars.get_mut(name).ok_or_else(|| IterError::Unbound {
            name: name.to_string(),
        })?;
        state.cursor = Some(cursor);
        state.current = next.clone();
        match upstream {
            Some(err) => Err(err),
            None => Ok(next),
        }
    }

    pub fn current_value(&self, name: &str) -> Option<&Value> {
        self.vars.get(name).and_then(|state| state.current.as_ref())
    }

    /// Snapshot of every variable that currently has a value.
    pub fn values(&self) -> Bindings {
        self.vars
            .iter()
            .filter_map(|(name, state)| {
                state
                    .current
                    .as_ref()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// Make the values in `bindings` current again. Cursors and binder
    /// ownership are left untouched; names not yet bound are ignored.
    pub fn restore_bindings(&mut self, bindings: &Bindings) {
        for (name, value) in bindings.iter() {
            if let Some(state) = self.vars.get_mut(name) {
                state.current = Some(value.clone());
            }
        }
    }
}
