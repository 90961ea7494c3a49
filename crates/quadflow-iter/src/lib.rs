//! quadflow-iter: pull-based iterator execution core for graph queries
//!
//! A query is compiled into a tree of [`GraphIterator`]s. The caller pulls
//! results from the root with `advance`, asks for alternative derivations of
//! the current result with `next_path`, and reads tagged bindings with
//! `tag_results`. Every call takes an explicit [`IterationContext`], which is
//! where query variables live.
//!
//! ## Operators
//!
//! - [`Count`]: collapses its upstream into a single integer
//! - [`Variable`] / [`VariableContainer`]: query variables with a
//!   single-binder, many-user discipline enforced through the context
//! - [`Recursive`]: breadth-first transitive closure of a morphism, with
//!   per-result depth and base (seed) tracking
//!
//! The [`primitives`] module holds the combinators these operators build on.
//!
//! ## Errors
//!
//! Iterators never panic on misuse. `advance`/`contains` return `false` and
//! the cause is available from `err()` as an [`IterError`];
//! [`IterError::is_invariant_violation`] separates tree-shape bugs from
//! upstream failures.

pub mod config;
pub mod context;
pub mod count;
pub mod error;
pub mod iterator;
pub mod primitives;
pub mod recursive;
pub mod store;
pub mod value;
pub mod variable;
pub mod variable_container;

#[cfg(test)]
mod testutil;

// Re-export key types
pub use config::{IterConfig, DEFAULT_MAX_RECURSIVE_DEPTH};
pub use context::IterationContext;
pub use count::Count;
pub use error::{IterError, IterResult};
pub use iterator::{
    close_all, next_uid, BoxIterator, Description, GraphIterator, IterKind, IteratorStats, Tagger,
    Uid,
};
pub use recursive::Recursive;
pub use store::{identity_morphism, Morphism, QuadStore, StoreRef};
pub use value::{Bindings, Literal, NodeRef, TagMap, Value, ValueKey};
pub use variable::{VarRole, Variable};
pub use variable_container::VariableContainer;
