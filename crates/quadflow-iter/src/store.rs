//! The storage-side interface the core consumes.
//!
//! The core never owns graph data. It asks a store for display names
//! (diagnostics), empty fixed-value iterators, and an enumeration of every
//! node (used by the variable machinery).

use std::fmt;
use std::sync::Arc;

use crate::iterator::BoxIterator;
use crate::primitives::Fixed;
use crate::value::{Literal, Value};

pub trait QuadStore: fmt::Debug {
    /// Display name for `value`, if the store knows it.
    fn name_of(&self, value: &Value) -> Option<Literal>;

    /// A fresh, empty fixed-value iterator.
    fn fixed_iterator(&self) -> Fixed {
        Fixed::new()
    }

    /// Every node known to the store.
    fn nodes_all_iterator(&self) -> BoxIterator;
}

pub type StoreRef = Arc<dyn QuadStore>;

/// One recursive expansion step: a pure function from an iterator of values
/// to a new iterator.
pub type Morphism = Arc<dyn Fn(&StoreRef, BoxIterator) -> BoxIterator>;

pub fn identity_morphism() -> Morphism {
    Arc::new(|_store: &StoreRef, it: BoxIterator| it)
}

/// Render a value for diagnostics, preferring the store's name for it.
pub fn display_value(store: &dyn QuadStore, value: &Value) -> String {
    match store.name_of(value) {
        Some(Literal::String(s)) => s,
        Some(other) => other.to_string(),
        None => value.to_string(),
    }
}
