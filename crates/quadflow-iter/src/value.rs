//! Opaque graph value handles.
//!
//! A `Value` is what iterators hand to each other. Two handles may describe
//! the same graph entity while carrying different incidental data (a node
//! handle with or without its display name cached), so every comparison in
//! the core goes through [`Value::key`].

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Literal payload of a pre-fetched value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Iri(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Iri(s) => write!(f, "<{s}>"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Store-resolved node handle.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub id: u32,
    /// Display name cached at resolution time. Not part of the identity.
    pub name: Option<Arc<str>>,
}

impl NodeRef {
    pub fn new(id: u32) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: u32, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

/// Hashable identity of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKey {
    Node(u32),
    Literal(Literal),
}

#[derive(Debug, Clone)]
pub enum Value {
    Node(NodeRef),
    Fetched(Literal),
}

impl Value {
    pub fn node(id: u32) -> Self {
        Value::Node(NodeRef::new(id))
    }

    pub fn int(i: i64) -> Self {
        Value::Fetched(Literal::Int(i))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Fetched(Literal::String(s.into()))
    }

    pub fn iri(s: impl Into<String>) -> Self {
        Value::Fetched(Literal::Iri(s.into()))
    }

    pub fn key(&self) -> ValueKey {
        match self {
            Value::Node(n) => ValueKey::Node(n.id),
            Value::Fetched(lit) => ValueKey::Literal(lit.clone()),
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Fetched(lit) => Some(lit),
            Value::Node(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Fetched(Literal::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Node(a), Value::Node(b)) => a.id == b.id,
            (Value::Fetched(a), Value::Fetched(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Node(NodeRef {
                name: Some(name), ..
            }) => write!(f, "{name}"),
            Value::Node(NodeRef { id, name: None }) => write!(f, "node#{id}"),
            Value::Fetched(lit) => write!(f, "{lit}"),
        }
    }
}

impl From<Literal> for Value {
    fn from(lit: Literal) -> Self {
        Value::Fetched(lit)
    }
}

/// Materialized tag bindings for one result.
pub type TagMap = BTreeMap<String, Value>;

/// Snapshot of the variables bound in an [`crate::IterationContext`].
///
/// Equality compares value identities, so two snapshots taken from handles
/// with different cached names still compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<String, Value>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<(String, Value)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_name_is_not_identity() {
        let a = Value::Node(NodeRef::named(7, "alice"));
        let b = Value::node(7);
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.to_string(), "alice");
        assert_eq!(b.to_string(), "node#7");
    }

    #[test]
    fn node_and_literal_never_collide() {
        assert_ne!(Value::node(1), Value::int(1));
        assert_ne!(Value::string("a"), Value::iri("a"));
    }

    #[test]
    fn bindings_compare_by_identity() {
        let mut a = Bindings::new();
        a.insert("x", Value::Node(NodeRef::named(3, "c")));
        let mut b = Bindings::new();
        b.insert("x", Value::node(3));
        assert_eq!(a, b);

        b.insert("x", Value::node(4));
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "{x: c}");
    }
}
