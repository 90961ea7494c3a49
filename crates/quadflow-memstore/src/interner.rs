//! Node and predicate names, stored once and referenced by u32 id.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct StringInterner {
    str_to_id: DashMap<String, u32>,
    id_to_str: DashMap<u32, String>,
    next_id: AtomicU32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its ID
    pub fn intern(&self, s: &str) -> u32 {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }
        let id = *self
            .str_to_id
            .entry(s.to_string())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        self.id_to_str.entry(id).or_insert_with(|| s.to_string());
        id
    }

    /// Look up an existing ID without inserting.
    pub fn id_of(&self, s: &str) -> Option<u32> {
        self.str_to_id.get(s).map(|id| *id)
    }

    pub fn lookup(&self, id: u32) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let interner = StringInterner::new();
        let a = interner.intern("alice");
        let b = interner.intern("bob");
        assert_ne!(a, b);
        assert_eq!(interner.intern("alice"), a);
        assert_eq!(interner.id_of("bob"), Some(b));
        assert_eq!(interner.id_of("carol"), None);
        assert_eq!(interner.lookup(a).as_deref(), Some("alice"));
        assert_eq!(interner.len(), 2);
    }
}
