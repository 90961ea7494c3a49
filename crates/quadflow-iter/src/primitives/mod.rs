//! Minimal forms of the primitive combinators the operators are built from.
//!
//! These mirror what a storage backend normally provides: an always-empty
//! iterator, a fixed value set, and the logical AND / OR / NOT combinators.

mod and;
mod fixed;
mod not;
mod null;
mod or;

pub use and::And;
pub use fixed::Fixed;
pub use not::Not;
pub use null::Null;
pub use or::Or;
