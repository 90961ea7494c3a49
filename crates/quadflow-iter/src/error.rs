//! Error taxonomy for iterator trees.
//!
//! Three families share one enum:
//!
//! - **invariant violations**: the tree was shaped or driven in a way the
//!   protocol forbids (a variable user advanced, a binder membership-tested,
//!   a broken seen-chain inside `Recursive`, ...). These are fatal for the
//!   current evaluation and are never retried.
//! - **upstream propagation**: a child reported an error; the parent surfaces
//!   it through its own `err()` instead of pretending to be exhausted.
//! - **resource release**: failures collected while closing a tree.

use crate::iterator::{IterKind, Uid};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IterError {
    #[error("variable user #{uid} for \"{name}\" was advanced; only the binder may advance")]
    UserAdvanced { name: String, uid: Uid },

    #[error("variable binder #{uid} for \"{name}\" was membership-tested")]
    BinderContains { name: String, uid: Uid },

    #[error("variable \"{name}\" is already bound by #{binder}")]
    AlreadyBound { name: String, binder: Uid },

    #[error("#{caller} tried to advance variable \"{name}\" owned by binder #{binder}")]
    NotBinder {
        name: String,
        binder: Uid,
        caller: Uid,
    },

    #[error("variable \"{name}\" has never been bound")]
    Unbound { name: String },

    #[error("variable container for \"{name}\" was queried before its role was resolved")]
    RoleUnresolved { name: String },

    #[error("variable containers must wrap a variable iterator, got {kind}")]
    NotAVariable { kind: IterKind },

    #[error("recursive seen-chain is broken at depth {depth}")]
    BrokenSeenChain { depth: usize },

    #[error("recursive iterator asked for the base of an unseen value")]
    UnseenValue,

    #[error("morphism result lost the recursion base tag")]
    MissingBaseTag,

    #[error("upstream {kind} #{uid} failed: {message}")]
    Upstream {
        kind: IterKind,
        uid: Uid,
        message: String,
    },

    #[error("closing {kind} #{uid} failed: {message}")]
    Close {
        kind: IterKind,
        uid: Uid,
        message: String,
    },
}

impl IterError {
    /// True for tree-shape / protocol misuse, as opposed to propagated or
    /// resource errors.
    pub fn is_invariant_violation(&self) -> bool {
        !matches!(self, IterError::Upstream { .. } | IterError::Close { .. })
    }
}

pub type IterResult<T> = std::result::Result<T, IterError>;
