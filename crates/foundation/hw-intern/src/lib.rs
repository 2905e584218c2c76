//! String interning and symbol bookkeeping shared by every IR layer.
//!
//! Module names, inner symbols and hierarchical path names are all interned
//! once and then compared as [`Symbol`]s. The interner is safe to share
//! between the worker threads that lower modules in parallel.

mod disjoint;
mod namespace;

pub use disjoint::DisjointSets;
pub use lasso::Spur as Symbol;
pub use namespace::Namespace;

use lasso::ThreadedRodeo;
use std::sync::Arc;

/// Thread-safe string interner
#[derive(Clone)]
pub struct Interner {
    inner: Arc<ThreadedRodeo>,
}

impl Interner {
    /// Creates an empty interner
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ThreadedRodeo::new()),
        }
    }

    /// Interns `text`, returning the existing symbol if it was seen before
    pub fn intern(&self, text: &str) -> Symbol {
        self.inner.get_or_intern(text)
    }

    /// Resolves a symbol produced by this interner
    pub fn resolve(&self, sym: &Symbol) -> &str {
        self.inner.resolve(sym)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner").field("len", &self.inner.len()).finish()
    }
}
