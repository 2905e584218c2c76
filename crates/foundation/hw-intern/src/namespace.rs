//! Collision-free name allocation

use rustc_hash::FxHashSet;

/// Set of taken names that hands out fresh ones on request
///
/// Fresh names are formed as `<base>_<n>` with a counter shared by every
/// base in the namespace.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    used: FxHashSet<String>,
    next_suffix: usize,
}

impl Namespace {
    /// Creates an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as taken
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_owned());
    }

    /// Returns `base` if it is free, otherwise the first free `<base>_<n>`
    pub fn new_name(&mut self, base: &str) -> String {
        if self.used.insert(base.to_owned()) {
            return base.to_owned();
        }
        loop {
            let candidate = format!("{base}_{}", self.next_suffix);
            self.next_suffix += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
