//! Per-module record of which inner symbols were split into which leaves

use hw_intern::{DisjointSets, Interner, Namespace, Symbol};
use hw_ir::{InnerRef, Module, OpId};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Where a renamed leaf lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A declaration in the module body
    Operation(OpId),
    /// A module port, found again by its symbol
    Port,
}

/// A ground leaf that now carries part of an original symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenameTarget {
    /// Symbol of the leaf
    pub sym: Symbol,
    /// Where the leaf lives
    pub kind: TargetKind,
}

/// Renames produced by lowering one module
#[derive(Debug, Clone, Default)]
pub struct ModuleRenames {
    /// Position of the module in the circuit
    pub module_index: usize,
    /// Original inner reference to the leaves replacing it, in creation order
    pub renames: IndexMap<InnerRef, Vec<RenameTarget>>,
}

impl ModuleRenames {
    /// Returns true if nothing was renamed
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Total number of leaf targets
    pub fn target_count(&self) -> usize {
        self.renames.values().map(Vec::len).sum()
    }
}

/// Mints inner symbols and tracks their provenance while a module is lowered
///
/// Every symbol derived from an inner symbol is unioned with it, so the
/// original symbol can be recovered however deep the recursive lowering
/// goes. Only original inner symbols key renames: a declaration without one
/// cannot be the target of a hierarchical path, so symbols minted for its
/// leaves start detached sets that are never recorded.
///
/// All minted symbols come from one namespace seeded with the module's
/// existing inner symbols, so they never collide with each other or with
/// symbols already in the module.
#[derive(Debug)]
pub struct SymbolTracker {
    module: Symbol,
    origins: DisjointSets,
    detached: FxHashSet<Symbol>,
    names: Namespace,
    renames: IndexMap<InnerRef, Vec<RenameTarget>>,
}

impl SymbolTracker {
    fn new(module: Symbol) -> Self {
        Self {
            module,
            origins: DisjointSets::new(),
            detached: FxHashSet::default(),
            names: Namespace::new(),
            renames: IndexMap::new(),
        }
    }

    /// Tracker whose namespace holds every inner symbol already in `module`
    pub fn for_module(module: &Module, interner: &Interner) -> Self {
        let mut tracker = Self::new(module.name);
        for sym in module.ports.iter().filter_map(|port| port.inner_sym) {
            tracker.names.reserve(interner.resolve(&sym));
        }
        if let Some(body) = &module.body {
            body.walk(&mut |op| {
                if let Some(sym) = body.kind(op).decl().and_then(|decl| decl.inner_sym) {
                    tracker.names.reserve(interner.resolve(&sym));
                }
            });
        }
        tracker
    }

    /// Mints `text`, or `text_<n>` if it is taken
    pub fn fresh(&mut self, interner: &Interner, text: &str) -> Symbol {
        interner.intern(&self.names.new_name(text))
    }

    /// Mints the symbol of a leaf split off the declaration carrying `base`
    ///
    /// Ground leaves become rename targets of the original symbol `base`
    /// descends from.
    pub fn derive(
        &mut self,
        interner: &Interner,
        base: Symbol,
        suffix: &str,
        ground: bool,
        kind: TargetKind,
    ) -> Symbol {
        let text = format!("{}{suffix}", interner.resolve(&base));
        let sym = self.fresh(interner, &text);
        let root = self.origins.union(base, sym);
        if ground && !self.detached.contains(&root) {
            self.renames
                .entry(InnerRef::new(self.module, root))
                .or_default()
                .push(RenameTarget { sym, kind });
        }
        sym
    }

    /// Mints a symbol for a leaf of a declaration that had none
    ///
    /// The leaf is named after the declaration, or gets a generated name
    /// when the declaration is anonymous.
    pub fn detached(&mut self, interner: &Interner, name: Option<&str>, suffix: &str) -> Symbol {
        let text = match name.filter(|name| !name.is_empty()) {
            Some(name) => format!("{name}{suffix}"),
            None => format!("{}{suffix}", crate::unique_name()),
        };
        let sym = self.fresh(interner, &text);
        self.detached.insert(sym);
        sym
    }

    /// Finishes tracking
    pub fn finish(self, module_index: usize) -> ModuleRenames {
        ModuleRenames {
            module_index,
            renames: self.renames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_ir::{Builder, DeclInfo, FirType, PortInfo};

    #[test]
    fn test_nested_splits_key_on_original() {
        let interner = Interner::new();
        let module = interner.intern("M");
        let w = interner.intern("w");

        let mut tracker = SymbolTracker::new(module);
        let w_a = tracker.derive(&interner, w, "_a", true, TargetKind::Port);
        let w_b = tracker.derive(&interner, w, "_b", false, TargetKind::Port);
        let w_b_c = tracker.derive(&interner, w_b, "_c", true, TargetKind::Port);
        let w_b_d = tracker.derive(&interner, w_b, "_d", true, TargetKind::Port);
        assert_eq!(interner.resolve(&w_b_d), "w_b_d");

        let renames = tracker.finish(3);
        assert_eq!(renames.module_index, 3);
        assert_eq!(renames.renames.len(), 1);
        let targets: Vec<_> = renames.renames[&InnerRef::new(module, w)]
            .iter()
            .map(|t| t.sym)
            .collect();
        assert_eq!(targets, vec![w_a, w_b_c, w_b_d]);
        assert_eq!(renames.target_count(), 3);
    }

    #[test]
    fn test_detached_leaves_are_not_renames() {
        let interner = Interner::new();
        let mut tracker = SymbolTracker::new(interner.intern("M"));
        let leaf = tracker.detached(&interner, Some("r"), "_b");
        assert_eq!(interner.resolve(&leaf), "r_b");
        tracker.derive(&interner, leaf, "_0", true, TargetKind::Port);

        let anonymous = tracker.detached(&interner, None, "_a");
        assert!(interner.resolve(&anonymous).starts_with("__GEN_"));
        assert!(tracker.finish(0).is_empty());
    }

    #[test]
    fn test_minted_symbols_avoid_existing_ones() {
        let interner = Interner::new();
        let taken = interner.intern("io_a");
        let mut module = Module::new(
            interner.intern("M"),
            vec![PortInfo::input("p", FirType::uint(1)).with_sym(taken)],
        );
        let body = module.body.as_mut().unwrap();
        let entry = body.entry();
        Builder::at_end(body, entry).wire(
            FirType::uint(1),
            DeclInfo::named("w").with_sym(interner.intern("io_b")),
        );

        let mut tracker = SymbolTracker::for_module(&module, &interner);
        let io = interner.intern("io");
        let a = tracker.derive(&interner, io, "_a", true, TargetKind::Port);
        let b = tracker.derive(&interner, io, "_b", true, TargetKind::Port);
        let c = tracker.detached(&interner, Some("io"), "_c");
        let again = tracker.detached(&interner, Some("io"), "_c");
        assert_eq!(interner.resolve(&a), "io_a_0");
        assert_eq!(interner.resolve(&b), "io_b_1");
        assert_eq!(interner.resolve(&c), "io_c");
        assert_eq!(interner.resolve(&again), "io_c_2");
    }
}
