//! Circuits, hierarchical paths and the circuit-wide lookup tables

use crate::{Module, ModuleKind, Visibility};
use hw_intern::{Interner, Namespace, Symbol};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Reference to a symbol inside a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InnerRef {
    /// Enclosing module
    pub module: Symbol,
    /// Inner symbol
    pub name: Symbol,
}

impl InnerRef {
    /// `module::name`
    pub fn new(module: Symbol, name: Symbol) -> Self {
        Self { module, name }
    }
}

/// One step of a hierarchical path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Instance or entity inside a module
    InnerRef(InnerRef),
    /// A whole module, only valid as the final segment
    Module(Symbol),
}

impl PathSegment {
    /// Module the segment lives in
    pub fn module(&self) -> Symbol {
        match self {
            Self::InnerRef(inner) => inner.module,
            Self::Module(module) => *module,
        }
    }
}

/// Named hierarchical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierPath {
    /// Path name, unique in the circuit
    pub name: Symbol,
    /// Segments from the root outward
    pub namepath: Vec<PathSegment>,
}

impl HierPath {
    /// Inner reference the path ends at, if it ends inside a module
    pub fn target(&self) -> Option<InnerRef> {
        match self.namepath.last()? {
            PathSegment::InnerRef(inner) => Some(*inner),
            PathSegment::Module(_) => None,
        }
    }
}

/// A compilation unit
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Circuit name
    pub name: Symbol,
    /// Modules in declaration order
    pub modules: Vec<Module>,
    /// Hierarchical paths keyed by name
    pub hier_paths: IndexMap<Symbol, HierPath>,
}

impl Circuit {
    /// Empty circuit
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            modules: Vec::new(),
            hier_paths: IndexMap::new(),
        }
    }

    /// Appends a module
    pub fn add_module(&mut self, module: Module) {
        self.modules.push(module);
    }

    /// Inserts a hierarchical path
    pub fn add_hier_path(&mut self, path: HierPath) {
        self.hier_paths.insert(path.name, path);
    }
}

/// Kind and visibility of a module, as seen by instantiating modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Internal or external
    pub kind: ModuleKind,
    /// Visibility
    pub visibility: Visibility,
}

/// Module lookup by name
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    entries: FxHashMap<Symbol, ModuleEntry>,
}

impl ModuleTable {
    /// Indexes every module of `circuit`
    pub fn new(circuit: &Circuit) -> Self {
        let entries = circuit
            .modules
            .iter()
            .map(|module| {
                (
                    module.name,
                    ModuleEntry {
                        kind: module.kind,
                        visibility: module.visibility,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Entry for `name`
    pub fn get(&self, name: Symbol) -> Option<ModuleEntry> {
        self.entries.get(&name).copied()
    }
}

/// Index from module name to the hierarchical paths passing through it
#[derive(Debug, Clone, Default)]
pub struct HierPathTable {
    by_module: FxHashMap<Symbol, Vec<Symbol>>,
}

impl HierPathTable {
    /// Indexes every path of `circuit`
    pub fn new(circuit: &Circuit) -> Self {
        let mut table = Self::default();
        for path in circuit.hier_paths.values() {
            table.index(path);
        }
        table
    }

    fn index(&mut self, path: &HierPath) {
        for segment in &path.namepath {
            let names = self.by_module.entry(segment.module()).or_default();
            if !names.contains(&path.name) {
                names.push(path.name);
            }
        }
    }

    /// Names of the paths that pass through `module`
    pub fn lookup(&self, module: Symbol) -> &[Symbol] {
        self.by_module.get(&module).map_or(&[], Vec::as_slice)
    }

    /// Removes path `name` from this table and from `circuit`
    pub fn erase(&mut self, name: Symbol, circuit: &mut Circuit) -> Option<HierPath> {
        let path = circuit.hier_paths.shift_remove(&name)?;
        for segment in &path.namepath {
            if let Some(names) = self.by_module.get_mut(&segment.module()) {
                names.retain(|other| *other != name);
            }
        }
        Some(path)
    }

    /// Adds `path` to this table and to `circuit`
    pub fn add(&mut self, path: HierPath, circuit: &mut Circuit) {
        self.index(&path);
        circuit.add_hier_path(path);
    }
}

/// Fresh-name allocator seeded with every circuit-level symbol
#[derive(Debug, Clone)]
pub struct CircuitNamespace {
    names: Namespace,
}

impl CircuitNamespace {
    /// Reserves the circuit, module and path names of `circuit`
    pub fn new(circuit: &Circuit, interner: &Interner) -> Self {
        let mut names = Namespace::new();
        names.reserve(interner.resolve(&circuit.name));
        for module in &circuit.modules {
            names.reserve(interner.resolve(&module.name));
        }
        for path in circuit.hier_paths.keys() {
            names.reserve(interner.resolve(path));
        }
        Self { names }
    }

    /// Returns `base` or `base_<n>`, whichever is unused, and reserves it
    pub fn new_name(&mut self, base: &str) -> String {
        self.names.new_name(base)
    }
}
