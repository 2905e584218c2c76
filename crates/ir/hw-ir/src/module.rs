//! Modules and their ports

use crate::{AnnotationSet, Body, Direction, FirType, ValueId};
use hw_intern::Symbol;
use serde::{Deserialize, Serialize};

/// Whether a module is visible outside the circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Visible to other circuits and tools
    #[default]
    Public,
    /// Only instantiated from within the circuit
    Private,
}

/// Module flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Defined here, with a body
    Internal,
    /// Declared here, defined elsewhere
    External,
}

/// A module port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name
    pub name: String,
    /// Port type
    pub ty: FirType,
    /// Port direction
    pub direction: Direction,
    /// Symbol used by hierarchical references
    pub inner_sym: Option<Symbol>,
    /// Port annotations
    pub annotations: AnnotationSet,
}

impl PortInfo {
    /// Input port
    pub fn input(name: impl Into<String>, ty: FirType) -> Self {
        Self::new(name, ty, Direction::In)
    }

    /// Output port
    pub fn output(name: impl Into<String>, ty: FirType) -> Self {
        Self::new(name, ty, Direction::Out)
    }

    /// Port without symbol or annotations
    pub fn new(name: impl Into<String>, ty: FirType, direction: Direction) -> Self {
        Self {
            name: name.into(),
            ty,
            direction,
            inner_sym: None,
            annotations: AnnotationSet::new(),
        }
    }

    /// Sets the inner symbol
    #[must_use]
    pub fn with_sym(mut self, sym: Symbol) -> Self {
        self.inner_sym = Some(sym);
        self
    }

    /// Replaces the annotations
    #[must_use]
    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = annotations;
        self
    }
}

/// A module or external module declaration
///
/// For internal modules the body's argument list runs parallel to `ports`.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name
    pub name: Symbol,
    /// Internal or external
    pub kind: ModuleKind,
    /// Visibility
    pub visibility: Visibility,
    /// Ports in declaration order
    pub ports: Vec<PortInfo>,
    /// Body, absent for external modules
    pub body: Option<Body>,
    /// Module annotations
    pub annotations: AnnotationSet,
}

impl Module {
    /// Internal module with an empty body
    pub fn new(name: Symbol, ports: Vec<PortInfo>) -> Self {
        let mut body = Body::new();
        for port in &ports {
            body.add_argument(port.ty.clone());
        }
        Self {
            name,
            kind: ModuleKind::Internal,
            visibility: Visibility::Public,
            ports,
            body: Some(body),
            annotations: AnnotationSet::new(),
        }
    }

    /// External module
    pub fn external(name: Symbol, ports: Vec<PortInfo>) -> Self {
        Self {
            name,
            kind: ModuleKind::External,
            visibility: Visibility::Public,
            ports,
            body: None,
            annotations: AnnotationSet::new(),
        }
    }

    /// Sets the visibility
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Returns true for external modules
    pub fn is_external(&self) -> bool {
        self.kind == ModuleKind::External
    }

    /// Returns true for public modules
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Argument value of port `index`
    pub fn port_value(&self, index: usize) -> Option<ValueId> {
        self.body.as_ref()?.args().get(index).copied()
    }

    /// Index of the port named `name`
    pub fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|port| port.name == name)
    }

    /// Index of the port carrying symbol `sym`
    pub fn port_with_sym(&self, sym: Symbol) -> Option<usize> {
        self.ports.iter().position(|port| port.inner_sym == Some(sym))
    }
}
