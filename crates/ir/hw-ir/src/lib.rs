//! Module-graph IR for hardware circuits
//!
//! A [`Circuit`] owns [`Module`]s whose bodies are arena-allocated operation
//! graphs with explicit use lists. Values carry [`FirType`]s, which may be
//! aggregates (bundles and vectors) until type lowering removes them.

mod annotations;
mod body;
mod builder;
mod circuit;
mod error;
mod module;
mod ops;
mod print;
mod types;

pub use annotations::{
    Annotation, AnnotationSet, DONT_TOUCH_CLASS, FIELD_ID_MEMBER, SIGNAL_DRIVER_CLASS,
};
pub use body::{Block, BlockId, Body, OpId, Operation, Use, ValueData, ValueDef, ValueId};
pub use builder::{Builder, InsertPoint};
pub use circuit::{
    Circuit, CircuitNamespace, HierPath, HierPathTable, InnerRef, ModuleEntry, ModuleTable,
    PathSegment,
};
pub use error::IrError;
pub use module::{Module, ModuleKind, PortInfo, Visibility};
pub use ops::{
    DeclInfo, Direction, InstanceDecl, InstancePort, MemDecl, MemPort, NameKind, OpKind,
    PortKind, PrimOp, ReadUnderWrite,
};
pub use print::{CircuitPrinter, ModulePrinter};
pub use types::{BundleElement, BundleType, FirType, VectorType};
