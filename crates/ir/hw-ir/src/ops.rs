//! Operation kinds and the metadata carried by declarations

use crate::{AnnotationSet, BlockId, BundleElement, FirType};
use hw_intern::Symbol;
use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Flows into the module
    In,
    /// Flows out of the module
    Out,
}

impl Direction {
    /// Returns the opposite direction when `flip` is set
    pub fn flip_if(self, flip: bool) -> Self {
        match (self, flip) {
            (dir, false) => dir,
            (Self::In, true) => Self::Out,
            (Self::Out, true) => Self::In,
        }
    }

    /// Lowercase keyword used by the printer
    pub fn keyword(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Whether later passes may drop a declaration's name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NameKind {
    /// Name may be discarded
    #[default]
    Droppable,
    /// Name was written by the user and should survive
    Interesting,
}

/// Metadata shared by every named declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclInfo {
    /// Source-level name
    pub name: Option<String>,
    /// Name retention policy
    pub name_kind: NameKind,
    /// Attached annotations
    pub annotations: AnnotationSet,
    /// Module-local symbol used by hierarchical references
    pub inner_sym: Option<Symbol>,
}

impl DeclInfo {
    /// Declaration with an interesting name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            name_kind: NameKind::Interesting,
            ..Self::default()
        }
    }

    /// Declaration with no name
    pub fn anonymous() -> Self {
        Self::default()
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

/// Memory port kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Read port
    Read,
    /// Write port
    Write,
    /// Combined read/write port
    ReadWrite,
}

impl PortKind {
    /// Keyword used by the printer
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "rw",
        }
    }
}

/// Read-under-write behaviour of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadUnderWrite {
    /// Unspecified
    #[default]
    Undefined,
    /// Reads observe the old value
    Old,
    /// Reads observe the new value
    New,
}

/// One port of a memory declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemPort {
    /// Port name
    pub name: String,
    /// Port kind
    pub kind: PortKind,
    /// Annotations addressing the port bundle by field ID
    pub annotations: AnnotationSet,
}

impl MemPort {
    /// Port without annotations
    pub fn new(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            kind,
            annotations: AnnotationSet::new(),
        }
    }
}

/// Memory declaration; one result per port, typed by [`MemDecl::port_type`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemDecl {
    /// Name, symbol and annotations
    pub decl: DeclInfo,
    /// Stored element type
    pub data_type: FirType,
    /// Number of entries
    pub depth: u64,
    /// Read latency in cycles
    pub read_latency: u32,
    /// Write latency in cycles
    pub write_latency: u32,
    /// Read-under-write behaviour
    pub ruw: ReadUnderWrite,
    /// Ports in result order
    pub ports: Vec<MemPort>,
}

impl MemDecl {
    /// Width of the address field for a memory of `depth` entries
    pub fn address_width(depth: u64) -> u32 {
        let bits = u64::BITS - depth.saturating_sub(1).leading_zeros();
        bits.max(1)
    }

    /// Bundle type of a port of kind `kind` on a memory of `depth` entries of `data`
    pub fn port_type_for(depth: u64, data: &FirType, kind: PortKind) -> FirType {
        let mut elements = vec![
            BundleElement::new("addr", FirType::uint(Self::address_width(depth))),
            BundleElement::new("en", FirType::uint(1)),
            BundleElement::new("clk", FirType::Clock),
        ];
        match kind {
            PortKind::Read => {
                elements.push(BundleElement::flipped("data", data.clone()));
            }
            PortKind::Write => {
                elements.push(BundleElement::new("data", data.clone()));
                elements.push(BundleElement::new("mask", data.mask_type()));
            }
            PortKind::ReadWrite => {
                elements.push(BundleElement::flipped("rdata", data.clone()));
                elements.push(BundleElement::new("wmode", FirType::uint(1)));
                elements.push(BundleElement::new("wdata", data.clone()));
                elements.push(BundleElement::new("wmask", data.mask_type()));
            }
        }
        FirType::bundle(elements)
    }

    /// Result types, one per port
    pub fn port_types(&self) -> Vec<FirType> {
        self.ports
            .iter()
            .map(|port| Self::port_type_for(self.depth, &self.data_type, port.kind))
            .collect()
    }
}

/// One port of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePort {
    /// Port name
    pub name: String,
    /// Port direction as seen from the instantiated module
    pub direction: Direction,
    /// Port annotations
    pub annotations: AnnotationSet,
}

impl InstancePort {
    /// Port without annotations
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
            annotations: AnnotationSet::new(),
        }
    }
}

/// Instance declaration; one result per port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDecl {
    /// Name, symbol and annotations
    pub decl: DeclInfo,
    /// Instantiated module
    pub module: Symbol,
    /// Ports in result order
    pub ports: Vec<InstancePort>,
    /// Emit as a bind rather than inline
    pub lower_to_bind: bool,
}

/// Ground-only primitive operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    /// Equality, `UInt<1>` result
    Eq,
    /// Concatenation, first operand in the high bits
    Cat,
    /// Bit extraction, inclusive
    Bits {
        /// High bit
        hi: u32,
        /// Low bit
        lo: u32,
    },
    /// Reinterpret as unsigned
    AsUInt,
    /// Reinterpret as signed
    AsSInt,
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Bitwise not
    Not,
}

impl PrimOp {
    /// Printer mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Cat => "cat",
            Self::Bits { .. } => "bits",
            Self::AsUInt => "asUInt",
            Self::AsSInt => "asSInt",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
        }
    }
}

/// Every operation the IR knows about
///
/// Operand layouts:
/// - `Reg`: `[clock]`
/// - `RegReset`: `[clock, reset, init]`
/// - `Node`, `Subfield`, `Subindex`, `BitCast`, `UnrealizedCast`: `[input]`
/// - `Subaccess`: `[input, index]`
/// - `Mux`: `[sel, high, low]`
/// - `MultibitMux`: `[index, inputs...]`
/// - `Connect`, `StrictConnect`: `[dest, src]`
/// - `When`: `[cond]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// Wire declaration
    Wire(DeclInfo),
    /// Register without reset
    Reg(DeclInfo),
    /// Register with reset value
    RegReset(DeclInfo),
    /// Named binding of an expression
    Node(DeclInfo),
    /// Memory
    Mem(MemDecl),
    /// Module instance
    Instance(InstanceDecl),
    /// Integer literal
    Constant {
        /// Literal value
        value: u128,
    },
    /// Placeholder invalid value
    Invalid,
    /// Static bundle field access
    Subfield {
        /// Field index
        index: usize,
    },
    /// Static vector element access
    Subindex {
        /// Element index
        index: usize,
    },
    /// Dynamic vector element access
    Subaccess,
    /// Two-way select
    Mux,
    /// N-way select; input `k` is chosen when the index equals `n - 1 - k`
    MultibitMux,
    /// Bit reinterpretation
    BitCast,
    /// Cast that later passes resolve
    UnrealizedCast,
    /// Ground primitive
    Prim(PrimOp),
    /// Last-connect-wins assignment
    Connect,
    /// Assignment between identically typed values
    StrictConnect,
    /// Conditional block
    When {
        /// Taken when the condition is set
        then_block: BlockId,
        /// Taken otherwise
        else_block: Option<BlockId>,
    },
}

impl OpKind {
    /// Declaration metadata, if this is a declaration
    pub fn decl(&self) -> Option<&DeclInfo> {
        match self {
            Self::Wire(decl) | Self::Reg(decl) | Self::RegReset(decl) | Self::Node(decl) => {
                Some(decl)
            }
            Self::Mem(mem) => Some(&mem.decl),
            Self::Instance(inst) => Some(&inst.decl),
            _ => None,
        }
    }

    /// Mutable declaration metadata
    pub fn decl_mut(&mut self) -> Option<&mut DeclInfo> {
        match self {
            Self::Wire(decl) | Self::Reg(decl) | Self::RegReset(decl) | Self::Node(decl) => {
                Some(decl)
            }
            Self::Mem(mem) => Some(&mut mem.decl),
            Self::Instance(inst) => Some(&mut inst.decl),
            _ => None,
        }
    }

    /// Printer mnemonic
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Wire(_) => "wire",
            Self::Reg(_) => "reg",
            Self::RegReset(_) => "regreset",
            Self::Node(_) => "node",
            Self::Mem(_) => "mem",
            Self::Instance(_) => "instance",
            Self::Constant { .. } => "constant",
            Self::Invalid => "invalid",
            Self::Subfield { .. } => "subfield",
            Self::Subindex { .. } => "subindex",
            Self::Subaccess => "subaccess",
            Self::Mux => "mux",
            Self::MultibitMux => "multibit_mux",
            Self::BitCast => "bitcast",
            Self::UnrealizedCast => "unrealized_cast",
            Self::Prim(prim) => prim.mnemonic(),
            Self::Connect => "connect",
            Self::StrictConnect => "strict_connect",
            Self::When { .. } => "when",
        }
    }

    /// Returns true for static or dynamic accessors
    pub fn is_accessor(&self) -> bool {
        matches!(
            self,
            Self::Subfield { .. } | Self::Subindex { .. } | Self::Subaccess
        )
    }
}
