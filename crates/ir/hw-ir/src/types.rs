//! Hardware types and their field-ID encoding
//!
//! Every type assigns a dense integer, its *field ID*, to each node of its
//! structure in pre-order: the whole value is 0, the first child is 1, and a
//! child's subtree occupies the IDs up to and including
//! `child_id + child.max_field_id()`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hardware type: either ground or an aggregate of further types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FirType {
    /// Unsigned integer, width optional until inferred
    UInt(Option<u32>),
    /// Signed integer, width optional until inferred
    SInt(Option<u32>),
    /// Clock signal
    Clock,
    /// Reset of undetermined flavour
    Reset,
    /// Asynchronous reset
    AsyncReset,
    /// Bidirectional analog wire
    Analog(Option<u32>),
    /// Named, ordered fields
    Bundle(BundleType),
    /// Fixed-length homogeneous elements
    Vector(VectorType),
}

/// One field of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleElement {
    /// Field name
    pub name: String,
    /// Whether the field flows against its parent
    pub flip: bool,
    /// Field type
    pub ty: FirType,
}

impl BundleElement {
    /// Non-flipped field
    pub fn new(name: impl Into<String>, ty: FirType) -> Self {
        Self {
            name: name.into(),
            flip: false,
            ty,
        }
    }

    /// Flipped field
    pub fn flipped(name: impl Into<String>, ty: FirType) -> Self {
        Self {
            name: name.into(),
            flip: true,
            ty,
        }
    }
}

/// Bundle type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleType {
    /// Fields in declaration order
    pub elements: Vec<BundleElement>,
}

/// Vector type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorType {
    /// Element type
    pub element: Box<FirType>,
    /// Number of elements
    pub len: usize,
}

impl FirType {
    /// `UInt<width>`
    pub fn uint(width: u32) -> Self {
        Self::UInt(Some(width))
    }

    /// `SInt<width>`
    pub fn sint(width: u32) -> Self {
        Self::SInt(Some(width))
    }

    /// Bundle built from its elements
    pub fn bundle(elements: Vec<BundleElement>) -> Self {
        Self::Bundle(BundleType { elements })
    }

    /// Vector of `len` copies of `element`
    pub fn vector(element: Self, len: usize) -> Self {
        Self::Vector(VectorType {
            element: Box::new(element),
            len,
        })
    }

    /// Returns true for types without bundle or vector structure
    pub fn is_ground(&self) -> bool {
        !self.is_aggregate()
    }

    /// Returns true for bundles and vectors
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Bundle(_) | Self::Vector(_))
    }

    /// Largest field ID used by this type
    pub fn max_field_id(&self) -> u64 {
        match self {
            Self::Bundle(bundle) => bundle.max_field_id(),
            Self::Vector(vector) => vector.max_field_id(),
            _ => 0,
        }
    }

    /// Total bit width, or `None` if some width is not known yet or the sum
    /// overflows
    pub fn bit_width(&self) -> Option<u64> {
        match self {
            Self::UInt(width) | Self::SInt(width) | Self::Analog(width) => {
                width.map(u64::from)
            }
            Self::Clock | Self::Reset | Self::AsyncReset => Some(1),
            Self::Bundle(bundle) => bundle
                .elements
                .iter()
                .try_fold(0u64, |acc, elt| acc.checked_add(elt.ty.bit_width()?)),
            Self::Vector(vector) => vector
                .element
                .bit_width()?
                .checked_mul(u64::try_from(vector.len).ok()?),
        }
    }

    /// Returns true if no field anywhere is flipped
    pub fn is_passive(&self) -> bool {
        match self {
            Self::Bundle(bundle) => bundle
                .elements
                .iter()
                .all(|elt| !elt.flip && elt.ty.is_passive()),
            Self::Vector(vector) => vector.element.is_passive(),
            _ => true,
        }
    }

    /// Returns true if an analog leaf is reachable
    pub fn contains_analog(&self) -> bool {
        match self {
            Self::Analog(_) => true,
            Self::Bundle(bundle) => bundle.elements.iter().any(|elt| elt.ty.contains_analog()),
            Self::Vector(vector) => vector.element.contains_analog(),
            _ => false,
        }
    }

    /// Returns true if a zero-width leaf or an empty aggregate is reachable
    ///
    /// A single such leaf is enough, so an aggregate that is only partly zero
    /// width is never preserved. Leaves whose width is still unknown count as
    /// zero width.
    pub fn has_zero_bit_width(&self) -> bool {
        match self {
            Self::Bundle(bundle) => {
                bundle.elements.is_empty()
                    || bundle.elements.iter().any(|elt| elt.ty.has_zero_bit_width())
            }
            Self::Vector(vector) => vector.len == 0 || vector.element.has_zero_bit_width(),
            ground => ground.bit_width().unwrap_or(0) == 0,
        }
    }

    /// Same structure with every ground leaf replaced by `UInt<1>`
    pub fn mask_type(&self) -> Self {
        match self {
            Self::Bundle(bundle) => Self::bundle(
                bundle
                    .elements
                    .iter()
                    .map(|elt| BundleElement::new(elt.name.clone(), elt.ty.mask_type()))
                    .collect(),
            ),
            Self::Vector(vector) => Self::vector(vector.element.mask_type(), vector.len),
            _ => Self::uint(1),
        }
    }

    /// Type of the immediate child at `index`
    pub fn child_type(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Bundle(bundle) => bundle.elements.get(index).map(|elt| &elt.ty),
            Self::Vector(vector) if index < vector.len => Some(&*vector.element),
            _ => None,
        }
    }
}

impl BundleType {
    /// Field ID of the element at `index`
    pub fn field_id(&self, index: usize) -> u64 {
        1 + self.elements[..index]
            .iter()
            .map(|elt| elt.ty.max_field_id() + 1)
            .sum::<u64>()
    }

    /// Index of the element whose subtree contains `field_id`
    ///
    /// `field_id` must be non-zero and at most [`Self::max_field_id`].
    pub fn index_for_field_id(&self, field_id: u64) -> usize {
        let mut next = 1;
        for (index, elt) in self.elements.iter().enumerate() {
            next += elt.ty.max_field_id() + 1;
            if field_id < next {
                return index;
            }
        }
        self.elements.len().saturating_sub(1)
    }

    /// Largest field ID used by this bundle
    pub fn max_field_id(&self) -> u64 {
        self.elements
            .iter()
            .map(|elt| elt.ty.max_field_id() + 1)
            .sum()
    }

    /// Element named `name` and its index
    pub fn element(&self, name: &str) -> Option<(usize, &BundleElement)> {
        self.elements
            .iter()
            .enumerate()
            .find(|(_, elt)| elt.name == name)
    }
}

impl VectorType {
    /// Field ID of element `index`
    pub fn field_id(&self, index: usize) -> u64 {
        1 + index as u64 * (self.element.max_field_id() + 1)
    }

    /// Index of the element whose subtree contains `field_id`
    pub fn index_for_field_id(&self, field_id: u64) -> usize {
        let stride = self.element.max_field_id() + 1;
        (field_id.saturating_sub(1) / stride) as usize
    }

    /// Largest field ID used by this vector
    pub fn max_field_id(&self) -> u64 {
        self.len as u64 * (self.element.max_field_id() + 1)
    }
}

fn write_width(f: &mut fmt::Formatter<'_>, name: &str, width: Option<u32>) -> fmt::Result {
    match width {
        Some(width) => write!(f, "{name}<{width}>"),
        None => f.write_str(name),
    }
}

impl fmt::Display for FirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(width) => write_width(f, "UInt", *width),
            Self::SInt(width) => write_width(f, "SInt", *width),
            Self::Analog(width) => write_width(f, "Analog", *width),
            Self::Clock => f.write_str("Clock"),
            Self::Reset => f.write_str("Reset"),
            Self::AsyncReset => f.write_str("AsyncReset"),
            Self::Bundle(bundle) => {
                f.write_str("{")?;
                for (index, elt) in bundle.elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    if elt.flip {
                        f.write_str("flip ")?;
                    }
                    write!(f, "{}: {}", elt.name, elt.ty)?;
                }
                f.write_str("}")
            }
            Self::Vector(vector) => write!(f, "{}[{}]", vector.element, vector.len),
        }
    }
}
