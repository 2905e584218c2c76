//! Errors raised while building or editing IR

use crate::{FirType, OpId};
use thiserror::Error;

/// IR construction and mutation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    /// An accessor was applied to a ground value
    #[error("cannot access a field of non-aggregate type `{ty}`")]
    NotAggregate {
        /// The offending type
        ty: FirType,
    },

    /// Field or element index past the end of the aggregate
    #[error("index {index} out of range for `{ty}`")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Accessed type
        ty: FirType,
    },

    /// Erasing an operation whose results are still used
    #[error("operation {op:?} still has uses")]
    OpHasUses {
        /// Operation that could not be erased
        op: OpId,
    },

    /// A multiplexer with no inputs
    #[error("multibit mux requires at least one input")]
    EmptyMux,

    /// A width-dependent operation on a type whose width is unknown
    #[error("type `{ty}` has no known width")]
    UnknownWidth {
        /// Type without a width
        ty: FirType,
    },

    /// A result width that does not fit in 32 bits
    #[error("result width {width} does not fit in 32 bits")]
    WidthOverflow {
        /// Width that was required
        width: u64,
    },
}
