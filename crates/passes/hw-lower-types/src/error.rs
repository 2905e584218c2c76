//! Errors raised by type lowering
//!
//! Every variant except [`ConfigError`] is an internal invariant violation:
//! earlier passes should have rejected the input, so the whole pass aborts.

use hw_ir::{FirType, IrError};
use thiserror::Error;

/// Fatal lowering errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerTypesError {
    /// An aggregate value is read by something other than a static accessor
    #[error("aggregate value of type `{ty}` has unexpected user `{user}`")]
    UnknownAggregateUser {
        /// Mnemonic of the offending user
        user: &'static str,
        /// Type of the aggregate value
        ty: FirType,
    },

    /// A write path contains an operation that is not an accessor
    #[error("unknown accessor `{op}` in write path")]
    UnknownAccessor {
        /// Mnemonic of the offending operation
        op: &'static str,
    },

    /// An instance refers to a module that is not in the circuit
    #[error("instance of unknown module `{name}`")]
    MissingModule {
        /// Referenced module name
        name: String,
    },

    /// A bit cast involves a type whose width is not known
    #[error("bit cast requires a known width for `{ty}`")]
    MissingWidth {
        /// Type without a width
        ty: FirType,
    },

    /// IR shape that cannot occur in verified input
    #[error("malformed IR: {what}")]
    Malformed {
        /// Description of the problem
        what: String,
    },

    /// Error reported by the IR layer
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Errors loading [`crate::LowerTypesOptions`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed
    #[error("invalid lower-types configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result alias for the pass
pub type Result<T, E = LowerTypesError> = std::result::Result<T, E>;
