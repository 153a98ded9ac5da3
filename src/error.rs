//! Error taxonomy for composition building and querying.
//!
//! Failures are reserved for contract violations and programmer error.
//! Expected absence is expressed with `Option`/`bool` returning accessors.

use thiserror::Error;

/// Errors raised by [`Composer`](crate::Composer), [`Composition`](crate::Composition)
/// and the contract resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// A required argument was absent or empty.
    #[error("required argument `{argument}` is missing")]
    NullArgument {
        /// Name of the missing argument.
        argument: &'static str,
    },

    /// The builder was used after it was finalized.
    #[error("cannot {operation}: composer has already been built")]
    IllegalState {
        /// The rejected operation.
        operation: &'static str,
    },

    /// A declared contract cannot be used for this capability.
    #[error("invalid contract `{contract}`: {reason}")]
    InvalidContract {
        /// Name of the offending contract type.
        contract: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A second primary capability was registered.
    #[error("subject `{subject}` already has primary capability `{existing}`; cannot add `{attempted}`")]
    DuplicatePrimary {
        /// Subject type name.
        subject: &'static str,
        /// Type name of the primary already registered.
        existing: &'static str,
        /// Type name of the rejected capability.
        attempted: &'static str,
    },

    /// A required capability query had no match.
    #[error(
        "no capability `{requested}` for subject `{subject}` (available: [{}])",
        .available.join(", ")
    )]
    NotFound {
        /// Queried type name.
        requested: &'static str,
        /// Subject type name.
        subject: &'static str,
        /// Sorted storage key names present in the composition.
        available: Vec<&'static str>,
    },

    /// An argument had the right shape but an unusable value.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why it was rejected.
        reason: String,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = ComposeError> = core::result::Result<T, E>;
