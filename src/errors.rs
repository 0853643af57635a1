//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`RetargetError`] covers the failure modes that are
//! reported upward:
//! - Host constraint adapter failures (create / configure / remove)
//! - Addressing errors (mapping index, bone or skeleton lookups)
//! - Rejected edits that would break the one-mapping-per-owner-bone rule
//! - Preset decoding errors
//!
//! Expected states are *not* errors: a mapping whose bones do not resolve is
//! simply invalid (its constraints stay disabled), and operations that need a
//! target skeleton are no-ops until one is set.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RetargetError>`.
//!
//! ```rust,ignore
//! use bonecopy::errors::Result;
//!
//! fn remap(session: &mut RetargetSession, host: &mut MemoryHost) -> Result<()> {
//!     session.add_mapping(host, "Hand.L", "hand_l", None)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::host::{ConstraintHandle, SkeletonId};

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum RetargetError {
    // ========================================================================
    // Host Adapter Errors
    // ========================================================================
    /// The host failed to perform a constraint operation.
    #[error("Host failed to {operation}: {reason}")]
    Host {
        /// Which adapter operation failed
        operation: &'static str,
        /// Host-provided description
        reason: String,
    },

    /// A constraint handle does not refer to a live host constraint.
    #[error("Unknown constraint handle: {0:?}")]
    UnknownConstraint(ConstraintHandle),

    /// The host has no skeleton with this identifier.
    #[error("Skeleton not found: {0}")]
    SkeletonNotFound(SkeletonId),

    /// The host skeleton has no bone with this name.
    #[error("Bone '{bone}' not found on skeleton {skeleton}")]
    BoneNotFound {
        /// Skeleton that was searched
        skeleton: SkeletonId,
        /// Bone name that failed to resolve
        bone: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Mapping index out of bounds.
    #[error("Mapping index out of bounds: {index} (len: {len})")]
    MappingIndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Number of mappings in the session
        len: usize,
    },

    /// Another mapping already drives this owner bone.
    #[error("Owner bone '{bone}' is already mapped at index {index}")]
    OwnerBoneTaken {
        /// Owner bone name
        bone: String,
        /// Index of the mapping that owns it
        index: usize,
    },

    /// The target skeleton is the owner skeleton itself.
    #[error("Skeleton {0} cannot be its own retarget source")]
    TargetIsOwner(SkeletonId),

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// Mapping preset (de)serialization error.
    #[error("Preset error: {0}")]
    Preset(#[from] serde_json::Error),
}

impl RetargetError {
    /// Shorthand for a [`RetargetError::Host`] failure.
    #[must_use]
    pub fn host(operation: &'static str, reason: impl Into<String>) -> Self {
        RetargetError::Host {
            operation,
            reason: reason.into(),
        }
    }
}

/// Alias for `Result<T, RetargetError>`.
pub type Result<T> = std::result::Result<T, RetargetError>;
