//! Host Constraint Adapter
//!
//! The narrow contract through which mappings create, query, enable and
//! remove constraint objects in the host application's pose system. The host
//! owns the scene graph, the bones and the constraint evaluator; this crate
//! only arranges constraints on owner bones.
//!
//! - [`ConstraintHost`]: the adapter trait implemented by the host
//! - [`ConstraintKind`] / [`ConstraintParams`]: what a constraint is and how it is configured
//! - [`memory::MemoryHost`]: a headless in-memory host

pub mod memory;

use std::fmt;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::errors::Result;

pub use memory::MemoryHost;

new_key_type! {
    /// Opaque handle to a constraint living on a host bone.
    pub struct ConstraintHandle;
}

/// Chain length of the IK corrective (the tip bone and its parent).
pub const IK_CHAIN_COUNT: u32 = 2;

/// Identifier of a skeleton object in the host scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkeletonId(String);

impl SkeletonId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkeletonId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ============================================================================
// Constraint description
// ============================================================================

/// The closed set of constraints a mapping may attach to its owner bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Owner bone's world rotation tracks the target bone. Always present.
    RotationCopy,
    /// Extra Euler rotation in the target bone's space, after the copy.
    RotationOffset,
    /// Owner bone's world position tracks the target bone.
    LocationCopy,
    /// Short IK chain chasing the target bone's position.
    Ik,
}

impl ConstraintKind {
    pub const COUNT: usize = 4;

    /// Stack order on the owner bone.
    pub const ALL: [ConstraintKind; Self::COUNT] = [
        ConstraintKind::RotationCopy,
        ConstraintKind::RotationOffset,
        ConstraintKind::LocationCopy,
        ConstraintKind::Ik,
    ];

    /// Well-known constraint name used for find-or-create.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ConstraintKind::RotationCopy => "RT_ROT_COPY",
            ConstraintKind::RotationOffset => "RT_ROT_OFFSET",
            ConstraintKind::LocationCopy => "RT_LOC_COPY",
            ConstraintKind::Ik => "RT_IK",
        }
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific configuration pushed by [`ConstraintHost::configure_constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstraintParams {
    /// Rotation copy and location copy carry no parameters.
    Plain,
    /// Euler rotation (radians, extrinsic XYZ) applied in the target bone's space.
    RotationOffset { euler: Vec3 },
    /// IK chain settings.
    Ik { chain_count: u32, use_tail: bool },
}

impl ConstraintParams {
    /// Parameters for `kind` given the mapping's stored offset.
    #[must_use]
    pub fn for_kind(kind: ConstraintKind, offset: Vec3) -> Self {
        match kind {
            ConstraintKind::RotationCopy | ConstraintKind::LocationCopy => ConstraintParams::Plain,
            ConstraintKind::RotationOffset => ConstraintParams::RotationOffset { euler: offset },
            ConstraintKind::Ik => ConstraintParams::Ik {
                chain_count: IK_CHAIN_COUNT,
                use_tail: false,
            },
        }
    }
}

// ============================================================================
// Adapter contract
// ============================================================================

/// Host pose system as seen by the retarget engine.
///
/// Every mutating call may fail; failures are propagated unchanged to the
/// caller of the engine operation. Implementations decide how "enabled" maps
/// onto their constraint model (an enabled flag, an inverted mute flag, ...).
pub trait ConstraintHost {
    // --- Skeleton queries ---

    /// Whether `bone` exists on `skeleton`.
    fn has_bone(&self, skeleton: &SkeletonId, bone: &str) -> bool;

    /// Object-to-world matrix of the skeleton.
    fn world_matrix(&self, skeleton: &SkeletonId) -> Option<Mat4>;

    /// Pose-space (armature-local) matrix of a bone.
    fn bone_pose_matrix(&self, skeleton: &SkeletonId, bone: &str) -> Option<Mat4>;

    // --- Constraint stack ---

    /// Looks up a constraint on `skeleton`/`bone` by its well-known name.
    fn find_constraint(&self, skeleton: &SkeletonId, bone: &str, name: &str) -> Option<ConstraintHandle>;

    /// Whether `handle` still refers to a live constraint.
    fn contains_constraint(&self, handle: ConstraintHandle) -> bool;

    /// Appends a new constraint to the bone's stack.
    fn create_constraint(
        &mut self,
        skeleton: &SkeletonId,
        bone: &str,
        kind: ConstraintKind,
        name: &str,
    ) -> Result<ConstraintHandle>;

    /// Points the constraint at `target`/`target_bone` and applies `params`.
    /// A `None` target clears the constraint's target.
    fn configure_constraint(
        &mut self,
        handle: ConstraintHandle,
        target: Option<&SkeletonId>,
        target_bone: &str,
        params: &ConstraintParams,
    ) -> Result<()>;

    fn set_constraint_enabled(&mut self, handle: ConstraintHandle, enabled: bool) -> Result<()>;

    /// Removes the constraint from the bone's stack.
    fn remove_constraint(&mut self, skeleton: &SkeletonId, bone: &str, handle: ConstraintHandle) -> Result<()>;
}
