//! Bone mapping
//!
//! One owner-bone ↔ target-bone correspondence plus the corrective
//! constraints synthesized on the owner bone to realize it.
//!
//! - [`BoneMapping`]: the mapping and its synthesis / teardown commands
//! - [`Feature`]: optional constraints toggled per mapping
//! - [`RigPair`]: the skeleton pair and policy a mapping operates in

mod bone_mapping;
mod slots;

use serde::{Deserialize, Serialize};

use crate::host::{ConstraintKind, SkeletonId};
use crate::settings::RetargetSettings;

pub use bone_mapping::BoneMapping;
pub use slots::ConstraintSlots;

/// Optional corrective constraints layered on the base rotation copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    RotationOffset,
    LocationCopy,
    Ik,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::RotationOffset, Feature::LocationCopy, Feature::Ik];

    #[must_use]
    pub const fn constraint_kind(self) -> ConstraintKind {
        match self {
            Feature::RotationOffset => ConstraintKind::RotationOffset,
            Feature::LocationCopy => ConstraintKind::LocationCopy,
            Feature::Ik => ConstraintKind::Ik,
        }
    }
}

/// Context every mapping command runs in: which skeleton owns the bones,
/// which skeleton (if any) supplies the transforms, and the session policy.
#[derive(Debug, Clone, Copy)]
pub struct RigPair<'a> {
    pub owner: &'a SkeletonId,
    pub target: Option<&'a SkeletonId>,
    pub settings: &'a RetargetSettings,
}
