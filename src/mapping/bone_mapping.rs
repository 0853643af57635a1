use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{ConstraintSlots, Feature, RigPair};
use crate::errors::Result;
use crate::host::{ConstraintHandle, ConstraintHost, ConstraintKind, ConstraintParams, SkeletonId};
use crate::math;

/// A single owner-bone ↔ target-bone correspondence.
///
/// The mapping owns up to four constraints on its owner bone, one per
/// [`ConstraintKind`], each found-or-created by its well-known name. Feature
/// flags decide which constraints *exist*; validity and the session preview
/// flag decide whether existing ones are *enabled*.
///
/// Every command takes the host and the [`RigPair`] explicitly and documents
/// its side effects on the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoneMapping {
    owner_bone: String,
    target_bone: String,

    has_rotation_offset: bool,
    has_location_copy: bool,
    has_ik: bool,

    /// Extrinsic XYZ Euler radians, each axis in [-π, π].
    offset: Vec3,

    selected: bool,

    #[serde(skip)]
    slots: ConstraintSlots,
}

impl BoneMapping {
    /// A mapping bound to `owner_bone` with no target and no constraints yet.
    #[must_use]
    pub fn new(owner_bone: impl Into<String>) -> Self {
        Self {
            owner_bone: owner_bone.into(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn owner_bone(&self) -> &str {
        &self.owner_bone
    }

    #[inline]
    #[must_use]
    pub fn target_bone(&self) -> &str {
        &self.target_bone
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    #[inline]
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    #[inline]
    #[must_use]
    pub fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::RotationOffset => self.has_rotation_offset,
            Feature::LocationCopy => self.has_location_copy,
            Feature::Ik => self.has_ik,
        }
    }

    /// Cached handle of the constraint of `kind`, if it has been synthesized.
    #[inline]
    #[must_use]
    pub fn constraint(&self, kind: ConstraintKind) -> Option<ConstraintHandle> {
        self.slots.get(kind)
    }

    /// Number of constraints the current flags call for.
    #[must_use]
    pub fn expected_constraint_count(&self) -> usize {
        ConstraintKind::ALL.iter().filter(|&&kind| self.wants(kind)).count()
    }

    /// Returns `true` if the flag actually changed.
    pub(crate) fn set_selected_flag(&mut self, selected: bool) -> bool {
        let changed = self.selected != selected;
        self.selected = selected;
        changed
    }

    fn wants(&self, kind: ConstraintKind) -> bool {
        match kind {
            ConstraintKind::RotationCopy => true,
            ConstraintKind::RotationOffset => self.has_rotation_offset,
            ConstraintKind::LocationCopy => self.has_location_copy,
            ConstraintKind::Ik => self.has_ik,
        }
    }

    fn flag_mut(&mut self, feature: Feature) -> &mut bool {
        match feature {
            Feature::RotationOffset => &mut self.has_rotation_offset,
            Feature::LocationCopy => &mut self.has_location_copy,
            Feature::Ik => &mut self.has_ik,
        }
    }

    // ========================================================================
    // Validity
    // ========================================================================

    /// Whether the owner bone exists on the owner skeleton.
    #[must_use]
    pub fn owner_resolves<H: ConstraintHost + ?Sized>(&self, host: &H, rig: RigPair<'_>) -> bool {
        !self.owner_bone.is_empty() && host.has_bone(rig.owner, &self.owner_bone)
    }

    /// Both bones resolve on their skeletons (and a target skeleton is set).
    #[must_use]
    pub fn is_valid<H: ConstraintHost + ?Sized>(&self, host: &H, rig: RigPair<'_>) -> bool {
        self.owner_resolves(host, rig)
            && !self.target_bone.is_empty()
            && rig.target.is_some_and(|target| host.has_bone(target, &self.target_bone))
    }

    fn enabled_state<H: ConstraintHost + ?Sized>(&self, host: &H, rig: RigPair<'_>) -> bool {
        rig.settings.preview && self.is_valid(host, rig)
    }

    /// Rotation offset implied by the current bone transforms, or `None` when
    /// the mapping is invalid or the host cannot provide the matrices.
    #[must_use]
    pub fn derive_offset<H: ConstraintHost + ?Sized>(&self, host: &H, rig: RigPair<'_>) -> Option<Vec3> {
        if !self.is_valid(host, rig) {
            return None;
        }
        let target = rig.target?;
        let offset = math::compute_offset(
            host.world_matrix(rig.owner)?,
            host.bone_pose_matrix(rig.owner, &self.owner_bone)?,
            host.world_matrix(target)?,
            host.bone_pose_matrix(target, &self.target_bone)?,
            rig.settings.quantize_offset,
        );
        Some(math::clamp_offset(offset))
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Rebinds the mapping to another owner bone.
    ///
    /// Tears down every constraint on the previous owner bone, then
    /// re-synthesizes under the new name. Never an in-place rename.
    pub fn bind<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, rig: RigPair<'_>, owner_bone: &str) -> Result<()> {
        self.teardown(host, rig)?;
        self.owner_bone = owner_bone.to_owned();
        self.apply_all(host, rig)
    }

    /// Assigns the target bone.
    ///
    /// With `calc_offset_on_assign` on and a valid mapping, the offset is
    /// derived from the bone transforms and stored; a non-zero result turns
    /// the rotation-offset feature on. Ends with [`apply_all`](Self::apply_all).
    pub fn set_target<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, rig: RigPair<'_>, target_bone: &str) -> Result<()> {
        self.target_bone = target_bone.to_owned();

        if rig.settings.calc_offset_on_assign {
            if let Some(offset) = self.derive_offset(&*host, rig) {
                self.offset = offset;
                if !math::is_zero_offset(offset) {
                    self.has_rotation_offset = true;
                }
            }
        }

        self.apply_all(host, rig)
    }

    /// Turns an optional constraint on or off.
    ///
    /// Enabling finds-or-creates the constraint and configures it from the
    /// current target and offset. Disabling removes it from the host.
    pub fn set_feature<H: ConstraintHost + ?Sized>(
        &mut self,
        host: &mut H,
        rig: RigPair<'_>,
        feature: Feature,
        enabled: bool,
    ) -> Result<()> {
        *self.flag_mut(feature) = enabled;
        if !self.owner_resolves(&*host, rig) {
            return Ok(());
        }

        let kind = feature.constraint_kind();
        if enabled {
            let handle = self.ensure(host, rig.owner, kind)?;
            let state = self.enabled_state(&*host, rig);
            self.sync(host, rig, handle, kind, state)
        } else {
            self.remove_kind(host, rig.owner, kind)
        }
    }

    /// Stores the offset (clamped to [-π, π]) and pushes it into the
    /// rotation-offset constraint if that constraint exists.
    pub fn set_offset<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, rig: RigPair<'_>, euler: Vec3) -> Result<()> {
        self.offset = math::clamp_offset(euler);
        if !self.owner_resolves(&*host, rig) {
            return Ok(());
        }

        let kind = ConstraintKind::RotationOffset;
        if let Some(handle) = self.lookup(&*host, rig.owner, kind) {
            let params = ConstraintParams::for_kind(kind, self.offset);
            host.configure_constraint(handle, rig.target, &self.target_bone, &params)?;
        }
        Ok(())
    }

    /// Idempotently synthesizes every constraint the flags call for, points
    /// each at the target bone and sets its enabled state to
    /// `valid && preview`. A no-op while the owner bone does not resolve.
    pub fn apply_all<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, rig: RigPair<'_>) -> Result<()> {
        if !self.owner_resolves(&*host, rig) {
            log::trace!("Skipping apply: owner bone '{}' missing on {}", self.owner_bone, rig.owner);
            return Ok(());
        }

        let enabled = self.enabled_state(&*host, rig);
        for kind in ConstraintKind::ALL {
            if !self.wants(kind) {
                continue;
            }
            let handle = self.ensure(host, rig.owner, kind)?;
            self.sync(host, rig, handle, kind, enabled)?;
        }
        Ok(())
    }

    /// Sets the enabled flag of every existing constraint. Never creates or
    /// removes constraints, and does nothing while the mapping is invalid.
    pub fn set_enabled<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, rig: RigPair<'_>, state: bool) -> Result<()> {
        if !self.is_valid(&*host, rig) {
            return Ok(());
        }
        for kind in ConstraintKind::ALL {
            if let Some(handle) = self.lookup(&*host, rig.owner, kind) {
                log::trace!("{} {kind} on '{}'", if state { "Enabling" } else { "Disabling" }, self.owner_bone);
                host.set_constraint_enabled(handle, state)?;
            }
        }
        Ok(())
    }

    /// Removes every constraint from the owner bone regardless of flags.
    pub fn teardown<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, rig: RigPair<'_>) -> Result<()> {
        if self.owner_resolves(&*host, rig) {
            for kind in ConstraintKind::ALL {
                self.remove_kind(host, rig.owner, kind)?;
            }
        }
        self.slots.clear();
        Ok(())
    }

    // ========================================================================
    // Constraint slots
    // ========================================================================

    /// Cached handle if still live, otherwise a by-name lookup on the host.
    fn lookup<H: ConstraintHost + ?Sized>(&mut self, host: &H, owner: &SkeletonId, kind: ConstraintKind) -> Option<ConstraintHandle> {
        if let Some(handle) = self.slots.get(kind) {
            if host.contains_constraint(handle) {
                return Some(handle);
            }
            log::warn!("Dropping stale {kind} handle on '{}'", self.owner_bone);
            self.slots.take(kind);
        }

        let handle = host.find_constraint(owner, &self.owner_bone, kind.name())?;
        self.slots.set(kind, handle);
        Some(handle)
    }

    fn ensure<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, owner: &SkeletonId, kind: ConstraintKind) -> Result<ConstraintHandle> {
        if let Some(handle) = self.lookup(&*host, owner, kind) {
            return Ok(handle);
        }

        let handle = host.create_constraint(owner, &self.owner_bone, kind, kind.name())?;
        log::debug!("Created {kind} on {owner}/{}", self.owner_bone);
        self.slots.set(kind, handle);
        Ok(handle)
    }

    fn sync<H: ConstraintHost + ?Sized>(
        &self,
        host: &mut H,
        rig: RigPair<'_>,
        handle: ConstraintHandle,
        kind: ConstraintKind,
        enabled: bool,
    ) -> Result<()> {
        let params = ConstraintParams::for_kind(kind, self.offset);
        host.configure_constraint(handle, rig.target, &self.target_bone, &params)?;
        host.set_constraint_enabled(handle, enabled)
    }

    fn remove_kind<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, owner: &SkeletonId, kind: ConstraintKind) -> Result<()> {
        if let Some(handle) = self.lookup(&*host, owner, kind) {
            host.remove_constraint(owner, &self.owner_bone, handle)?;
            self.slots.take(kind);
            log::debug!("Removed {kind} from {owner}/{}", self.owner_bone);
        }
        Ok(())
    }
}
