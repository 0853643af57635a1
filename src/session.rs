//! Retarget Session
//!
//! The ordered, selectable collection of [`BoneMapping`]s for one owner
//! skeleton, plus the target skeleton they draw from.
//!
//! All mutations are synchronous and run to completion. Collection-wide
//! passes are deterministic: apply passes walk mappings in collection order,
//! removal walks descending indices.
//!
//! A session is not internally synchronized. Hosts that drive it from several
//! threads must serialize mutating calls (e.g. one `Mutex` per session).

use glam::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::{RetargetError, Result};
use crate::host::{ConstraintHost, SkeletonId};
use crate::mapping::{BoneMapping, Feature, RigPair};
use crate::settings::RetargetSettings;

/// Mapping indices in descending order.
pub type Selection = SmallVec<[usize; 8]>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SessionRecord")]
pub struct RetargetSession {
    owner: SkeletonId,
    target: Option<SkeletonId>,

    /// Insertion order is display and bake order.
    mappings: Vec<BoneMapping>,
    active_index: Option<usize>,
    /// Always equals the number of mappings with `selected == true`.
    selected_count: usize,

    settings: RetargetSettings,
}

/// Serialized form of a session. `selected_count` is not trusted on load; it
/// is recounted from the mappings' `selected` flags.
#[derive(Deserialize)]
struct SessionRecord {
    owner: SkeletonId,
    #[serde(default)]
    target: Option<SkeletonId>,
    #[serde(default)]
    mappings: Vec<BoneMapping>,
    #[serde(default)]
    active_index: Option<usize>,
    #[serde(default)]
    settings: RetargetSettings,
}

impl From<SessionRecord> for RetargetSession {
    fn from(record: SessionRecord) -> Self {
        let selected_count = record.mappings.iter().filter(|m| m.is_selected()).count();
        let active_index = record.active_index.filter(|&i| i < record.mappings.len());
        Self {
            owner: record.owner,
            target: record.target,
            mappings: record.mappings,
            active_index,
            selected_count,
            settings: record.settings,
        }
    }
}

impl RetargetSession {
    #[must_use]
    pub fn new(owner: SkeletonId) -> Self {
        Self::with_settings(owner, RetargetSettings::default())
    }

    #[must_use]
    pub fn with_settings(owner: SkeletonId, settings: RetargetSettings) -> Self {
        Self {
            owner,
            target: None,
            mappings: Vec::new(),
            active_index: None,
            selected_count: 0,
            settings,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn owner(&self) -> &SkeletonId {
        &self.owner
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&SkeletonId> {
        self.target.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn mappings(&self) -> &[BoneMapping] {
        &self.mappings
    }

    #[inline]
    #[must_use]
    pub fn mapping(&self, index: usize) -> Option<&BoneMapping> {
        self.mappings.get(index)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    #[must_use]
    pub fn active_mapping(&self) -> Option<&BoneMapping> {
        self.active_index.and_then(|i| self.mappings.get(i))
    }

    #[inline]
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RetargetSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn preview_enabled(&self) -> bool {
        self.settings.preview
    }

    /// The rig context mappings of this session operate in.
    #[must_use]
    pub fn rig(&self) -> RigPair<'_> {
        RigPair {
            owner: &self.owner,
            target: self.target.as_ref(),
            settings: &self.settings,
        }
    }

    /// Whether the mapping at `index` currently resolves on both skeletons.
    #[must_use]
    pub fn is_valid<H: ConstraintHost + ?Sized>(&self, host: &H, index: usize) -> bool {
        self.mappings.get(index).is_some_and(|m| m.is_valid(host, self.rig()))
    }

    // ========================================================================
    // Session-wide commands
    // ========================================================================

    /// Chooses the skeleton that supplies source transforms (or clears it)
    /// and re-points every mapping's constraints at it.
    pub fn set_target<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, target: Option<SkeletonId>) -> Result<()> {
        if target.as_ref() == Some(&self.owner) {
            return Err(RetargetError::TargetIsOwner(self.owner.clone()));
        }
        self.target = target;
        self.refresh(host)
    }

    /// Enables or disables every synthesized constraint without touching the
    /// mapping graph.
    pub fn set_preview<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, enabled: bool) -> Result<()> {
        self.settings.preview = enabled;
        let (rig, mappings) = self.split();
        for mapping in mappings.iter_mut() {
            mapping.set_enabled(host, rig, enabled)?;
        }
        Ok(())
    }

    pub fn set_calc_offset_on_assign(&mut self, enabled: bool) {
        self.settings.calc_offset_on_assign = enabled;
    }

    pub fn set_quantize_offset(&mut self, enabled: bool) {
        self.settings.quantize_offset = enabled;
    }

    /// Re-runs `apply_all` on every mapping in collection order. Call after
    /// host-side edits (bones renamed, deleted, skeleton swapped) or to retry
    /// after a host failure.
    pub fn refresh<H: ConstraintHost + ?Sized>(&mut self, host: &mut H) -> Result<()> {
        let (rig, mappings) = self.split();
        for mapping in mappings.iter_mut() {
            mapping.apply_all(host, rig)?;
        }
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// First mapping whose target bone is `name`. Empty names never match.
    #[must_use]
    pub fn find_by_target_bone(&self, name: &str) -> Option<(usize, &BoneMapping)> {
        if name.is_empty() {
            return None;
        }
        self.mappings.iter().enumerate().find(|(_, m)| m.target_bone() == name)
    }

    /// The mapping that owns bone `name`. Empty names never match.
    #[must_use]
    pub fn find_by_owner_bone(&self, name: &str) -> Option<(usize, &BoneMapping)> {
        if name.is_empty() {
            return None;
        }
        self.mappings.iter().enumerate().find(|(_, m)| m.owner_bone() == name)
    }

    // ========================================================================
    // Collection editing
    // ========================================================================

    /// Maps `owner_bone` onto `target_bone` and returns the mapping's index.
    ///
    /// An existing mapping for `owner_bone` is re-targeted in place. Otherwise
    /// a new mapping is inserted at `index` (default: right after the active
    /// mapping, or appended when none is active) and becomes active.
    pub fn add_mapping<H: ConstraintHost + ?Sized>(
        &mut self,
        host: &mut H,
        owner_bone: &str,
        target_bone: &str,
        index: Option<usize>,
    ) -> Result<usize> {
        let existing = self.find_by_owner_bone(owner_bone).map(|(i, _)| i);
        if let Some(existing) = existing {
            let (rig, mappings) = self.split();
            mappings[existing].set_target(host, rig, target_bone)?;
            return Ok(existing);
        }

        // Inserted before synthesis: partially created constraints always
        // belong to a stored mapping.
        let len = self.mappings.len();
        let index = index
            .unwrap_or_else(|| self.active_index.map_or(len, |active| active + 1))
            .min(len);
        self.mappings.insert(index, BoneMapping::new(owner_bone));
        self.active_index = Some(index);

        let (rig, mappings) = self.split();
        mappings[index].set_target(host, rig, target_bone)?;

        log::debug!("Mapped {owner_bone} <- {target_bone} at {index}");
        Ok(index)
    }

    /// Indices `remove_selection` would act on, descending.
    ///
    /// Every selected mapping, or the active mapping alone when nothing is
    /// selected.
    #[must_use]
    pub fn selection(&self) -> Selection {
        if self.selected_count == 0 {
            return self
                .active_index
                .filter(|&i| i < self.mappings.len())
                .into_iter()
                .collect();
        }
        self.mappings
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, m)| m.is_selected())
            .map(|(i, _)| i)
            .collect()
    }

    /// Tears down and removes the current selection; returns how many
    /// mappings were removed.
    pub fn remove_selection<H: ConstraintHost + ?Sized>(&mut self, host: &mut H) -> Result<usize> {
        let selection = self.selection();

        let Self {
            owner,
            target,
            mappings,
            active_index,
            selected_count,
            settings,
        } = self;
        let rig = RigPair {
            owner: &*owner,
            target: target.as_ref(),
            settings: &*settings,
        };

        let clamp_active = |active: Option<usize>, len: usize| match active {
            Some(i) if len > 0 => Some(i.min(len - 1)),
            _ => None,
        };

        for &index in &selection {
            if let Err(err) = mappings[index].teardown(host, rig) {
                *selected_count = mappings.iter().filter(|m| m.is_selected()).count();
                *active_index = clamp_active(*active_index, mappings.len());
                return Err(err);
            }
            mappings.remove(index);
        }

        *active_index = clamp_active(*active_index, mappings.len());
        *selected_count = 0;

        log::debug!("Removed {} mapping(s) from {owner}", selection.len());
        Ok(selection.len())
    }

    pub fn set_active_index(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(i) = index {
            self.check_index(i)?;
        }
        self.active_index = index;
        Ok(())
    }

    /// Marks or unmarks a mapping as selected, keeping `selected_count` exact.
    pub fn set_selected(&mut self, index: usize, selected: bool) -> Result<()> {
        self.check_index(index)?;
        if self.mappings[index].set_selected_flag(selected) {
            if selected {
                self.selected_count += 1;
            } else {
                self.selected_count = self.selected_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    pub fn select_all(&mut self, selected: bool) {
        for mapping in &mut self.mappings {
            mapping.set_selected_flag(selected);
        }
        self.selected_count = if selected { self.mappings.len() } else { 0 };
    }

    /// Moves a mapping to another position. The active index follows the
    /// moved mapping if it was active.
    pub fn move_mapping(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let mapping = self.mappings.remove(from);
        self.mappings.insert(to, mapping);

        self.active_index = self.active_index.map(|active| {
            if active == from {
                to
            } else if from < active && active <= to {
                active - 1
            } else if to <= active && active < from {
                active + 1
            } else {
                active
            }
        });
        Ok(())
    }

    // ========================================================================
    // Per-mapping commands
    // ========================================================================

    /// Rebinds the mapping at `index` to another owner bone.
    pub fn rebind_owner<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, index: usize, owner_bone: &str) -> Result<()> {
        self.check_index(index)?;
        let taken = self.find_by_owner_bone(owner_bone).map(|(i, _)| i);
        if let Some(other) = taken {
            if other == index {
                return Ok(());
            }
            log::warn!("Refusing to bind '{owner_bone}' twice (already mapped at {other})");
            return Err(RetargetError::OwnerBoneTaken {
                bone: owner_bone.to_owned(),
                index: other,
            });
        }

        let (rig, mappings) = self.split();
        mappings[index].bind(host, rig, owner_bone)
    }

    pub fn set_mapping_target<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, index: usize, target_bone: &str) -> Result<()> {
        self.check_index(index)?;
        let (rig, mappings) = self.split();
        mappings[index].set_target(host, rig, target_bone)
    }

    pub fn set_feature<H: ConstraintHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
        feature: Feature,
        enabled: bool,
    ) -> Result<()> {
        self.check_index(index)?;
        let (rig, mappings) = self.split();
        mappings[index].set_feature(host, rig, feature, enabled)
    }

    pub fn set_offset<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, index: usize, euler: Vec3) -> Result<()> {
        self.check_index(index)?;
        let (rig, mappings) = self.split();
        mappings[index].set_offset(host, rig, euler)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.mappings.len() {
            Ok(())
        } else {
            Err(RetargetError::MappingIndexOutOfBounds {
                index,
                len: self.mappings.len(),
            })
        }
    }

    /// Borrows the rig context and the mapping list separately.
    fn split(&mut self) -> (RigPair<'_>, &mut Vec<BoneMapping>) {
        (
            RigPair {
                owner: &self.owner,
                target: self.target.as_ref(),
                settings: &self.settings,
            },
            &mut self.mappings,
        )
    }
}
