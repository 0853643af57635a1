//! In-memory host
//!
//! A headless implementation of [`ConstraintHost`]: skeletons are plain
//! tables of named bones with pose matrices, and constraints live in a
//! `SlotMap` referenced from each bone's ordered stack. Useful for tests,
//! benchmarks and offline tooling that wants to inspect the constraint graph
//! a session would build.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use super::{ConstraintHandle, ConstraintHost, ConstraintKind, ConstraintParams, SkeletonId};
use crate::errors::{RetargetError, Result};

/// A constraint as stored by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostConstraint {
    pub kind: ConstraintKind,
    pub name: String,
    pub owner: SkeletonId,
    pub bone: String,
    pub target: Option<SkeletonId>,
    pub subtarget: String,
    pub params: ConstraintParams,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct MemoryBone {
    pose: Mat4,
    // Evaluation order
    stack: Vec<ConstraintHandle>,
}

#[derive(Debug, Clone)]
struct MemorySkeleton {
    world: Mat4,
    bones: FxHashMap<String, MemoryBone>,
}

/// Running totals of constraint traffic, for idempotence checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub created: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    skeletons: FxHashMap<SkeletonId, MemorySkeleton>,
    constraints: SlotMap<ConstraintHandle, HostConstraint>,
    stats: HostStats,
    /// Creates still allowed before they start failing; `None` is unlimited.
    create_budget: Option<usize>,
    fail_removes: bool,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Scene editing
    // ========================================================================

    /// Adds (or replaces) a skeleton with the given object-to-world matrix.
    pub fn add_skeleton(&mut self, id: impl Into<SkeletonId>, world: Mat4) -> SkeletonId {
        let id = id.into();
        self.remove_skeleton(&id);
        self.skeletons.insert(
            id.clone(),
            MemorySkeleton {
                world,
                bones: FxHashMap::default(),
            },
        );
        id
    }

    /// Removes a skeleton together with every constraint on its bones.
    pub fn remove_skeleton(&mut self, id: &SkeletonId) -> bool {
        let Some(skeleton) = self.skeletons.remove(id) else {
            return false;
        };
        for bone in skeleton.bones.into_values() {
            for handle in bone.stack {
                self.constraints.remove(handle);
            }
        }
        true
    }

    pub fn add_bone(&mut self, skeleton: &SkeletonId, bone: &str, pose: Mat4) -> Result<()> {
        let skel = self.skeleton_mut(skeleton)?;
        skel.bones
            .entry(bone.to_owned())
            .and_modify(|b| b.pose = pose)
            .or_insert(MemoryBone { pose, stack: Vec::new() });
        Ok(())
    }

    /// Deletes a bone. Its constraint stack goes with it, so handles cached
    /// elsewhere become stale.
    pub fn remove_bone(&mut self, skeleton: &SkeletonId, bone: &str) -> Result<()> {
        let removed = self
            .skeleton_mut(skeleton)?
            .bones
            .remove(bone)
            .ok_or_else(|| RetargetError::BoneNotFound {
                skeleton: skeleton.clone(),
                bone: bone.to_owned(),
            })?;
        for handle in removed.stack {
            self.constraints.remove(handle);
        }
        Ok(())
    }

    /// Renames a bone, carrying its constraint stack along.
    pub fn rename_bone(&mut self, skeleton: &SkeletonId, from: &str, to: &str) -> Result<()> {
        let skel = self.skeleton_mut(skeleton)?;
        let data = skel.bones.remove(from).ok_or_else(|| RetargetError::BoneNotFound {
            skeleton: skeleton.clone(),
            bone: from.to_owned(),
        })?;
        let stack = data.stack.clone();
        skel.bones.insert(to.to_owned(), data);
        for handle in stack {
            if let Some(constraint) = self.constraints.get_mut(handle) {
                constraint.bone = to.to_owned();
            }
        }
        Ok(())
    }

    pub fn set_bone_pose(&mut self, skeleton: &SkeletonId, bone: &str, pose: Mat4) -> Result<()> {
        let skel = self.skeleton_mut(skeleton)?;
        let data = skel.bones.get_mut(bone).ok_or_else(|| RetargetError::BoneNotFound {
            skeleton: skeleton.clone(),
            bone: bone.to_owned(),
        })?;
        data.pose = pose;
        Ok(())
    }

    pub fn set_world_matrix(&mut self, skeleton: &SkeletonId, world: Mat4) -> Result<()> {
        self.skeleton_mut(skeleton)?.world = world;
        Ok(())
    }

    /// Makes every subsequent `create_constraint` fail (simulated host error).
    pub fn set_fail_creates(&mut self, fail: bool) {
        self.create_budget = fail.then_some(0);
    }

    /// Lets the next `creates` calls to `create_constraint` succeed and fails
    /// every one after that. `None` lifts the limit.
    pub fn set_create_budget(&mut self, creates: Option<usize>) {
        self.create_budget = creates;
    }

    /// Makes every subsequent `remove_constraint` fail (simulated host error).
    pub fn set_fail_removes(&mut self, fail: bool) {
        self.fail_removes = fail;
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.stats
    }

    #[inline]
    #[must_use]
    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&HostConstraint> {
        self.constraints.get(handle)
    }

    /// Total number of live constraints across all skeletons.
    #[inline]
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// The bone's constraint stack in evaluation order.
    #[must_use]
    pub fn constraints_on(&self, skeleton: &SkeletonId, bone: &str) -> Vec<(ConstraintHandle, &HostConstraint)> {
        self.skeletons
            .get(skeleton)
            .and_then(|s| s.bones.get(bone))
            .map(|b| {
                b.stack
                    .iter()
                    .filter_map(|&h| self.constraints.get(h).map(|c| (h, c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn skeleton_mut(&mut self, id: &SkeletonId) -> Result<&mut MemorySkeleton> {
        self.skeletons
            .get_mut(id)
            .ok_or_else(|| RetargetError::SkeletonNotFound(id.clone()))
    }

    fn bone(&self, skeleton: &SkeletonId, bone: &str) -> Option<&MemoryBone> {
        self.skeletons.get(skeleton)?.bones.get(bone)
    }
}

impl ConstraintHost for MemoryHost {
    fn has_bone(&self, skeleton: &SkeletonId, bone: &str) -> bool {
        self.bone(skeleton, bone).is_some()
    }

    fn world_matrix(&self, skeleton: &SkeletonId) -> Option<Mat4> {
        self.skeletons.get(skeleton).map(|s| s.world)
    }

    fn bone_pose_matrix(&self, skeleton: &SkeletonId, bone: &str) -> Option<Mat4> {
        self.bone(skeleton, bone).map(|b| b.pose)
    }

    fn find_constraint(&self, skeleton: &SkeletonId, bone: &str, name: &str) -> Option<ConstraintHandle> {
        self.bone(skeleton, bone)?
            .stack
            .iter()
            .copied()
            .find(|&h| self.constraints.get(h).is_some_and(|c| c.name == name))
    }

    fn contains_constraint(&self, handle: ConstraintHandle) -> bool {
        self.constraints.contains_key(handle)
    }

    fn create_constraint(
        &mut self,
        skeleton: &SkeletonId,
        bone: &str,
        kind: ConstraintKind,
        name: &str,
    ) -> Result<ConstraintHandle> {
        match &mut self.create_budget {
            Some(0) => {
                return Err(RetargetError::host("create constraint", format!("{name} on {skeleton}/{bone} rejected")));
            }
            Some(left) => *left -= 1,
            None => {}
        }
        if self.bone(skeleton, bone).is_none() {
            return Err(RetargetError::BoneNotFound {
                skeleton: skeleton.clone(),
                bone: bone.to_owned(),
            });
        }

        let handle = self.constraints.insert(HostConstraint {
            kind,
            name: name.to_owned(),
            owner: skeleton.clone(),
            bone: bone.to_owned(),
            target: None,
            subtarget: String::new(),
            params: ConstraintParams::for_kind(kind, Vec3::ZERO),
            enabled: true,
        });
        if let Some(data) = self.skeleton_mut(skeleton)?.bones.get_mut(bone) {
            data.stack.push(handle);
        }
        self.stats.created += 1;
        Ok(handle)
    }

    fn configure_constraint(
        &mut self,
        handle: ConstraintHandle,
        target: Option<&SkeletonId>,
        target_bone: &str,
        params: &ConstraintParams,
    ) -> Result<()> {
        let constraint = self
            .constraints
            .get_mut(handle)
            .ok_or(RetargetError::UnknownConstraint(handle))?;
        constraint.target = target.cloned();
        constraint.subtarget = target_bone.to_owned();
        constraint.params = *params;
        Ok(())
    }

    fn set_constraint_enabled(&mut self, handle: ConstraintHandle, enabled: bool) -> Result<()> {
        let constraint = self
            .constraints
            .get_mut(handle)
            .ok_or(RetargetError::UnknownConstraint(handle))?;
        constraint.enabled = enabled;
        Ok(())
    }

    fn remove_constraint(&mut self, skeleton: &SkeletonId, bone: &str, handle: ConstraintHandle) -> Result<()> {
        if self.fail_removes {
            return Err(RetargetError::host("remove constraint", format!("{skeleton}/{bone} is locked")));
        }
        let skel = self.skeleton_mut(skeleton)?;
        let data = skel.bones.get_mut(bone).ok_or_else(|| RetargetError::BoneNotFound {
            skeleton: skeleton.clone(),
            bone: bone.to_owned(),
        })?;
        let Some(pos) = data.stack.iter().position(|&h| h == handle) else {
            return Err(RetargetError::UnknownConstraint(handle));
        };
        data.stack.remove(pos);
        self.constraints.remove(handle);
        self.stats.removed += 1;
        Ok(())
    }
}
