//! RetargetSession tests
//!
//! Tests for:
//! - add_mapping: overwrite-on-duplicate, insertion position, activation
//! - Selection accounting and selection fallback to the active mapping
//! - remove_selection ordering and active index clamping
//! - Target switching and preview toggling across all mappings
//! - Reordering, rebinding and lookup helpers
//! - Reload from serialized state

use glam::{Mat4, Vec3};

use bonecopy::{ConstraintKind, Feature, MemoryHost, RetargetError, RetargetSession, SkeletonId};

const OWNER_BONES: [&str; 6] = ["Hips", "Spine", "Chest", "Neck", "Head", "Hand.L"];
const TARGET_BONES: [&str; 7] = ["hips", "spine", "chest", "neck", "head", "Hand.L", "Wrist.L"];

fn setup() -> (MemoryHost, RetargetSession) {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut host = MemoryHost::new();
    let owner = host.add_skeleton("Hero", Mat4::IDENTITY);
    let target = host.add_skeleton("Mocap", Mat4::IDENTITY);
    for bone in OWNER_BONES {
        host.add_bone(&owner, bone, Mat4::IDENTITY).unwrap();
    }
    for bone in TARGET_BONES {
        host.add_bone(&target, bone, Mat4::IDENTITY).unwrap();
    }

    let mut session = RetargetSession::new(owner);
    session.set_target(&mut host, Some(target)).unwrap();
    (host, session)
}

/// Maps the first `n` owner bones onto their lowercase counterparts, in order.
fn populate(host: &mut MemoryHost, session: &mut RetargetSession, n: usize) {
    for (owner, target) in OWNER_BONES.iter().zip(TARGET_BONES).take(n) {
        let len = session.len();
        session.add_mapping(host, owner, target, Some(len)).unwrap();
    }
}

fn owner_bones(session: &RetargetSession) -> Vec<&str> {
    session.mappings().iter().map(|m| m.owner_bone()).collect()
}

fn all_enabled(host: &MemoryHost, session: &RetargetSession) -> Vec<bool> {
    session
        .mappings()
        .iter()
        .flat_map(|m| host.constraints_on(session.owner(), m.owner_bone()))
        .map(|(_, c)| c.enabled)
        .collect()
}

// ============================================================================
// add_mapping
// ============================================================================

#[test]
fn add_mapping_overwrites_existing_owner_bone() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();

    let first = session.add_mapping(&mut host, "Hand.L", "Hand.L", None)?;
    let second = session.add_mapping(&mut host, "Hand.L", "Wrist.L", None)?;

    assert_eq!(first, second);
    assert_eq!(session.len(), 1);
    assert_eq!(session.mappings()[0].target_bone(), "Wrist.L");
    assert_eq!(host.constraints_on(session.owner(), "Hand.L").len(), 1);

    let (_, copy) = host.constraints_on(session.owner(), "Hand.L")[0];
    assert_eq!(copy.subtarget, "Wrist.L");
    Ok(())
}

#[test]
fn add_mapping_inserts_after_active() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();

    session.add_mapping(&mut host, "Hips", "hips", None)?;
    session.add_mapping(&mut host, "Spine", "spine", None)?;
    session.set_active_index(Some(0))?;

    let index = session.add_mapping(&mut host, "Chest", "chest", None)?;

    assert_eq!(index, 1);
    assert_eq!(session.active_index(), Some(1));
    assert_eq!(owner_bones(&session), vec!["Hips", "Chest", "Spine"]);
    Ok(())
}

#[test]
fn add_mapping_appends_without_active() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 2);
    session.set_active_index(None)?;

    let index = session.add_mapping(&mut host, "Neck", "neck", None)?;

    assert_eq!(index, 2);
    assert_eq!(session.active_mapping().map(|m| m.owner_bone()), Some("Neck"));
    Ok(())
}

#[test]
fn add_mapping_honors_explicit_index() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);

    let index = session.add_mapping(&mut host, "Head", "head", Some(0))?;

    assert_eq!(index, 0);
    assert_eq!(owner_bones(&session), vec!["Head", "Hips", "Spine", "Chest"]);
    Ok(())
}

#[test]
fn owner_bones_stay_unique() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 4);
    for target in ["chest", "neck", "spine"] {
        session.add_mapping(&mut host, "Spine", target, None)?;
    }

    let mut bones = owner_bones(&session);
    bones.sort_unstable();
    bones.dedup();
    assert_eq!(bones.len(), session.len());
    Ok(())
}

#[test]
fn partially_synthesized_mapping_stays_in_session() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    let target = session.target().cloned().unwrap();
    host.set_bone_pose(&target, "Hand.L", Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2))?;

    // Rotation copy is created, the rotation offset is refused
    host.set_create_budget(Some(1));
    let err = session.add_mapping(&mut host, "Hand.L", "Hand.L", None).unwrap_err();
    assert!(matches!(err, RetargetError::Host { .. }), "unexpected error: {err}");

    let (index, mapping) = session.find_by_owner_bone("Hand.L").expect("mapping kept after host failure");
    assert_eq!(session.len(), 1);
    assert_eq!(session.active_index(), Some(index));
    assert!(mapping.has_feature(Feature::RotationOffset));
    assert_eq!(host.constraints_on(session.owner(), "Hand.L").len(), 1);

    host.set_create_budget(None);
    session.refresh(&mut host)?;
    assert_eq!(host.constraints_on(session.owner(), "Hand.L").len(), 2);

    session.remove_selection(&mut host)?;
    assert!(session.is_empty());
    assert!(host.constraints_on(session.owner(), "Hand.L").is_empty());
    Ok(())
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn selected_count_tracks_every_toggle() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 6);

    // Deterministic LCG so the sequence is reproducible
    let mut seed: u32 = 0x2545_f491;
    for _ in 0..200 {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let index = (seed >> 8) as usize % session.len();
        let selected = (seed >> 20) & 1 == 1;

        session.set_selected(index, selected)?;

        let actual = session.mappings().iter().filter(|m| m.is_selected()).count();
        assert_eq!(session.selected_count(), actual);
    }

    session.select_all(true);
    assert_eq!(session.selected_count(), session.len());
    session.select_all(false);
    assert_eq!(session.selected_count(), 0);
    Ok(())
}

#[test]
fn selection_falls_back_to_active() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);
    session.set_active_index(Some(1))?;

    assert_eq!(session.selection().as_slice(), &[1]);

    session.set_selected(0, true)?;
    session.set_selected(2, true)?;
    assert_eq!(session.selection().as_slice(), &[2, 0]);
    Ok(())
}

#[test]
fn set_selected_rejects_bad_index() {
    let (_, mut session) = setup();
    let err = session.set_selected(3, true).unwrap_err();
    assert!(matches!(err, RetargetError::MappingIndexOutOfBounds { index: 3, len: 0 }));
}

// ============================================================================
// remove_selection
// ============================================================================

#[test]
fn remove_selection_removes_in_descending_order() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 5);
    for index in [0, 2, 4] {
        session.set_selected(index, true)?;
    }
    let removed_before = host.stats().removed;

    let removed = session.remove_selection(&mut host)?;

    assert_eq!(removed, 3);
    assert_eq!(owner_bones(&session), vec!["Spine", "Neck"]);
    assert_eq!(host.stats().removed - removed_before, 3);
    for bone in ["Hips", "Chest", "Head"] {
        assert!(host.constraints_on(session.owner(), bone).is_empty(), "{bone} not torn down");
    }
    for bone in ["Spine", "Neck"] {
        assert_eq!(host.constraints_on(session.owner(), bone).len(), 1);
    }
    assert_eq!(session.selected_count(), 0);
    Ok(())
}

#[test]
fn remove_without_selection_removes_active_and_clamps() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);
    assert_eq!(session.active_index(), Some(2));

    session.remove_selection(&mut host)?;

    assert_eq!(owner_bones(&session), vec!["Hips", "Spine"]);
    assert_eq!(session.active_index(), Some(1));
    Ok(())
}

#[test]
fn removing_last_mapping_clears_active() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 1);

    assert_eq!(session.remove_selection(&mut host)?, 1);
    assert!(session.is_empty());
    assert_eq!(session.active_index(), None);
    assert_eq!(session.remove_selection(&mut host)?, 0);
    Ok(())
}

#[test]
fn failed_removal_keeps_active_index_in_range() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 4);
    session.set_active_index(Some(3))?;
    session.set_selected(2, true)?;
    session.set_selected(3, true)?;

    // Neck is gone host-side, so its mapping is dropped without a host call.
    // Chest still has a constraint to remove.
    let owner = session.owner().clone();
    host.remove_bone(&owner, "Neck")?;
    host.set_fail_removes(true);

    let err = session.remove_selection(&mut host).unwrap_err();

    assert!(matches!(err, RetargetError::Host { .. }), "unexpected error: {err}");
    assert_eq!(owner_bones(&session), vec!["Hips", "Spine", "Chest"]);
    assert_eq!(session.active_index(), Some(2));
    assert_eq!(session.selected_count(), 1);
    assert!(session.active_mapping().is_some());

    host.set_fail_removes(false);
    assert_eq!(session.remove_selection(&mut host)?, 1);
    assert_eq!(owner_bones(&session), vec!["Hips", "Spine"]);
    assert_eq!(session.active_index(), Some(1));
    Ok(())
}

// ============================================================================
// Target & preview
// ============================================================================

#[test]
fn preview_toggles_enabled_state_only() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 4);
    session.set_feature(&mut host, 0, Feature::LocationCopy, true)?;
    let created = host.stats().created;

    session.set_preview(&mut host, false)?;
    assert!(!session.preview_enabled());
    assert!(all_enabled(&host, &session).iter().all(|&e| !e));

    session.set_preview(&mut host, true)?;
    assert!(all_enabled(&host, &session).iter().all(|&e| e));

    assert_eq!(host.stats().created, created);
    assert_eq!(host.constraint_count(), 5);
    Ok(())
}

#[test]
fn invalid_mapping_stays_disabled_under_preview() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    let index = session.add_mapping(&mut host, "Spine", "no_such_bone", None)?;

    session.set_preview(&mut host, true)?;

    assert!(!session.is_valid(&host, index));
    assert_eq!(all_enabled(&host, &session), vec![false]);
    Ok(())
}

#[test]
fn retargeting_repoints_every_constraint() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);
    session.set_feature(&mut host, 1, Feature::Ik, true)?;

    let other = host.add_skeleton("MocapB", Mat4::from_translation(Vec3::X));
    for bone in TARGET_BONES {
        host.add_bone(&other, bone, Mat4::IDENTITY)?;
    }
    let created = host.stats().created;

    session.set_target(&mut host, Some(other.clone()))?;

    assert_eq!(host.stats().created, created);
    for mapping in session.mappings() {
        for (_, constraint) in host.constraints_on(session.owner(), mapping.owner_bone()) {
            assert_eq!(constraint.target.as_ref(), Some(&other));
            assert!(constraint.enabled);
        }
    }
    Ok(())
}

#[test]
fn clearing_target_disables_constraints() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 2);

    session.set_target(&mut host, None)?;

    assert_eq!(session.target(), None);
    assert_eq!(all_enabled(&host, &session), vec![false, false]);
    Ok(())
}

#[test]
fn skeleton_cannot_target_itself() {
    let (mut host, mut session) = setup();
    let owner = session.owner().clone();

    let err = session.set_target(&mut host, Some(owner)).unwrap_err();
    assert!(matches!(err, RetargetError::TargetIsOwner(_)));
    assert_eq!(session.target(), Some(&SkeletonId::new("Mocap")));
}

#[test]
fn refresh_follows_host_side_renames() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 2);
    let target = session.target().cloned().unwrap();

    host.rename_bone(&target, "spine", "spine_01")?;
    session.refresh(&mut host)?;
    assert_eq!(all_enabled(&host, &session), vec![true, false]);

    host.rename_bone(&target, "spine_01", "spine")?;
    session.refresh(&mut host)?;
    assert_eq!(all_enabled(&host, &session), vec![true, true]);
    Ok(())
}

// ============================================================================
// Reorder, rebind, lookup
// ============================================================================

#[test]
fn move_mapping_carries_active_index() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 4);
    session.set_active_index(Some(1))?;

    session.move_mapping(1, 3)?;
    assert_eq!(owner_bones(&session), vec!["Hips", "Chest", "Neck", "Spine"]);
    assert_eq!(session.active_index(), Some(3));

    session.move_mapping(0, 3)?;
    assert_eq!(owner_bones(&session), vec!["Chest", "Neck", "Spine", "Hips"]);
    assert_eq!(session.active_index(), Some(2));

    assert!(session.move_mapping(0, 4).is_err());
    Ok(())
}

#[test]
fn rebind_owner_rejects_claimed_bone() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 2);

    let err = session.rebind_owner(&mut host, 0, "Spine").unwrap_err();
    assert!(matches!(err, RetargetError::OwnerBoneTaken { index: 1, .. }));

    session.rebind_owner(&mut host, 0, "Head")?;
    assert_eq!(owner_bones(&session), vec!["Head", "Spine"]);
    assert!(host.constraints_on(session.owner(), "Hips").is_empty());
    assert_eq!(host.constraints_on(session.owner(), "Head").len(), 1);
    Ok(())
}

#[test]
fn lookup_by_bone_name() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);

    let (index, mapping) = session.find_by_target_bone("chest").unwrap();
    assert_eq!((index, mapping.owner_bone()), (2, "Chest"));

    let (index, mapping) = session.find_by_owner_bone("Spine").unwrap();
    assert_eq!((index, mapping.target_bone()), (1, "spine"));

    assert!(session.find_by_owner_bone("Tail").is_none());
    assert!(session.find_by_owner_bone("").is_none());
    assert!(session.find_by_target_bone("").is_none());
    Ok(())
}

#[test]
fn set_offset_by_index_reaches_constraint() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 1);
    session.set_feature(&mut host, 0, Feature::RotationOffset, true)?;
    session.set_offset(&mut host, 0, Vec3::new(0.0, 1.0, 0.0))?;

    let handle = session.mappings()[0].constraint(ConstraintKind::RotationOffset).unwrap();
    let constraint = host.constraint(handle).unwrap();
    assert_eq!(
        constraint.params,
        bonecopy::ConstraintParams::RotationOffset { euler: Vec3::new(0.0, 1.0, 0.0) }
    );
    Ok(())
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn reloaded_session_adopts_existing_constraints() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);
    session.set_feature(&mut host, 2, Feature::LocationCopy, true)?;
    session.set_selected(1, true)?;

    let json = serde_json::to_string(&session)?;
    let mut reloaded: RetargetSession = serde_json::from_str(&json)?;
    let created = host.stats().created;

    reloaded.refresh(&mut host)?;

    assert_eq!(host.stats().created, created);
    assert_eq!(owner_bones(&reloaded), owner_bones(&session));
    assert_eq!(reloaded.selected_count(), 1);
    assert!(reloaded.mappings()[2].constraint(ConstraintKind::LocationCopy).is_some());
    Ok(())
}

#[test]
fn reload_recounts_selection_from_flags() -> anyhow::Result<()> {
    let (mut host, mut session) = setup();
    populate(&mut host, &mut session, 3);
    session.set_selected(0, true)?;
    session.set_selected(2, true)?;

    let mut value = serde_json::to_value(&session)?;
    value["selected_count"] = serde_json::json!(0);
    value["active_index"] = serde_json::json!(7);
    let mut reloaded: RetargetSession = serde_json::from_value(value)?;

    assert_eq!(reloaded.selected_count(), 2);
    assert_eq!(reloaded.active_index(), None);
    reloaded.set_selected(0, false)?;
    reloaded.set_selected(2, false)?;
    reloaded.set_selected(2, false)?;
    assert_eq!(reloaded.selected_count(), 0);
    Ok(())
}
