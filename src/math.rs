//! Transform Math
//!
//! Setup-time helpers that derive the corrective rotation between an owner
//! bone and a target bone. Nothing here runs per frame.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{EulerRot, Mat4, Vec3};

/// Euler order used for rotation offsets: extrinsic XYZ, `R = Rz * Ry * Rx`.
///
/// This is the convention pose-constraint hosts expect for "XYZ" offsets.
/// glam's plain `EulerRot::XYZ` is intrinsic (`R = Rx * Ry * Rz`) and
/// decomposes multi-axis offsets differently.
pub const OFFSET_EULER_ORDER: EulerRot = EulerRot::XYZEx;

/// Offsets whose axes all fall below this magnitude count as "no offset".
pub const OFFSET_EPSILON: f32 = 1e-4;

/// Computes the rotation that carries the target bone's world orientation
/// onto the owner bone's world orientation, as extrinsic XYZ Euler angles
/// (radians, see [`OFFSET_EULER_ORDER`]).
///
/// `relative = inverse(target_world * target_bone) * (owner_world * owner_bone)`
///
/// With `quantize` set, each axis is snapped to the nearest multiple of
/// 90° (see [`quantize_to_right_angles`]).
#[must_use]
pub fn compute_offset(
    owner_world: Mat4,
    owner_bone: Mat4,
    target_world: Mat4,
    target_bone: Mat4,
    quantize: bool,
) -> Vec3 {
    let target_bone_world = target_world * target_bone;
    let owner_bone_world = owner_world * owner_bone;
    let relative = target_bone_world.inverse() * owner_bone_world;

    // Scale and translation are irrelevant; only the rotation part is kept.
    let (_, rotation, _) = relative.to_scale_rotation_translation();
    let (x, y, z) = rotation.normalize().to_euler(OFFSET_EULER_ORDER);
    let euler = Vec3::new(x, y, z);

    if quantize {
        quantize_to_right_angles(euler)
    } else {
        euler
    }
}

/// Rounds each axis independently to the nearest multiple of π/2.
#[inline]
#[must_use]
pub fn quantize_to_right_angles(euler: Vec3) -> Vec3 {
    let snap = |angle: f32| (angle / FRAC_PI_2).round() * FRAC_PI_2;
    Vec3::new(snap(euler.x), snap(euler.y), snap(euler.z))
}

/// Clamps each axis into the [-π, π] range accepted for stored offsets.
#[inline]
#[must_use]
pub fn clamp_offset(euler: Vec3) -> Vec3 {
    euler.clamp(Vec3::splat(-PI), Vec3::splat(PI))
}

/// Whether an offset is (numerically) the identity rotation.
#[inline]
#[must_use]
pub fn is_zero_offset(euler: Vec3) -> bool {
    euler.abs().max_element() < OFFSET_EPSILON
}
