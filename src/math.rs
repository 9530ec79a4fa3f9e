//! Rotation and smoothing math shared by the body and camera updates.
//!
//! Everything here is a pure function. All normalizing paths are guarded so
//! that near-zero-length inputs degrade to a zero/no-op contribution instead
//! of producing NaN.

use bevy::prelude::*;

/// Interpolant for exponential (frame-rate independent) smoothing.
///
/// Returns the fraction in `[0, 1]` to linearly interpolate toward a target
/// this frame so that repeated application converges at the same rate
/// regardless of time step: `1 - exp(-sharpness * dt)`.
///
/// Higher sharpness reaches the target faster. Non-positive sharpness (or dt)
/// returns `0.0`, leaving the smoothed value untouched.
#[inline]
pub fn sharpness_interpolant(sharpness: f32, dt: f32) -> f32 {
    if sharpness <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    (1.0 - (-sharpness * dt).exp()).clamp(0.0, 1.0)
}

/// Clamp a vector to a maximum length, preserving direction.
///
/// Vectors shorter than `max_length` are returned unchanged.
#[inline]
pub fn clamp_to_max_length(vector: Vec3, max_length: f32) -> Vec3 {
    let length_sq = vector.length_squared();
    if length_sq > max_length * max_length {
        vector * (max_length / length_sq.sqrt())
    } else {
        vector
    }
}

/// Project a vector onto the plane defined by `plane_normal`.
///
/// The normal does not need to be unit length; a near-zero normal returns the
/// vector unchanged.
#[inline]
pub fn project_on_plane(vector: Vec3, plane_normal: Vec3) -> Vec3 {
    let normal = plane_normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return vector;
    }
    vector - normal * vector.dot(normal)
}

/// Reorient a vector onto a plane while preserving its length.
///
/// Used to redirect planar velocity along a slope: the direction is the
/// projection of `vector` onto the plane, the magnitude is kept. Degenerate
/// projections (vector parallel to the normal) return `Vec3::ZERO`.
#[inline]
pub fn reorient_on_plane(vector: Vec3, plane_normal: Vec3) -> Vec3 {
    let length = vector.length();
    let direction = project_on_plane(vector, plane_normal).normalize_or_zero();
    direction * length
}

/// Build an orientation whose up axis matches `up` exactly, with a forward as
/// close as possible to the supplied one.
///
/// `forward` is re-derived by projecting it onto the plane perpendicular to
/// `up`. When the supplied forward is (nearly) parallel to `up`, a fallback
/// axis is used so the result is always a valid rotation.
pub fn rotation_with_up_priority(up: Vec3, forward: Vec3) -> Quat {
    let up = up.normalize_or_zero();
    let up = if up == Vec3::ZERO { Vec3::Y } else { up };

    let mut flat_forward = project_on_plane(forward, up);
    if flat_forward.length_squared() < 1e-8 {
        // Forward is parallel to up; fall back to whichever world axis is
        // least aligned with up.
        flat_forward = project_on_plane(Vec3::NEG_Z, up);
        if flat_forward.length_squared() < 1e-8 {
            flat_forward = project_on_plane(Vec3::X, up);
        }
    }
    let forward = flat_forward.normalize();
    let right = forward.cross(up);

    Quat::from_mat3(&Mat3::from_cols(right, up, -forward))
}

/// Forward direction (`-Z`) of a rotation.
#[inline]
pub fn forward_from_rotation(rotation: Quat) -> Vec3 {
    rotation * Vec3::NEG_Z
}

/// Right direction (`+X`) of a rotation.
#[inline]
pub fn right_from_rotation(rotation: Quat) -> Vec3 {
    rotation * Vec3::X
}

/// Up direction (`+Y`) of a rotation.
#[inline]
pub fn up_from_rotation(rotation: Quat) -> Vec3 {
    rotation * Vec3::Y
}

/// Fold a fixed-rate rotation delta into a variable-rate frame.
///
/// When a parent body rotated by `fixed_rate_delta` over the last physics step
/// of length `fixed_dt`, a variable-rate frame of length `dt` should only
/// apply the proportional slice of that rotation. Applies
/// `slerp(identity, fixed_rate_delta, dt / fixed_dt)` on top of `rotation`.
pub fn add_variable_rate_rotation(
    rotation: &mut Quat,
    fixed_rate_delta: Quat,
    dt: f32,
    fixed_dt: f32,
) {
    if fixed_dt <= 0.0 {
        return;
    }
    let ratio = (dt / fixed_dt).clamp(0.0, 1.0);
    *rotation = Quat::IDENTITY.slerp(fixed_rate_delta, ratio) * *rotation;
}

/// Smoothly rotate toward facing `direction`, constrained to spin around `up`.
///
/// The target orientation keeps `up` as its exact up axis (so the character
/// never tilts off its grounding frame) and the blend uses the sharpness
/// interpolant. A degenerate direction leaves the rotation untouched.
pub fn slerp_towards_direction_around_up(
    rotation: &mut Quat,
    dt: f32,
    direction: Vec3,
    up: Vec3,
    sharpness: f32,
) {
    if direction.length_squared() < 1e-8 {
        return;
    }
    let target = rotation_with_up_priority(up, direction);
    *rotation = rotation.slerp(target, sharpness_interpolant(sharpness, dt));
}
