//! Velocity control building blocks.
//!
//! The small, deterministic operations the per-archetype velocity-control
//! phase is composed from: grounded interpolated movement, jumping, airborne
//! acceleration, gravity and drag. All of them mutate a velocity in place and
//! are pure with respect to everything else.

use bevy::prelude::*;

use crate::math::{clamp_to_max_length, project_on_plane, reorient_on_plane, sharpness_interpolant};

/// Blend grounded velocity toward `target_velocity`.
///
/// The target is first reoriented onto the ground plane so that walking on a
/// slope follows the surface, then the velocity is moved toward it by the
/// sharpness interpolant, giving frame-rate independent exponential approach.
pub fn ground_move_interpolated(
    velocity: &mut Vec3,
    target_velocity: Vec3,
    sharpness: f32,
    dt: f32,
    ground_normal: Vec3,
) {
    let target_on_slope = reorient_on_plane(target_velocity, ground_normal);
    *velocity = velocity.lerp(target_on_slope, sharpness_interpolant(sharpness, dt));
}

/// Apply a jump impulse.
///
/// Cancels any velocity along `up` first (so landing momentum cannot eat the
/// jump), adds `jump_velocity`, and forces the grounded flag off immediately:
/// the body must not be treated as supported for the rest of this tick.
pub fn standard_jump(
    velocity: &mut Vec3,
    is_grounded: &mut bool,
    jump_velocity: Vec3,
    up: Vec3,
) {
    let up = up.normalize_or_zero();
    if up != Vec3::ZERO {
        let vertical = velocity.dot(up);
        if vertical < 0.0 {
            // Keep upward momentum, drop downward momentum.
            *velocity -= up * vertical;
        }
    }
    *velocity += jump_velocity;
    *is_grounded = false;
}

/// Accelerate airborne velocity toward the input direction.
///
/// Unlike grounded movement this is a fixed-rate acceleration, not a blend.
/// Input acceleration never pushes the planar speed above `max_speed`, but
/// pre-existing overspeed (e.g. inherited platform momentum) is preserved
/// rather than clamped away.
pub fn air_accelerate(
    velocity: &mut Vec3,
    acceleration: Vec3,
    max_speed: f32,
    up: Vec3,
    dt: f32,
) {
    let planar = project_on_plane(*velocity, up);
    let vertical = *velocity - planar;

    let added = project_on_plane(acceleration, up) * dt;
    let mut new_planar = planar + added;

    let speed_before = planar.length();
    if new_planar.length() > max_speed {
        // Only the input contribution is capped; external momentum stays.
        let cap = speed_before.max(max_speed);
        new_planar = clamp_to_max_length(new_planar, cap);
    }

    *velocity = new_planar + vertical;
}

/// Integrate a constant acceleration (gravity) over `dt`.
#[inline]
pub fn accelerate(velocity: &mut Vec3, acceleration: Vec3, dt: f32) {
    *velocity += acceleration * dt;
}

/// Apply exponential drag over `dt`.
#[inline]
pub fn apply_drag(velocity: &mut Vec3, dt: f32, drag: f32) {
    *velocity *= 1.0 / (1.0 + drag * dt);
}
