//! Third-person orbit camera state and update math.
//!
//! The camera updates in two phases per frame because simulation transforms
//! and presentation transforms diverge under fixed-step sub-stepping:
//!
//! 1. a **simulation phase** consuming look/zoom input and producing the raw
//!    orbit pose from the target's simulation transform, and
//! 2. a **late phase** after transform propagation, recomputing the pose
//!    against the target's presentation transform and applying distance
//!    smoothing and obstruction avoidance.
//!
//! The ECS systems driving these phases live in `systems`; everything here is
//! component state plus pure orbit math so the phases stay unit-testable.

use bevy::prelude::*;

use crate::config::OrbitCameraConfig;
use crate::math::{
    add_variable_rate_rotation, forward_from_rotation, rotation_with_up_priority,
    sharpness_interpolant,
};

/// Evolving orbit state of a camera.
///
/// Pitch is in degrees; positive pitch looks down on the target from above.
/// The distance triple is ordered: `target_distance` follows input (clamped),
/// `smoothed_target_distance` eases toward it, `obstructed_distance` is what
/// the camera actually sits at after obstruction handling.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct OrbitCamera {
    /// Yaw-only facing direction, kept orthogonal to the target's up axis.
    pub planar_forward: Vec3,
    /// Accumulated pitch angle in degrees, clamped to the configured bounds.
    pub pitch_angle: f32,
    /// Input-driven orbit distance.
    pub target_distance: f32,
    /// Smoothed approach toward `target_distance`.
    pub smoothed_target_distance: f32,
    /// Final distance after obstruction handling.
    pub obstructed_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            planar_forward: Vec3::NEG_Z,
            pitch_angle: 0.0,
            target_distance: 5.0,
            smoothed_target_distance: 5.0,
            obstructed_distance: 5.0,
        }
    }
}

impl OrbitCamera {
    /// Create orbit state starting at the given distance.
    pub fn at_distance(distance: f32) -> Self {
        Self {
            target_distance: distance,
            smoothed_target_distance: distance,
            obstructed_distance: distance,
            ..default()
        }
    }
}

/// Per-frame control intent consumed by the camera's simulation phase.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct OrbitCameraControl {
    /// The character this camera follows.
    pub followed_character: Option<Entity>,
    /// Look delta in degrees (x = yaw, y = pitch).
    pub look_degrees_delta: Vec2,
    /// Zoom delta (positive zooms out).
    pub zoom_delta: f32,
}

/// Optional camera-target override on a followed character.
///
/// When present, the camera tracks this entity's transform instead of the
/// character's own (e.g. a head-height anchor childed to the character).
#[derive(Component, Reflect, Debug, Clone, Copy)]
pub struct CameraTarget {
    /// Entity whose transform the camera should track.
    pub target: Entity,
}

/// Entities excluded from this camera's obstruction casts, in addition to the
/// followed character itself.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct OrbitCameraIgnoredEntities(pub Vec<Entity>);

/// Compose the camera rotation from the target up axis, the planar forward
/// and the pitch angle (degrees, positive looking down).
pub fn calculate_camera_rotation(target_up: Vec3, planar_forward: Vec3, pitch_angle: f32) -> Quat {
    let pitch_rotation = Quat::from_axis_angle(Vec3::X, -pitch_angle.to_radians());
    rotation_with_up_priority(target_up, planar_forward) * pitch_rotation
}

/// Place the camera on the orbit: target position minus camera forward times
/// distance.
pub fn calculate_camera_position(target_position: Vec3, rotation: Quat, distance: f32) -> Vec3 {
    target_position - forward_from_rotation(rotation) * distance
}

/// Simulation-phase step: consume look/zoom input against the target's
/// simulation transform and return the raw (unsmoothed, unobstructed) pose.
///
/// `parent_rotation` carries the followed character's
/// `(rotation_from_parent, last_physics_update_dt)` when the camera frame
/// should turn with a rotating platform.
#[allow(clippy::too_many_arguments)]
pub fn simulation_step(
    camera: &mut OrbitCamera,
    config: &OrbitCameraConfig,
    look_degrees_delta: Vec2,
    zoom_delta: f32,
    target_position: Vec3,
    target_up: Vec3,
    parent_rotation: Option<(Quat, f32)>,
    dt: f32,
) -> (Vec3, Quat) {
    // Re-project the planar forward onto the target's current up plane.
    let mut planar_rotation = rotation_with_up_priority(target_up, camera.planar_forward);
    if config.rotate_with_character_parent {
        if let Some((rotation_from_parent, fixed_dt)) = parent_rotation {
            // The camera is already adjusting itself to the target's up, so
            // only the up-axis component of the parent rotation matters; the
            // up-priority re-projection below discards the rest.
            add_variable_rate_rotation(&mut planar_rotation, rotation_from_parent, dt, fixed_dt);
        }
    }
    camera.planar_forward = forward_from_rotation(planar_rotation);

    // Yaw.
    let yaw_degrees = look_degrees_delta.x * config.rotation_speed;
    camera.planar_forward =
        Quat::from_axis_angle(target_up, yaw_degrees.to_radians()) * camera.planar_forward;

    // Pitch.
    camera.pitch_angle = (camera.pitch_angle - look_degrees_delta.y * config.rotation_speed)
        .clamp(config.min_v_angle, config.max_v_angle);

    let rotation = calculate_camera_rotation(target_up, camera.planar_forward, camera.pitch_angle);

    // Zoom.
    camera.target_distance = (camera.target_distance
        + zoom_delta * config.distance_movement_speed)
        .clamp(config.min_distance, config.max_distance);

    // Raw pose only; smoothing and obstruction run in the late phase.
    let position = calculate_camera_position(target_position, rotation, camera.target_distance);
    (position, rotation)
}

/// Late-phase distance smoothing toward the input-driven target distance.
pub fn smooth_target_distance(camera: &mut OrbitCamera, config: &OrbitCameraConfig, dt: f32) {
    camera.smoothed_target_distance = camera.smoothed_target_distance.lerp(
        camera.target_distance,
        sharpness_interpolant(config.distance_movement_sharpness, dt),
    );
}

/// Move the obstructed distance toward its new candidate with asymmetric
/// smoothing: retreating back out uses the (slower) outer sharpness, pulling
/// in to avoid clipping uses the (faster) inner sharpness.
pub fn smooth_obstructed_distance(
    camera: &mut OrbitCamera,
    config: &OrbitCameraConfig,
    new_obstructed_distance: f32,
    dt: f32,
) {
    if camera.obstructed_distance < new_obstructed_distance {
        camera.obstructed_distance = camera.obstructed_distance.lerp(
            new_obstructed_distance,
            sharpness_interpolant(config.obstruction_outer_smoothing_sharpness, dt),
        );
    } else if camera.obstructed_distance > new_obstructed_distance {
        camera.obstructed_distance = camera.obstructed_distance.lerp(
            new_obstructed_distance,
            sharpness_interpolant(config.obstruction_inner_smoothing_sharpness, dt),
        );
    }
}
