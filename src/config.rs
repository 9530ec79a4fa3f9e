//! Tunable configuration components.
//!
//! Configuration is loaded once at entity creation and stays immutable while
//! the simulation runs; everything that evolves per tick lives in the state
//! components (`KinematicCharacterBody`, `OrbitCamera`) instead. Validation
//! of malformed values (e.g. min > max distance) is the loading boundary's
//! concern, not this crate's.

use bevy::prelude::*;

use crate::backend::CapsuleGeometry;

/// Step and slope handling parameters for a character archetype.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct StepSlopeConfig {
    /// Maximum slope angle (degrees from the grounding up axis) a surface may
    /// have and still count as ground.
    pub max_grounding_angle: f32,

    /// Whether obstruction hits below `max_step_height` are climbed instead
    /// of blocking movement.
    pub step_handling: bool,

    /// Maximum obstruction height the character walks up onto.
    pub max_step_height: f32,

    /// Width used to validate that a detected step can actually support the
    /// character before climbing it.
    pub character_width_for_step_check: f32,

    /// Whether to refuse grounding when moving toward an upcoming slope
    /// discontinuity that would not itself count as ground.
    pub prevent_grounding_on_slope_break: bool,

    /// Lookahead distance along planar velocity for the slope-break probe.
    pub slope_break_lookahead: f32,

    /// Whether grounded velocity is reprojected onto the ground plane after
    /// collision projection, preventing slow creep up non-walkable surfaces.
    pub constrain_velocity_to_ground_plane: bool,
}

impl Default for StepSlopeConfig {
    fn default() -> Self {
        Self {
            max_grounding_angle: 60.0,
            step_handling: true,
            max_step_height: 0.5,
            character_width_for_step_check: 1.0,
            prevent_grounding_on_slope_break: true,
            slope_break_lookahead: 0.5,
            constrain_velocity_to_ground_plane: true,
        }
    }
}

/// Swept collision volume and integration limits of a character.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct CharacterShape {
    /// Capsule radius.
    pub radius: f32,
    /// Half the distance between the capsule's hemisphere centers.
    pub half_segment: f32,
    /// Minimum separation kept from touched surfaces.
    pub skin_width: f32,
    /// How far below the capsule the grounding probe reaches.
    pub grounding_probe_distance: f32,
    /// Iteration ceiling for the movement/decollision sweep loop.
    pub max_movement_iterations: u32,
    /// Iteration ceiling for post-movement overlap resolution.
    pub max_decollision_iterations: u32,
}

impl Default for CharacterShape {
    fn default() -> Self {
        Self {
            radius: 0.5,
            half_segment: 0.5,
            skin_width: 0.02,
            grounding_probe_distance: 0.3,
            max_movement_iterations: 8,
            max_decollision_iterations: 2,
        }
    }
}

impl CharacterShape {
    /// The capsule swept by collision queries for this shape.
    #[inline]
    pub fn capsule(&self) -> CapsuleGeometry {
        CapsuleGeometry {
            radius: self.radius,
            half_segment: self.half_segment,
        }
    }

    /// Distance from the capsule center to its lowest point.
    #[inline]
    pub fn bottom_offset(&self) -> f32 {
        self.half_segment + self.radius
    }
}

/// Per-character tunables.
///
/// Movement speeds, smoothing sharpness values, jump/gravity settings and the
/// step/slope parameters of one character archetype.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct CharacterConfig {
    /// Sharpness of the visual facing slerp toward the move direction.
    pub rotation_sharpness: f32,
    /// Ground speed while walking.
    pub walk_speed: f32,
    /// Ground speed while sprint is held.
    pub sprint_speed: f32,
    /// Sharpness of the grounded velocity blend toward the move target.
    pub grounded_movement_sharpness: f32,
    /// Airborne acceleration rate (units/second^2).
    pub air_acceleration: f32,
    /// Exponential drag applied to airborne velocity.
    pub air_drag: f32,
    /// Jump impulse speed along the grounding up axis.
    pub jump_speed: f32,
    /// Gravity applied while airborne.
    pub gravity: Vec3,
    /// Character mass, used when pushing on dynamic ground bodies.
    pub mass: f32,
    /// Discard a tick's air acceleration when it would push the character
    /// into a surface that does not count as ground (prevents climbing
    /// un-walkable slopes with air control).
    pub prevent_air_acceleration_against_ungrounded_hits: bool,
    /// Step and slope handling parameters.
    pub step_and_slope: StepSlopeConfig,
    /// Swept volume and integration limits.
    pub shape: CharacterShape,
    /// Camera whose frame the character's move input is expressed in.
    pub controlled_camera: Option<Entity>,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            rotation_sharpness: 25.0,
            walk_speed: 10.0,
            sprint_speed: 15.0,
            grounded_movement_sharpness: 10.0,
            air_acceleration: 50.0,
            air_drag: 1.0,
            jump_speed: 10.0,
            gravity: Vec3::Y * -25.0,
            mass: 1.0,
            prevent_air_acceleration_against_ungrounded_hits: true,
            step_and_slope: StepSlopeConfig::default(),
            shape: CharacterShape::default(),
            controlled_camera: None,
        }
    }
}

impl CharacterConfig {
    /// Builder: set the controlled camera entity.
    pub fn with_camera(mut self, camera: Entity) -> Self {
        self.controlled_camera = Some(camera);
        self
    }

    /// Builder: set walk and sprint speeds.
    pub fn with_speeds(mut self, walk: f32, sprint: f32) -> Self {
        self.walk_speed = walk;
        self.sprint_speed = sprint;
        self
    }

    /// Builder: set gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder: set step and slope handling.
    pub fn with_step_and_slope(mut self, step_and_slope: StepSlopeConfig) -> Self {
        self.step_and_slope = step_and_slope;
        self
    }

    /// Builder: set the swept shape.
    pub fn with_shape(mut self, shape: CharacterShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Per-camera tunables for the orbit rig.
///
/// The evolving orbit state (planar forward, pitch, distances) lives in
/// [`crate::camera::OrbitCamera`].
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct OrbitCameraConfig {
    /// Degrees of yaw/pitch per degree of look input.
    pub rotation_speed: f32,
    /// Lower pitch bound, degrees. Negative pitches look up from below.
    pub min_v_angle: f32,
    /// Upper pitch bound, degrees. Positive pitches look down from above.
    pub max_v_angle: f32,
    /// Follow the followed character's parent rotation (up-axis component
    /// only), so a rotating platform turns the camera frame too.
    pub rotate_with_character_parent: bool,

    /// Closest orbit distance.
    pub min_distance: f32,
    /// Farthest orbit distance.
    pub max_distance: f32,
    /// Distance change per unit of zoom input.
    pub distance_movement_speed: f32,
    /// Sharpness of the smoothed approach toward the target distance.
    pub distance_movement_sharpness: f32,

    /// Radius of the obstruction sphere cast. Zero disables obstruction
    /// handling entirely.
    pub obstruction_radius: f32,
    /// Sharpness used while the camera pulls in toward an obstruction.
    /// Deliberately faster than the outer sharpness so the camera never
    /// visibly clips.
    pub obstruction_inner_smoothing_sharpness: f32,
    /// Sharpness used while the camera retreats back out.
    pub obstruction_outer_smoothing_sharpness: f32,
    /// Re-run an obstruction cast against the hit body's interpolated
    /// transform and prefer that result when it also hits.
    pub prevent_fixed_update_jitter: bool,
}

impl Default for OrbitCameraConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 1.0,
            min_v_angle: -89.0,
            max_v_angle: 89.0,
            rotate_with_character_parent: true,

            min_distance: 1.0,
            max_distance: 10.0,
            distance_movement_speed: 1.0,
            distance_movement_sharpness: 10.0,

            obstruction_radius: 0.2,
            obstruction_inner_smoothing_sharpness: 120.0,
            obstruction_outer_smoothing_sharpness: 5.0,
            prevent_fixed_update_jitter: true,
        }
    }
}

impl OrbitCameraConfig {
    /// Builder: set the distance bounds.
    pub fn with_distance_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    /// Builder: set the pitch bounds in degrees.
    pub fn with_pitch_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_v_angle = min;
        self.max_v_angle = max;
        self
    }

    /// Builder: set the obstruction sphere radius.
    pub fn with_obstruction_radius(mut self, radius: f32) -> Self {
        self.obstruction_radius = radius;
        self
    }

    /// Builder: disable obstruction handling.
    pub fn without_obstruction(mut self) -> Self {
        self.obstruction_radius = 0.0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_bottom_offset() {
        let shape = CharacterShape {
            radius: 0.4,
            half_segment: 0.6,
            ..default()
        };
        assert_eq!(shape.bottom_offset(), 1.0);
    }

    #[test]
    fn character_defaults_are_sane() {
        let config = CharacterConfig::default();
        assert!(config.sprint_speed > config.walk_speed);
        assert!(config.gravity.y < 0.0);
        assert!(config.shape.max_movement_iterations > 0);
    }

    #[test]
    fn camera_builder_chains() {
        let config = OrbitCameraConfig::default()
            .with_distance_bounds(2.0, 20.0)
            .with_pitch_bounds(-45.0, 45.0)
            .without_obstruction();
        assert_eq!(config.min_distance, 2.0);
        assert_eq!(config.max_distance, 20.0);
        assert_eq!(config.max_v_angle, 45.0);
        assert_eq!(config.obstruction_radius, 0.0);
    }
}
