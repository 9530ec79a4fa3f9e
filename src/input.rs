//! Input translation: raw per-frame samples to per-tick control intents.
//!
//! The embedding application polls devices (out of scope here) and writes
//! [`PlayerInputs`]. This module turns those samples into the control
//! structures the body and camera consume: a camera-relative world-space move
//! vector clamped to unit length, a tick-stamped jump edge, and look/zoom
//! pass-through for the camera.
//!
//! Edge-triggered inputs are stamped with the simulation tick at press time
//! so a single press is consumed exactly once regardless of how frame rate
//! and fixed rate interleave.

use bevy::prelude::*;

use crate::math::{clamp_to_max_length, forward_from_rotation, project_on_plane, right_from_rotation};

/// The process-wide simulation clock: incremented once at the end of every
/// fixed step, reset to zero at startup.
#[derive(Resource, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Resource)]
pub struct SimulationTick(pub u32);

/// An edge-triggered input stamped with the tick it was pressed for.
///
/// `is_set(tick)` reads true only when queried with the stamping tick, so the
/// press fires during exactly one fixed step: reading it twice in that step
/// still reports the press, and it never leaks into a later step.
#[derive(Reflect, Debug, Clone, Copy, Default)]
pub struct FixedInputEvent {
    was_ever_set: bool,
    last_set_tick: u32,
}

impl FixedInputEvent {
    /// Stamp the event for `tick`.
    pub fn set(&mut self, tick: u32) {
        self.last_set_tick = tick;
        self.was_ever_set = true;
    }

    /// Whether the event is active for `tick`.
    pub fn is_set(&self, tick: u32) -> bool {
        self.was_ever_set && self.last_set_tick == tick
    }
}

/// Raw input samples for one player-controlled character.
///
/// Written once per rendered frame by the embedding app's device adapter;
/// translated into [`CharacterControl`] and camera control by this crate.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct PlayerInputs {
    /// 2D move axes (x = strafe, y = forward), unnormalized.
    pub move_axes: Vec2,
    /// Look delta in degrees for this frame.
    pub camera_look: Vec2,
    /// Zoom delta for this frame (positive zooms out).
    pub camera_zoom: f32,
    /// Whether sprint is held.
    pub sprint_held: bool,
    /// Tick-stamped jump press.
    pub jump_pressed: FixedInputEvent,
}

/// Per-tick movement intent consumed by the character body update.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct CharacterControl {
    /// World-space move direction, length at most 1.
    pub move_vector: Vec3,
    /// Whether a jump was requested this tick.
    pub jump: bool,
    /// Whether sprint is held this tick.
    pub sprint_held: bool,
}

/// Translate raw inputs into a per-tick [`CharacterControl`].
///
/// The move axes are combined with the camera's forward/right, projected onto
/// the character's up plane; without a camera the identity frame is used
/// (world `-Z`/`+X`), so a missing camera degrades instead of failing.
pub fn build_character_control(
    inputs: &PlayerInputs,
    tick: u32,
    character_up: Vec3,
    camera_rotation: Option<Quat>,
) -> CharacterControl {
    let rotation = camera_rotation.unwrap_or(Quat::IDENTITY);
    let forward_on_up_plane =
        project_on_plane(forward_from_rotation(rotation), character_up).normalize_or_zero();
    let right = right_from_rotation(rotation);

    let move_vector =
        forward_on_up_plane * inputs.move_axes.y + right * inputs.move_axes.x;

    CharacterControl {
        move_vector: clamp_to_max_length(move_vector, 1.0),
        jump: inputs.jump_pressed.is_set(tick),
        sprint_held: inputs.sprint_held,
    }
}
