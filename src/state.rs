//! State marker components.
//!
//! These components mirror the character body's grounding state as markers,
//! added/removed after the fixed-tick body update. Downstream consumers
//! (animation adapters, audio cue adapters) can filter on them instead of
//! reading the body every frame.

use bevy::prelude::*;

/// Marker component indicating the character is grounded.
///
/// Added automatically when the grounding probe finds supporting ground.
/// Mutually exclusive with [`Airborne`].
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use orbit_character_controller::prelude::*;
///
/// // Grounded is a marker component - just use it in queries
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Added automatically when the character leaves ground support.
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;
