//! # `orbit_character_controller`
//!
//! A deterministic 3D kinematic character controller with a third-person
//! orbit camera and collision backend abstraction.
//!
//! This crate provides the simulation core of a third-person character:
//! - Kinematic body update with grounding, sliding, stepping, slope handling
//!   and iterative swept collision resolution
//! - Moving-platform tracking with momentum transfer on separation
//! - Third-person orbit camera with target tracking, distance smoothing and
//!   obstruction avoidance via sphere casts
//! - Tick-stamped input translation so edge-triggered inputs are consumed
//!   exactly once regardless of frame-rate/fixed-rate interleaving
//! - Collision backend abstraction; a brush-based primitive scene backend is
//!   included (`primitive-scene` feature, on by default)
//!
//! ## Architecture
//!
//! Two scheduling domains drive one logical pipeline:
//! 1. the **fixed-rate domain** runs input translation and the ordered
//!    character body phases once per simulation tick, and
//! 2. the **variable-rate domain** runs once per rendered frame: camera
//!    control application, character visual rotation, the camera's
//!    simulation phase, and (after transform propagation) the camera's late
//!    phase with smoothing and obstruction handling.
//!
//! The core consumes a per-tick input vector, a scene collision-query
//! interface ([`backend::CollisionBackend`]) and entity transforms; it never
//! touches rendering, asset loading or device input.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use orbit_character_controller::prelude::*;
//!
//! App::new()
//!     .add_plugins(MinimalPlugins)
//!     .add_plugins(TransformPlugin)
//!     .add_plugins(OrbitCharacterPlugin::<PrimitiveSceneBackend>::default())
//!     .run();
//! ```

use bevy::prelude::*;
use bevy::transform::TransformSystem;

pub mod backend;
pub mod body;
pub mod camera;
pub mod collector;
pub mod config;
pub mod control;
pub mod input;
pub mod math;
pub mod state;
pub mod systems;

#[cfg(feature = "primitive-scene")]
pub mod scene;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{CapsuleGeometry, CastHit, CollisionBackend, OverlapHit};
    pub use crate::body::{
        CharacterBehavior, CharacterHit, CharacterProcessor, DefaultProcessor,
        GroundingEvaluation, HitPhase, KinematicCharacterBody, StatefulHit, SurfaceHit,
    };
    pub use crate::camera::{
        CameraTarget, OrbitCamera, OrbitCameraControl, OrbitCameraIgnoredEntities,
    };
    pub use crate::collector::ClosestHitCollector;
    pub use crate::config::{CharacterConfig, CharacterShape, OrbitCameraConfig, StepSlopeConfig};
    pub use crate::input::{
        CharacterControl, FixedInputEvent, PlayerInputs, SimulationTick,
    };
    pub use crate::state::{Airborne, Grounded};
    pub use crate::{CharacterCameraSet, OrbitCharacterPlugin};

    #[cfg(feature = "primitive-scene")]
    pub use crate::scene::{
        CollisionScene, PrimitiveSceneBackend, PrimitiveScenePlugin, SceneBodyMotion,
    };
}

/// System sets for ordering against the controller's systems.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterCameraSet {
    /// Fixed-rate input translation, body update and marker sync
    /// (`FixedUpdate`).
    Fixed,
    /// Variable-rate control application, visual rotation and the camera
    /// simulation phase (`Update`).
    Variable,
    /// The camera late phase, after transform propagation (`PostUpdate`).
    Late,
}

/// Main plugin for the character and orbit camera simulation.
///
/// Generic over a collision backend `B` which provides shape casts and
/// rigid-body lookups against the scene.
///
/// # Examples
///
/// With the built-in primitive scene backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use orbit_character_controller::prelude::*;
///
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(TransformPlugin)
///     .add_plugins(OrbitCharacterPlugin::<PrimitiveSceneBackend>::default())
///     .run();
/// ```
pub struct OrbitCharacterPlugin<B: backend::CollisionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CollisionBackend> Default for OrbitCharacterPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CollisionBackend> Plugin for OrbitCharacterPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::CharacterConfig>();
        app.register_type::<config::OrbitCameraConfig>();
        app.register_type::<body::KinematicCharacterBody>();
        app.register_type::<camera::OrbitCamera>();
        app.register_type::<camera::OrbitCameraControl>();
        app.register_type::<camera::CameraTarget>();
        app.register_type::<camera::OrbitCameraIgnoredEntities>();
        app.register_type::<input::PlayerInputs>();
        app.register_type::<input::CharacterControl>();
        app.register_type::<input::SimulationTick>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();

        // The simulation clock starts at zero and only ever advances at the
        // end of a fixed step.
        app.init_resource::<input::SimulationTick>();

        // Add the collision backend plugin
        app.add_plugins(B::plugin());

        // Fixed-rate domain: input translation, body phases, marker sync.
        app.add_systems(
            FixedUpdate,
            (
                systems::fixed_step_character_control,
                systems::character_physics_update::<B>,
                systems::sync_state_markers,
            )
                .chain()
                .in_set(CharacterCameraSet::Fixed),
        );
        app.add_systems(FixedPostUpdate, systems::advance_simulation_tick);

        // Variable-rate domain: camera control, visual rotation, camera
        // simulation phase.
        app.add_systems(
            Update,
            (
                systems::variable_step_camera_control,
                systems::character_visual_rotation,
                systems::camera_simulation_update,
            )
                .chain()
                .in_set(CharacterCameraSet::Variable),
        );

        // Camera late phase runs against propagated (presentation)
        // transforms.
        app.add_systems(
            PostUpdate,
            systems::camera_late_update::<B>
                .in_set(CharacterCameraSet::Late)
                .after(TransformSystem::TransformPropagate),
        );
    }
}
