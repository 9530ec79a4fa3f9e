//! ECS systems driving the character and camera updates.
//!
//! Two scheduling domains, strictly ordered inside each:
//!
//! - fixed rate (`FixedUpdate`): input translation, character body update,
//!   state-marker sync; the simulation tick advances last
//!   (`FixedPostUpdate`);
//! - variable rate (`Update` + `PostUpdate`): camera control application,
//!   character visual rotation, camera simulation phase, then the camera
//!   late phase after transform propagation.
//!
//! Systems that issue collision queries are exclusive and generic over the
//! [`CollisionBackend`]: they snapshot the entities they update, run the
//! update against the read-only world, then write results back.

use bevy::prelude::*;

use crate::backend::CollisionBackend;
use crate::body::{
    character_variable_update, update_character_body, CharacterBehavior, ImpulseRequest,
    KinematicCharacterBody,
};
use crate::camera::{
    calculate_camera_position, calculate_camera_rotation, simulation_step,
    smooth_obstructed_distance, smooth_target_distance, CameraTarget, OrbitCamera,
    OrbitCameraControl, OrbitCameraIgnoredEntities,
};
use crate::collector::ClosestHitCollector;
use crate::config::{CharacterConfig, OrbitCameraConfig};
use crate::input::{build_character_control, CharacterControl, PlayerInputs, SimulationTick};
use crate::math::{forward_from_rotation, up_from_rotation};
use crate::state::{Airborne, Grounded};

/// Fixed-rate input translation: build each character's per-tick control
/// intent from its raw inputs and its controlled camera's frame.
pub fn fixed_step_character_control(
    tick: Res<SimulationTick>,
    mut characters: Query<(
        &PlayerInputs,
        &CharacterConfig,
        &Transform,
        &mut CharacterControl,
    )>,
    cameras: Query<&OrbitCamera>,
) {
    for (inputs, config, transform, mut control) in &mut characters {
        let character_up = up_from_rotation(transform.rotation);

        // The camera rotation is recomputed from orbit state rather than read
        // from its transform, so this works before the camera has ever been
        // placed. A missing camera degrades to the identity frame.
        let camera_rotation = config
            .controlled_camera
            .and_then(|camera| cameras.get(camera).ok())
            .map(|orbit| {
                calculate_camera_rotation(character_up, orbit.planar_forward, orbit.pitch_angle)
            });

        *control = build_character_control(inputs, tick.0, character_up, camera_rotation);
    }
}

/// Variable-rate input application: route look/zoom input to the controlled
/// camera.
pub fn variable_step_camera_control(
    characters: Query<(Entity, &PlayerInputs, &CharacterConfig)>,
    mut camera_controls: Query<&mut OrbitCameraControl>,
) {
    for (entity, inputs, config) in &characters {
        let Some(camera) = config.controlled_camera else {
            continue;
        };
        let Ok(mut control) = camera_controls.get_mut(camera) else {
            continue;
        };
        control.followed_character = Some(entity);
        control.look_degrees_delta = inputs.camera_look;
        control.zoom_delta = inputs.camera_zoom;
    }
}

/// Advance the simulation tick. Runs after everything else in the fixed
/// domain so that a press stamped between fixed steps is consumed by exactly
/// the next step.
pub fn advance_simulation_tick(mut tick: ResMut<SimulationTick>) {
    tick.0 = tick.0.wrapping_add(1);
}

/// Fixed-rate character body update: runs the ordered body phases for every
/// character, then applies the impulses the bodies requested.
pub fn character_physics_update<B: CollisionBackend>(world: &mut World) {
    let dt = world
        .get_resource::<Time<Fixed>>()
        .map(|t| t.delta_secs())
        .filter(|&d| d > 0.0)
        .unwrap_or(1.0 / 60.0);

    let entities: Vec<(
        Entity,
        CharacterConfig,
        CharacterBehavior,
        CharacterControl,
        KinematicCharacterBody,
        Transform,
    )> = world
        .query::<(
            Entity,
            &CharacterConfig,
            Option<&CharacterBehavior>,
            &CharacterControl,
            &KinematicCharacterBody,
            &Transform,
        )>()
        .iter(world)
        .map(|(entity, config, behavior, control, body, transform)| {
            (
                entity,
                config.clone(),
                behavior.cloned().unwrap_or_default(),
                *control,
                body.clone(),
                *transform,
            )
        })
        .collect();

    let mut impulses: Vec<ImpulseRequest> = Vec::new();

    for (entity, config, behavior, control, mut body, transform) in entities {
        let mut position = transform.translation;

        update_character_body::<B>(
            world,
            entity,
            &config,
            behavior.0.as_ref(),
            &control,
            &mut body,
            &mut position,
            transform.rotation,
            dt,
            &mut impulses,
        );

        if let Some(mut body_component) = world.get_mut::<KinematicCharacterBody>(entity) {
            *body_component = body;
        }
        if let Some(mut transform_component) = world.get_mut::<Transform>(entity) {
            transform_component.translation = position;
        }
    }

    for request in impulses {
        B::apply_impulse_at_point(world, request.entity, request.impulse, request.point);
    }
}

/// Sync the [`Grounded`]/[`Airborne`] markers from body state.
pub fn sync_state_markers(
    mut commands: Commands,
    characters: Query<(Entity, &KinematicCharacterBody, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, body, has_grounded, has_airborne) in &characters {
        if body.is_grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !body.is_grounded && !has_airborne {
            commands.entity(entity).remove::<Grounded>().insert(Airborne);
        }
    }
}

/// Variable-rate visual rotation of characters.
pub fn character_visual_rotation(
    time: Res<Time>,
    mut characters: Query<(
        &KinematicCharacterBody,
        &CharacterConfig,
        &CharacterControl,
        &mut Transform,
    )>,
) {
    let dt = time.delta_secs();
    for (body, config, control, mut transform) in &mut characters {
        character_variable_update(body, config, control.move_vector, &mut transform.rotation, dt);
    }
}

/// Camera simulation phase: consume look/zoom input against the target's
/// simulation transform and write the raw orbit pose.
pub fn camera_simulation_update(
    time: Res<Time>,
    mut cameras: Query<(
        &OrbitCameraConfig,
        &mut OrbitCamera,
        &mut Transform,
        &OrbitCameraControl,
    )>,
    targets: Query<&CameraTarget>,
    bodies: Query<&KinematicCharacterBody>,
    transforms: Query<(&Transform, Option<&Parent>), Without<OrbitCamera>>,
) {
    let dt = time.delta_secs();

    for (config, mut camera, mut transform, control) in &mut cameras {
        let Some(followed) = control.followed_character else {
            continue;
        };
        let Some((target_position, target_rotation)) =
            resolve_target_simulation(followed, &targets, &transforms)
        else {
            continue;
        };
        let target_up = up_from_rotation(target_rotation);

        let parent_rotation = bodies
            .get(followed)
            .ok()
            .map(|body| (body.rotation_from_parent, body.last_physics_update_dt));

        let (position, rotation) = simulation_step(
            &mut camera,
            config,
            control.look_degrees_delta,
            control.zoom_delta,
            target_position,
            target_up,
            parent_rotation,
            dt,
        );

        *transform = Transform::from_translation(position).with_rotation(rotation);
    }
}

/// Resolve the camera target's simulation-time world transform: an explicit
/// [`CameraTarget`] override wins over the followed character's own
/// transform; `None` when neither resolves.
fn resolve_target_simulation(
    followed: Entity,
    targets: &Query<&CameraTarget>,
    transforms: &Query<(&Transform, Option<&Parent>), Without<OrbitCamera>>,
) -> Option<(Vec3, Quat)> {
    let resolve = |entity: Entity| -> Option<(Vec3, Quat)> {
        let (transform, parent) = transforms.get(entity).ok()?;
        let mut accumulated = *transform;
        let mut parent = parent.map(|p| p.get());
        while let Some(parent_entity) = parent {
            let Ok((parent_transform, grand_parent)) = transforms.get(parent_entity) else {
                break;
            };
            accumulated = *parent_transform * accumulated;
            parent = grand_parent.map(|p| p.get());
        }
        Some((accumulated.translation, accumulated.rotation))
    };

    if let Ok(target) = targets.get(followed) {
        if let Some(resolved) = resolve(target.target) {
            return Some(resolved);
        }
    }
    resolve(followed)
}

/// Camera late phase: distance smoothing, obstruction handling and the final
/// pose, computed against the target's interpolated (presentation) transform.
///
/// Runs after transform propagation; the final pose is written to both the
/// camera's `Transform` and its `GlobalTransform` since propagation has
/// already happened this frame.
pub fn camera_late_update<B: CollisionBackend>(world: &mut World) {
    let dt = world
        .get_resource::<Time>()
        .map(|t| t.delta_secs())
        .unwrap_or(0.0);

    let cameras: Vec<(
        Entity,
        OrbitCameraConfig,
        OrbitCamera,
        OrbitCameraControl,
        Vec<Entity>,
    )> = world
        .query::<(
            Entity,
            &OrbitCameraConfig,
            &OrbitCamera,
            &OrbitCameraControl,
            Option<&OrbitCameraIgnoredEntities>,
        )>()
        .iter(world)
        .map(|(entity, config, camera, control, ignored)| {
            (
                entity,
                *config,
                camera.clone(),
                *control,
                ignored.map(|i| i.0.clone()).unwrap_or_default(),
            )
        })
        .collect();

    for (entity, config, mut camera, control, ignored) in cameras {
        let Some(followed) = control.followed_character else {
            continue;
        };
        let Some((target_position, target_rotation)) =
            resolve_target_interpolated(world, followed)
        else {
            continue;
        };
        let target_up = up_from_rotation(target_rotation);

        // Planar forward and pitch were finalized in the simulation phase;
        // only the rotation is recomputed here against the interpolated up.
        let rotation =
            calculate_camera_rotation(target_up, camera.planar_forward, camera.pitch_angle);
        let camera_forward = forward_from_rotation(rotation);

        smooth_target_distance(&mut camera, &config, dt);

        if config.obstruction_radius > 0.0 {
            let check_distance = camera.smoothed_target_distance;
            let cast_direction = -camera_forward;

            let mut collector =
                ClosestHitCollector::new(Some(followed), &ignored, cast_direction);
            B::cast_sphere(
                world,
                target_position,
                config.obstruction_radius,
                cast_direction,
                check_distance,
                &mut collector,
            );

            let mut new_obstructed_distance = check_distance;
            if let Some(&hit) = collector.closest_hit() {
                new_obstructed_distance = check_distance * hit.fraction;

                // Re-cast against the hit body's interpolated transform and
                // prefer that result when it also hits; casting the
                // simulation transform of a moving body would jitter at the
                // fixed rate.
                if config.prevent_fixed_update_jitter {
                    if let Some(pose) = interpolated_pose(world, hit.entity) {
                        let mut recast =
                            ClosestHitCollector::new(Some(followed), &ignored, cast_direction);
                        B::cast_sphere_against(
                            world,
                            hit.entity,
                            pose,
                            target_position,
                            config.obstruction_radius,
                            cast_direction,
                            check_distance,
                            &mut recast,
                        );
                        if let Some(&interpolated_hit) = recast.closest_hit() {
                            new_obstructed_distance = check_distance * interpolated_hit.fraction;
                        }
                    }
                }
            }

            smooth_obstructed_distance(&mut camera, &config, new_obstructed_distance, dt);
        } else {
            camera.obstructed_distance = camera.smoothed_target_distance;
        }

        let position =
            calculate_camera_position(target_position, rotation, camera.obstructed_distance);
        let final_transform = Transform::from_translation(position).with_rotation(rotation);

        if let Some(mut camera_state) = world.get_mut::<OrbitCamera>(entity) {
            *camera_state = camera.clone();
        }
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            *transform = final_transform;
        }
        if let Some(mut global) = world.get_mut::<GlobalTransform>(entity) {
            *global = GlobalTransform::from(final_transform);
        }
    }
}

fn interpolated_pose(world: &World, entity: Entity) -> Option<(Vec3, Quat)> {
    world.get::<GlobalTransform>(entity).map(|global| {
        let transform = global.compute_transform();
        (transform.translation, transform.rotation)
    })
}

/// Resolve the camera target's interpolated world transform, with the same
/// override-then-fallback rule as the simulation phase.
fn resolve_target_interpolated(world: &World, followed: Entity) -> Option<(Vec3, Quat)> {
    if let Some(camera_target) = world.get::<CameraTarget>(followed) {
        if let Some(pose) = interpolated_pose(world, camera_target.target) {
            return Some(pose);
        }
    }
    interpolated_pose(world, followed)
}
