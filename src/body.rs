//! Kinematic character body state and its per-tick update phases.
//!
//! The body has no discrete state machine beyond its continuous fields; the
//! ordered phases executed once per fixed tick *are* the design:
//! initialization, parent movement, grounding, velocity control, slope-break
//! pre-emption, ground pushing, movement integration with decollision,
//! platform tracking with momentum transfer, and stateful hit bookkeeping.
//!
//! Per-archetype decisions (what counts as ground, how velocity deflects off
//! surfaces) are injected through the [`CharacterProcessor`] trait rather than
//! hardcoded, so other archetypes can reuse the phase pipeline unchanged.

use std::sync::Arc;

use bevy::log::debug;
use bevy::prelude::*;

use crate::backend::{CollisionBackend, OverlapHit};
use crate::collector::ClosestHitCollector;
use crate::config::CharacterConfig;
use crate::control;
use crate::input::CharacterControl;
use crate::math::{
    add_variable_rate_rotation, project_on_plane, reorient_on_plane,
    slerp_towards_direction_around_up, up_from_rotation,
};

/// Movement below this length is treated as no movement at all.
const MIN_MOVE_DISTANCE: f32 = 1e-4;
/// Leftover time budget below this fraction of a tick is dropped.
const MIN_REMAINING_TIME: f32 = 1e-5;

/// A surface contact: who was touched, where, and the surface normal there.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct SurfaceHit {
    /// Entity owning the touched collider.
    pub entity: Entity,
    /// World-space contact point.
    pub point: Vec3,
    /// World-space surface normal.
    pub normal: Vec3,
}

/// A hit registered by the body during one tick.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct CharacterHit {
    /// The touched surface.
    pub hit: SurfaceHit,
    /// Whether the surface qualified as ground when it was touched.
    pub is_grounded_on_hit: bool,
}

/// Lifecycle of a stateful hit relative to the previous tick.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPhase {
    /// The entity was not touched last tick.
    Enter,
    /// The entity was touched last tick too.
    Stay,
    /// The entity was touched last tick but not this one.
    Exit,
}

/// A per-tick hit annotated with enter/stay/exit semantics.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct StatefulHit {
    /// The hit data (for `Exit`, the last data seen while touching).
    pub hit: CharacterHit,
    /// Lifecycle phase this tick.
    pub phase: HitPhase,
}

/// Attachment to a supporting parent body (moving platform).
#[derive(Reflect, Debug, Clone, Copy)]
pub struct ParentAttachment {
    /// The supporting body.
    pub entity: Entity,
    /// Character position in the parent's local space.
    pub local_anchor: Vec3,
    /// Parent world rotation when the anchor was stored.
    pub rotation: Quat,
}

/// Context in which a grounding decision is requested.
///
/// The default predicate treats them all the same (slope angle only), but an
/// archetype may want e.g. stricter step-up grounding than probe grounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundingEvaluation {
    /// The downward grounding probe at the start of the tick.
    GroundProbe,
    /// A hit found while integrating movement.
    MovementHit,
    /// The landing surface of a step-up attempt.
    StepUp,
    /// The lookahead probe for upcoming slope changes.
    SlopeBreak,
}

/// An impulse the body wants applied to another body.
///
/// Phases run against a read-only world; impulse application is deferred to
/// the end of the system pass.
#[derive(Debug, Clone, Copy)]
pub struct ImpulseRequest {
    /// Body to push.
    pub entity: Entity,
    /// Impulse to apply.
    pub impulse: Vec3,
    /// World-space application point.
    pub point: Vec3,
}

/// Per-archetype character behavior callbacks.
///
/// One implementation per character archetype, injected through
/// [`CharacterBehavior`]. All methods have defaults implementing the standard
/// grounded-humanoid behavior.
pub trait CharacterProcessor: Send + Sync + 'static {
    /// Whether a surface qualifies as ground for this archetype.
    fn is_grounded_on_hit(
        &self,
        config: &CharacterConfig,
        grounding_up: Vec3,
        hit_normal: Vec3,
        _evaluation: GroundingEvaluation,
    ) -> bool {
        hit_normal.angle_between(grounding_up).to_degrees()
            <= config.step_and_slope.max_grounding_angle
    }

    /// Deflect velocity along the accumulated hit planes of this tick.
    fn project_velocity_on_hits(
        &self,
        config: &CharacterConfig,
        velocity: &mut Vec3,
        is_grounded: bool,
        ground_normal: Option<Vec3>,
        hit_normals: &[Vec3],
        original_velocity_direction: Vec3,
    ) {
        default_project_velocity_on_hits(
            config,
            velocity,
            is_grounded,
            ground_normal,
            hit_normals,
            original_velocity_direction,
        );
    }

    /// Effective mass used when pushing on dynamic ground bodies.
    fn effective_mass(&self, config: &CharacterConfig) -> f32 {
        config.mass
    }
}

/// The standard grounded-humanoid behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProcessor;

impl CharacterProcessor for DefaultProcessor {}

/// Per-entity injection point for a [`CharacterProcessor`].
#[derive(Component, Clone)]
pub struct CharacterBehavior(pub Arc<dyn CharacterProcessor>);

impl Default for CharacterBehavior {
    fn default() -> Self {
        Self(Arc::new(DefaultProcessor))
    }
}

/// Kinematic character body state, mutated exactly once per fixed tick.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct KinematicCharacterBody {
    /// Velocity relative to the supporting parent (world velocity when there
    /// is no parent).
    pub relative_velocity: Vec3,
    /// Whether the body is supported by walkable ground this tick.
    pub is_grounded: bool,
    /// The supporting surface, when grounded.
    pub ground_hit: Option<SurfaceHit>,
    /// Up axis used for grounding decisions this tick.
    pub grounding_up: Vec3,
    /// Supporting parent body attachment, if resting on a moving body.
    pub parent: Option<ParentAttachment>,
    /// Rotation applied by the parent since the previous tick.
    pub rotation_from_parent: Quat,
    /// Delta time of the most recent physics tick, for variable-rate
    /// reconciliation.
    pub last_physics_update_dt: f32,
    /// Snapshot of `is_grounded` taken at the start of the tick.
    pub was_grounded_before_update: bool,
    /// Skip the next grounding probe (set by jumping and by slope-break
    /// pre-emption, consumed by the probe).
    must_unground: bool,
    /// Hits registered this tick.
    pub hits: Vec<CharacterHit>,
    /// Enter/stay/exit hit records for this tick.
    pub stateful_hits: Vec<StatefulHit>,
    /// Hits from the previous tick, for stateful classification.
    previous_hits: Vec<CharacterHit>,
    /// Normals of the planes velocity has been projected on this tick.
    velocity_projection_normals: Vec<Vec3>,
}

impl Default for KinematicCharacterBody {
    fn default() -> Self {
        Self {
            relative_velocity: Vec3::ZERO,
            is_grounded: false,
            ground_hit: None,
            grounding_up: Vec3::Y,
            parent: None,
            rotation_from_parent: Quat::IDENTITY,
            last_physics_update_dt: 0.0,
            was_grounded_before_update: false,
            must_unground: false,
            hits: Vec::new(),
            stateful_hits: Vec::new(),
            previous_hits: Vec::new(),
            velocity_projection_normals: Vec::new(),
        }
    }
}

impl KinematicCharacterBody {
    /// Create a body at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the body off the ground and keep it off through the next
    /// grounding probe.
    pub fn unground(&mut self) {
        self.is_grounded = false;
        self.ground_hit = None;
        self.must_unground = true;
    }

    /// Normal of the supporting surface, or the grounding up axis when
    /// airborne.
    pub fn ground_normal(&self) -> Vec3 {
        self.ground_hit.map(|h| h.normal).unwrap_or(self.grounding_up)
    }

    /// Entity of the supporting surface, if grounded.
    pub fn ground_entity(&self) -> Option<Entity> {
        self.ground_hit.map(|h| h.entity)
    }

    fn record_hit(&mut self, hit: SurfaceHit, is_grounded_on_hit: bool) {
        self.hits.push(CharacterHit {
            hit,
            is_grounded_on_hit,
        });
    }
}

/// Run all fixed-tick phases of one character body, in order.
///
/// `position` is the body's simulation position and is mutated in place;
/// `rotation` is read-only here (rotation is visual-rate state). Impulses the
/// body wants applied to other bodies are appended to `impulses` for deferred
/// application.
#[allow(clippy::too_many_arguments)]
pub fn update_character_body<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    control: &CharacterControl,
    body: &mut KinematicCharacterBody,
    position: &mut Vec3,
    rotation: Quat,
    dt: f32,
    impulses: &mut Vec<ImpulseRequest>,
) {
    initialize(body, dt);
    parent_movement::<B>(world, body, position);
    grounding_probe::<B>(world, entity, config, processor, body, position, rotation);
    velocity_control::<B>(world, entity, config, processor, body, *position, rotation, control, dt);
    prevent_grounding_from_slope_break::<B>(world, entity, config, processor, body, *position);
    ground_pushing::<B>(world, config, processor, body, dt, impulses);
    movement_and_decollision::<B>(world, entity, config, processor, body, position, rotation, dt);
    platform_detection_and_momentum::<B>(world, body, *position);
    process_stateful_hits(body);
}

/// Phase 1: snapshot flags and clear per-tick buffers.
fn initialize(body: &mut KinematicCharacterBody, dt: f32) {
    body.was_grounded_before_update = body.is_grounded;
    body.last_physics_update_dt = dt;
    body.hits.clear();
    body.stateful_hits.clear();
    body.velocity_projection_normals.clear();
    body.rotation_from_parent = Quat::IDENTITY;
}

/// Phase 2: replay the supporting parent's movement since last tick.
///
/// The character is carried to where its stored anchor ended up, and the
/// parent's rotation delta is published for velocity re-orientation and for
/// the variable-rate updates.
fn parent_movement<B: CollisionBackend>(
    world: &World,
    body: &mut KinematicCharacterBody,
    position: &mut Vec3,
) {
    let Some(attachment) = body.parent else {
        return;
    };
    let Some((parent_position, parent_rotation)) = B::body_pose(world, attachment.entity) else {
        // Parent disappeared; drop the attachment and keep current velocity.
        body.parent = None;
        return;
    };

    let target = parent_position + parent_rotation * attachment.local_anchor;
    *position = target;
    body.rotation_from_parent = parent_rotation * attachment.rotation.inverse();
}

/// Phase 3: downward probe to determine support.
fn grounding_probe<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &mut KinematicCharacterBody,
    position: &mut Vec3,
    rotation: Quat,
) {
    body.grounding_up = up_from_rotation(rotation);
    body.is_grounded = false;
    body.ground_hit = None;

    if body.must_unground {
        // A jump or slope-break pre-emption this past tick asked to stay
        // airborne through one probe.
        body.must_unground = false;
        return;
    }

    let shape = &config.shape;
    let probe_distance = shape.grounding_probe_distance + shape.skin_width;
    let down = -body.grounding_up;

    let mut collector = ClosestHitCollector::new(Some(entity), &[], down);
    B::cast_capsule(
        world,
        shape.capsule(),
        *position,
        rotation,
        down,
        probe_distance,
        &mut collector,
    );

    let Some(&hit) = collector.closest_hit() else {
        return;
    };

    let surface = SurfaceHit {
        entity: hit.entity,
        point: hit.point,
        normal: hit.normal,
    };
    let grounded = processor.is_grounded_on_hit(
        config,
        body.grounding_up,
        hit.normal,
        GroundingEvaluation::GroundProbe,
    );
    body.record_hit(surface, grounded);

    if grounded {
        body.is_grounded = true;
        body.ground_hit = Some(surface);

        // Snap to keep exactly one skin width of separation, but never pull
        // the body down while it is moving away from the ground.
        let moving_away = body.relative_velocity.dot(body.grounding_up) > 1e-3;
        let snap = hit.distance - shape.skin_width;
        if snap > 0.0 && (body.was_grounded_before_update || !moving_away) {
            *position -= body.grounding_up * snap;
        }
    }
}

/// Phase 4: velocity control for the grounded/airborne regimes.
#[allow(clippy::too_many_arguments)]
fn velocity_control<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &mut KinematicCharacterBody,
    position: Vec3,
    rotation: Quat,
    control: &CharacterControl,
    dt: f32,
) {
    // Carry the parent's rotation into the control frame so riding a turning
    // platform feels stationary from the player's point of view.
    let mut move_vector = control.move_vector;
    if body.parent.is_some() && body.rotation_from_parent != Quat::IDENTITY {
        move_vector = body.rotation_from_parent * move_vector;
        body.relative_velocity = body.rotation_from_parent * body.relative_velocity;
    }

    let move_speed = if control.sprint_held {
        config.sprint_speed
    } else {
        config.walk_speed
    };

    if body.is_grounded {
        let ground_normal = body.ground_normal();
        control::ground_move_interpolated(
            &mut body.relative_velocity,
            move_vector * move_speed,
            config.grounded_movement_sharpness,
            dt,
            ground_normal,
        );

        if control.jump {
            control::standard_jump(
                &mut body.relative_velocity,
                &mut body.is_grounded,
                body.grounding_up * config.jump_speed,
                body.grounding_up,
            );
            body.ground_hit = None;
            body.must_unground = true;
        }
    } else {
        let air_acceleration = move_vector * config.air_acceleration;
        if air_acceleration.length_squared() > 0.0 {
            let velocity_before = body.relative_velocity;
            control::air_accelerate(
                &mut body.relative_velocity,
                air_acceleration,
                move_speed,
                body.grounding_up,
                dt,
            );

            // Discard the contribution if it would press the body into a
            // surface that does not count as ground (air-climb prevention).
            if config.prevent_air_acceleration_against_ungrounded_hits
                && movement_would_hit_non_grounded_obstruction::<B>(
                    world,
                    entity,
                    config,
                    processor,
                    body,
                    position,
                    rotation,
                    body.relative_velocity * dt,
                )
            {
                body.relative_velocity = velocity_before;
            }
        }

        control::accelerate(&mut body.relative_velocity, config.gravity, dt);
        control::apply_drag(&mut body.relative_velocity, dt, config.air_drag);
    }
}

/// Trial-move a displacement and report whether it would strike a surface
/// that does not qualify as ground.
#[allow(clippy::too_many_arguments)]
fn movement_would_hit_non_grounded_obstruction<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &KinematicCharacterBody,
    position: Vec3,
    rotation: Quat,
    displacement: Vec3,
) -> bool {
    let distance = displacement.length();
    if distance <= MIN_MOVE_DISTANCE {
        return false;
    }
    let direction = displacement / distance;

    let mut collector = ClosestHitCollector::new(Some(entity), &[], direction);
    B::cast_capsule(
        world,
        config.shape.capsule(),
        position,
        rotation,
        direction,
        distance + config.shape.skin_width,
        &mut collector,
    );

    match collector.closest_hit() {
        Some(hit) => !processor.is_grounded_on_hit(
            config,
            body.grounding_up,
            hit.normal,
            GroundingEvaluation::MovementHit,
        ),
        None => false,
    }
}

/// Phase 5: refuse grounding when sliding toward a surface break that would
/// not itself count as ground.
fn prevent_grounding_from_slope_break<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &mut KinematicCharacterBody,
    position: Vec3,
) {
    let step = &config.step_and_slope;
    if !step.prevent_grounding_on_slope_break || !body.is_grounded {
        return;
    }

    let planar_velocity = project_on_plane(body.relative_velocity, body.grounding_up);
    let speed = planar_velocity.length();
    if speed <= MIN_MOVE_DISTANCE {
        return;
    }
    let forward = planar_velocity / speed;

    let probe_radius = config.shape.radius * 0.5;
    let origin = position + forward * step.slope_break_lookahead;
    let probe_length = config.shape.bottom_offset()
        + config.shape.grounding_probe_distance
        + step.max_step_height;

    let down = -body.grounding_up;
    let mut collector = ClosestHitCollector::new(Some(entity), &[], down);
    B::cast_sphere(world, origin, probe_radius, down, probe_length, &mut collector);

    if let Some(hit) = collector.closest_hit() {
        // Only surfaces below the body count: the probe is asking what the
        // body is about to stand on, not what it is brushing against.
        let below_body =
            (hit.point - position).dot(body.grounding_up) < -config.shape.bottom_offset() * 0.5;
        if !below_body {
            return;
        }
        let upcoming_is_ground = processor.is_grounded_on_hit(
            config,
            body.grounding_up,
            hit.normal,
            GroundingEvaluation::SlopeBreak,
        );
        if !upcoming_is_ground {
            body.unground();
        }
    }
}

/// Phase 6: push on dynamic ground bodies so the character's weight is felt.
fn ground_pushing<B: CollisionBackend>(
    world: &World,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &KinematicCharacterBody,
    dt: f32,
    impulses: &mut Vec<ImpulseRequest>,
) {
    if !body.is_grounded {
        return;
    }
    let Some(ground) = body.ground_hit else {
        return;
    };
    if B::body_mass(world, ground.entity).is_none() {
        // Static or kinematic support; nothing to push.
        return;
    }

    let mass = processor.effective_mass(config);
    impulses.push(ImpulseRequest {
        entity: ground.entity,
        impulse: config.gravity * mass * dt,
        point: ground.point,
    });
}

/// Phase 7: sweep the body through `velocity * dt`, resolving collisions
/// iteratively and maintaining minimum separation from touched surfaces.
#[allow(clippy::too_many_arguments)]
fn movement_and_decollision<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &mut KinematicCharacterBody,
    position: &mut Vec3,
    rotation: Quat,
    dt: f32,
) {
    let shape = &config.shape;
    let original_velocity_direction = body.relative_velocity.normalize_or_zero();

    let mut remaining_time = dt;
    let mut iterations = 0u32;

    while remaining_time > MIN_REMAINING_TIME {
        let displacement = body.relative_velocity * remaining_time;
        let distance = displacement.length();
        if distance <= MIN_MOVE_DISTANCE {
            break;
        }
        if iterations >= shape.max_movement_iterations {
            debug!("movement iteration cap reached, dropping leftover displacement");
            break;
        }
        iterations += 1;

        let direction = displacement / distance;
        let mut collector = ClosestHitCollector::new(Some(entity), &[], direction);
        B::cast_capsule(
            world,
            shape.capsule(),
            *position,
            rotation,
            direction,
            distance + shape.skin_width,
            &mut collector,
        );

        let Some(&hit) = collector.closest_hit() else {
            *position += displacement;
            break;
        };

        let advance = (hit.distance - shape.skin_width).max(0.0);
        *position += direction * advance;
        remaining_time -= remaining_time * (advance / distance);

        let surface = SurfaceHit {
            entity: hit.entity,
            point: hit.point,
            normal: hit.normal,
        };
        let is_ground_hit = processor.is_grounded_on_hit(
            config,
            body.grounding_up,
            hit.normal,
            GroundingEvaluation::MovementHit,
        );
        body.record_hit(surface, is_ground_hit);

        // A climbable obstruction is walked up onto instead of deflecting
        // velocity.
        if !is_ground_hit
            && try_step_up::<B>(world, entity, config, processor, body, position, rotation, direction)
        {
            continue;
        }

        if is_ground_hit && body.is_grounded {
            // Slope transition while grounded: keep speed, follow the new
            // surface.
            body.ground_hit = Some(surface);
            body.relative_velocity = reorient_on_plane(body.relative_velocity, hit.normal);
        } else {
            body.velocity_projection_normals.push(hit.normal);
            let is_grounded = body.is_grounded;
            let ground_normal = body.ground_hit.map(|h| h.normal);
            processor.project_velocity_on_hits(
                config,
                &mut body.relative_velocity,
                is_grounded,
                ground_normal,
                &body.velocity_projection_normals,
                original_velocity_direction,
            );
        }
    }

    // Decollision: push out of any remaining penetrations.
    let mut overlaps: Vec<OverlapHit> = Vec::new();
    for _ in 0..shape.max_decollision_iterations {
        overlaps.clear();
        B::overlaps_capsule(
            world,
            shape.capsule(),
            *position,
            rotation,
            Some(entity),
            &mut overlaps,
        );

        let mut corrected = false;
        for overlap in &overlaps {
            if overlap.collidable && overlap.depth > 0.0 {
                *position += overlap.normal * overlap.depth;
                corrected = true;
            }
        }
        if !corrected {
            break;
        }
    }
}

/// Attempt to walk up onto the obstruction just hit. Returns `true` when the
/// body was placed on top of the step.
#[allow(clippy::too_many_arguments)]
fn try_step_up<B: CollisionBackend>(
    world: &World,
    entity: Entity,
    config: &CharacterConfig,
    processor: &dyn CharacterProcessor,
    body: &KinematicCharacterBody,
    position: &mut Vec3,
    rotation: Quat,
    direction: Vec3,
) -> bool {
    let step = &config.step_and_slope;
    if !step.step_handling || step.max_step_height <= 0.0 {
        return false;
    }

    let shape = &config.shape;
    let up = body.grounding_up;
    let forward = project_on_plane(direction, up).normalize_or_zero();
    if forward == Vec3::ZERO {
        return false;
    }

    // Headroom above the body.
    let mut collector = ClosestHitCollector::new(Some(entity), &[], up);
    B::cast_capsule(
        world,
        shape.capsule(),
        *position,
        rotation,
        up,
        step.max_step_height + shape.skin_width,
        &mut collector,
    );
    let clearance = match collector.closest_hit() {
        Some(hit) => (hit.distance - shape.skin_width).max(0.0),
        None => step.max_step_height,
    };
    if clearance <= shape.skin_width {
        return false;
    }

    // Clearance forward at the raised position: can the body pass over the
    // obstruction's lip?
    let forward_distance = shape.radius * 0.5 + shape.skin_width * 2.0;
    let raised = *position + up * clearance;
    let mut collector = ClosestHitCollector::new(Some(entity), &[], forward);
    B::cast_capsule(
        world,
        shape.capsule(),
        raised,
        rotation,
        forward,
        forward_distance + shape.skin_width,
        &mut collector,
    );
    if collector.has_hit() {
        return false;
    }
    let stepped = raised + forward * forward_distance;

    // Landing surface within step height, and it must qualify as ground.
    let down = -up;
    let mut collector = ClosestHitCollector::new(Some(entity), &[], down);
    B::cast_capsule(
        world,
        shape.capsule(),
        stepped,
        rotation,
        down,
        clearance + shape.skin_width,
        &mut collector,
    );
    let Some(&landing) = collector.closest_hit() else {
        return false;
    };
    let landed_height = clearance - (landing.distance - shape.skin_width);
    if landed_height <= 0.0 || landed_height > step.max_step_height + shape.skin_width {
        return false;
    }
    if !processor.is_grounded_on_hit(
        config,
        up,
        landing.normal,
        GroundingEvaluation::StepUp,
    ) {
        return false;
    }

    // Width validity: the step must support the character across its width,
    // not just at the leading edge.
    let width_probe_origin = stepped + forward * (step.character_width_for_step_check * 0.5);
    let mut collector = ClosestHitCollector::new(Some(entity), &[], down);
    B::cast_sphere(
        world,
        width_probe_origin,
        shape.skin_width.max(0.01) * 2.0,
        down,
        clearance + shape.bottom_offset(),
        &mut collector,
    );
    let width_supported = match collector.closest_hit() {
        Some(hit) => processor.is_grounded_on_hit(
            config,
            up,
            hit.normal,
            GroundingEvaluation::StepUp,
        ),
        None => false,
    };
    if !width_supported {
        return false;
    }

    *position = stepped - up * (landing.distance - shape.skin_width).max(0.0);
    true
}

/// Phase 8: re-evaluate the supporting parent and transfer momentum across
/// attach/detach boundaries.
fn platform_detection_and_momentum<B: CollisionBackend>(
    world: &World,
    body: &mut KinematicCharacterBody,
    position: Vec3,
) {
    let previous = body.parent;
    let detected = body
        .ground_entity()
        .filter(|&ground| body.is_grounded && B::is_moving_body(world, ground));

    match (previous, detected) {
        (None, None) => {}
        (None, Some(ground)) => {
            attach_to_parent::<B>(world, body, position, ground);
        }
        (Some(attachment), None) => {
            // Keep the platform's velocity at separation.
            let platform_velocity =
                B::velocity_at_point(world, attachment.entity, position).unwrap_or(Vec3::ZERO);
            body.relative_velocity += platform_velocity;
            body.parent = None;
        }
        (Some(attachment), Some(ground)) if attachment.entity != ground => {
            let old_velocity =
                B::velocity_at_point(world, attachment.entity, position).unwrap_or(Vec3::ZERO);
            body.relative_velocity += old_velocity;
            body.parent = None;
            attach_to_parent::<B>(world, body, position, ground);
        }
        (Some(attachment), Some(_)) => {
            // Same parent: refresh the anchor for next tick's replay.
            if let Some((parent_position, parent_rotation)) =
                B::body_pose(world, attachment.entity)
            {
                body.parent = Some(ParentAttachment {
                    entity: attachment.entity,
                    local_anchor: parent_rotation.inverse() * (position - parent_position),
                    rotation: parent_rotation,
                });
            } else {
                body.parent = None;
            }
        }
    }
}

fn attach_to_parent<B: CollisionBackend>(
    world: &World,
    body: &mut KinematicCharacterBody,
    position: Vec3,
    parent: Entity,
) {
    let Some((parent_position, parent_rotation)) = B::body_pose(world, parent) else {
        return;
    };
    // Velocity becomes relative to the new support.
    let platform_velocity = B::velocity_at_point(world, parent, position).unwrap_or(Vec3::ZERO);
    body.relative_velocity -= platform_velocity;
    body.parent = Some(ParentAttachment {
        entity: parent,
        local_anchor: parent_rotation.inverse() * (position - parent_position),
        rotation: parent_rotation,
    });
}

/// Phase 9: classify this tick's hits against last tick's into
/// enter/stay/exit records.
fn process_stateful_hits(body: &mut KinematicCharacterBody) {
    body.stateful_hits.clear();

    let mut seen: Vec<Entity> = Vec::new();
    for &hit in &body.hits {
        if seen.contains(&hit.hit.entity) {
            continue;
        }
        seen.push(hit.hit.entity);

        let was_touching = body
            .previous_hits
            .iter()
            .any(|previous| previous.hit.entity == hit.hit.entity);
        body.stateful_hits.push(StatefulHit {
            hit,
            phase: if was_touching {
                HitPhase::Stay
            } else {
                HitPhase::Enter
            },
        });
    }

    for &previous in &body.previous_hits {
        let still_touching = seen.contains(&previous.hit.entity);
        let already_exited = body
            .stateful_hits
            .iter()
            .any(|s| s.phase == HitPhase::Exit && s.hit.hit.entity == previous.hit.entity);
        if !still_touching && !already_exited {
            body.stateful_hits.push(StatefulHit {
                hit: previous,
                phase: HitPhase::Exit,
            });
        }
    }

    body.previous_hits.clear();
    let hits = std::mem::take(&mut body.hits);
    for hit in &hits {
        if !body
            .previous_hits
            .iter()
            .any(|p| p.hit.entity == hit.hit.entity)
        {
            body.previous_hits.push(*hit);
        }
    }
    body.hits = hits;
}

/// Default velocity deflection along the accumulated hit planes.
///
/// Projects onto the most recent plane, slides along the crease when a
/// previous plane is still violated, and stops entirely when cornered or when
/// the deflection would reverse the original movement direction. Grounded
/// velocity is finally constrained back onto the ground plane when the
/// archetype asks for it.
pub fn default_project_velocity_on_hits(
    config: &CharacterConfig,
    velocity: &mut Vec3,
    is_grounded: bool,
    ground_normal: Option<Vec3>,
    hit_normals: &[Vec3],
    original_velocity_direction: Vec3,
) {
    let Some(&latest) = hit_normals.last() else {
        return;
    };
    if velocity.dot(latest) >= 0.0 {
        return;
    }

    let mut projected = project_on_plane(*velocity, latest);

    for &normal in &hit_normals[..hit_normals.len() - 1] {
        if projected.dot(normal) < -1e-4 {
            let crease = latest.cross(normal).normalize_or_zero();
            if crease == Vec3::ZERO {
                projected = Vec3::ZERO;
                break;
            }
            projected = crease * projected.dot(crease);
        }
    }

    // Cornered: some plane is still violated, or the deflection points back
    // against the original movement.
    if hit_normals.iter().any(|&n| projected.dot(n) < -1e-3)
        || (original_velocity_direction != Vec3::ZERO
            && projected.dot(original_velocity_direction) < -1e-4)
    {
        projected = Vec3::ZERO;
    }

    if is_grounded && config.step_and_slope.constrain_velocity_to_ground_plane {
        if let Some(normal) = ground_normal {
            projected = project_on_plane(projected, normal);
        }
    }

    *velocity = projected;
}

/// Variable-rate visual update of a character's rotation.
///
/// Reconciles the fixed-tick parent rotation delta into the rendered frame,
/// then slerps the facing toward the current move direction. Physical state
/// is never touched here.
pub fn character_variable_update(
    body: &KinematicCharacterBody,
    config: &CharacterConfig,
    move_vector: Vec3,
    rotation: &mut Quat,
    dt: f32,
) {
    add_variable_rate_rotation(
        rotation,
        body.rotation_from_parent,
        dt,
        body.last_physics_update_dt,
    );

    if move_vector.length_squared() > 0.0 {
        let up = up_from_rotation(*rotation);
        slerp_towards_direction_around_up(
            rotation,
            dt,
            move_vector.normalize_or_zero(),
            up,
            config.rotation_sharpness,
        );
    }
}
