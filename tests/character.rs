//! Integration tests for the character body update.
//!
//! These drive the full fixed/variable pipeline headlessly against the
//! primitive scene backend and check body state, transforms and hit records
//! after known tick sequences.

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use orbit_character_controller::prelude::*;

/// Create a headless test app where every `update` advances time by exactly
/// one fixed timestep, so each update runs exactly one simulation tick.
fn create_test_app(fixed_dt: f64) -> App {
    let mut app = App::new();

    app.add_plugins(MinimalPlugins);
    app.add_plugins(TransformPlugin);
    app.add_plugins(OrbitCharacterPlugin::<PrimitiveSceneBackend>::default());
    app.insert_resource(Time::<Fixed>::from_seconds(fixed_dt));
    app.insert_resource(TimeUpdateStrategy::ManualDuration(
        Duration::from_secs_f64(fixed_dt),
    ));

    app.finish();
    app.cleanup();
    // The very first time update reports a zero delta; absorb it here so
    // every test tick advances by exactly one step.
    app.update();
    app
}

/// Run exactly one simulation tick.
fn tick(app: &mut App, _fixed_dt: f64) {
    app.update();
}

fn run_ticks(app: &mut App, fixed_dt: f64, count: usize) {
    for _ in 0..count {
        tick(app, fixed_dt);
    }
}

/// Spawn a static box brush; top surface is at `center.y + half_extents.y`.
fn spawn_box(app: &mut App, center: Vec3, half_extents: Vec3) -> Entity {
    let transform = Transform::from_translation(center);
    let entity = app
        .world_mut()
        .spawn((transform, GlobalTransform::from(transform)))
        .id();
    app.world_mut()
        .resource_mut::<CollisionScene>()
        .add_box(entity, half_extents);
    entity
}

/// Floor with its top surface at y = 0.
fn spawn_floor(app: &mut App) -> Entity {
    spawn_box(app, Vec3::new(0.0, -1.0, 0.0), Vec3::new(30.0, 1.0, 30.0))
}

fn spawn_character_with_config(app: &mut App, position: Vec3, config: CharacterConfig) -> Entity {
    let transform = Transform::from_translation(position);
    app.world_mut()
        .spawn((
            transform,
            GlobalTransform::from(transform),
            KinematicCharacterBody::new(),
            config,
            CharacterControl::default(),
            PlayerInputs::default(),
        ))
        .id()
}

/// Default character resting exactly one skin width above y = 0 ground.
fn spawn_character(app: &mut App, position: Vec3) -> Entity {
    spawn_character_with_config(app, position, CharacterConfig::default())
}

/// Rest height of the default capsule over a surface at y = 0.
const REST_HEIGHT: f32 = 1.0 + 0.02;

fn set_move(app: &mut App, entity: Entity, axes: Vec2) {
    app.world_mut()
        .get_mut::<PlayerInputs>(entity)
        .unwrap()
        .move_axes = axes;
}

fn press_jump(app: &mut App, entity: Entity) {
    let tick = app.world().resource::<SimulationTick>().0;
    app.world_mut()
        .get_mut::<PlayerInputs>(entity)
        .unwrap()
        .jump_pressed
        .set(tick);
}

fn body(app: &App, entity: Entity) -> &KinematicCharacterBody {
    app.world().get::<KinematicCharacterBody>(entity).unwrap()
}

fn position(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<Transform>(entity).unwrap().translation
}

// ==================== Grounding ====================

#[test]
fn character_detects_ground_and_markers() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    tick(&mut app, 0.02);

    assert!(body(&app, character).is_grounded);
    assert!(body(&app, character).ground_entity().is_some());
    assert!(app.world().entity(character).contains::<Grounded>());
    assert!(!app.world().entity(character).contains::<Airborne>());
}

#[test]
fn airborne_character_is_not_grounded() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, 5.0, 0.0));

    tick(&mut app, 0.02);

    assert!(!body(&app, character).is_grounded);
    assert!(app.world().entity(character).contains::<Airborne>());
}

#[test]
fn falling_character_lands_on_floor() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, 3.0, 0.0));

    run_ticks(&mut app, 0.02, 100);

    assert!(body(&app, character).is_grounded);
    let y = position(&app, character).y;
    assert!((y - REST_HEIGHT).abs() < 0.05, "resting height was {y}");
}

#[test]
fn penetrating_spawn_is_decollided() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    // Capsule bottom 0.2 inside the floor.
    let character = spawn_character(&mut app, Vec3::new(0.0, 0.8, 0.0));

    tick(&mut app, 0.02);

    let y = position(&app, character).y;
    assert!(y >= 0.98, "still penetrating, y = {y}");
    assert!(y <= REST_HEIGHT + 0.05);
}

// ==================== Velocity control ====================

#[test]
fn grounded_move_covers_interpolant_fraction_in_one_tick() {
    // WalkSpeed 10, GroundedMovementSharpness 10, dt 0.1: one tick covers
    // 1 - e^-1 of the gap toward full speed.
    let mut app = create_test_app(0.1);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));
    set_move(&mut app, character, Vec2::new(0.0, 1.0));

    tick(&mut app, 0.1);

    let velocity = body(&app, character).relative_velocity;
    let expected = 10.0 * (1.0 - (-1.0f32).exp());
    // Identity input frame: forward is -Z.
    assert!(
        (velocity.z + expected).abs() < 0.05,
        "velocity.z = {}, expected {}",
        velocity.z,
        -expected
    );
    assert!(velocity.x.abs() < 1e-3);
    assert!(body(&app, character).is_grounded);

    // The body also moved by velocity * dt.
    let z = position(&app, character).z;
    assert!((z + expected * 0.1).abs() < 0.02, "position.z = {z}");
}

#[test]
fn sprint_blends_toward_sprint_speed() {
    let mut app = create_test_app(0.1);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));
    set_move(&mut app, character, Vec2::new(0.0, 1.0));
    app.world_mut()
        .get_mut::<PlayerInputs>(character)
        .unwrap()
        .sprint_held = true;

    tick(&mut app, 0.1);

    let velocity = body(&app, character).relative_velocity;
    let expected = 15.0 * (1.0 - (-1.0f32).exp());
    assert!((velocity.z + expected).abs() < 0.05);
}

#[test]
fn airborne_gravity_and_drag_integrate() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, 10.0, 0.0));

    tick(&mut app, 0.02);

    // One tick: gravity -25 * 0.02 then drag 1/(1 + 1*0.02).
    let expected = -25.0f32 * 0.02 / 1.02;
    let velocity = body(&app, character).relative_velocity;
    assert!((velocity.y - expected).abs() < 1e-3, "velocity.y = {}", velocity.y);
}

// ==================== Jumping ====================

#[test]
fn jump_ungrounds_and_applies_impulse() {
    let mut app = create_test_app(0.1);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    tick(&mut app, 0.1);
    assert!(body(&app, character).is_grounded);

    press_jump(&mut app, character);
    tick(&mut app, 0.1);

    let state = body(&app, character);
    assert!(!state.is_grounded);
    assert!((state.relative_velocity.y - 10.0).abs() < 1e-3);
    assert!(position(&app, character).y > REST_HEIGHT + 0.9);
    assert!(app.world().entity(character).contains::<Airborne>());
}

#[test]
fn jump_press_is_consumed_by_exactly_one_tick() {
    let mut app = create_test_app(0.1);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    tick(&mut app, 0.1);
    press_jump(&mut app, character);
    tick(&mut app, 0.1);
    let velocity_after_jump = body(&app, character).relative_velocity.y;
    assert!(velocity_after_jump > 9.0);

    // The stale press must not fire again on the next tick: gravity wins.
    tick(&mut app, 0.1);
    let velocity_next = body(&app, character).relative_velocity.y;
    assert!(velocity_next < velocity_after_jump);
}

#[test]
fn character_returns_to_ground_after_jump() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    tick(&mut app, 0.02);
    press_jump(&mut app, character);
    run_ticks(&mut app, 0.02, 200);

    assert!(body(&app, character).is_grounded);
    assert!((position(&app, character).y - REST_HEIGHT).abs() < 0.05);
}

// ==================== Steps, walls, sliding ====================

#[test]
fn character_steps_up_low_obstacle() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    // A 0.3-high ledge ahead of the character, below the 0.5 step limit.
    spawn_box(
        &mut app,
        Vec3::new(0.0, 0.15, -4.0),
        Vec3::new(2.0, 0.15, 2.0),
    );
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));
    set_move(&mut app, character, Vec2::new(0.0, 1.0));

    run_ticks(&mut app, 0.02, 30);

    let pos = position(&app, character);
    assert!(
        pos.y > 0.3 + 1.0 - 0.05,
        "did not climb the step, y = {}, z = {}",
        pos.y,
        pos.z
    );
    assert!(body(&app, character).is_grounded);
}

#[test]
fn character_is_blocked_by_tall_wall() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    // Wall from y = 0 to y = 4, faces at z = -2.75 / -3.25.
    spawn_box(
        &mut app,
        Vec3::new(0.0, 2.0, -3.0),
        Vec3::new(10.0, 2.0, 0.25),
    );
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));
    set_move(&mut app, character, Vec2::new(0.0, 1.0));

    run_ticks(&mut app, 0.02, 40);

    let pos = position(&app, character);
    // Stopped at the wall (capsule radius 0.5 plus skin), never climbed it.
    assert!(pos.z > -2.3, "went through the wall, z = {}", pos.z);
    assert!(pos.z < -2.0, "never reached the wall, z = {}", pos.z);
    assert!((pos.y - REST_HEIGHT).abs() < 0.05, "climbed the wall, y = {}", pos.y);
    assert!(body(&app, character).is_grounded);
}

#[test]
fn character_slides_along_wall() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    spawn_box(
        &mut app,
        Vec3::new(0.0, 2.0, -3.0),
        Vec3::new(20.0, 2.0, 0.25),
    );
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));
    // Diagonal input: forward into the wall plus strafe right.
    set_move(&mut app, character, Vec2::new(1.0, 1.0));

    run_ticks(&mut app, 0.02, 50);

    let pos = position(&app, character);
    // Forward progress stopped at the wall, lateral movement continued.
    assert!(pos.z > -2.3);
    assert!(pos.x > 2.0, "did not slide along the wall, x = {}", pos.x);
}

#[test]
fn air_acceleration_into_wall_is_vetoed() {
    let mut app = create_test_app(0.02);
    // No floor: the character hangs beside a tall wall and pushes into it.
    let wall = spawn_box(
        &mut app,
        Vec3::new(1.55, 0.0, 0.0),
        Vec3::new(1.0, 8.0, 5.0),
    );
    let character = spawn_character(&mut app, Vec3::new(0.0, 0.0, 0.0));
    set_move(&mut app, character, Vec2::new(1.0, 0.0));

    run_ticks(&mut app, 0.02, 8);

    let state = body(&app, character);
    // The acceleration toward the wall was discarded once the trial move
    // started hitting it: no horizontal velocity, no sustained contact.
    assert!(state.relative_velocity.x.abs() < 1e-3);
    assert!(position(&app, character).x < 0.1);
    assert!(
        !state
            .stateful_hits
            .iter()
            .any(|s| s.hit.hit.entity == wall && s.phase == HitPhase::Stay),
        "still grinding against the wall"
    );
}

#[test]
fn without_veto_character_keeps_pressing_into_wall() {
    let mut app = create_test_app(0.02);
    let wall = spawn_box(
        &mut app,
        Vec3::new(1.55, 0.0, 0.0),
        Vec3::new(1.0, 8.0, 5.0),
    );
    let config = CharacterConfig {
        prevent_air_acceleration_against_ungrounded_hits: false,
        ..Default::default()
    };
    let character = spawn_character_with_config(&mut app, Vec3::new(0.0, 0.0, 0.0), config);
    set_move(&mut app, character, Vec2::new(1.0, 0.0));

    run_ticks(&mut app, 0.02, 8);

    let state = body(&app, character);
    assert!(
        state
            .stateful_hits
            .iter()
            .any(|s| s.hit.hit.entity == wall),
        "expected sustained wall contact without the veto"
    );
}

// ==================== Moving platforms ====================

#[test]
fn platform_carries_character() {
    let fixed_dt = 0.1;
    let mut app = create_test_app(fixed_dt);
    let platform = spawn_box(&mut app, Vec3::new(0.0, -1.0, 0.0), Vec3::new(4.0, 1.0, 4.0));
    app.world_mut()
        .entity_mut(platform)
        .insert(SceneBodyMotion::kinematic(Vec3::X * 2.0));
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    for _ in 0..10 {
        // The test is the platform's animator: move it, then simulate.
        app.world_mut()
            .get_mut::<Transform>(platform)
            .unwrap()
            .translation
            .x += 2.0 * fixed_dt as f32;
        tick(&mut app, fixed_dt);
    }

    let state = body(&app, character);
    assert_eq!(state.parent.map(|p| p.entity), Some(platform));
    assert!(
        position(&app, character).x > 1.2,
        "not carried, x = {}",
        position(&app, character).x
    );
    assert!(body(&app, character).is_grounded);
}

#[test]
fn leaving_platform_keeps_its_momentum() {
    let fixed_dt = 0.1;
    let mut app = create_test_app(fixed_dt);
    let platform = spawn_box(&mut app, Vec3::new(0.0, -1.0, 0.0), Vec3::new(4.0, 1.0, 4.0));
    app.world_mut()
        .entity_mut(platform)
        .insert(SceneBodyMotion::kinematic(Vec3::X * 2.0));
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    for _ in 0..10 {
        app.world_mut()
            .get_mut::<Transform>(platform)
            .unwrap()
            .translation
            .x += 2.0 * fixed_dt as f32;
        tick(&mut app, fixed_dt);
    }

    press_jump(&mut app, character);
    app.world_mut()
        .get_mut::<Transform>(platform)
        .unwrap()
        .translation
        .x += 2.0 * fixed_dt as f32;
    tick(&mut app, fixed_dt);

    let state = body(&app, character);
    assert!(state.parent.is_none());
    // Platform velocity was folded back in at separation.
    assert!(
        (state.relative_velocity.x - 2.0).abs() < 0.3,
        "lost platform momentum, vx = {}",
        state.relative_velocity.x
    );
    assert!(state.relative_velocity.y > 9.0);
}

#[test]
fn grounded_character_pushes_dynamic_body() {
    let fixed_dt = 0.1;
    let mut app = create_test_app(fixed_dt);
    let raft = spawn_box(&mut app, Vec3::new(0.0, -1.0, 0.0), Vec3::new(4.0, 1.0, 4.0));
    app.world_mut()
        .entity_mut(raft)
        .insert(SceneBodyMotion::dynamic(10.0));
    spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    tick(&mut app, fixed_dt);

    // Weight impulse: gravity (-25) * mass (1) * dt (0.1) / raft mass (10).
    let motion = app.world().get::<SceneBodyMotion>(raft).unwrap();
    assert!(
        (motion.linear_velocity.y + 0.25).abs() < 1e-3,
        "raft vy = {}",
        motion.linear_velocity.y
    );
}

// ==================== Stateful hits ====================

#[test]
fn landing_produces_enter_then_stay_hits() {
    let mut app = create_test_app(0.02);
    let floor = spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, 2.0, 0.0));

    // Fall until the floor is touched.
    let mut landed_tick = None;
    for i in 0..100 {
        tick(&mut app, 0.02);
        if body(&app, character).is_grounded {
            landed_tick = Some(i);
            break;
        }
    }
    assert!(landed_tick.is_some(), "never landed");

    let state = body(&app, character);
    assert!(state
        .stateful_hits
        .iter()
        .any(|s| s.hit.hit.entity == floor && s.phase == HitPhase::Enter));

    tick(&mut app, 0.02);
    let state = body(&app, character);
    assert!(state
        .stateful_hits
        .iter()
        .any(|s| s.hit.hit.entity == floor && s.phase == HitPhase::Stay));
}

#[test]
fn jumping_produces_exit_hit() {
    let mut app = create_test_app(0.1);
    let floor = spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));

    run_ticks(&mut app, 0.1, 2);
    press_jump(&mut app, character);
    tick(&mut app, 0.1);
    // Jump tick still probed the floor; the tick after is airborne.
    tick(&mut app, 0.1);

    let state = body(&app, character);
    assert!(state
        .stateful_hits
        .iter()
        .any(|s| s.hit.hit.entity == floor && s.phase == HitPhase::Exit));
}

// ==================== Visual rotation ====================

#[test]
fn character_turns_toward_move_direction() {
    let mut app = create_test_app(0.02);
    spawn_floor(&mut app);
    let character = spawn_character(&mut app, Vec3::new(0.0, REST_HEIGHT, 0.0));
    set_move(&mut app, character, Vec2::new(1.0, 0.0));

    run_ticks(&mut app, 0.02, 120);

    let rotation = app.world().get::<Transform>(character).unwrap().rotation;
    let forward = rotation * Vec3::NEG_Z;
    assert!(
        forward.dot(Vec3::X) > 0.95,
        "not facing move direction, forward = {forward}"
    );
}
