//! Primitive-scene collision backend.
//!
//! A brush-based collision world over parry3d primitive shapes: each brush is
//! keyed by the entity that owns it and poses are read live from that entity's
//! `Transform`, so moving platforms work without any extra bookkeeping. This
//! is the reference [`CollisionBackend`] used by the integration tests and by
//! headless embeddings; engine-backed worlds implement the same trait.
//!
//! Enable with the `primitive-scene` feature (on by default).

use bevy::prelude::*;
use nalgebra::{Quaternion, Translation3, UnitQuaternion};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::query::{self, ShapeCastOptions};
use parry3d::shape::{Ball, Capsule, Shape, SharedShape};

use crate::backend::{CapsuleGeometry, CastHit, CollisionBackend, OverlapHit};
use crate::collector::ClosestHitCollector;

/// One piece of collision geometry, owned by an entity.
struct SceneBrush {
    entity: Entity,
    shape: SharedShape,
    collidable: bool,
}

/// The collision scene: all brushes queryable by casts.
///
/// Brush poses come from the owning entity's `Transform` at query time (the
/// simulation pose), or from an explicitly substituted pose for interpolated
/// re-casts.
#[derive(Resource, Default)]
pub struct CollisionScene {
    brushes: Vec<SceneBrush>,
}

impl CollisionScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a box brush owned by `entity`.
    pub fn add_box(&mut self, entity: Entity, half_extents: Vec3) {
        self.brushes.push(SceneBrush {
            entity,
            shape: SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            collidable: true,
        });
    }

    /// Add a non-collidable (trigger/sensor) box brush owned by `entity`.
    ///
    /// Sensor brushes are reported to collectors but rejected by the
    /// collidable-material filter.
    pub fn add_sensor_box(&mut self, entity: Entity, half_extents: Vec3) {
        self.brushes.push(SceneBrush {
            entity,
            shape: SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
            collidable: false,
        });
    }

    /// Add a ball brush owned by `entity`.
    pub fn add_ball(&mut self, entity: Entity, radius: f32) {
        self.brushes.push(SceneBrush {
            entity,
            shape: SharedShape::ball(radius),
            collidable: true,
        });
    }

    /// Add a vertical capsule brush owned by `entity`.
    pub fn add_capsule(&mut self, entity: Entity, radius: f32, half_segment: f32) {
        self.brushes.push(SceneBrush {
            entity,
            shape: capsule_shape(CapsuleGeometry {
                radius,
                half_segment,
            }),
            collidable: true,
        });
    }

    /// Remove all brushes owned by `entity`.
    pub fn remove(&mut self, entity: Entity) {
        self.brushes.retain(|brush| brush.entity != entity);
    }

    /// Number of brushes in the scene.
    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }
}

/// Motion state of a scene body.
///
/// Present on entities whose brushes move: kinematic platforms (`mass: None`)
/// and dynamic bodies (`mass: Some`). The character update uses it for
/// platform tracking, momentum transfer and ground pushing.
#[derive(Component, Debug, Clone, Copy)]
pub struct SceneBodyMotion {
    /// Linear velocity of the body.
    pub linear_velocity: Vec3,
    /// Angular velocity of the body (axis * radians/second).
    pub angular_velocity: Vec3,
    /// Mass for dynamic bodies; `None` marks a kinematic body.
    pub mass: Option<f32>,
}

impl SceneBodyMotion {
    /// A kinematic (infinite-mass) moving body, e.g. an animated platform.
    pub fn kinematic(linear_velocity: Vec3) -> Self {
        Self {
            linear_velocity,
            angular_velocity: Vec3::ZERO,
            mass: None,
        }
    }

    /// A dynamic body of the given mass.
    pub fn dynamic(mass: f32) -> Self {
        Self {
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: Some(mass),
        }
    }

    /// Builder: set angular velocity.
    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }
}

/// Collision backend over [`CollisionScene`].
pub struct PrimitiveSceneBackend;

/// Plugin installing the collision scene resource.
pub struct PrimitiveScenePlugin;

impl Plugin for PrimitiveScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionScene>();
    }
}

fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::from_quaternion(Quaternion::new(
            rotation.w, rotation.x, rotation.y, rotation.z,
        )),
    )
}

fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

fn point_to_vec3(p: Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

fn capsule_shape(capsule: CapsuleGeometry) -> SharedShape {
    SharedShape::new(Capsule::new(
        Point::new(0.0, -capsule.half_segment, 0.0),
        Point::new(0.0, capsule.half_segment, 0.0),
        capsule.radius,
    ))
}

/// Sweep `shape` against the scene's brushes, feeding every candidate to the
/// collector. When `only` is set, all other brushes are skipped and the given
/// pose is substituted for the entity's transform.
fn cast_against_brushes(
    world: &World,
    shape: &dyn Shape,
    pose: &Isometry<Real>,
    direction: Vec3,
    max_distance: f32,
    collector: &mut ClosestHitCollector<'_>,
    only: Option<(Entity, (Vec3, Quat))>,
) {
    if max_distance <= 0.0 {
        return;
    }
    let direction = direction.normalize_or_zero();
    if direction == Vec3::ZERO {
        return;
    }

    let Some(scene) = world.get_resource::<CollisionScene>() else {
        return;
    };

    let velocity = to_vector(direction);
    let zero_velocity = to_vector(Vec3::ZERO);
    let options = ShapeCastOptions {
        max_time_of_impact: max_distance,
        stop_at_penetration: true,
        compute_impact_geometry_on_penetration: true,
        ..Default::default()
    };

    for brush in &scene.brushes {
        let brush_pose = match only {
            Some((entity, (position, rotation))) => {
                if brush.entity != entity {
                    continue;
                }
                to_isometry(position, rotation)
            }
            None => {
                let Some(transform) = world.get::<Transform>(brush.entity) else {
                    continue;
                };
                to_isometry(transform.translation, transform.rotation)
            }
        };

        let result = query::cast_shapes(
            pose,
            &velocity,
            shape,
            &brush_pose,
            &zero_velocity,
            brush.shape.as_ref(),
            options,
        );
        let Ok(Some(hit)) = result else {
            continue;
        };
        if hit.time_of_impact > max_distance {
            continue;
        }

        // Witness point and normal are reported in the struck shape's local
        // space; bring them into world space through the brush pose.
        let local_normal = Vector::new(hit.normal2.x, hit.normal2.y, hit.normal2.z);
        let world_normal = brush_pose.rotation * local_normal;
        let normal = Vec3::new(world_normal.x, world_normal.y, world_normal.z);
        let point = point_to_vec3(brush_pose.transform_point(&hit.witness2));

        collector.add_hit(CastHit {
            entity: brush.entity,
            point,
            normal,
            fraction: hit.time_of_impact / max_distance,
            distance: hit.time_of_impact,
            collidable: brush.collidable,
        });
    }
}

impl CollisionBackend for PrimitiveSceneBackend {
    fn plugin() -> impl Plugin {
        PrimitiveScenePlugin
    }

    fn cast_sphere(
        world: &World,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        collector: &mut ClosestHitCollector<'_>,
    ) {
        let shape = Ball::new(radius);
        let pose = to_isometry(origin, Quat::IDENTITY);
        cast_against_brushes(world, &shape, &pose, direction, max_distance, collector, None);
    }

    fn cast_sphere_against(
        world: &World,
        body: Entity,
        pose: (Vec3, Quat),
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        collector: &mut ClosestHitCollector<'_>,
    ) {
        let shape = Ball::new(radius);
        let cast_pose = to_isometry(origin, Quat::IDENTITY);
        cast_against_brushes(
            world,
            &shape,
            &cast_pose,
            direction,
            max_distance,
            collector,
            Some((body, pose)),
        );
    }

    fn cast_capsule(
        world: &World,
        capsule: CapsuleGeometry,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
        collector: &mut ClosestHitCollector<'_>,
    ) {
        let shape = Capsule::new(
            Point::new(0.0, -capsule.half_segment, 0.0),
            Point::new(0.0, capsule.half_segment, 0.0),
            capsule.radius,
        );
        let pose = to_isometry(position, rotation);
        cast_against_brushes(world, &shape, &pose, direction, max_distance, collector, None);
    }

    fn overlaps_capsule(
        world: &World,
        capsule: CapsuleGeometry,
        position: Vec3,
        rotation: Quat,
        exclude: Option<Entity>,
        overlaps: &mut Vec<OverlapHit>,
    ) {
        let Some(scene) = world.get_resource::<CollisionScene>() else {
            return;
        };
        let shape = Capsule::new(
            Point::new(0.0, -capsule.half_segment, 0.0),
            Point::new(0.0, capsule.half_segment, 0.0),
            capsule.radius,
        );
        let pose = to_isometry(position, rotation);

        for brush in &scene.brushes {
            if exclude == Some(brush.entity) {
                continue;
            }
            let Some(transform) = world.get::<Transform>(brush.entity) else {
                continue;
            };
            let brush_pose = to_isometry(transform.translation, transform.rotation);

            let result = query::contact(&pose, &shape, &brush_pose, brush.shape.as_ref(), 0.0);
            let Ok(Some(contact)) = result else {
                continue;
            };
            if contact.dist >= 0.0 {
                continue;
            }

            overlaps.push(OverlapHit {
                entity: brush.entity,
                normal: Vec3::new(contact.normal2.x, contact.normal2.y, contact.normal2.z),
                depth: -contact.dist,
                collidable: brush.collidable,
            });
        }
    }

    fn body_pose(world: &World, entity: Entity) -> Option<(Vec3, Quat)> {
        world
            .get::<Transform>(entity)
            .map(|transform| (transform.translation, transform.rotation))
    }

    fn velocity_at_point(world: &World, entity: Entity, point: Vec3) -> Option<Vec3> {
        let motion = world.get::<SceneBodyMotion>(entity)?;
        let center = world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .unwrap_or(point);
        Some(motion.linear_velocity + motion.angular_velocity.cross(point - center))
    }

    fn body_mass(world: &World, entity: Entity) -> Option<f32> {
        world.get::<SceneBodyMotion>(entity).and_then(|m| m.mass)
    }

    fn is_moving_body(world: &World, entity: Entity) -> bool {
        world.get::<SceneBodyMotion>(entity).is_some()
    }

    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, _point: Vec3) {
        if let Some(mut motion) = world.get_mut::<SceneBodyMotion>(entity) {
            if let Some(mass) = motion.mass {
                if mass > 0.0 {
                    motion.linear_velocity += impulse / mass;
                }
            }
        }
    }
}
