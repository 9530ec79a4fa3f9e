//! Collision backend abstraction.
//!
//! This module defines the trait a collision/physics world provider must
//! implement for the character body and orbit camera to run against it. The
//! core never owns a physics world; it only issues shape-cast and overlap
//! queries and a handful of rigid-body lookups through this seam, which makes
//! the simulation deterministic and lets different scenes or engines be
//! swapped in.
//!
//! A brush-based implementation over primitive shapes is provided in the
//! `scene` module (feature `primitive-scene`).

use bevy::prelude::*;

use crate::collector::ClosestHitCollector;

/// A single candidate hit produced by a shape cast.
///
/// Backends report *every* candidate along the cast; filtering and
/// closest-selection are the collector's job.
#[derive(Debug, Clone, Copy)]
pub struct CastHit {
    /// Entity owning the struck collider.
    pub entity: Entity,
    /// World-space contact point on the struck surface.
    pub point: Vec3,
    /// World-space surface normal at the contact point.
    pub normal: Vec3,
    /// Fraction along the cast at which the hit occurs, in `[0, 1]`.
    pub fraction: f32,
    /// Distance along the cast at which the hit occurs.
    pub distance: f32,
    /// Whether the struck material is collidable (solid geometry, not a
    /// trigger/sensor volume).
    pub collidable: bool,
}

/// A penetration pair reported by an overlap query.
#[derive(Debug, Clone, Copy)]
pub struct OverlapHit {
    /// Entity owning the overlapping collider.
    pub entity: Entity,
    /// World-space surface normal to push the queried shape out along.
    pub normal: Vec3,
    /// Penetration depth along the normal.
    pub depth: f32,
    /// Whether the overlapping material is collidable.
    pub collidable: bool,
}

/// Capsule volume swept for the character body, aligned to its local up axis.
#[derive(Debug, Clone, Copy)]
pub struct CapsuleGeometry {
    /// Radius of the capsule.
    pub radius: f32,
    /// Half the distance between the two hemisphere centers.
    pub half_segment: f32,
}

/// Trait for collision world providers.
///
/// All cast methods must feed **every** candidate hit to the supplied
/// collector rather than early-exiting on the first one: the collector needs
/// the complete candidate stream to select the true closest valid hit, and
/// determinism requires the same candidate order for the same world state.
pub trait CollisionBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Sweep a sphere through the world.
    ///
    /// # Arguments
    /// * `origin` - Sphere center at the start of the cast
    /// * `radius` - Sphere radius
    /// * `direction` - Cast direction (should be normalized)
    /// * `max_distance` - Maximum cast distance
    /// * `collector` - Receives every candidate hit
    fn cast_sphere(
        world: &World,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        collector: &mut ClosestHitCollector<'_>,
    );

    /// Sweep a sphere against a single body with a substituted world pose.
    ///
    /// Used to re-run an obstruction query against a body's interpolated
    /// (presentation) transform instead of its simulation transform.
    #[allow(clippy::too_many_arguments)]
    fn cast_sphere_against(
        world: &World,
        body: Entity,
        pose: (Vec3, Quat),
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        collector: &mut ClosestHitCollector<'_>,
    );

    /// Sweep a character capsule through the world.
    ///
    /// # Arguments
    /// * `capsule` - Capsule dimensions
    /// * `position` - Capsule center at the start of the cast
    /// * `rotation` - Capsule orientation (segment along its local `+Y`)
    /// * `direction` - Cast direction (should be normalized)
    /// * `max_distance` - Maximum cast distance
    /// * `collector` - Receives every candidate hit
    #[allow(clippy::too_many_arguments)]
    fn cast_capsule(
        world: &World,
        capsule: CapsuleGeometry,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
        collector: &mut ClosestHitCollector<'_>,
    );

    /// Collect all penetrations of a character capsule at a fixed pose.
    fn overlaps_capsule(
        world: &World,
        capsule: CapsuleGeometry,
        position: Vec3,
        rotation: Quat,
        exclude: Option<Entity>,
        overlaps: &mut Vec<OverlapHit>,
    );

    /// World position and rotation of a body, if it exists.
    fn body_pose(world: &World, entity: Entity) -> Option<(Vec3, Quat)>;

    /// Velocity of a body at a world-space point (includes angular
    /// contribution). `None` for bodies without motion state.
    fn velocity_at_point(world: &World, entity: Entity, point: Vec3) -> Option<Vec3>;

    /// Mass of a dynamic body. `None` for static or kinematic bodies.
    fn body_mass(world: &World, entity: Entity) -> Option<f32>;

    /// Whether the body moves (kinematic platform or dynamic body), i.e.
    /// whether it is worth tracking as a support parent.
    fn is_moving_body(world: &World, entity: Entity) -> bool;

    /// Apply an impulse to a dynamic body at a world-space point.
    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, point: Vec3);
}
