//! Closest-hit selection for shape casts.
//!
//! Backends stream every candidate hit of a cast into a collector; the
//! collector filters out the caster itself, back-facing surfaces,
//! non-collidable materials and ignored entities, and keeps the closest
//! remaining hit by fraction. It never stops a cast early: the full candidate
//! stream must be scanned so the true closest valid hit is found, and the
//! result is deterministic for a given candidate order.

use bevy::prelude::*;

use crate::backend::CastHit;

/// Collects candidate hits from a shape cast and retains the closest valid one.
pub struct ClosestHitCollector<'a> {
    /// Entity performing the cast, excluded from results.
    exclude: Option<Entity>,
    /// Entities excluded from this cast (followed character attachments and
    /// the like). Scanned linearly; these lists are small.
    ignored: &'a [Entity],
    /// Direction of the cast, used for back-face rejection.
    cast_direction: Vec3,
    /// Number of valid hits seen so far.
    num_hits: u32,
    /// Closest valid hit seen so far.
    closest: Option<CastHit>,
    closest_fraction: f32,
}

impl<'a> ClosestHitCollector<'a> {
    /// Create a collector for a cast along `cast_direction`.
    pub fn new(exclude: Option<Entity>, ignored: &'a [Entity], cast_direction: Vec3) -> Self {
        Self {
            exclude,
            ignored,
            cast_direction,
            num_hits: 0,
            closest: None,
            closest_fraction: f32::MAX,
        }
    }

    /// Offer a candidate hit to the collector.
    ///
    /// Returns `true` if the hit was accepted as valid. A hit is rejected if
    /// it comes from the excluded entity, faces away from the cast (its
    /// surface normal does not oppose the cast direction), is not collidable,
    /// or belongs to an ignored entity.
    pub fn add_hit(&mut self, hit: CastHit) -> bool {
        if self.exclude == Some(hit.entity) {
            return false;
        }

        // Only surfaces opposing the cast direction count; anything else is a
        // back face we are leaving, not an obstruction we are entering.
        if hit.normal.dot(self.cast_direction) >= 0.0 || !hit.collidable {
            return false;
        }

        if self.ignored.contains(&hit.entity) {
            return false;
        }

        if hit.fraction < self.closest_fraction {
            self.closest_fraction = hit.fraction;
            self.closest = Some(hit);
        }
        self.num_hits += 1;

        true
    }

    /// Number of valid hits offered so far.
    #[inline]
    pub fn num_hits(&self) -> u32 {
        self.num_hits
    }

    /// Whether any valid hit was collected.
    #[inline]
    pub fn has_hit(&self) -> bool {
        self.closest.is_some()
    }

    /// The closest valid hit by fraction, if any.
    #[inline]
    pub fn closest_hit(&self) -> Option<&CastHit> {
        self.closest.as_ref()
    }
}
