//! Thin wrappers over parry queries between the character capsule and one collider.

use kinematic_actor::{
    Capsule,
    math::{Iso, Vec3},
};
use log::trace;
use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    query::{self, PointQuery, Ray, RayCast, ShapeCastOptions},
    shape::{Shape, SharedShape},
};

/// The character capsule as a parry shape placed in world space.
pub struct CharacterShape {
    shape: SharedShape,
    pose: Iso,
}

impl CharacterShape {
    /// A capsule whose sphere centers coincide becomes a ball.
    pub fn from_capsule(capsule: &Capsule) -> Self {
        let axis = capsule.top - capsule.bottom;
        let shape = if axis.norm_squared() <= 1.0e-12 {
            SharedShape::ball(capsule.radius)
        } else {
            SharedShape::capsule(na::Point3::origin(), na::Point3::from(axis), capsule.radius)
        };
        Self {
            shape,
            pose: Iso::translation(capsule.bottom.x, capsule.bottom.y, capsule.bottom.z),
        }
    }

    pub fn aabb(&self) -> Aabb {
        self.shape.compute_aabb(&self.pose)
    }
}

/// First contact of a cast, in world space.
#[derive(Clone, Copy, Debug)]
pub struct ShapeHit {
    /// Distance along the normalized cast direction.
    pub distance: f32,
    pub point: Vec3,
    /// Outward normal of the hit collider.
    pub normal: Vec3,
}

/// Sweep the character along `displacement` against one collider.
///
/// Colliders the character already overlaps are not reported.
pub fn cast_character(
    character: &CharacterShape,
    displacement: Vec3,
    pose: &Iso,
    shape: &dyn Shape,
) -> Option<ShapeHit> {
    let len = displacement.norm();
    if len <= 1.0e-9 {
        return None;
    }
    if overlaps(character, pose, shape) {
        return None;
    }

    let hit = match query::cast_shapes(
        &character.pose,
        &displacement,
        &*character.shape,
        pose,
        &Vec3::zeros(),
        shape,
        ShapeCastOptions::with_max_time_of_impact(1.0),
    ) {
        Ok(hit) => hit?,
        Err(err) => {
            trace!("unsupported shape cast: {err:?}");
            return None;
        }
    };

    Some(ShapeHit {
        distance: hit.time_of_impact * len,
        point: (pose * hit.witness2).coords,
        normal: pose.rotation * hit.normal2.into_inner(),
    })
}

/// Cast a ray against one collider. Rays starting inside the collider report nothing.
pub fn cast_ray(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    pose: &Iso,
    shape: &dyn Shape,
) -> Option<ShapeHit> {
    let start = na::Point3::from(origin);
    if shape.contains_point(pose, &start) {
        return None;
    }
    let ray = Ray::new(start, direction);
    let hit = shape.cast_ray_and_get_normal(pose, &ray, max_distance, true)?;
    Some(ShapeHit {
        distance: hit.time_of_impact,
        point: ray.point_at(hit.time_of_impact).coords,
        normal: hit.normal,
    })
}

pub fn overlaps(character: &CharacterShape, pose: &Iso, shape: &dyn Shape) -> bool {
    query::intersection_test(&character.pose, &*character.shape, pose, shape).unwrap_or_else(|err| {
        trace!("unsupported intersection test: {err:?}");
        false
    })
}

/// Closest points within `prediction` of the character: `(point on the collider, collider normal)`.
pub fn contact(
    character: &CharacterShape,
    prediction: f32,
    pose: &Iso,
    shape: &dyn Shape,
) -> Option<(Vec3, Vec3)> {
    match query::contact(&character.pose, &*character.shape, pose, shape, prediction) {
        Ok(contact) => contact.map(|c| (c.point2.coords, c.normal2.into_inner())),
        Err(err) => {
            trace!("unsupported contact query: {err:?}");
            None
        }
    }
}
