use kinematic_actor::math::Vec3;
use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
};

/// Broad-phase accelerator over the static colliders of a world.
///
/// Notes:
/// - Bounded statics are stored as world-space AABBs in a BVH. `bounded` maps each BVH leaf back to
///   its collider index.
/// - Unbounded statics (planes) cannot live in the BVH; they are candidates of every query.
/// - Colliders attached to bodies move every step and are scanned linearly by the world.
pub struct StaticAccel {
    bvh: Bvh,
    bounded: Vec<usize>,
    unbounded: Vec<usize>,
}

impl StaticAccel {
    /// Build from `(collider index, world AABB)` pairs; `None` marks an unbounded collider.
    pub fn build(entries: &[(usize, Option<Aabb>)]) -> Self {
        let mut aabbs: Vec<Aabb> = Vec::new();
        let mut bounded = Vec::new();
        let mut unbounded = Vec::new();

        for (index, aabb) in entries {
            match aabb {
                Some(aabb) => {
                    aabbs.push(*aabb);
                    bounded.push(*index);
                }
                None => unbounded.push(*index),
            }
        }

        Self {
            bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs),
            bounded,
            unbounded,
        }
    }

    /// Number of static colliders indexed, bounded or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.bounded.len() + self.unbounded.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the indices of statics whose AABB intersects `query`, plus every unbounded static.
    pub fn candidates(&self, query: &Aabb, out: &mut Vec<usize>) {
        out.extend_from_slice(&self.unbounded);
        out.extend(
            self.bvh
                .intersect_aabb(query)
                .map(|leaf| self.bounded[leaf as usize]),
        );
    }
}

/// AABB covering `aabb` swept along `displacement`, inflated by `margin`.
pub fn swept_aabb(aabb: &Aabb, displacement: Vec3, margin: f32) -> Aabb {
    let moved = Aabb {
        mins: aabb.mins + displacement,
        maxs: aabb.maxs + displacement,
    };
    inflate(&union(aabb, &moved), margin)
}

/// AABB of the segment from `a` to `b`, inflated by `margin`.
pub fn segment_aabb(a: Vec3, b: Vec3, margin: f32) -> Aabb {
    let aabb = Aabb {
        mins: na::Point3::from(a.inf(&b)),
        maxs: na::Point3::from(a.sup(&b)),
    };
    inflate(&aabb, margin)
}

/// Inflate an AABB by `margin` on all sides.
pub fn inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = Vec3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

/// Compute the union of two AABBs.
fn union(a: &Aabb, b: &Aabb) -> Aabb {
    Aabb {
        mins: a.mins.inf(&b.mins),
        maxs: a.maxs.sup(&b.maxs),
    }
}
