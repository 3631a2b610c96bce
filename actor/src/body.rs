/*!
Body geometry: where the characteristic points of the capsule are for a given foot position.

The actor position is the bottom-most point of the body (its feet). Everything else is derived
from it, the body size and the up direction. A body whose height is below its width collapses to a
sphere: both capsule centers meet at the bottom center.
*/

use serde::{Deserialize, Serialize};

use crate::{
    math::{Vec3, lerp},
    settings::{SIZE_SNAP_EPSILON, SKIN_WIDTH, SizeReference},
    types::Capsule,
};

/// Width (twice the radius) and height of the capsule, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySize {
    pub width: f32,
    pub height: f32,
}

impl BodySize {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.width * 0.5
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    #[inline]
    pub fn lerp(&self, target: BodySize, t: f32) -> BodySize {
        BodySize::new(
            lerp(self.width, target.width, t),
            lerp(self.height, target.height, t),
        )
    }

    #[inline]
    fn is_close_to(&self, other: &BodySize) -> bool {
        (self.width - other.width).abs() < SIZE_SNAP_EPSILON
            && (self.height - other.height).abs() < SIZE_SNAP_EPSILON
    }
}

/// One step of the size interpolation toward `target`.
///
/// A non-positive `lerp_speed` applies the target immediately. Sizes that land within
/// `SIZE_SNAP_EPSILON` of the target snap onto it, so the interpolation always terminates.
pub fn next_size(current: BodySize, target: BodySize, lerp_speed: f32, dt: f32) -> BodySize {
    if lerp_speed <= 0.0 {
        return target;
    }
    let next = current.lerp(target, (lerp_speed * dt).clamp(0.0, 1.0));
    if next.is_close_to(&target) {
        target
    } else {
        next
    }
}

/// Signed shift along up that keeps the reference point of the body in place while its height
/// goes from `previous_height` to `new_height`.
#[inline]
pub fn anchor_shift(reference: SizeReference, previous_height: f32, new_height: f32) -> f32 {
    let delta = previous_height - new_height;
    match reference {
        SizeReference::Top => delta,
        SizeReference::Center => delta * 0.5,
        SizeReference::Bottom => 0.0,
    }
}

/// A body size together with the up direction it is measured along.
#[derive(Clone, Copy, Debug)]
pub struct BodyGeometry {
    pub size: BodySize,
    /// Unit up direction of the character.
    pub up: Vec3,
}

impl BodyGeometry {
    #[inline]
    pub fn new(size: BodySize, up: Vec3) -> Self {
        Self { size, up }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.size.radius()
    }

    #[inline]
    pub fn center(&self, position: Vec3) -> Vec3 {
        position + self.up * (self.size.height * 0.5)
    }

    /// Top of the body, pulled in by the skin.
    #[inline]
    pub fn top(&self, position: Vec3) -> Vec3 {
        position + self.up * (self.size.height - SKIN_WIDTH)
    }

    /// Bottom of the body, pushed in by the skin.
    #[inline]
    pub fn bottom(&self, position: Vec3) -> Vec3 {
        position + self.up * SKIN_WIDTH
    }

    /// Center of the top sphere. Never below the bottom sphere center.
    #[inline]
    pub fn top_center(&self, position: Vec3) -> Vec3 {
        let r = self.radius();
        position + self.up * (self.size.height - r).max(r)
    }

    /// Center of the bottom sphere, raised by `bottom_offset`.
    #[inline]
    pub fn bottom_center(&self, position: Vec3, bottom_offset: f32) -> Vec3 {
        position + self.up * (self.radius() + bottom_offset)
    }

    /// How far the bottom of the body is lifted while walking, derived from the step-up distance.
    #[inline]
    pub fn step_offset(&self, step_up_distance: f32) -> f32 {
        (step_up_distance - self.radius()).max(0.0)
    }

    /// The capsule used by sweeps: radius shrunk by the skin, bottom raised by `bottom_offset`.
    ///
    /// When the offset lifts the bottom sphere past the top one, the capsule becomes a sphere
    /// at the top center.
    pub fn cast_capsule(&self, position: Vec3, bottom_offset: f32) -> Capsule {
        self.capsule_with_radius(position, bottom_offset, self.radius() - SKIN_WIDTH)
    }

    /// The full-size capsule, as the collider would be placed.
    pub fn collider_capsule(&self, position: Vec3, bottom_offset: f32) -> Capsule {
        self.capsule_with_radius(position, bottom_offset, self.radius())
    }

    fn capsule_with_radius(&self, position: Vec3, bottom_offset: f32, radius: f32) -> Capsule {
        let top = self.top_center(position);
        let mut bottom = self.bottom_center(position, bottom_offset);
        if (bottom - position).dot(&self.up) > (top - position).dot(&self.up) {
            bottom = top;
        }
        Capsule {
            bottom,
            top,
            radius: radius.max(0.0),
        }
    }

    /// The bottom sphere alone, shrunk by the skin and raised by `bottom_offset`.
    pub fn bottom_sphere(&self, position: Vec3, bottom_offset: f32) -> Capsule {
        let center = self.bottom_center(position, bottom_offset);
        Capsule {
            bottom: center,
            top: center,
            radius: (self.radius() - SKIN_WIDTH).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1.0e-6;

    fn geometry() -> BodyGeometry {
        BodyGeometry::new(BodySize::new(1.0, 2.0), Vec3::y())
    }

    #[test]
    fn characteristic_points_follow_the_feet() {
        let g = geometry();
        let p = Vec3::new(1.0, 2.0, 3.0);

        assert!((g.center(p).y - 3.0).abs() < EPS);
        assert!((g.top(p).y - (4.0 - SKIN_WIDTH)).abs() < EPS);
        assert!((g.bottom(p).y - (2.0 + SKIN_WIDTH)).abs() < EPS);
        assert!((g.top_center(p).y - 3.5).abs() < EPS);
        assert!((g.bottom_center(p, 0.0).y - 2.5).abs() < EPS);
        assert!((g.bottom_center(p, 0.2).y - 2.7).abs() < EPS);
    }

    #[test]
    fn short_body_degenerates_to_a_sphere() {
        let g = BodyGeometry::new(BodySize::new(1.0, 0.6), Vec3::y());
        let c = g.cast_capsule(Vec3::zeros(), 0.0);
        assert!((c.bottom - c.top).norm() < EPS);
        assert!((c.top.y - 0.5).abs() < EPS);
    }

    #[test]
    fn cast_capsule_is_shrunk_by_the_skin() {
        let g = geometry();
        let c = g.cast_capsule(Vec3::zeros(), 0.3);
        assert!((c.radius - (0.5 - SKIN_WIDTH)).abs() < EPS);
        assert!((c.bottom.y - 0.8).abs() < EPS);
        assert!((g.collider_capsule(Vec3::zeros(), 0.0).radius - 0.5).abs() < EPS);
    }

    #[test]
    fn step_offset_never_goes_negative() {
        let g = geometry();
        assert_eq!(g.step_offset(0.3), 0.0);
        let narrow = BodyGeometry::new(BodySize::new(0.6, 1.8), Vec3::y());
        assert!((narrow.step_offset(0.5) - 0.2).abs() < EPS);
    }

    #[test]
    fn size_interpolation_snaps_to_target() {
        let mut size = BodySize::new(1.0, 2.0);
        let target = BodySize::new(1.0, 1.0);
        for _ in 0..200 {
            size = next_size(size, target, 8.0, 1.0 / 60.0);
        }
        assert_eq!(size, target);
        assert_eq!(next_size(BodySize::new(1.0, 2.0), target, 0.0, 0.1), target);
    }

    #[test]
    fn anchor_shift_is_signed() {
        assert!((anchor_shift(SizeReference::Top, 2.0, 1.0) - 1.0).abs() < EPS);
        assert!((anchor_shift(SizeReference::Top, 1.0, 2.0) + 1.0).abs() < EPS);
        assert!((anchor_shift(SizeReference::Center, 2.0, 1.0) - 0.5).abs() < EPS);
        assert_eq!(anchor_shift(SizeReference::Bottom, 2.0, 1.0), 0.0);
    }
}
