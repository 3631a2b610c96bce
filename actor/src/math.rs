/*!
Vector helpers used by the solver.

All angles exchanged through this module are in degrees. Directions passed in are not required
to be normalized unless stated otherwise; degenerate inputs fall back to zero vectors instead of
producing NaNs.
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Squared length below which a vector is treated as zero.
pub const ZERO_SQ: f32 = 1.0e-12;

/// Angle between two vectors in degrees, in `[0, 180]`.
///
/// Returns 0 when either vector is degenerate.
#[inline]
pub fn angle_deg(a: &Vec3, b: &Vec3) -> f32 {
    let denom = (a.norm_squared() * b.norm_squared()).sqrt();
    if denom < 1.0e-15 {
        return 0.0;
    }
    let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

#[inline]
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > ZERO_SQ {
        v / len_sq.sqrt()
    } else {
        Vec3::zeros()
    }
}

#[inline]
pub fn is_zero(v: &Vec3) -> bool {
    v.norm_squared() <= ZERO_SQ
}

#[inline]
pub fn is_finite(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// Component of `v` along `onto`.
#[inline]
pub fn project(v: Vec3, onto: Vec3) -> Vec3 {
    let len_sq = onto.norm_squared();
    if len_sq <= ZERO_SQ {
        return Vec3::zeros();
    }
    onto * (v.dot(&onto) / len_sq)
}

/// `v` with its component along `normal` removed.
#[inline]
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - project(v, normal)
}

/// Redirect `v` onto the surface described by `normal`, keeping its magnitude and its heading
/// as seen from above (`up`).
///
/// Walking into an uphill slope yields an uphill displacement of the same length, instead of the
/// shorter vector a plain plane projection would give. A vector parallel to `up` has no heading
/// and maps to zero.
#[inline]
pub fn project_on_tangent(v: Vec3, normal: Vec3, up: Vec3) -> Vec3 {
    let len = v.norm();
    if len <= 1.0e-6 {
        return Vec3::zeros();
    }
    let right = normalize_or_zero(v.cross(&up));
    if is_zero(&right) {
        return Vec3::zeros();
    }
    normalize_or_zero(normal.cross(&right)) * len
}

/// Keep only the part of `v` running along the crease formed by two planes.
///
/// Used to slide along a wall while staying on the ground plane. Parallel planes have no crease;
/// in that case the vector is projected on `plane`.
#[inline]
pub fn deflect_vector(v: Vec3, ground_normal: Vec3, plane_normal: Vec3) -> Vec3 {
    let dir = normalize_or_zero(ground_normal.cross(&plane_normal));
    if is_zero(&dir) {
        return project_on_plane(v, plane_normal);
    }
    dir * v.dot(&dir)
}

#[inline]
pub fn clamp_magnitude(v: Vec3, max_len: f32) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > max_len * max_len && len_sq > ZERO_SQ {
        v * (max_len / len_sq.sqrt())
    } else {
        v
    }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Angle from `from` to `to` (degrees), negative when the turn is clockwise around `axis`.
#[inline]
pub fn signed_angle_deg(from: &Vec3, to: &Vec3, axis: &Vec3) -> f32 {
    let angle = angle_deg(from, to);
    if axis.dot(&from.cross(to)) < 0.0 { -angle } else { angle }
}

/// Shortest rotation taking direction `from` onto direction `to`.
///
/// Opposite directions have no unique shortest arc; a half turn around any perpendicular axis is
/// returned.
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    if let Some(q) = Quat::rotation_between(&from, &to) {
        return q;
    }
    if is_zero(&from) || is_zero(&to) {
        return Quat::identity();
    }
    let mut axis = from.cross(&Vec3::x());
    if is_zero(&axis) {
        axis = from.cross(&Vec3::z());
    }
    Quat::from_axis_angle(&na::Unit::new_normalize(axis), std::f32::consts::PI)
}

/// Rotation whose local +Z looks along `forward` and local +Y leans toward `up`.
///
/// Returns `None` when `forward` is degenerate or collinear with `up`.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    if is_zero(&forward) || is_zero(&up) || is_zero(&forward.cross(&up)) {
        return None;
    }
    Some(Quat::face_towards(&forward, &up))
}
