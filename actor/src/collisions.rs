/*!
Body-level casts built on top of a [`ShapeCaster`].

These helpers turn raw hits into [`CollisionInfo`] records: how far the body may move, the slope
of what it touched, and for ground probes the surfaces on both sides of an edge.
*/

use crate::{
    body::BodyGeometry,
    math::{Vec3, angle_deg, is_zero, normalize_or_zero, project_on_plane},
    scene::ShapeCaster,
    settings::{EDGE_RAYS_CAST_DISTANCE, EDGE_RAYS_SEPARATION, MAX_EDGE_ANGLE, MIN_EDGE_ANGLE, SKIN_WIDTH},
    types::{CastFilter, CollisionInfo, EdgeInfo, HitInfo},
};

/// Sweep the whole body (bottom raised by `bottom_offset`) along `displacement`.
///
/// On a hit the allowed displacement stops the shrunk cast capsule one skin short of the contact,
/// which leaves the full-size body touching it.
pub fn cast_body<C: ShapeCaster + ?Sized>(
    caster: &C,
    geometry: &BodyGeometry,
    position: Vec3,
    displacement: Vec3,
    bottom_offset: f32,
    filter: &CastFilter,
) -> CollisionInfo {
    let len = displacement.norm();
    if len <= 1.0e-6 {
        return CollisionInfo::miss(displacement);
    }

    let capsule = geometry.cast_capsule(position, bottom_offset);
    let Some(hit) = caster.cast_capsule(&capsule, displacement, filter) else {
        return CollisionInfo::miss(displacement);
    };

    let dir = displacement / len;
    let slope = angle_deg(&geometry.up, &hit.normal);
    CollisionInfo {
        hit: Some(hit),
        displacement: dir * (hit.distance - SKIN_WIDTH).clamp(0.0, len),
        contact_slope_angle: slope,
        edge: EdgeInfo::flat(hit.normal, slope),
    }
}

/// Look for ground under the feet with the bottom sphere.
///
/// The sphere starts `step_offset` above its resting place, so ground up to that height above the
/// feet is found too, and travels down to `distance` below the feet. The returned displacement
/// moves the feet onto the ground; it points up when the ground is above the feet.
pub fn check_for_ground<C: ShapeCaster + ?Sized>(
    caster: &C,
    geometry: &BodyGeometry,
    position: Vec3,
    step_offset: f32,
    distance: f32,
    filter: &CastFilter,
) -> CollisionInfo {
    let down = -geometry.up;
    let sphere = geometry.bottom_sphere(position, step_offset);
    let cast_distance = step_offset + distance + SKIN_WIDTH;

    let Some(hit) = caster.cast_capsule(&sphere, down * cast_distance, filter) else {
        return CollisionInfo::miss(Vec3::zeros());
    };

    let sphere_center = sphere.bottom + down * hit.distance;
    CollisionInfo {
        hit: Some(hit),
        displacement: down * (hit.distance - step_offset - SKIN_WIDTH),
        contact_slope_angle: angle_deg(&geometry.up, &hit.normal),
        edge: edge_info(caster, &hit, sphere_center, geometry.up, filter),
    }
}

/// Read the ground straight below the bottom sphere center with a ray.
///
/// No edge forgiveness: the raw surface normal is reported.
pub fn check_for_ground_ray<C: ShapeCaster + ?Sized>(
    caster: &C,
    geometry: &BodyGeometry,
    position: Vec3,
    distance: f32,
    filter: &CastFilter,
) -> CollisionInfo {
    let origin = geometry.bottom_center(position, 0.0);
    let radius = geometry.radius();
    let down = -geometry.up;

    let Some(hit) = caster.cast_ray(origin, down, radius + distance + SKIN_WIDTH, filter) else {
        return CollisionInfo::miss(Vec3::zeros());
    };

    let slope = angle_deg(&geometry.up, &hit.normal);
    CollisionInfo {
        hit: Some(hit),
        displacement: down * (hit.distance - radius),
        contact_slope_angle: slope,
        edge: EdgeInfo::flat(hit.normal, slope),
    }
}

/// Whether a body of this geometry fits at `position` without overlapping anything.
pub fn body_fits<C: ShapeCaster + ?Sized>(
    caster: &C,
    geometry: &BodyGeometry,
    position: Vec3,
    filter: &CastFilter,
) -> bool {
    !caster.overlaps_capsule(&geometry.cast_capsule(position, 0.0), filter)
}

/// Probe the surfaces just above and below a ground contact.
///
/// Two rays leave the sphere center toward the contact, shifted a little up and down within the
/// plane spanned by the contact direction and `up`. On a step corner the upper ray lands on the
/// tread and the lower one on the riser. A ray that misses falls back to the contact normal.
fn edge_info<C: ShapeCaster + ?Sized>(
    caster: &C,
    hit: &HitInfo,
    sphere_center: Vec3,
    up: Vec3,
    filter: &CastFilter,
) -> EdgeInfo {
    let slope = angle_deg(&up, &hit.normal);
    let to_contact = hit.point - sphere_center;
    let dist = to_contact.norm();
    if dist <= 1.0e-6 {
        return EdgeInfo::flat(hit.normal, slope);
    }
    let dir = to_contact / dist;

    // Contact straight below the center: nothing to tell apart.
    let lift = normalize_or_zero(project_on_plane(up, dir));
    if is_zero(&lift) {
        return EdgeInfo::flat(hit.normal, slope);
    }

    let max_distance = dist + EDGE_RAYS_CAST_DISTANCE;
    let upper_normal = caster
        .cast_ray(sphere_center + lift * EDGE_RAYS_SEPARATION, dir, max_distance, filter)
        .map_or(hit.normal, |h| h.normal);
    let lower_normal = caster
        .cast_ray(sphere_center - lift * EDGE_RAYS_SEPARATION, dir, max_distance, filter)
        .map_or(hit.normal, |h| h.normal);

    let edge_angle = angle_deg(&upper_normal, &lower_normal);
    EdgeInfo {
        is_edge: (MIN_EDGE_ANGLE..=MAX_EDGE_ANGLE).contains(&edge_angle),
        edge_angle,
        upper_normal,
        lower_normal,
        upper_slope_angle: angle_deg(&up, &upper_normal),
        lower_slope_angle: angle_deg(&up, &lower_normal),
    }
}
