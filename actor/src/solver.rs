/*!
Collide-and-slide.

Each variant repeatedly casts the body along the remaining displacement, advances to the contact,
and redirects what is left. The variants differ in which part of the body is cast and in how the
remainder is redirected:

- stable: the body bottom is raised by the step offset (small ledges pass under it); walkable
  surfaces redirect the remainder along the slope, walls along the crease with the ground plane.
  A wall whose top is walkable and within the step-up distance is climbed instead.
- post-simulation: same as stable, with its own iteration cap and without pushing. Used to carry
  the character with moving ground.
- unstable: the whole body is cast; up to two slide planes are remembered and the remainder follows
  the first plane, then the crease of both. Climbing steep slopes is speed limited.

Notes
- A zero displacement performs no cast and returns the start position.
- Reaching the iteration cap keeps the displacement applied so far.
- Candidate positions that are not finite are dropped; the last finite position is kept.
*/

use log::{trace, warn};

use crate::{
    body::BodyGeometry,
    collisions::cast_body,
    layers::LayerSettings,
    math::{
        Vec3, angle_deg, clamp_magnitude, deflect_vector, is_finite, is_zero, normalize_or_zero,
        project, project_on_plane, project_on_tangent,
    },
    scene::ShapeCaster,
    settings::{Dimension, MAX_UNSTABLE_UPWARDS_ANGLE, MIN_MOVE_SQ, SKIN_WIDTH, STEP_TREAD_INSET},
    types::{BodyId, CastFilter, CollisionInfo, HitInfo},
};

/// Why a slide stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideEnd {
    /// Nothing to move.
    Idle,
    /// The last cast was clear; the remainder was applied in full.
    Clear,
    /// Passed through a one-way platform.
    OneWayPlatform,
    /// Hit a pushable dynamic body; the simulation resolves the push.
    Pushable,
    /// Hit a wall with wall sliding unavailable.
    Blocked,
    /// The remainder was consumed by slides.
    Consumed,
    /// The iteration cap was reached.
    Exhausted,
}

#[derive(Clone, Copy, Debug)]
pub struct SlideOutcome {
    pub position: Vec3,
    pub end: SlideEnd,
    /// Number of casts performed.
    pub casts: u32,
    /// Whether any cast hit something.
    pub collided: bool,
    /// Grounded slides only: the body climbed onto a ledge.
    pub stepped: bool,
    /// Unstable slides only: a one-way platform was touched from above.
    pub valid_one_way_platform: bool,
}

impl SlideOutcome {
    fn idle(position: Vec3) -> Self {
        Self {
            position,
            end: SlideEnd::Idle,
            casts: 0,
            collided: false,
            stepped: false,
            valid_one_way_platform: false,
        }
    }
}

/// Everything a slide needs to know about the character and its world.
pub struct SlideContext<'a, C: ShapeCaster + ?Sized> {
    pub caster: &'a C,
    pub geometry: BodyGeometry,
    pub layers: LayerSettings,
    pub slope_limit: f32,
    pub step_offset: f32,
    /// Highest ledge (above the feet) a walking slide climbs.
    pub step_up_distance: f32,
    pub slide_on_walls: bool,
    pub dimension: Dimension,
    pub can_push_dynamic_bodies: bool,
    /// Body the character stands on; it is never pushed.
    pub ground_body: Option<BodyId>,
    /// Whether the character currently touches a wall.
    pub wall_contact: bool,
}

/// Inputs specific to airborne slides.
#[derive(Clone, Copy, Debug)]
pub struct UnstableSlide {
    pub was_grounded: bool,
    pub dt: f32,
    pub max_upwards_velocity: f32,
    /// Full arc (degrees) around up in which one-way platform contacts are solid.
    pub one_way_valid_arc: f32,
}

impl<C: ShapeCaster + ?Sized> SlideContext<'_, C> {
    fn filter(&self) -> CastFilter {
        CastFilter::solid(self.layers.obstacles()).keeping_ignored(self.layers.one_way_platforms)
    }

    fn is_pushable(&self, info: &CollisionInfo) -> bool {
        let Some(hit) = info.hit else {
            return false;
        };
        self.can_push_dynamic_bodies
            && hit.is_dynamic_rigidbody()
            && self.layers.is_pushable(hit.layer)
            && hit.body_id() != self.ground_body
    }

    fn is_wall(&self, info: &CollisionInfo) -> bool {
        let Some(hit) = info.hit else {
            return false;
        };
        info.contact_slope_angle > self.slope_limit || !self.layers.is_stable(hit.layer)
    }

    /// Whether a one-way platform contact lies inside the valid arc below the bottom sphere.
    fn is_valid_one_way_contact(&self, contact: Vec3, position: Vec3, arc: f32) -> bool {
        let to_bottom = self.geometry.bottom_center(position, 0.0) - contact;
        angle_deg(&self.geometry.up, &to_bottom) <= 0.5 * arc
    }
}

/// The flavours of grounded slides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GroundedPass {
    /// Walking: raised bottom, ledges climbed, pushable bodies respected.
    Walk,
    /// Walking with the whole body: ledges block.
    FullBody,
    /// Carried by moving ground: raised bottom, no climbing, no pushing.
    FollowGround,
}

/// Stable slide along the ground.
///
/// `ground_normal` seeds the ground plane used to build wall creases. With `use_full_body` the
/// bottom of the body is not raised and ledges are not climbed, so they block instead.
pub fn stable_collide_and_slide<C: ShapeCaster + ?Sized>(
    ctx: &SlideContext<'_, C>,
    position: Vec3,
    displacement: Vec3,
    ground_normal: Vec3,
    use_full_body: bool,
    max_iterations: u32,
) -> SlideOutcome {
    let pass = if use_full_body { GroundedPass::FullBody } else { GroundedPass::Walk };
    grounded_slide(ctx, position, displacement, ground_normal, pass, max_iterations)
}

/// Slide used to follow moving ground after the simulation.
pub fn post_simulation_collide_and_slide<C: ShapeCaster + ?Sized>(
    ctx: &SlideContext<'_, C>,
    position: Vec3,
    displacement: Vec3,
    ground_normal: Vec3,
    max_iterations: u32,
) -> SlideOutcome {
    grounded_slide(
        ctx,
        position,
        displacement,
        ground_normal,
        GroundedPass::FollowGround,
        max_iterations,
    )
}

fn grounded_slide<C: ShapeCaster + ?Sized>(
    ctx: &SlideContext<'_, C>,
    position: Vec3,
    displacement: Vec3,
    ground_normal: Vec3,
    pass: GroundedPass,
    max_iterations: u32,
) -> SlideOutcome {
    if displacement.norm_squared() <= MIN_MOVE_SQ {
        return SlideOutcome::idle(position);
    }

    let bottom_offset = match pass {
        GroundedPass::FullBody => 0.0,
        GroundedPass::Walk | GroundedPass::FollowGround => ctx.step_offset,
    };
    let filter = ctx.filter();
    let mut out = SlideOutcome {
        end: SlideEnd::Exhausted,
        ..SlideOutcome::idle(position)
    };
    let mut remaining = displacement;
    let mut ground_plane = ground_normal;
    let mut sliding_plane: Option<Vec3> = None;

    for _ in 0..max_iterations {
        out.casts += 1;
        let info = cast_body(
            ctx.caster,
            &ctx.geometry,
            out.position,
            remaining,
            bottom_offset,
            &filter,
        );

        let Some(hit) = info.hit else {
            commit(&mut out.position, remaining);
            out.end = SlideEnd::Clear;
            break;
        };
        out.collided = true;

        if ctx.layers.is_one_way_platform(hit.layer) {
            commit(&mut out.position, remaining);
            out.end = SlideEnd::OneWayPlatform;
            break;
        }

        if pass != GroundedPass::FollowGround && ctx.is_pushable(&info) {
            commit(&mut out.position, remaining);
            out.end = SlideEnd::Pushable;
            break;
        }

        if pass == GroundedPass::Walk && ctx.is_wall(&info) {
            let contact = out.position + info.displacement;
            let rest = remaining - info.displacement;
            if let Some(step) = step_up(ctx, &filter, contact, rest, &hit) {
                trace!("stepped onto {:?}, landing at {:?}", hit.collider, step.landing);
                let delta = step.landing - out.position;
                commit(&mut out.position, delta);
                out.stepped = true;
                remaining = project_on_plane(rest, ctx.geometry.up) - step.advance;
                if remaining.norm_squared() <= MIN_MOVE_SQ {
                    out.end = SlideEnd::Consumed;
                    break;
                }
                continue;
            }
        }

        if ctx.slide_on_walls && ctx.dimension == Dimension::Three {
            commit(&mut out.position, info.displacement);
            remaining -= info.displacement;
            remaining = redirect(ctx, &info, remaining, &mut ground_plane, &mut sliding_plane);
            trace!(
                "slide hit {:?} at {:.1} deg, remaining {:?}",
                hit.collider, info.contact_slope_angle, remaining
            );
            if remaining.norm_squared() <= MIN_MOVE_SQ {
                out.end = SlideEnd::Consumed;
                break;
            }
        } else {
            if !ctx.wall_contact {
                commit(&mut out.position, info.displacement);
            }
            out.end = SlideEnd::Blocked;
            break;
        }
    }
    out
}

/// Redirect the remaining displacement after a grounded hit.
///
/// Walkable surfaces become the new ground plane and the remainder follows them. Walls deflect
/// the remainder along their crease with the ground plane, unless the character is wedged
/// between two walls facing each other.
fn redirect<C: ShapeCaster + ?Sized>(
    ctx: &SlideContext<'_, C>,
    info: &CollisionInfo,
    remaining: Vec3,
    ground_plane: &mut Vec3,
    sliding_plane: &mut Option<Vec3>,
) -> Vec3 {
    let Some(hit) = info.hit else {
        return remaining;
    };
    let normal = hit.normal;

    if ctx.is_wall(info) {
        let redirected = match *sliding_plane {
            Some(previous) if normal.dot(&previous) <= 0.0 => Vec3::zeros(),
            _ => deflect_vector(remaining, *ground_plane, normal),
        };
        *sliding_plane = Some(normal);
        redirected
    } else {
        *ground_plane = normal;
        *sliding_plane = None;
        project_on_tangent(remaining, normal, ctx.geometry.up)
    }
}

struct Step {
    landing: Vec3,
    /// Displacement covered on top of the ledge, perpendicular to up.
    advance: Vec3,
}

/// Climb onto the ledge behind a blocking contact.
///
/// A ray dropped just past the contact must find a walkable tread no higher than the step-up
/// distance above `position`. The body is then lifted, moved along the part of `remaining`
/// perpendicular to up and lowered again. Fails when a ceiling or another obstacle is in the way.
fn step_up<C: ShapeCaster + ?Sized>(
    ctx: &SlideContext<'_, C>,
    filter: &CastFilter,
    position: Vec3,
    remaining: Vec3,
    hit: &HitInfo,
) -> Option<Step> {
    let up = ctx.geometry.up;
    let forward = project_on_plane(remaining, up);
    let into_ledge = normalize_or_zero(project_on_plane(-hit.normal, up));
    if is_zero(&forward) || is_zero(&into_ledge) {
        return None;
    }

    let height = (hit.point - position).dot(&up);
    if height <= 0.0 || height > ctx.step_up_distance {
        return None;
    }

    // Starts step_up_distance above the feet; rays starting inside the obstacle report nothing.
    let origin = hit.point + into_ledge * STEP_TREAD_INSET + up * (ctx.step_up_distance - height);
    let tread = ctx.caster.cast_ray(origin, -up, ctx.step_up_distance, filter)?;
    if angle_deg(&up, &tread.normal) > ctx.slope_limit || !ctx.layers.is_stable(tread.layer) {
        return None;
    }
    let rise = ctx.step_up_distance - tread.distance;
    if rise <= SKIN_WIDTH {
        return None;
    }

    let lift = cast_body(ctx.caster, &ctx.geometry, position, up * ctx.step_up_distance, 0.0, filter);
    let lifted = lift.displacement.dot(&up);
    if lifted < rise {
        return None;
    }
    let raised = position + lift.displacement;

    let advance = cast_body(ctx.caster, &ctx.geometry, raised, forward, 0.0, filter).displacement;
    if advance.norm_squared() <= MIN_MOVE_SQ {
        return None;
    }
    let moved = raised + advance;

    let drop = cast_body(ctx.caster, &ctx.geometry, moved, -up * lifted, 0.0, filter);
    Some(Step {
        landing: moved + drop.displacement,
        advance,
    })
}

/// Airborne slide.
pub fn unstable_collide_and_slide<C: ShapeCaster + ?Sized>(
    ctx: &SlideContext<'_, C>,
    params: &UnstableSlide,
    position: Vec3,
    displacement: Vec3,
    max_iterations: u32,
) -> SlideOutcome {
    if displacement.norm_squared() <= MIN_MOVE_SQ {
        return SlideOutcome::idle(position);
    }

    let filter = ctx.filter();
    let up = ctx.geometry.up;
    let mut out = SlideOutcome {
        end: SlideEnd::Exhausted,
        ..SlideOutcome::idle(position)
    };
    let mut remaining = displacement;
    let mut plane_a: Option<Vec3> = None;
    let mut plane_b: Option<Vec3> = None;

    for _ in 0..max_iterations {
        out.casts += 1;
        let info = cast_body(ctx.caster, &ctx.geometry, out.position, remaining, 0.0, &filter);

        let Some(hit) = info.hit else {
            commit(&mut out.position, remaining);
            out.end = SlideEnd::Clear;
            break;
        };
        out.collided = true;

        let slope_angle = angle_deg(&up, &hit.normal);
        let bottom_collision = slope_angle < 90.0;

        if ctx.layers.is_one_way_platform(hit.layer) {
            let next_position = out.position + info.displacement;
            out.valid_one_way_platform =
                ctx.is_valid_one_way_contact(hit.point, next_position, params.one_way_valid_arc);
            if !out.valid_one_way_platform {
                commit(&mut out.position, remaining);
                out.end = SlideEnd::OneWayPlatform;
                break;
            }
        }

        if ctx.can_push_dynamic_bodies
            && hit.is_dynamic_rigidbody()
            && ctx.layers.is_pushable(hit.layer)
        {
            commit(&mut out.position, remaining);
            out.end = SlideEnd::Pushable;
            break;
        }

        commit(&mut out.position, info.displacement);
        remaining -= info.displacement;

        match (plane_a, plane_b) {
            (None, _) => {
                remaining = project_on_plane(remaining, hit.normal);
                plane_a = Some(hit.normal);

                let steep = slope_angle > ctx.slope_limit && slope_angle < MAX_UNSTABLE_UPWARDS_ANGLE;
                let upwards = project(remaining, up).dot(&up) > 0.0;
                if steep && !params.was_grounded && bottom_collision && upwards && params.dt > 0.0 {
                    let max_len = params.max_upwards_velocity * params.dt;
                    if remaining.norm() / params.dt > params.max_upwards_velocity {
                        trace!("clamping unstable climb to {max_len:.3}");
                        remaining = clamp_magnitude(remaining, max_len);
                    }
                }
            }
            (Some(a), None) => {
                plane_b = Some(hit.normal);
                let crease = normalize_or_zero(a.cross(&hit.normal));
                remaining = project(remaining, crease);
            }
            _ => {}
        }

        if remaining.norm_squared() <= MIN_MOVE_SQ {
            out.end = SlideEnd::Consumed;
            break;
        }
    }
    out
}

/// Advance `position` by `delta` unless the result is not finite.
#[inline]
fn commit(position: &mut Vec3, delta: Vec3) {
    let candidate = *position + delta;
    if is_finite(&candidate) {
        *position = candidate;
    } else {
        warn!("dropping non-finite slide position {candidate:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::BodySize,
        layers::{Layer, LayerMask},
        test_scene::PlaneScene,
        types::BodyKind,
    };

    fn context(scene: &PlaneScene) -> SlideContext<'_, PlaneScene> {
        SlideContext {
            caster: scene,
            geometry: BodyGeometry::new(BodySize::new(1.0, 2.0), Vec3::y()),
            layers: LayerSettings::default(),
            slope_limit: 55.0,
            step_offset: 0.0,
            step_up_distance: 0.0,
            slide_on_walls: true,
            dimension: Dimension::Three,
            can_push_dynamic_bodies: true,
            ground_body: None,
            wall_contact: false,
        }
    }

    fn airborne(dt: f32) -> UnstableSlide {
        UnstableSlide {
            was_grounded: false,
            dt,
            max_upwards_velocity: 7.0,
            one_way_valid_arc: 175.0,
        }
    }

    #[test]
    fn zero_displacement_performs_no_cast() {
        let scene = PlaneScene::floor();
        let ctx = context(&scene);
        let p = Vec3::new(1.0, 0.0, 2.0);

        let stable = stable_collide_and_slide(&ctx, p, Vec3::zeros(), Vec3::y(), false, 3);
        assert_eq!(stable.position, p);
        assert_eq!(stable.casts, 0);
        assert_eq!(stable.end, SlideEnd::Idle);

        let unstable = unstable_collide_and_slide(&ctx, &airborne(0.1), p, Vec3::zeros(), 3);
        assert_eq!(unstable.position, p);
        assert_eq!(unstable.casts, 0);
    }

    #[test]
    fn clear_path_applies_everything() {
        let scene = PlaneScene::floor();
        let ctx = context(&scene);
        let d = Vec3::new(1.0, 0.0, -0.5);
        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), d, Vec3::y(), false, 3);
        assert!((out.position - d).norm() < 1.0e-6);
        assert_eq!(out.end, SlideEnd::Clear);
        assert_eq!(out.casts, 1);
    }

    #[test]
    fn wall_keeps_only_the_tangential_part() {
        let scene = PlaneScene::floor().with_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0));
        let ctx = context(&scene);

        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), Vec3::new(2.0, 0.0, 1.0), Vec3::y(), false, 3);

        assert!(out.collided);
        assert!(out.position.x <= 0.5 + 1.0e-3);
        assert!(out.position.x > 0.49);
        assert!((out.position.z - 1.0).abs() < 1.0e-4);
        assert!(out.position.y.abs() < 1.0e-6);
    }

    #[test]
    fn walls_without_a_tread_are_not_climbed() {
        let scene = PlaneScene::floor().with_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0));
        let mut ctx = context(&scene);
        ctx.step_up_distance = 0.5;

        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0), Vec3::y(), false, 3);

        assert!(!out.stepped);
        assert!(out.position.x <= 0.5 + 1.0e-3);
        assert!(out.position.y.abs() < 1.0e-6);
    }

    #[test]
    fn steep_treads_are_not_climbed() {
        let angle = 70.0_f32.to_radians();
        let normal = Vec3::new(-angle.sin(), angle.cos(), 0.0);
        let scene = PlaneScene::floor().with_plane(normal, Vec3::new(1.0, 0.0, 0.0));
        let mut ctx = context(&scene);
        ctx.step_up_distance = 0.5;

        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0), Vec3::y(), false, 3);

        assert!(!out.stepped);
        assert!(out.position.x < 1.0);
    }

    #[test]
    fn non_finite_moves_keep_the_last_position() {
        let mut position = Vec3::new(1.0, 2.0, 3.0);
        commit(&mut position, Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(position, Vec3::new(1.0, 2.0, 3.0));
        commit(&mut position, Vec3::new(f32::INFINITY, 0.0, 0.0));
        assert_eq!(position, Vec3::new(1.0, 2.0, 3.0));

        commit(&mut position, Vec3::new(0.5, 0.0, -1.0));
        assert!((position - Vec3::new(1.5, 2.0, 2.0)).norm() < 1.0e-6);
    }

    #[test]
    fn concave_corner_wedges_the_body() {
        let scene = PlaneScene::floor()
            .with_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0))
            .with_plane(-Vec3::z(), Vec3::new(0.0, 0.0, 1.0));
        let ctx = context(&scene);

        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), Vec3::new(2.0, 0.0, 2.0), Vec3::y(), false, 3);

        assert!(out.position.x <= 0.5 + 5.0e-3);
        assert!(out.position.z <= 0.5 + 5.0e-3);
        assert_eq!(out.end, SlideEnd::Consumed);
    }

    #[test]
    fn one_way_platforms_never_block_grounded_slides() {
        let scene = PlaneScene::floor().with_layered_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0), Layer(1));
        let mut ctx = context(&scene);
        ctx.layers.one_way_platforms = LayerMask::from_layers(&[Layer(1)]);

        let d = Vec3::new(2.0, 0.0, 0.0);
        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), d, Vec3::y(), false, 3);
        assert_eq!(out.end, SlideEnd::OneWayPlatform);
        assert!((out.position - d).norm() < 1.0e-6);
    }

    #[test]
    fn pushable_bodies_take_the_whole_displacement_unless_they_are_ground() {
        let scene = PlaneScene::floor()
            .with_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0))
            .on_body(BodyKind::Dynamic, Vec3::zeros());
        let mut ctx = context(&scene);
        let d = Vec3::new(2.0, 0.0, 0.0);

        let pushed = stable_collide_and_slide(&ctx, Vec3::zeros(), d, Vec3::y(), false, 3);
        assert_eq!(pushed.end, SlideEnd::Pushable);

        ctx.ground_body = Some(crate::types::BodyId(0));
        let blocked = stable_collide_and_slide(&ctx, Vec3::zeros(), d, Vec3::y(), false, 3);
        assert_ne!(blocked.end, SlideEnd::Pushable);
        assert!(blocked.position.x <= 0.5 + 1.0e-3);
    }

    #[test]
    fn planar_mode_stops_at_walls() {
        let scene = PlaneScene::floor().with_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0));
        let mut ctx = context(&scene);
        ctx.dimension = Dimension::Two;

        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0), Vec3::y(), false, 3);
        assert_eq!(out.end, SlideEnd::Blocked);
        assert!((out.position.x - 0.5).abs() < 1.0e-3);

        // Already touching the wall: no further advance.
        ctx.wall_contact = true;
        let out = stable_collide_and_slide(&ctx, Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0), Vec3::y(), false, 3);
        assert_eq!(out.position, Vec3::zeros());
    }

    #[test]
    fn walkable_slope_turns_the_remainder_uphill() {
        let slope = Vec3::new(-0.5, 1.0, 0.0).normalize();
        // Floor for x < 1, then a 26.6 degree ramp.
        let scene = PlaneScene::default().with_plane(slope, Vec3::new(1.0, 0.0, 0.0));
        let ctx = context(&scene);

        let out = stable_collide_and_slide(&ctx, Vec3::new(-1.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0), Vec3::y(), true, 3);
        assert!(out.collided);
        assert!(out.position.y > 0.0);
    }

    #[test]
    fn unstable_climb_is_speed_limited() {
        let angle = 70.0_f32.to_radians();
        let normal = Vec3::new(-angle.sin(), angle.cos(), 0.0);
        let scene = PlaneScene::default().with_plane(normal, Vec3::new(0.6, 0.0, 0.0));
        let ctx = context(&scene);
        let dt = 0.1;

        let out = unstable_collide_and_slide(&ctx, &airborne(dt), Vec3::zeros(), Vec3::new(5.0, 0.0, 0.0), 3);
        let max_len = 7.0 * dt;
        assert!(out.collided);
        assert!(out.position.y > 0.0);
        assert!(out.position.y <= max_len + 1.0e-3);

        // Without the clamp the same slide climbs much higher.
        let grounded = UnstableSlide {
            was_grounded: true,
            ..airborne(dt)
        };
        let free = unstable_collide_and_slide(&ctx, &grounded, Vec3::zeros(), Vec3::new(5.0, 0.0, 0.0), 3);
        assert!(free.position.y > out.position.y + 0.5);
    }

    #[test]
    fn one_way_platform_blocks_only_from_above() {
        let scene = PlaneScene::default().with_layered_plane(Vec3::y(), Vec3::new(0.0, 2.0, 0.0), Layer(1));
        let mut ctx = context(&scene);
        ctx.layers.one_way_platforms = LayerMask::from_layers(&[Layer(1)]);

        // Falling onto it from above lands on top.
        let land = unstable_collide_and_slide(&ctx, &airborne(0.1), Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -2.0, 0.0), 3);
        assert!(land.valid_one_way_platform);
        assert!((land.position.y - 2.0).abs() < 1.0e-3);
    }

    #[test]
    fn unstable_slide_follows_the_crease_of_two_planes() {
        let scene = PlaneScene::floor().with_plane(-Vec3::x(), Vec3::new(1.0, 0.0, 0.0));
        let ctx = context(&scene);

        // Falling diagonally into the corner between floor and wall.
        let out = unstable_collide_and_slide(&ctx, &airborne(0.1), Vec3::new(0.0, 0.5, 0.0), Vec3::new(2.0, -2.0, 1.0), 4);
        assert!(out.position.x <= 0.5 + 5.0e-3);
        assert!(out.position.y >= -5.0e-3);
        assert!((out.position.z - 1.0).abs() < 1.0e-3);
    }
}
