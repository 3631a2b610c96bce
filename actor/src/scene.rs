/*!
Seams between the solver and the host world.

The solver never owns geometry. It asks a [`ShapeCaster`] where the body would stop, reads and
nudges rigid bodies through [`BodyAccess`], and hands the character to a [`Simulation`] between the
two halves of a step. Any physics backend can sit behind these traits; `kinematic_world` provides
one on top of parry.

Casting contract
- Colliders the cast shape already overlaps at its start are not reported.
- `HitInfo::distance` is measured along the normalized cast direction.
- Normals point out of the hit collider.
*/

use crate::{
    math::{Quat, Vec3},
    types::{BodyId, BodyKind, CastFilter, Capsule, ColliderId, Contact, HitInfo},
};

/// Collision queries used by the solver.
pub trait ShapeCaster {
    /// Sweep `capsule` along `displacement` and return the earliest blocking hit.
    fn cast_capsule(
        &self,
        capsule: &Capsule,
        displacement: Vec3,
        filter: &CastFilter,
    ) -> Option<HitInfo>;

    /// Cast a ray along the unit `direction` up to `max_distance`.
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &CastFilter,
    ) -> Option<HitInfo>;

    /// Whether `capsule` overlaps any collider passing `filter`.
    fn overlaps_capsule(&self, capsule: &Capsule, filter: &CastFilter) -> bool;

    /// Append every collider within `prediction` of `capsule` to `out`.
    fn contacts(
        &self,
        capsule: &Capsule,
        prediction: f32,
        filter: &CastFilter,
        out: &mut Vec<Contact>,
    );
}

/// Read and write access to the rigid bodies the character interacts with.
pub trait BodyAccess {
    /// False once the collider was removed from the world.
    fn collider_exists(&self, collider: ColliderId) -> bool;

    fn body_pose(&self, body: BodyId) -> Option<(Vec3, Quat)>;

    fn body_kind(&self, body: BodyId) -> Option<BodyKind>;

    /// Velocity of the body at a world-space point. Zero for unknown bodies.
    fn body_point_velocity(&self, body: BodyId, point: Vec3) -> Vec3;

    /// Queue a force on a dynamic body for the next simulation. Ignored for other bodies.
    fn apply_force_at_point(&mut self, body: BodyId, force: Vec3, point: Vec3);

    /// Toggle collision between the character and `collider` in the simulation and in contact
    /// queries.
    fn ignore_collision(&mut self, collider: ColliderId, ignore: bool);
}

/// The character as seen by the external simulation.
#[derive(Clone, Copy, Debug)]
pub struct SimulatedBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
}

/// One atomic step of the host simulation.
pub trait Simulation {
    /// Advance the world by `dt` and move `body` according to its velocity.
    fn simulate(&mut self, dt: f32, body: &mut SimulatedBody);
}

/// Everything the actor needs from a world outside of the simulation call.
pub trait Scene: ShapeCaster + BodyAccess {}

impl<T: ShapeCaster + BodyAccess + ?Sized> Scene for T {}
