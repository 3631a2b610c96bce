/*!
In-memory collision world for character actors.

Design goals
- Deterministic: colliders and bodies are inserted sorted by `id`, so the same definition always
  produces the same query results.
- Query-focused: implements the actor's [`ShapeCaster`], [`BodyAccess`] and [`Simulation`] seams on
  top of parry queries. Static colliders go through a BVH broad phase; colliders attached to
  bodies are scanned linearly.
- Minimal simulation: kinematic bodies move with their velocities, dynamic bodies additionally
  integrate the forces applied to them. Bodies do not collide with each other.
*/

use std::collections::{HashMap, HashSet};

use kinematic_actor::{
    BodyAccess, BodyId, BodyKind, CastFilter, Capsule, ColliderId, Contact, HitInfo, Layer,
    ShapeCaster, SimulatedBody, Simulation,
    math::{Iso, Quat, Vec3, is_finite},
};
use log::{debug, trace, warn};
use rapier3d::parry::{bounding_volume::Aabb, shape::SharedShape};

use crate::{
    broad::{StaticAccel, inflate, segment_aabb, swept_aabb},
    error::WorldError,
    narrow_phase::{self, CharacterShape},
    scene_def::WorldDef,
    shapes::rotation_from_euler_deg,
};

/// Margin added around broad-phase query boxes (meters).
const BROAD_PHASE_MARGIN: f32 = 0.01;

#[derive(Clone, Copy, Debug)]
struct BodyState {
    id: BodyId,
    kind: BodyKind,
    position: Vec3,
    rotation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    mass: f32,
    /// Forces accumulated since the last simulation step.
    force: Vec3,
}

impl BodyState {
    #[inline]
    fn pose(&self) -> Iso {
        Iso::from_parts(self.position.into(), self.rotation)
    }
}

#[derive(Clone)]
struct ColliderEntry {
    id: ColliderId,
    shape: SharedShape,
    /// Pose in world space for statics, relative to the body otherwise.
    local: Iso,
    layer: Layer,
    trigger: bool,
    /// Planes have no AABB and bypass the BVH.
    unbounded: bool,
    /// Index into `CollisionWorld::bodies`.
    body: Option<usize>,
}

pub struct CollisionWorld {
    bodies: Vec<BodyState>,
    colliders: Vec<ColliderEntry>,
    statics: StaticAccel,
    /// Colliders whose collision with the character is switched off.
    ignored: HashSet<ColliderId>,
}

impl CollisionWorld {
    /// Build a world from a definition. The definition is validated first.
    pub fn from_def(def: &WorldDef) -> Result<Self, WorldError> {
        def.validate()?;

        let mut body_defs = def.bodies.clone();
        body_defs.sort_by_key(|b| b.id);
        let mut collider_defs = def.colliders.clone();
        collider_defs.sort_by_key(|c| c.id);

        let bodies: Vec<BodyState> = body_defs
            .iter()
            .map(|b| BodyState {
                id: BodyId(b.id),
                kind: b.kind,
                position: b.position,
                rotation: rotation_from_euler_deg(b.euler_deg),
                linear_velocity: b.linear_velocity,
                angular_velocity: b.angular_velocity,
                mass: b.mass,
                force: Vec3::zeros(),
            })
            .collect();
        let body_index: HashMap<u32, usize> =
            bodies.iter().enumerate().map(|(i, b)| (b.id.0, i)).collect();

        let mut colliders = Vec::with_capacity(collider_defs.len());
        for c in &collider_defs {
            let body = match c.body {
                Some(id) => Some(*body_index.get(&id).ok_or(WorldError::UnknownBody {
                    collider: c.id,
                    body: id,
                })?),
                None => None,
            };
            let (shape, offset) = c.shape.build();
            let pose = Iso::from_parts(c.translation.into(), rotation_from_euler_deg(c.euler_deg));
            colliders.push(ColliderEntry {
                id: ColliderId(c.id),
                shape,
                local: pose * offset,
                layer: c.layer,
                trigger: c.trigger,
                unbounded: c.shape.is_unbounded(),
                body,
            });
        }

        let mut world = Self {
            bodies,
            colliders,
            statics: StaticAccel::build(&[]),
            ignored: HashSet::new(),
        };
        world.rebuild_statics();
        debug!(
            "collision world with {} bodies, {} colliders ({} static)",
            world.bodies.len(),
            world.colliders.len(),
            world.statics.len()
        );
        Ok(world)
    }

    /// Parse, validate and build a world from TOML.
    pub fn from_toml_str(src: &str) -> Result<Self, WorldError> {
        Self::from_def(&WorldDef::from_toml_str(src)?)
    }

    fn rebuild_statics(&mut self) {
        let entries: Vec<(usize, Option<Aabb>)> = self
            .colliders
            .iter()
            .enumerate()
            .filter(|(_, c)| c.body.is_none())
            .map(|(i, c)| {
                let aabb = (!c.unbounded).then(|| c.shape.compute_aabb(&c.local));
                (i, aabb)
            })
            .collect();
        self.statics = StaticAccel::build(&entries);
    }

    /// Remove a collider. Returns `false` when no such collider exists.
    pub fn remove_collider(&mut self, id: ColliderId) -> bool {
        let Some(index) = self.colliders.iter().position(|c| c.id == id) else {
            return false;
        };
        self.colliders.remove(index);
        self.ignored.remove(&id);
        self.rebuild_statics();
        debug!("removed collider {id:?}");
        true
    }

    pub fn set_body_velocity(
        &mut self,
        body: BodyId,
        linear: Vec3,
        angular: Vec3,
    ) -> Result<(), WorldError> {
        let state = self.body_mut(body)?;
        state.linear_velocity = linear;
        state.angular_velocity = angular;
        Ok(())
    }

    /// Move a body without going through its velocity.
    pub fn set_body_pose(&mut self, body: BodyId, position: Vec3, rotation: Quat) -> Result<(), WorldError> {
        if !is_finite(&position) {
            return Err(WorldError::NonFinite { what: "body", id: body.0 });
        }
        let state = self.body_mut(body)?;
        state.position = position;
        state.rotation = rotation;
        Ok(())
    }

    /// Linear and angular velocity of a body.
    pub fn body_velocity(&self, body: BodyId) -> Option<(Vec3, Vec3)> {
        self.body(body).map(|b| (b.linear_velocity, b.angular_velocity))
    }

    pub fn is_ignored(&self, collider: ColliderId) -> bool {
        self.ignored.contains(&collider)
    }

    fn body(&self, id: BodyId) -> Option<&BodyState> {
        self.bodies.iter().find(|b| b.id == id)
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut BodyState, WorldError> {
        self.bodies
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(WorldError::NoSuchBody(id.0))
    }

    fn collider_pose(&self, collider: &ColliderEntry) -> Iso {
        match collider.body {
            Some(index) => self.bodies[index].pose() * collider.local,
            None => collider.local,
        }
    }

    fn body_of(&self, collider: &ColliderEntry) -> Option<(BodyId, BodyKind)> {
        collider.body.map(|index| {
            let body = &self.bodies[index];
            (body.id, body.kind)
        })
    }

    fn passes(&self, collider: &ColliderEntry, filter: &CastFilter) -> bool {
        if !filter.mask.has(collider.layer) {
            return false;
        }
        if filter.ignore_rigidbodies && collider.body.is_some() {
            return false;
        }
        if filter.ignore_triggers && collider.trigger {
            return false;
        }
        if self.ignored.contains(&collider.id) && !filter.keep_ignored.has(collider.layer) {
            return false;
        }
        true
    }

    /// Colliders passing `filter` that may touch `query`, with their world poses.
    fn candidates(&self, query: &Aabb, filter: &CastFilter) -> Vec<(&ColliderEntry, Iso)> {
        let mut indices = Vec::new();
        self.statics.candidates(query, &mut indices);
        indices.extend(
            self.colliders
                .iter()
                .enumerate()
                .filter(|(_, c)| c.body.is_some())
                .map(|(i, _)| i),
        );

        indices
            .into_iter()
            .map(|i| &self.colliders[i])
            .filter(|c| self.passes(c, filter))
            .map(|c| (c, self.collider_pose(c)))
            .collect()
    }

    fn hit_info(&self, collider: &ColliderEntry, hit: narrow_phase::ShapeHit) -> HitInfo {
        HitInfo {
            distance: hit.distance,
            point: hit.point,
            normal: hit.normal,
            layer: collider.layer,
            collider: collider.id,
            body: self.body_of(collider),
        }
    }
}

impl ShapeCaster for CollisionWorld {
    fn cast_capsule(&self, capsule: &Capsule, displacement: Vec3, filter: &CastFilter) -> Option<HitInfo> {
        let character = CharacterShape::from_capsule(capsule);
        let query = swept_aabb(&character.aabb(), displacement, BROAD_PHASE_MARGIN);

        let mut best: Option<HitInfo> = None;
        for (collider, pose) in self.candidates(&query, filter) {
            let Some(hit) = narrow_phase::cast_character(&character, displacement, &pose, &*collider.shape)
            else {
                continue;
            };
            if best.as_ref().is_none_or(|b| hit.distance < b.distance) {
                best = Some(self.hit_info(collider, hit));
            }
        }
        best
    }

    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32, filter: &CastFilter) -> Option<HitInfo> {
        let query = segment_aabb(origin, origin + direction * max_distance, BROAD_PHASE_MARGIN);

        let mut best: Option<HitInfo> = None;
        for (collider, pose) in self.candidates(&query, filter) {
            let Some(hit) = narrow_phase::cast_ray(origin, direction, max_distance, &pose, &*collider.shape)
            else {
                continue;
            };
            if best.as_ref().is_none_or(|b| hit.distance < b.distance) {
                best = Some(self.hit_info(collider, hit));
            }
        }
        best
    }

    fn overlaps_capsule(&self, capsule: &Capsule, filter: &CastFilter) -> bool {
        let character = CharacterShape::from_capsule(capsule);
        self.candidates(&character.aabb(), filter)
            .into_iter()
            .any(|(collider, pose)| narrow_phase::overlaps(&character, &pose, &*collider.shape))
    }

    fn contacts(&self, capsule: &Capsule, prediction: f32, filter: &CastFilter, out: &mut Vec<Contact>) {
        let character = CharacterShape::from_capsule(capsule);
        let query = inflate(&character.aabb(), prediction + BROAD_PHASE_MARGIN);

        for (collider, pose) in self.candidates(&query, filter) {
            // Triggers and switched-off colliders never touch the character.
            if collider.trigger || self.ignored.contains(&collider.id) {
                continue;
            }
            if let Some((point, normal)) = narrow_phase::contact(&character, prediction, &pose, &*collider.shape) {
                out.push(Contact {
                    point,
                    normal,
                    collider: collider.id,
                    layer: collider.layer,
                    body: self.body_of(collider),
                });
            }
        }
    }
}

impl BodyAccess for CollisionWorld {
    fn collider_exists(&self, collider: ColliderId) -> bool {
        self.colliders.iter().any(|c| c.id == collider)
    }

    fn body_pose(&self, body: BodyId) -> Option<(Vec3, Quat)> {
        self.body(body).map(|b| (b.position, b.rotation))
    }

    fn body_kind(&self, body: BodyId) -> Option<BodyKind> {
        self.body(body).map(|b| b.kind)
    }

    fn body_point_velocity(&self, body: BodyId, point: Vec3) -> Vec3 {
        self.body(body).map_or(Vec3::zeros(), |b| {
            b.linear_velocity + b.angular_velocity.cross(&(point - b.position))
        })
    }

    /// Linear response only; the torque of off-center forces is dropped.
    fn apply_force_at_point(&mut self, body: BodyId, force: Vec3, _point: Vec3) {
        if !is_finite(&force) {
            warn!("ignoring non-finite force {force:?} on {body:?}");
            return;
        }
        match self.bodies.iter_mut().find(|b| b.id == body) {
            Some(state) if state.kind == BodyKind::Dynamic => state.force += force,
            Some(_) => {}
            None => trace!("force on unknown body {body:?}"),
        }
    }

    fn ignore_collision(&mut self, collider: ColliderId, ignore: bool) {
        if ignore {
            self.ignored.insert(collider);
        } else {
            self.ignored.remove(&collider);
        }
    }
}

impl Simulation for CollisionWorld {
    fn simulate(&mut self, dt: f32, body: &mut SimulatedBody) {
        for state in &mut self.bodies {
            if state.kind == BodyKind::Dynamic {
                state.linear_velocity += state.force / state.mass * dt;
            }
            state.force = Vec3::zeros();

            state.position += state.linear_velocity * dt;
            state.rotation = Quat::from_scaled_axis(state.angular_velocity * dt) * state.rotation;
        }
        body.position += body.velocity * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scene_def::{BodyDef, ColliderDef},
        shapes::ShapeDef,
    };
    use kinematic_actor::LayerMask;

    fn plane() -> ShapeDef {
        ShapeDef::Plane {
            offset_along_normal: 0.0,
        }
    }

    fn capsule_at(feet: Vec3) -> Capsule {
        Capsule {
            bottom: feet + Vec3::new(0.0, 0.5, 0.0),
            top: feet + Vec3::new(0.0, 1.5, 0.0),
            radius: 0.5,
        }
    }

    fn all() -> CastFilter {
        CastFilter::solid(LayerMask::all())
    }

    fn world(def: WorldDef) -> CollisionWorld {
        CollisionWorld::from_def(&def).unwrap()
    }

    #[test]
    fn nearest_hit_wins_across_statics_and_bodies() {
        let w = world(WorldDef {
            bodies: vec![BodyDef::kinematic(0, Vec3::new(0.0, 1.0, 0.0))],
            colliders: vec![
                ColliderDef::new(0, plane()),
                ColliderDef::new(
                    1,
                    ShapeDef::Cuboid {
                        half_extents: Vec3::new(1.0, 0.1, 1.0),
                    },
                )
                .attached_to(0),
            ],
        });

        let hit = w
            .cast_capsule(&capsule_at(Vec3::new(0.0, 3.0, 0.0)), Vec3::new(0.0, -5.0, 0.0), &all())
            .unwrap();
        assert_eq!(hit.collider, ColliderId(1));
        assert_eq!(hit.body, Some((BodyId(0), BodyKind::Kinematic)));
        assert!((hit.distance - 1.9).abs() < 1.0e-3);
    }

    #[test]
    fn filters_apply_to_layers_triggers_and_ignored_colliders() {
        let mut w = world(WorldDef {
            bodies: vec![],
            colliders: vec![
                ColliderDef::new(0, plane()),
                ColliderDef::new(1, plane()).at(Vec3::new(0.0, 1.0, 0.0)).on_layer(Layer(3)),
                ColliderDef::new(2, plane()).at(Vec3::new(0.0, 2.0, 0.0)).as_trigger(),
            ],
        });
        let from = capsule_at(Vec3::new(0.0, 5.0, 0.0));
        let down = Vec3::new(0.0, -10.0, 0.0);

        let hit = w.cast_capsule(&from, down, &all()).unwrap();
        assert_eq!(hit.collider, ColliderId(1));

        w.ignore_collision(ColliderId(1), true);
        assert_eq!(w.cast_capsule(&from, down, &all()).unwrap().collider, ColliderId(0));

        let keep = all().keeping_ignored(LayerMask::from_layers(&[Layer(3)]));
        assert_eq!(w.cast_capsule(&from, down, &keep).unwrap().collider, ColliderId(1));

        w.ignore_collision(ColliderId(1), false);
        let mut no_layer_3 = all();
        no_layer_3.mask.remove(Layer(3));
        assert_eq!(w.cast_capsule(&from, down, &no_layer_3).unwrap().collider, ColliderId(0));
    }

    #[test]
    fn rays_start_outside_and_stop_at_the_first_surface() {
        let w = world(WorldDef {
            bodies: vec![],
            colliders: vec![
                ColliderDef::new(0, plane()),
                ColliderDef::new(
                    1,
                    ShapeDef::Cuboid {
                        half_extents: Vec3::new(0.5, 0.5, 0.5),
                    },
                )
                .at(Vec3::new(0.0, 0.5, 3.0)),
            ],
        });

        let hit = w
            .cast_ray(Vec3::new(0.0, 0.5, 0.0), Vec3::z(), 10.0, &all())
            .unwrap();
        assert_eq!(hit.collider, ColliderId(1));
        assert!((hit.distance - 2.5).abs() < 1.0e-4);
        assert!((hit.normal + Vec3::z()).norm() < 1.0e-4);

        let hit = w.cast_ray(Vec3::new(0.0, 2.0, 0.0), -Vec3::y(), 10.0, &all()).unwrap();
        assert_eq!(hit.collider, ColliderId(0));
        assert!((hit.distance - 2.0).abs() < 1.0e-4);
    }

    #[test]
    fn contacts_and_overlaps() {
        let w = world(WorldDef {
            bodies: vec![],
            colliders: vec![
                ColliderDef::new(0, plane()),
                ColliderDef::new(
                    1,
                    ShapeDef::Cuboid {
                        half_extents: Vec3::new(0.5, 2.0, 2.0),
                    },
                )
                .at(Vec3::new(1.0, 2.0, 0.0)),
            ],
        });

        let mut out = Vec::new();
        w.contacts(&capsule_at(Vec3::zeros()), 0.01, &all(), &mut out);
        assert_eq!(out.len(), 2);
        let wall = out.iter().find(|c| c.collider == ColliderId(1)).unwrap();
        assert!((wall.normal + Vec3::x()).norm() < 1.0e-4);

        assert!(!w.overlaps_capsule(&capsule_at(Vec3::new(-0.1, 0.01, 0.0)), &all()));
        assert!(w.overlaps_capsule(&capsule_at(Vec3::new(0.2, 0.01, 0.0)), &all()));
    }

    #[test]
    fn bodies_move_and_report_point_velocities() {
        let mut w = world(WorldDef {
            bodies: vec![
                BodyDef::kinematic(0, Vec3::zeros())
                    .moving(Vec3::new(1.0, 0.0, 0.0))
                    .spinning(Vec3::new(0.0, 1.0, 0.0)),
                BodyDef::dynamic(1, Vec3::zeros(), 2.0),
            ],
            colliders: vec![],
        });

        let v = w.body_point_velocity(BodyId(0), Vec3::new(0.0, 0.0, 1.0));
        assert!((v - Vec3::new(2.0, 0.0, 0.0)).norm() < 1.0e-5);

        w.apply_force_at_point(BodyId(1), Vec3::new(0.0, -4.0, 0.0), Vec3::zeros());
        w.apply_force_at_point(BodyId(0), Vec3::new(0.0, -4.0, 0.0), Vec3::zeros());

        let mut character = SimulatedBody {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            velocity: Vec3::new(0.0, 0.0, 2.0),
        };
        w.simulate(0.5, &mut character);

        assert!((character.position - Vec3::new(0.0, 0.0, 1.0)).norm() < 1.0e-6);
        let (p0, _) = w.body_pose(BodyId(0)).unwrap();
        assert!((p0 - Vec3::new(0.5, 0.0, 0.0)).norm() < 1.0e-6);
        let (v1, _) = w.body_velocity(BodyId(1)).unwrap();
        assert!((v1 - Vec3::new(0.0, -1.0, 0.0)).norm() < 1.0e-6);
        let (v0, _) = w.body_velocity(BodyId(0)).unwrap();
        assert!((v0 - Vec3::new(1.0, 0.0, 0.0)).norm() < 1.0e-6);
    }

    #[test]
    fn removing_a_collider_takes_it_out_of_queries() {
        let mut w = world(WorldDef {
            bodies: vec![],
            colliders: vec![ColliderDef::new(
                7,
                ShapeDef::Sphere { radius: 1.0 },
            )],
        });
        assert!(w.collider_exists(ColliderId(7)));
        assert!(w.remove_collider(ColliderId(7)));
        assert!(!w.remove_collider(ColliderId(7)));
        assert!(!w.collider_exists(ColliderId(7)));
        assert!(
            w.cast_ray(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), 10.0, &all())
                .is_none()
        );
    }

    #[test]
    fn world_loads_from_toml() {
        let w = CollisionWorld::from_toml_str(
            r#"
            [[colliders]]
            id = 0
            shape = { type = "plane" }
            euler_deg = [0.0, 0.0, 30.0]
            "#,
        )
        .unwrap();
        let hit = w.cast_ray(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), 10.0, &all()).unwrap();
        let expected = rotation_from_euler_deg(Vec3::new(0.0, 0.0, 30.0)) * Vec3::y();
        assert!((hit.normal - expected).norm() < 1.0e-4);
    }
}
