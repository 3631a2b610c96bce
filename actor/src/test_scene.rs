//! Analytic half-space world used by unit tests.

use crate::{
    layers::Layer,
    math::{Quat, Vec3},
    scene::{BodyAccess, ShapeCaster, SimulatedBody, Simulation},
    types::{BodyId, BodyKind, CastFilter, Capsule, ColliderId, Contact, HitInfo},
};

/// Solid half-space `normal . x <= offset`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Plane {
    pub normal: Vec3,
    pub offset: f32,
    pub layer: Layer,
    pub collider: ColliderId,
    pub body: Option<(BodyId, BodyKind)>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TestBody {
    pub id: BodyId,
    pub kind: BodyKind,
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Default)]
pub(crate) struct PlaneScene {
    pub planes: Vec<Plane>,
    pub bodies: Vec<TestBody>,
    pub ignored: Vec<ColliderId>,
    pub forces: Vec<(BodyId, Vec3, Vec3)>,
}

impl PlaneScene {
    pub fn floor() -> Self {
        Self::default().with_plane(Vec3::y(), Vec3::zeros())
    }

    pub fn with_plane(self, normal: Vec3, point: Vec3) -> Self {
        self.with_layered_plane(normal, point, Layer::DEFAULT)
    }

    pub fn with_layered_plane(mut self, normal: Vec3, point: Vec3, layer: Layer) -> Self {
        let normal = normal.normalize();
        let collider = ColliderId(self.planes.len() as u32);
        self.planes.push(Plane {
            normal,
            offset: normal.dot(&point),
            layer,
            collider,
            body: None,
        });
        self
    }

    /// Attach the last added plane to a new body.
    pub fn on_body(mut self, kind: BodyKind, velocity: Vec3) -> Self {
        let id = BodyId(self.bodies.len() as u32);
        if let Some(plane) = self.planes.last_mut() {
            plane.body = Some((id, kind));
            self.bodies.push(TestBody {
                id,
                kind,
                position: plane.normal * plane.offset,
                velocity,
            });
        }
        self
    }

    pub fn remove(&mut self, collider: ColliderId) {
        self.planes.retain(|p| p.collider != collider);
    }

    fn passes(&self, plane: &Plane, filter: &CastFilter) -> bool {
        if !filter.mask.has(plane.layer) {
            return false;
        }
        if filter.ignore_rigidbodies && plane.body.is_some() {
            return false;
        }
        if self.ignored.contains(&plane.collider) && !filter.keep_ignored.has(plane.layer) {
            return false;
        }
        true
    }

    fn body(&self, id: BodyId) -> Option<&TestBody> {
        self.bodies.iter().find(|b| b.id == id)
    }

    fn lowest_point(plane: &Plane, capsule: &Capsule) -> (f32, Vec3) {
        let a = plane.normal.dot(&capsule.bottom);
        let b = plane.normal.dot(&capsule.top);
        if a <= b {
            (a, capsule.bottom)
        } else {
            (b, capsule.top)
        }
    }
}

impl ShapeCaster for PlaneScene {
    fn cast_capsule(&self, capsule: &Capsule, displacement: Vec3, filter: &CastFilter) -> Option<HitInfo> {
        let len = displacement.norm();
        if len <= 1.0e-9 {
            return None;
        }
        let dir = displacement / len;

        let mut best: Option<HitInfo> = None;
        for plane in self.planes.iter().filter(|p| self.passes(p, filter)) {
            let (lowest, endpoint) = Self::lowest_point(plane, capsule);
            let gap = lowest - plane.offset - capsule.radius;
            if gap < 0.0 {
                continue;
            }
            let rate = plane.normal.dot(&dir);
            if rate >= -1.0e-6 {
                continue;
            }
            let distance = gap / -rate;
            if distance > len {
                continue;
            }
            if best.as_ref().is_none_or(|b| distance < b.distance) {
                best = Some(HitInfo {
                    distance,
                    point: endpoint + dir * distance - plane.normal * capsule.radius,
                    normal: plane.normal,
                    layer: plane.layer,
                    collider: plane.collider,
                    body: plane.body,
                });
            }
        }
        best
    }

    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32, filter: &CastFilter) -> Option<HitInfo> {
        let mut best: Option<HitInfo> = None;
        for plane in self.planes.iter().filter(|p| self.passes(p, filter)) {
            let height = plane.normal.dot(&origin) - plane.offset;
            let rate = plane.normal.dot(&direction);
            if height < 0.0 || rate >= -1.0e-6 {
                continue;
            }
            let distance = height / -rate;
            if distance > max_distance {
                continue;
            }
            if best.as_ref().is_none_or(|b| distance < b.distance) {
                best = Some(HitInfo {
                    distance,
                    point: origin + direction * distance,
                    normal: plane.normal,
                    layer: plane.layer,
                    collider: plane.collider,
                    body: plane.body,
                });
            }
        }
        best
    }

    fn overlaps_capsule(&self, capsule: &Capsule, filter: &CastFilter) -> bool {
        self.planes
            .iter()
            .filter(|p| self.passes(p, filter))
            .any(|p| Self::lowest_point(p, capsule).0 - p.offset - capsule.radius < 0.0)
    }

    fn contacts(&self, capsule: &Capsule, prediction: f32, filter: &CastFilter, out: &mut Vec<Contact>) {
        for plane in self.planes.iter().filter(|p| self.passes(p, filter)) {
            if self.ignored.contains(&plane.collider) {
                continue;
            }
            let (lowest, endpoint) = Self::lowest_point(plane, capsule);
            if lowest - plane.offset - capsule.radius <= prediction {
                out.push(Contact {
                    point: endpoint - plane.normal * capsule.radius,
                    normal: plane.normal,
                    collider: plane.collider,
                    layer: plane.layer,
                    body: plane.body,
                });
            }
        }
    }
}

impl BodyAccess for PlaneScene {
    fn collider_exists(&self, collider: ColliderId) -> bool {
        self.planes.iter().any(|p| p.collider == collider)
    }

    fn body_pose(&self, body: BodyId) -> Option<(Vec3, Quat)> {
        self.body(body).map(|b| (b.position, Quat::identity()))
    }

    fn body_kind(&self, body: BodyId) -> Option<BodyKind> {
        self.body(body).map(|b| b.kind)
    }

    fn body_point_velocity(&self, body: BodyId, _point: Vec3) -> Vec3 {
        self.body(body).map_or(Vec3::zeros(), |b| b.velocity)
    }

    fn apply_force_at_point(&mut self, body: BodyId, force: Vec3, point: Vec3) {
        self.forces.push((body, force, point));
    }

    fn ignore_collision(&mut self, collider: ColliderId, ignore: bool) {
        self.ignored.retain(|c| *c != collider);
        if ignore {
            self.ignored.push(collider);
        }
    }
}

impl Simulation for PlaneScene {
    fn simulate(&mut self, dt: f32, body: &mut SimulatedBody) {
        for b in &mut self.bodies {
            let delta = b.velocity * dt;
            b.position += delta;
            for plane in self.planes.iter_mut() {
                if plane.body.map(|(id, _)| id) == Some(b.id) {
                    plane.offset += plane.normal.dot(&delta);
                }
            }
        }
        body.position += body.velocity * dt;
    }
}
