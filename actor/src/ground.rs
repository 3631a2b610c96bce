/*!
Ground detection.

Stable characters probe the ground after the simulation and snap onto it; airborne characters
predict the ground below them and adopt it once they touch it. The ground itself is a plain
[`GroundState`] record; whether it is walkable is decided by [`crate::stability`].
*/

use log::debug;

use crate::{
    actor::CharacterActor,
    collisions::{check_for_ground, check_for_ground_ray},
    layers::Layer,
    math::{Vec3, angle_deg, project, project_on_tangent},
    scene::{BodyAccess, Scene, ShapeCaster},
    settings::{
        DEFAULT_FORCE_NOT_GROUNDED_FRAMES, FORCE_GROUNDED_STEP_FACTOR, GROUND_CHECK_DISTANCE,
        GROUND_PREDICTION_DISTANCE, MAX_UNSTABLE_GROUND_CONTACT_TIME,
    },
    solver::stable_collide_and_slide,
    types::{BodyId, BodyKind, CastFilter, ColliderId, CollisionInfo},
};

/// What the character stands on.
#[derive(Clone, Copy, Debug)]
pub struct GroundState {
    /// `None` while not grounded.
    pub collider: Option<ColliderId>,
    pub body: Option<(BodyId, BodyKind)>,
    pub layer: Layer,
    pub contact_point: Vec3,
    pub contact_normal: Vec3,
    /// Normal used for walking; differs from the contact normal on edges.
    pub stable_normal: Vec3,
    /// Angle between up and `stable_normal` (degrees).
    pub slope_angle: f32,
    /// Angle between up and `contact_normal` (degrees).
    pub contact_slope_angle: f32,
    pub is_on_edge: bool,
    pub edge_angle: f32,
}

impl Default for GroundState {
    fn default() -> Self {
        Self {
            collider: None,
            body: None,
            layer: Layer::DEFAULT,
            contact_point: Vec3::zeros(),
            contact_normal: Vec3::y(),
            stable_normal: Vec3::y(),
            slope_angle: 0.0,
            contact_slope_angle: 0.0,
            is_on_edge: false,
            edge_angle: 0.0,
        }
    }
}

impl GroundState {
    /// Ground described by a probe hit, or `None` when the probe missed.
    pub fn from_collision(info: &CollisionInfo, up: Vec3, slope_limit: f32) -> Option<Self> {
        let hit = info.hit?;
        let stable_normal = ground_slope_normal(info, up, slope_limit);
        Some(Self {
            collider: Some(hit.collider),
            body: hit.body,
            layer: hit.layer,
            contact_point: hit.point,
            contact_normal: hit.normal,
            stable_normal,
            slope_angle: angle_deg(&up, &stable_normal),
            contact_slope_angle: angle_deg(&up, &hit.normal),
            is_on_edge: info.edge.is_edge,
            edge_angle: info.edge.edge_angle,
        })
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.collider.is_some()
    }

    #[inline]
    pub fn is_rigidbody(&self) -> bool {
        self.body.is_some()
    }

    #[inline]
    pub fn body_id(&self) -> Option<BodyId> {
        self.body.map(|(id, _)| id)
    }
}

/// Normal the character walks on for a ground probe hit.
///
/// On an edge the walkable side wins: flat enough on both sides means the edge is walked over as
/// if it was flat, otherwise the first walkable side is used. Off edges the contact normal is used.
pub fn ground_slope_normal(info: &CollisionInfo, up: Vec3, slope_limit: f32) -> Vec3 {
    let Some(hit) = info.hit else {
        return up;
    };
    let edge = &info.edge;
    if !edge.is_edge {
        return hit.normal;
    }

    let contact_slope_angle = angle_deg(&up, &hit.normal);
    if contact_slope_angle < slope_limit
        && edge.upper_slope_angle <= slope_limit
        && edge.lower_slope_angle <= slope_limit
    {
        up
    } else if edge.upper_slope_angle <= slope_limit {
        edge.upper_normal
    } else if edge.lower_slope_angle <= slope_limit {
        edge.lower_normal
    } else {
        hit.normal
    }
}

#[inline]
fn is_stable_edge(info: &CollisionInfo, slope_limit: f32) -> bool {
    info.edge.is_edge && info.edge.upper_slope_angle <= slope_limit
}

/// Ground seen below an airborne character.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroundPrediction {
    pub collider: Option<ColliderId>,
    /// Distance between the feet and the predicted ground.
    pub distance: f32,
    /// Time spent within touching distance of it.
    pub contact_time: f32,
    /// One-way platform whose collision with the character is currently ignored.
    pub ignored_platform: Option<ColliderId>,
}

/// Whether touched predicted ground becomes the ground.
///
/// Ascending characters skim over ground for a moment before landing on it, unless they are
/// configured to land right away or the ground is a rigid body.
#[inline]
pub fn should_adopt_predicted_ground(
    detect_while_ascending: bool,
    is_falling: bool,
    contact_time: f32,
    is_rigidbody: bool,
) -> bool {
    detect_while_ascending
        || is_falling
        || contact_time >= MAX_UNSTABLE_GROUND_CONTACT_TIME
        || is_rigidbody
}

impl CharacterActor {
    /// Whether ground detection may currently ground the character.
    #[inline]
    pub fn can_enter_grounded_state(&self) -> bool {
        !self.settings.always_not_grounded && self.force_not_grounded_frames == 0
    }

    /// Drop the ground and keep ground detection off for `frames` steps.
    pub fn force_not_grounded(&mut self, frames: u32) {
        self.force_not_grounded_frames = frames;
        self.was_grounded = self.is_grounded();
        self.was_stable = self.is_stable();
        self.reset_ground_info();
        self.force_not_grounded_flag = true;
    }

    /// Snap onto walkable ground below (or slightly inside) the body, if there is any.
    pub fn force_grounded<W: Scene + ?Sized>(&mut self, world: &W) {
        if !self.can_enter_grounded_state() {
            return;
        }

        let geometry = self.geometry();
        let layers = &self.settings.layers;
        let filter = CastFilter::solid(layers.obstacles()).keeping_ignored(layers.one_way_platforms);
        let info = check_for_ground(
            world,
            &geometry,
            self.position,
            self.body_size.height * FORCE_GROUNDED_STEP_FACTOR,
            self.settings.step_down_distance,
            &filter,
        );

        let Some(ground) = GroundState::from_collision(&info, geometry.up, self.settings.slope_limit)
        else {
            return;
        };
        self.process_new_ground(ground.collider);

        if ground.slope_angle <= self.settings.slope_limit {
            self.set_ground_info(ground);
            self.position += info.displacement;
            let position = self.position;
            self.set_dynamic_ground_data(world, position);
        }
    }

    /// Post-simulation ground probe of a stable character.
    pub(crate) fn probe_ground<W: Scene + ?Sized>(&mut self, world: &W, dt: f32) {
        let geometry = self.geometry();
        let up = geometry.up;
        let slope_limit = self.settings.slope_limit;
        let mut position = self.position;

        let check_distance = if self.settings.edge_compensation {
            geometry.radius() + GROUND_CHECK_DISTANCE
        } else {
            GROUND_CHECK_DISTANCE
        };
        let distance = check_distance.max(self.settings.step_down_distance);
        let layers = &self.settings.layers;
        let filter = CastFilter::solid(layers.obstacles()).keeping_ignored(layers.one_way_platforms);

        let info = check_for_ground(world, &geometry, position, self.step_offset(), distance, &filter);
        let Some(ground) = GroundState::from_collision(&info, up, slope_limit) else {
            self.force_not_grounded(DEFAULT_FORCE_NOT_GROUNDED_FRAMES);
            return;
        };

        if ground.slope_angle <= slope_limit && self.settings.layers.is_stable(ground.layer) {
            self.process_new_ground(ground.collider);
            self.set_ground_info(ground);
            position += info.displacement;

            if self.settings.edge_compensation && is_stable_edge(&info, slope_limit) {
                // Treat the bottom sphere as a cylinder standing on the edge.
                position += project(ground.contact_point - position, up);
            }
        } else {
            if self.settings.prevent_bad_steps && self.was_grounded {
                debug!("bad step onto {:?}, redoing the move with the full body", ground.collider);
                let start = self.pre_simulation_position + self.dynamic_ground.velocity * dt;
                let displacement =
                    project_on_tangent(self.velocities.input * dt, self.ground.stable_normal, up);
                let ctx = self.slide_context(world);
                position = stable_collide_and_slide(
                    &ctx,
                    start,
                    displacement,
                    self.ground.stable_normal,
                    true,
                    self.settings.max_slide_iterations,
                )
                .position;
                if dt > 0.0 {
                    self.velocity = (position - start) / dt;
                }
            }

            let ray = check_for_ground_ray(world, &geometry, position, distance, &filter);
            match GroundState::from_collision(&ray, up, slope_limit) {
                Some(ground) => {
                    self.process_new_ground(ground.collider);
                    self.set_ground_info(ground);
                }
                None => self.reset_ground_info(),
            }
        }

        if self.is_stable() {
            self.position = position;
        }
    }

    /// Ground prediction of an airborne character at the end of its slide.
    pub(crate) fn unstable_probe_ground<W: Scene + ?Sized>(
        &mut self,
        world: &mut W,
        position: Vec3,
        valid_one_way_platform: bool,
        dt: f32,
    ) {
        if !self.can_enter_grounded_state() {
            self.clear_prediction(world);
            self.reset_ground_info();
            return;
        }

        let layers = &self.settings.layers;
        let mask = if valid_one_way_platform {
            layers.obstacles()
        } else {
            layers.obstacles_without_one_way_platforms()
        };
        // Ignoring a predicted platform only affects the simulation, never this probe.
        let filter = CastFilter::solid(mask).keeping_ignored(layers.one_way_platforms);
        let geometry = self.geometry();
        let info = check_for_ground(
            &*world,
            &geometry,
            position,
            self.step_offset(),
            GROUND_PREDICTION_DISTANCE,
            &filter,
        );

        let Some(ground) = GroundState::from_collision(&info, geometry.up, self.settings.slope_limit)
        else {
            self.clear_prediction(world);
            self.reset_ground_info();
            return;
        };

        if self.prediction.collider != ground.collider {
            self.restore_ignored_platform(world);
        }
        self.prediction.collider = ground.collider;
        self.prediction.distance = info.displacement.norm();

        if self.settings.layers.is_one_way_platform(ground.layer) {
            if let Some(collider) = ground.collider {
                world.ignore_collision(collider, true);
                self.prediction.ignored_platform = Some(collider);
            }
        }

        if self.prediction.distance <= GROUND_CHECK_DISTANCE {
            self.prediction.contact_time += dt;
            if should_adopt_predicted_ground(
                self.settings.detect_ground_while_ascending,
                self.is_falling(),
                self.prediction.contact_time,
                ground.is_rigidbody(),
            ) {
                self.process_new_ground(ground.collider);
                self.set_ground_info(ground);
            }
        } else {
            self.prediction.contact_time = 0.0;
            self.reset_ground_info();
        }
    }

    fn clear_prediction<W: BodyAccess + ?Sized>(&mut self, world: &mut W) {
        self.restore_ignored_platform(world);
        self.prediction = GroundPrediction::default();
    }

    fn restore_ignored_platform<W: BodyAccess + ?Sized>(&mut self, world: &mut W) {
        if let Some(collider) = self.prediction.ignored_platform.take() {
            world.ignore_collision(collider, false);
        }
    }

    /// Fire `NewGroundEnter` when the ground collider changes.
    pub(crate) fn process_new_ground(&mut self, collider: Option<ColliderId>) {
        if collider == self.ground.collider {
            return;
        }
        if let Some(collider) = collider {
            debug!("new ground {collider:?}");
            self.events.emit(crate::events::ActorEvent::NewGroundEnter { collider });
        }
    }

    pub(crate) fn set_ground_info(&mut self, ground: GroundState) {
        self.ground = ground;
    }

    pub(crate) fn reset_ground_info(&mut self) {
        self.ground = GroundState::default();
    }

    /// Lost-ground check: the collider the character stood on no longer exists.
    pub(crate) fn check_lost_ground<W: ShapeCaster + BodyAccess + ?Sized>(&mut self, world: &W) {
        let Some(collider) = self.ground.collider else {
            return;
        };
        if !world.collider_exists(collider) {
            debug!("ground {collider:?} was removed");
            self.reset_ground_info();
            self.dynamic_ground.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layers::LayerMask,
        settings::ActorSettings,
        test_scene::PlaneScene,
        types::{EdgeInfo, HitInfo},
    };

    fn edge_hit(contact: Vec3, upper: Vec3, lower: Vec3) -> CollisionInfo {
        let up = Vec3::y();
        CollisionInfo {
            hit: Some(HitInfo {
                distance: 0.1,
                point: Vec3::zeros(),
                normal: contact,
                layer: Layer::DEFAULT,
                collider: ColliderId(0),
                body: None,
            }),
            displacement: Vec3::zeros(),
            contact_slope_angle: angle_deg(&up, &contact),
            edge: EdgeInfo {
                is_edge: true,
                edge_angle: angle_deg(&upper, &lower),
                upper_normal: upper,
                lower_normal: lower,
                upper_slope_angle: angle_deg(&up, &upper),
                lower_slope_angle: angle_deg(&up, &lower),
            },
        }
    }

    fn tilted(deg: f32) -> Vec3 {
        let r = deg.to_radians();
        Vec3::new(-r.sin(), r.cos(), 0.0)
    }

    #[test]
    fn edge_resolution_prefers_the_walkable_side() {
        let up = Vec3::y();

        // Both sides walkable: the edge is walked over as flat ground.
        let gentle = edge_hit(tilted(20.0), tilted(10.0), tilted(30.0));
        assert_eq!(ground_slope_normal(&gentle, up, 55.0), up);

        // Step corner: tread above, riser below.
        let step = edge_hit(tilted(45.0), Vec3::y(), -Vec3::x());
        assert_eq!(ground_slope_normal(&step, up, 55.0), Vec3::y());

        // Ledge top is steep, the surface below it walkable.
        let lower = edge_hit(tilted(60.0), tilted(70.0), tilted(10.0));
        assert!((ground_slope_normal(&lower, up, 55.0) - tilted(10.0)).norm() < 1.0e-6);

        // Nothing walkable: raw contact normal.
        let steep = edge_hit(tilted(75.0), tilted(70.0), tilted(80.0));
        assert!((ground_slope_normal(&steep, up, 55.0) - tilted(75.0)).norm() < 1.0e-6);
    }

    #[test]
    fn plain_contacts_use_their_own_normal() {
        let mut info = edge_hit(tilted(30.0), Vec3::y(), Vec3::y());
        info.edge = EdgeInfo::flat(tilted(30.0), 30.0);
        let normal = ground_slope_normal(&info, Vec3::y(), 55.0);
        assert!((normal - tilted(30.0)).norm() < 1.0e-6);

        let ground = GroundState::from_collision(&info, Vec3::y(), 55.0).unwrap();
        assert!((ground.slope_angle - 30.0).abs() < 1.0e-3);
        assert!(!ground.is_on_edge);
    }

    #[test]
    fn adoption_rules() {
        assert!(should_adopt_predicted_ground(true, false, 0.0, false));
        assert!(should_adopt_predicted_ground(false, true, 0.0, false));
        assert!(should_adopt_predicted_ground(false, false, 0.0, true));
        assert!(!should_adopt_predicted_ground(false, false, 0.1, false));
        assert!(should_adopt_predicted_ground(false, false, 0.2, false));
    }

    fn actor_at(y: f32) -> CharacterActor {
        let settings = ActorSettings {
            force_grounded_at_start: false,
            ..Default::default()
        };
        CharacterActor::new(settings, Vec3::new(0.0, y, 0.0))
    }

    #[test]
    fn force_grounded_snaps_onto_the_floor() {
        let scene = PlaneScene::floor();
        let mut actor = actor_at(0.3);
        actor.force_grounded(&scene);

        assert!(actor.is_grounded());
        assert!(actor.is_stable());
        assert!(actor.position().y.abs() < 1.0e-3);
        assert!(matches!(
            actor.events().last(),
            Some(crate::events::ActorEvent::NewGroundEnter { collider: ColliderId(0) })
        ));
    }

    #[test]
    fn force_grounded_is_refused_while_forced_off_the_ground() {
        let scene = PlaneScene::floor();
        let mut actor = actor_at(0.3);
        actor.force_not_grounded(3);
        actor.force_grounded(&scene);
        assert!(!actor.is_grounded());
    }

    #[test]
    fn predicted_ground_is_adopted_when_falling_onto_it() {
        let mut scene = PlaneScene::floor();
        let mut actor = actor_at(0.05);
        actor.set_velocity(Vec3::new(0.0, -1.0, 0.0));

        actor.unstable_probe_ground(&mut scene, Vec3::new(0.0, 0.05, 0.0), false, 0.02);
        assert!(actor.is_grounded());
        assert_eq!(actor.prediction.collider, Some(ColliderId(0)));
        assert!((actor.prediction.distance - 0.05).abs() < 1.0e-3);
    }

    #[test]
    fn ascending_characters_need_contact_time() {
        let mut scene = PlaneScene::floor();
        let mut actor = actor_at(0.05);
        actor.set_velocity(Vec3::new(0.0, 1.0, 0.0));

        let p = Vec3::new(0.0, 0.05, 0.0);
        actor.unstable_probe_ground(&mut scene, p, false, 0.15);
        assert!(!actor.is_grounded());
        actor.unstable_probe_ground(&mut scene, p, false, 0.15);
        assert!(actor.is_grounded());
    }

    #[test]
    fn distant_prediction_does_not_ground() {
        let mut scene = PlaneScene::floor();
        let mut actor = actor_at(2.0);
        actor.set_velocity(Vec3::new(0.0, -1.0, 0.0));

        actor.unstable_probe_ground(&mut scene, Vec3::new(0.0, 2.0, 0.0), false, 0.02);
        assert!(!actor.is_grounded());
        assert_eq!(actor.prediction.collider, Some(ColliderId(0)));
        assert_eq!(actor.prediction.contact_time, 0.0);
    }

    #[test]
    fn predicted_one_way_platform_is_ignored_until_the_prediction_moves() {
        let mut scene = PlaneScene::floor().with_layered_plane(Vec3::y(), Vec3::new(0.0, 1.0, 0.0), Layer(1));
        let settings = ActorSettings {
            force_grounded_at_start: false,
            layers: crate::layers::LayerSettings {
                one_way_platforms: LayerMask::from_layers(&[Layer(1)]),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut actor = CharacterActor::new(settings, Vec3::new(0.0, 3.0, 0.0));
        actor.set_velocity(Vec3::new(0.0, -1.0, 0.0));

        actor.unstable_probe_ground(&mut scene, Vec3::new(0.0, 3.0, 0.0), true, 0.02);
        assert_eq!(actor.prediction.collider, Some(ColliderId(1)));
        assert_eq!(scene.ignored, vec![ColliderId(1)]);

        // Below the platform only the floor is predicted.
        actor.unstable_probe_ground(&mut scene, Vec3::new(0.0, 0.5, 0.0), false, 0.02);
        assert_eq!(actor.prediction.collider, Some(ColliderId(0)));
        assert!(scene.ignored.is_empty());
    }

    #[test]
    fn probe_keeps_a_stable_character_on_the_floor() {
        let scene = PlaneScene::floor();
        let mut actor = actor_at(0.0);
        actor.force_grounded(&scene);

        actor.position = Vec3::new(0.0, 0.2, 0.0);
        actor.probe_ground(&scene, 0.02);
        assert!(actor.is_stable());
        assert!(actor.position().y.abs() < 1.0e-3);
    }

    #[test]
    fn probe_without_ground_ungrounds() {
        let mut scene = PlaneScene::floor();
        let mut actor = actor_at(0.0);
        actor.force_grounded(&scene);

        scene.remove(ColliderId(0));
        actor.probe_ground(&scene, 0.02);
        assert!(!actor.is_grounded());
        assert!(!actor.can_enter_grounded_state());
    }

    #[test]
    fn removed_ground_is_lost() {
        let mut scene = PlaneScene::floor();
        let mut actor = actor_at(0.0);
        actor.force_grounded(&scene);
        assert!(actor.is_grounded());

        scene.remove(ColliderId(0));
        actor.check_lost_ground(&scene);
        assert!(!actor.is_grounded());
    }
}
