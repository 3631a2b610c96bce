/*!
Coupling with moving ground.

Before the simulation the actor remembers where the ground body was and where the character stood
relative to it. After the simulation the same relative placement, carried by the ground's motion,
is the character's target. Sudden ground accelerations break the coupling.
*/

use log::debug;

use crate::{
    actor::CharacterActor,
    math::{Quat, Vec3, angle_deg, is_zero, look_rotation, normalize_or_zero, project, project_on_plane},
    scene::{BodyAccess, Scene},
    settings::{DEFAULT_FORCE_NOT_GROUNDED_FRAMES, DISTURBANCE_LAUNCH_ANGLE, Dimension, InheritedVelocity},
    solver::post_simulation_collide_and_slide,
    types::BodyId,
};

/// Pose of the ground body taken before the simulation.
#[derive(Clone, Copy, Debug)]
pub struct GroundAnchor {
    pub body: BodyId,
    pub position: Vec3,
    pub rotation: Quat,
    /// Character position relative to the ground body position, in world axes.
    pub ground_to_character: Vec3,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DynamicGroundLink {
    pub anchor: Option<GroundAnchor>,
    /// Velocity of the ground under the character.
    pub velocity: Vec3,
    /// Ground velocity of the previous update.
    pub previous_velocity: Vec3,
}

impl DynamicGroundLink {
    #[inline]
    pub fn delta_velocity(&self) -> Vec3 {
        self.velocity - self.previous_velocity
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Where the ground motion carries the character.
#[derive(Clone, Copy, Debug)]
pub struct FollowTarget {
    pub position: Vec3,
    /// Rotation of the ground since the anchor was taken.
    pub delta_rotation: Quat,
}

/// Carry the anchored placement along with the ground's current pose.
pub fn follow_target(anchor: &GroundAnchor, ground_position: Vec3, ground_rotation: Quat) -> FollowTarget {
    let delta_rotation = ground_rotation * anchor.rotation.inverse();
    FollowTarget {
        position: ground_position + delta_rotation * anchor.ground_to_character,
        delta_rotation,
    }
}

/// A ground velocity change too large to follow. One-way platforms are always followed.
#[inline]
pub fn is_disturbance(delta_velocity: Vec3, max_change: f32, on_one_way_platform: bool) -> bool {
    !on_one_way_platform && delta_velocity.norm() > max_change
}

/// Velocity after leaving moving ground.
///
/// Planar and vertical ground motion are inherited separately, each only above its threshold.
/// Vertical ground motion is not inherited when it would pull a jumping character down.
pub fn inherited_velocity(
    velocity: Vec3,
    ground_velocity: Vec3,
    up: Vec3,
    settings: &InheritedVelocity,
) -> Vec3 {
    let planar = project_on_plane(ground_velocity, up);
    let vertical = project(ground_velocity, up);
    let mut inherited = Vec3::zeros();

    if planar.norm() >= settings.planar_threshold {
        inherited += planar * settings.planar_multiplier;
    }
    if vertical.norm() >= settings.vertical_threshold && velocity.dot(&up) > -ground_velocity.dot(&up) {
        inherited += vertical * settings.vertical_multiplier;
    }
    velocity + inherited
}

impl CharacterActor {
    fn follows_ground(&self) -> bool {
        self.is_stable() && self.settings.support_dynamic_ground && self.ground.is_rigidbody()
    }

    /// Anchor the character to its ground body at `position`, or drop the link.
    pub(crate) fn set_dynamic_ground_data<W: BodyAccess + ?Sized>(&mut self, world: &W, position: Vec3) {
        let pose = self
            .ground
            .body_id()
            .filter(|_| self.follows_ground())
            .and_then(|body| world.body_pose(body).map(|pose| (body, pose)));

        match pose {
            Some((body, (ground_position, ground_rotation))) => {
                let velocity = world.body_point_velocity(body, position);
                self.dynamic_ground = DynamicGroundLink {
                    anchor: Some(GroundAnchor {
                        body,
                        position: ground_position,
                        rotation: ground_rotation,
                        ground_to_character: position - ground_position,
                    }),
                    velocity,
                    previous_velocity: velocity,
                };
            }
            None => self.dynamic_ground.clear(),
        }
    }

    /// Follow the ground body after the simulation moved it.
    pub(crate) fn process_dynamic_ground_movement<W: Scene + ?Sized>(&mut self, world: &W, dt: f32) {
        if !self.settings.support_dynamic_ground || !self.ground.is_rigidbody() {
            return;
        }
        let Some(anchor) = self.dynamic_ground.anchor else {
            return;
        };
        let Some((ground_position, ground_rotation)) = world.body_pose(anchor.body) else {
            return;
        };

        self.ignore_ground_collision();

        let target = follow_target(&anchor, ground_position, ground_rotation);
        let mut target_rotation = self.rotation;
        if self.settings.dimension == Dimension::Three && self.settings.rotate_forward_direction {
            let up = self.up();
            let forward = normalize_or_zero(project_on_plane(target.delta_rotation * self.forward(), up));
            if let Some(rotation) = look_rotation(forward, up) {
                target_rotation = rotation;
            }
        }

        self.dynamic_ground.previous_velocity = self.dynamic_ground.velocity;
        if dt > 0.0 {
            self.dynamic_ground.velocity = (target.position - self.position) / dt;
        }

        let on_platform = self.settings.layers.is_one_way_platform(self.ground.layer);
        if is_disturbance(
            self.dynamic_ground.delta_velocity(),
            self.settings.max_ground_velocity_change,
            on_platform,
        ) {
            let ground_velocity = self.dynamic_ground.velocity;
            debug!("ground disturbance, velocity change {:?}", self.dynamic_ground.delta_velocity());
            if !is_zero(&ground_velocity)
                && angle_deg(&ground_velocity, &self.up()) < DISTURBANCE_LAUNCH_ANGLE
            {
                self.force_not_grounded(DEFAULT_FORCE_NOT_GROUNDED_FRAMES);
            }

            let velocity = self.dynamic_ground.previous_velocity;
            self.velocity = velocity;
            self.position += velocity * dt;
            self.rotation = target_rotation;
        } else {
            let ctx = self.slide_context(world);
            let out = post_simulation_collide_and_slide(
                &ctx,
                self.position,
                target.position - self.position,
                self.ground.stable_normal,
                self.settings.max_post_simulation_slide_iterations,
            );
            self.position = out.position;
            // Blocked while following: keep facing where the character faced.
            if !out.collided {
                self.rotation = target_rotation;
            }
        }
    }

    /// A kinematic ground body pushing into the character must not add velocity.
    fn ignore_ground_collision(&mut self) {
        let Some(ground_body) = self.ground.body_id() else {
            return;
        };
        let rammed = self.contacts.all.iter().any(|c| {
            matches!(c.body, Some((id, crate::types::BodyKind::Kinematic)) if id == ground_body)
        });
        if rammed {
            self.velocity = self.velocities.input;
        }
    }

    /// Add the ground velocity once, on the first airborne update after a forced ungrounding.
    pub(crate) fn process_inherited_velocity(&mut self) {
        if !self.force_not_grounded_flag {
            return;
        }
        self.velocity = inherited_velocity(
            self.velocity,
            self.dynamic_ground.velocity,
            self.up(),
            &self.settings.inherited_velocity,
        );
        self.dynamic_ground.velocity = Vec3::zeros();
        self.dynamic_ground.previous_velocity = Vec3::zeros();
    }

    /// Push the character's weight into the ground body at the contact point.
    pub(crate) fn apply_weight<W: BodyAccess + ?Sized>(&self, world: &mut W) {
        if !self.settings.apply_weight_to_ground {
            return;
        }
        let Some(body) = self.ground.body_id() else {
            return;
        };
        let force = -self.up() * (self.settings.mass * self.settings.weight_gravity);
        world.apply_force_at_point(body, force, self.ground.contact_point);
    }
}
