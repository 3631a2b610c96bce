/*!
The character actor and its update step.

An update is split around the host simulation:

1. [`CharacterActor::pre_simulation_step`] moves the character with collide-and-slide, detects
   ground while airborne and turns the result into a velocity for the simulation.
2. The host simulation integrates that velocity (and whatever else it simulates).
3. [`CharacterActor::post_simulation_step`] gathers contacts, follows moving ground, probes and snaps
   to the ground and settles the velocity kept for the next update.

[`CharacterActor::step`] runs all three for hosts that implement [`Simulation`].
*/

use log::{debug, warn};
use nalgebra as na;

use crate::{
    body::{BodyGeometry, BodySize, anchor_shift, next_size},
    collisions::{body_fits, cast_body},
    contacts::ContactSet,
    dynamic_ground::DynamicGroundLink,
    events::{ActorEvent, EventBus},
    ground::{GroundPrediction, GroundState},
    math::{
        Quat, Vec3, from_to_rotation, is_finite, is_zero, normalize_or_zero, project,
        project_on_plane, project_on_tangent, signed_angle_deg,
    },
    scene::{Scene, ShapeCaster, SimulatedBody, Simulation},
    settings::{
        ActorSettings, COLLIDER_MIN_BOTTOM_OFFSET, CONTACT_PREDICTION,
        DEFAULT_FORCE_NOT_GROUNDED_FRAMES, Dimension, ReferenceMode, UpDirection, VelocityMode,
    },
    solver::{SlideContext, UnstableSlide, stable_collide_and_slide, unstable_collide_and_slide},
    stability::{
        GroundedTransition, Stability, StabilityInput, StateTimers, classify, grounded_transition,
        last_grounded_velocity,
    },
    types::CastFilter,
};

/// Velocities recorded at the phases of the last update.
#[derive(Clone, Copy, Debug, Default)]
pub struct VelocityState {
    /// Velocity the update started with.
    pub input: Vec3,
    /// Velocity handed to the simulation.
    pub pre_simulation: Vec3,
    /// Velocity the simulation left.
    pub post_simulation: Vec3,
    /// `post_simulation - pre_simulation`.
    pub external: Vec3,
}

/// Positions around the last ground probe.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbingRecord {
    pub pre_position: Vec3,
    pub post_position: Vec3,
    pub displacement: Vec3,
}

#[derive(Debug)]
pub struct CharacterActor {
    pub(crate) settings: ActorSettings,

    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    /// Forward direction in planar mode, where the rotation only carries the up direction.
    pub(crate) forward_2d: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) velocities: VelocityState,
    pub(crate) pre_simulation_position: Vec3,

    pub(crate) body_size: BodySize,
    pub(crate) target_body_size: BodySize,

    pub(crate) ground: GroundState,
    pub(crate) was_grounded: bool,
    pub(crate) was_stable: bool,
    pub(crate) force_not_grounded_frames: u32,
    pub(crate) force_not_grounded_flag: bool,
    pub(crate) prediction: GroundPrediction,
    pub(crate) dynamic_ground: DynamicGroundLink,

    pub(crate) contacts: ContactSet,
    pub(crate) timers: StateTimers,
    pub(crate) last_grounded_velocity: Vec3,
    pub(crate) probing: ProbingRecord,
    pub(crate) events: EventBus,
    started: bool,
}

#[inline]
fn is_valid_dt(dt: f32) -> bool {
    dt.is_finite() && dt > 0.0
}

impl CharacterActor {
    /// A character with its feet at `position`. Settings are taken as given; validate them first.
    pub fn new(settings: ActorSettings, position: Vec3) -> Self {
        let rotation = match settings.up_direction {
            UpDirection::Fixed(up) if !is_zero(&up) => from_to_rotation(Vec3::y(), up.normalize()),
            _ => Quat::identity(),
        };

        Self {
            position,
            rotation,
            forward_2d: Vec3::x(),
            velocity: Vec3::zeros(),
            velocities: VelocityState::default(),
            pre_simulation_position: position,
            body_size: settings.body_size,
            target_body_size: settings.body_size,
            ground: GroundState::default(),
            was_grounded: false,
            was_stable: false,
            force_not_grounded_frames: 0,
            force_not_grounded_flag: false,
            prediction: GroundPrediction::default(),
            dynamic_ground: DynamicGroundLink::default(),
            contacts: ContactSet::default(),
            timers: StateTimers::default(),
            last_grounded_velocity: Vec3::zeros(),
            probing: ProbingRecord::default(),
            events: EventBus::default(),
            started: false,
            settings,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Update

    /// Run a whole update: pre-simulation, the host simulation and post-simulation.
    pub fn step<W: Scene + Simulation + ?Sized>(&mut self, world: &mut W, dt: f32) {
        if !is_valid_dt(dt) {
            warn!("skipping actor step with dt = {dt}");
            return;
        }
        self.pre_simulation_step(world, dt);

        let mut body = self.simulated_body();
        world.simulate(dt, &mut body);
        self.apply_simulated_body(body);

        self.post_simulation_step(world, dt);
    }

    /// The character as handed to the host simulation.
    pub fn simulated_body(&self) -> SimulatedBody {
        SimulatedBody {
            position: self.position,
            rotation: self.rotation,
            velocity: self.velocity,
        }
    }

    /// Take back the character after the host simulation moved it.
    pub fn apply_simulated_body(&mut self, body: SimulatedBody) {
        if !is_finite(&body.position) || !is_finite(&body.velocity) {
            warn!("ignoring non-finite simulated body {body:?}");
            return;
        }
        self.position = body.position;
        self.rotation = body.rotation;
        self.velocity = body.velocity;
    }

    pub fn pre_simulation_step<W: Scene + ?Sized>(&mut self, world: &mut W, dt: f32) {
        if !is_valid_dt(dt) {
            warn!("skipping pre-simulation step with dt = {dt}");
            return;
        }

        self.contacts.clear();
        self.events.clear_log();

        if !self.started {
            self.started = true;
            if self.settings.force_grounded_at_start {
                self.force_grounded(&*world);
            }
        }

        if !self.force_not_grounded_flag {
            self.was_grounded = self.is_grounded();
            self.was_stable = self.is_stable();
        }

        if self.settings.always_not_grounded {
            self.force_not_grounded(DEFAULT_FORCE_NOT_GROUNDED_FRAMES);
        }

        self.check_lost_ground(&*world);

        self.velocities.input = self.velocity;

        self.handle_size(dt);
        self.handle_position(world, dt);

        self.velocities.pre_simulation = self.velocity;
        self.pre_simulation_position = self.position;

        let stability = self.stability();
        self.timers.advance(stability, dt);
        self.last_grounded_velocity =
            last_grounded_velocity(self.last_grounded_velocity, self.velocity, stability);

        match grounded_transition(self.was_grounded, stability.is_grounded()) {
            Some(GroundedTransition::Enter) => {
                debug!("grounded on {:?}", self.ground.collider);
                let local_velocity = self.local_velocity();
                self.events.emit(ActorEvent::GroundedStateEnter { local_velocity });
            }
            Some(GroundedTransition::Exit) => {
                debug!("left the ground");
                self.events.emit(ActorEvent::GroundedStateExit);
            }
            None => {}
        }

        self.force_not_grounded_frames = self.force_not_grounded_frames.saturating_sub(1);
        self.force_not_grounded_flag = false;
    }

    pub fn post_simulation_step<W: Scene + ?Sized>(&mut self, world: &mut W, dt: f32) {
        if !is_valid_dt(dt) {
            warn!("skipping post-simulation step with dt = {dt}");
            return;
        }

        self.handle_rotation(dt);
        self.gather_contacts(&*world);

        self.velocities.post_simulation = self.velocity;
        self.velocities.external = self.velocities.post_simulation - self.velocities.pre_simulation;

        if self.is_stable() {
            self.process_dynamic_ground_movement(&*world, dt);

            self.probing.pre_position = self.position;
            if self.is_stable() {
                self.probe_ground(&*world, dt);
            }
            self.probing.post_position = self.position;
            self.probing.displacement = self.probing.post_position - self.probing.pre_position;
        } else {
            self.probing.displacement = Vec3::zeros();
        }

        self.reconcile_velocity();
    }

    fn handle_size(&mut self, dt: f32) {
        let previous = self.body_size;
        self.body_size = next_size(previous, self.target_body_size, self.settings.size_lerp_speed, dt);

        if !self.is_grounded() && previous.height != self.body_size.height {
            let shift = anchor_shift(self.settings.size_reference, previous.height, self.body_size.height);
            self.position += self.up() * shift;
        }
    }

    fn handle_position<W: Scene + ?Sized>(&mut self, world: &mut W, dt: f32) {
        let up = self.up();

        let position = if self.is_stable() {
            self.apply_weight(world);
            self.velocity = project_on_plane(self.velocity, up);

            let displacement = project_on_tangent(
                self.constrain(self.velocity * dt),
                self.ground.stable_normal,
                up,
            );
            let ctx = self.slide_context(&*world);
            let position = stable_collide_and_slide(
                &ctx,
                self.position,
                displacement,
                self.ground.stable_normal,
                false,
                self.settings.max_slide_iterations,
            )
            .position;

            self.set_dynamic_ground_data(&*world, position);
            position
        } else {
            self.process_inherited_velocity();

            let params = UnstableSlide {
                was_grounded: self.was_grounded,
                dt,
                max_upwards_velocity: self.settings.max_unstable_upwards_velocity,
                one_way_valid_arc: self.settings.one_way_platforms_valid_arc,
            };
            let displacement = self.constrain(self.velocity * dt);
            let ctx = self.slide_context(&*world);
            let out = unstable_collide_and_slide(
                &ctx,
                &params,
                self.position,
                displacement,
                self.settings.max_slide_iterations,
            );

            self.unstable_probe_ground(world, out.position, out.valid_one_way_platform, dt);
            self.set_dynamic_ground_data(&*world, out.position);
            out.position
        };

        self.move_to(position, dt);
    }

    /// Reach `position` through the simulation: the velocity covers the gap in one update.
    fn move_to(&mut self, position: Vec3, dt: f32) {
        let velocity = (position - self.position) / dt;
        if is_finite(&velocity) {
            self.velocity = velocity;
        } else {
            warn!("dropping non-finite move toward {position:?}");
        }
    }

    fn handle_rotation(&mut self, dt: f32) {
        if !self.settings.constraint_rotation {
            return;
        }
        let up = match self.settings.up_direction {
            UpDirection::Fixed(up) => up,
            UpDirection::Reference { point, mode } => {
                let target = self.position + self.velocity * dt;
                let toward = normalize_or_zero(point - target);
                match mode {
                    ReferenceMode::Towards => toward,
                    ReferenceMode::Away => -toward,
                }
            }
        };
        self.set_up(up);
    }

    fn gather_contacts<C: ShapeCaster + ?Sized>(&mut self, world: &C) {
        // A stable character floats its collider above the ground.
        let bottom_offset = if self.is_stable() {
            self.step_offset().max(COLLIDER_MIN_BOTTOM_OFFSET)
        } else {
            0.0
        };
        let capsule = self.geometry().collider_capsule(self.position, bottom_offset);
        let filter = CastFilter::solid(self.settings.layers.obstacles());

        let mut found = std::mem::take(&mut self.contacts.all);
        found.clear();
        world.contacts(&capsule, CONTACT_PREDICTION, &filter, &mut found);
        self.contacts.all = found;

        let new = self.contacts.classify(self.up());
        if let Some(contact) = new.wall {
            self.events.emit(ActorEvent::WallHit(contact));
        }
        if let Some(contact) = new.head {
            self.events.emit(ActorEvent::HeadHit(contact));
        }
    }

    fn reconcile_velocity(&mut self) {
        let mode = if self.is_stable() {
            self.settings.stable_velocity_mode
        } else {
            self.settings.unstable_velocity_mode
        };

        match mode {
            VelocityMode::Input => self.velocity = self.velocities.input,
            VelocityMode::PreSimulation => self.velocity = self.velocities.pre_simulation,
            VelocityMode::PostSimulation => {}
        }

        // Walking: keep the speed but drop the direction changes the simulation made.
        if self.is_stable() && mode != VelocityMode::Input && self.was_stable {
            let up = self.up();
            let planar = normalize_or_zero(project_on_plane(self.velocity, up));
            self.velocity = planar * self.velocity.norm() + project(self.velocity, up);
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Internals shared with the ground modules

    /// Body geometry for the current size and up direction.
    pub fn geometry(&self) -> BodyGeometry {
        BodyGeometry::new(self.body_size, self.up())
    }

    #[inline]
    pub(crate) fn step_offset(&self) -> f32 {
        self.geometry().step_offset(self.settings.step_up_distance)
    }

    pub(crate) fn slide_context<'a, C: ShapeCaster + ?Sized>(&self, caster: &'a C) -> SlideContext<'a, C> {
        SlideContext {
            caster,
            geometry: self.geometry(),
            layers: self.settings.layers,
            slope_limit: self.settings.slope_limit,
            step_offset: self.step_offset(),
            step_up_distance: self.settings.step_up_distance,
            slide_on_walls: self.settings.slide_on_walls,
            dimension: self.settings.dimension,
            can_push_dynamic_bodies: self.settings.can_push_dynamic_bodies,
            ground_body: self.ground.body_id(),
            wall_contact: self.contacts.wall_collision,
        }
    }

    /// Keep displacements in the XY plane in planar mode.
    #[inline]
    fn constrain(&self, v: Vec3) -> Vec3 {
        match self.settings.dimension {
            Dimension::Two => Vec3::new(v.x, v.y, 0.0),
            Dimension::Three => v,
        }
    }

    /// Rotate around the bottom center while grounded and around the center otherwise.
    fn rotate_internal(&mut self, delta: Quat) {
        let pivot = |actor: &Self| {
            let geometry = actor.geometry();
            if actor.is_grounded() {
                geometry.bottom_center(actor.position, 0.0)
            } else {
                geometry.center(actor.position)
            }
        };
        let before = pivot(self);
        self.rotation = delta * self.rotation;
        let after = pivot(self);
        self.position += before - after;
    }

    // ---------------------------------------------------------------------------------------------
    // State

    pub fn settings(&self) -> &ActorSettings {
        &self.settings
    }

    /// Feet position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    pub fn forward(&self) -> Vec3 {
        match self.settings.dimension {
            Dimension::Two => self.forward_2d,
            Dimension::Three => self.rotation * Vec3::z(),
        }
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::x()
    }

    pub fn body_size(&self) -> BodySize {
        self.body_size
    }

    pub fn target_body_size(&self) -> BodySize {
        self.target_body_size
    }

    pub fn stability(&self) -> Stability {
        classify(&StabilityInput {
            grounded: self.ground.is_grounded(),
            stable_layer: self.settings.layers.is_stable(self.ground.layer),
            was_stable: self.was_stable,
            slope_angle: self.ground.slope_angle,
            contact_slope_angle: self.ground.contact_slope_angle,
            slope_limit: self.settings.slope_limit,
            use_stable_edge_when_landing: self.settings.use_stable_edge_when_landing,
        })
    }

    pub fn is_grounded(&self) -> bool {
        self.ground.is_grounded()
    }

    pub fn is_stable(&self) -> bool {
        self.stability().is_stable()
    }

    pub fn was_grounded(&self) -> bool {
        self.was_grounded
    }

    pub fn was_stable(&self) -> bool {
        self.was_stable
    }

    pub fn is_falling(&self) -> bool {
        self.local_velocity().y < 0.0
    }

    pub fn is_ascending(&self) -> bool {
        self.local_velocity().y > 0.0
    }

    pub fn ground(&self) -> &GroundState {
        &self.ground
    }

    pub fn prediction(&self) -> &GroundPrediction {
        &self.prediction
    }

    pub fn dynamic_ground(&self) -> &DynamicGroundLink {
        &self.dynamic_ground
    }

    pub fn contacts(&self) -> &ContactSet {
        &self.contacts
    }

    pub fn timers(&self) -> &StateTimers {
        &self.timers
    }

    pub fn last_grounded_velocity(&self) -> Vec3 {
        self.last_grounded_velocity
    }

    pub fn probing(&self) -> &ProbingRecord {
        &self.probing
    }

    pub fn velocities(&self) -> &VelocityState {
        &self.velocities
    }

    /// Events emitted since the current update started.
    pub fn events(&self) -> &[ActorEvent] {
        self.events.log()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ActorEvent) + Send + 'static) {
        self.events.subscribe(observer);
    }

    // ---------------------------------------------------------------------------------------------
    // Velocity

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn planar_velocity(&self) -> Vec3 {
        project_on_plane(self.velocity, self.up())
    }

    /// Replace the planar part, keeping the vertical part.
    pub fn set_planar_velocity(&mut self, planar: Vec3) {
        let up = self.up();
        self.velocity = project_on_plane(planar, up) + project(self.velocity, up);
    }

    pub fn vertical_velocity(&self) -> Vec3 {
        project(self.velocity, self.up())
    }

    /// Replace the vertical part, keeping the planar part.
    pub fn set_vertical_velocity(&mut self, vertical: Vec3) {
        let up = self.up();
        self.velocity = project_on_plane(self.velocity, up) + project(vertical, up);
    }

    /// Velocity in the character's own axes.
    pub fn local_velocity(&self) -> Vec3 {
        self.rotation.inverse() * self.velocity
    }

    pub fn set_local_velocity(&mut self, local: Vec3) {
        self.velocity = self.rotation * local;
    }

    /// Velocity along the ground tangent, or perpendicular to up when not stable.
    pub fn stable_velocity(&self) -> Vec3 {
        let up = self.up();
        let normal = if self.is_stable() { self.ground.stable_normal } else { up };
        project_on_tangent(self.velocity, normal, up)
    }

    // ---------------------------------------------------------------------------------------------
    // Orientation

    /// Turn the up direction. Zero vectors are ignored.
    pub fn set_up(&mut self, up: Vec3) {
        let up = normalize_or_zero(up);
        if is_zero(&up) {
            return;
        }
        self.rotate_internal(from_to_rotation(self.up(), up));
    }

    /// Turn the forward direction. With rotation constraints on, only yaw around up changes.
    pub fn set_forward(&mut self, forward: Vec3) {
        if is_zero(&forward) {
            return;
        }

        match self.settings.dimension {
            Dimension::Two => {
                let forward = normalize_or_zero(project(forward, Vec3::x()));
                if !is_zero(&forward) {
                    self.forward_2d = forward;
                }
            }
            Dimension::Three => {
                let delta = if self.settings.constraint_rotation {
                    let up = self.up();
                    let angle = signed_angle_deg(&self.forward(), &forward, &up).to_radians();
                    Quat::from_axis_angle(&na::Unit::new_normalize(up), angle)
                } else {
                    from_to_rotation(self.forward(), forward)
                };
                self.rotate_internal(delta);
            }
        }
    }

    /// Turn around up by `degrees`.
    pub fn set_yaw(&mut self, degrees: f32) {
        let turn = Quat::from_axis_angle(&na::Unit::new_normalize(self.up()), degrees.to_radians());
        let forward = turn * self.forward();
        self.set_forward(forward);
    }

    // ---------------------------------------------------------------------------------------------
    // Body size and placement

    /// Request a new body size. Returns `false`, leaving the size unchanged, when the size is
    /// invalid or the body would not fit.
    pub fn set_body_size<C: ShapeCaster + ?Sized>(&mut self, size: BodySize, world: &C) -> bool {
        if !(size.width.is_finite() && size.height.is_finite()) || !size.is_valid() {
            return false;
        }

        let up = self.up();
        let mut position = self.position;
        if !self.is_grounded() {
            position += up * anchor_shift(self.settings.size_reference, self.body_size.height, size.height);
        }

        let filter =
            CastFilter::solid(self.settings.layers.obstacles_without_one_way_platforms()).without_rigidbodies();
        if !body_fits(world, &BodyGeometry::new(size, up), position, &filter) {
            debug!("body size {size:?} does not fit");
            return false;
        }

        self.target_body_size = size;
        true
    }

    pub fn teleport(&mut self, position: Vec3) {
        let rotation = self.rotation;
        self.teleport_with_rotation(position, rotation);
    }

    pub fn teleport_with_rotation(&mut self, position: Vec3, rotation: Quat) {
        if !is_finite(&position) {
            warn!("ignoring teleport to {position:?}");
            return;
        }
        self.position = position;
        self.rotation = rotation;
        self.events.emit(ActorEvent::Teleport { position, rotation });
    }

    /// Move toward `destination` with a single body cast, stopping at the first obstacle.
    /// Triggers and one-way platforms do not stop it.
    pub fn sweep_and_teleport<C: ShapeCaster + ?Sized>(&mut self, destination: Vec3, world: &C) {
        let filter = CastFilter::solid(self.settings.layers.obstacles_without_one_way_platforms());
        let info = cast_body(
            world,
            &self.geometry(),
            self.position,
            destination - self.position,
            0.0,
            &filter,
        );
        let position = self.position + info.displacement;
        if is_finite(&position) {
            self.position = position;
        }
    }
}
