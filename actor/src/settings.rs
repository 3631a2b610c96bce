/*!
Character actor settings and solver tolerances.

The `pub const` values are fixed tolerances of the solver. Everything a game would tune per
character lives in [`ActorSettings`], which is plain data: it derives `serde` traits, falls back to
sensible defaults for missing fields and is checked once by [`ActorSettings::validate`].

Notes
- Distances are in meters, time in seconds, angles in degrees.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
*/

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    body::BodySize,
    error::SettingsError,
    layers::LayerSettings,
    math::{Vec3, is_finite, is_zero},
};

/// Gap kept between the cast shape and whatever it hits (meters).
/// Casts use a capsule shrunk by this amount so a resting body never starts a cast in contact.
pub const SKIN_WIDTH: f32 = 0.005;

/// Lowest the collider bottom is raised while standing stable (meters).
pub const COLLIDER_MIN_BOTTOM_OFFSET: f32 = 0.1;

/// Default cap on collide-and-slide iterations per pre-simulation slide.
pub const MAX_SLIDE_ITERATIONS: u32 = 3;

/// Default cap on collide-and-slide iterations while following dynamic ground.
pub const MAX_POST_SIMULATION_SLIDE_ITERATIONS: u32 = 2;

/// Distance below the feet within which predicted ground counts as touched (meters).
pub const GROUND_CHECK_DISTANCE: f32 = 0.1;

/// How far below the feet ground is predicted while airborne (meters).
pub const GROUND_PREDICTION_DISTANCE: f32 = 10.0;

/// Time a non-falling character must touch predicted ground before adopting it (seconds).
pub const MAX_UNSTABLE_GROUND_CONTACT_TIME: f32 = 0.2;

/// Upper bound of the slope range on which unstable upward motion is clamped (degrees).
pub const MAX_UNSTABLE_UPWARDS_ANGLE: f32 = 80.0;

/// Contacts whose normal is within this many degrees of horizontal count as walls.
pub const WALL_CONTACT_ANGLE_TOLERANCE: f32 = 10.0;

/// Contacts whose normal is at least this far from up (degrees) count as head contacts.
pub const HEAD_CONTACT_MIN_ANGLE: f32 = 100.0;

/// Contacts whose normal is at most this far from up (degrees) count as ground contacts.
pub const GROUND_CONTACT_MAX_ANGLE: f32 = 89.0;

/// Contact gathering reports colliders closer than this to the body (meters).
pub const CONTACT_PREDICTION: f32 = 0.01;

/// Sideways offset of the two edge detection rays from the contact (meters).
pub const EDGE_RAYS_SEPARATION: f32 = 0.005;

/// Extra length given to edge detection rays past the contact (meters).
pub const EDGE_RAYS_CAST_DISTANCE: f32 = 0.05;

/// How far past a blocking contact the step-up ray looks for the tread (meters).
pub const STEP_TREAD_INSET: f32 = 0.02;

/// Edge angles outside `[MIN_EDGE_ANGLE, MAX_EDGE_ANGLE]` are not edges (degrees).
pub const MIN_EDGE_ANGLE: f32 = 0.5;
pub const MAX_EDGE_ANGLE: f32 = 170.0;

/// Ground velocity within this angle of up is treated as a launch on disturbances (degrees).
pub const DISTURBANCE_LAUNCH_ANGLE: f32 = 45.0;

/// Frames ground detection stays disabled after a forced ungrounding.
pub const DEFAULT_FORCE_NOT_GROUNDED_FRAMES: u32 = 3;

/// Fraction of the body height used as step offset by [`force_grounded`](crate::actor::CharacterActor::force_grounded).
pub const FORCE_GROUNDED_STEP_FACTOR: f32 = 0.8;

/// Body sizes closer than this to their target snap onto it (meters).
pub const SIZE_SNAP_EPSILON: f32 = 1.0e-3;

/// Minimum squared movement threshold to consider a displacement meaningful (m^2).
pub const MIN_MOVE_SQ: f32 = 1.0e-10;

/// Gravity magnitude used for the weight applied to dynamic ground (m/s^2).
pub const DEFAULT_GRAVITY: f32 = 9.8;

/// Which velocity the actor keeps once a step is over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// The velocity the step started with.
    Input,
    /// The velocity produced by collide-and-slide, before the external simulation.
    PreSimulation,
    /// Whatever the external simulation left.
    #[default]
    PostSimulation,
}

/// Which point of the body stays fixed while the size changes in the air.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeReference {
    Top,
    Center,
    #[default]
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Up points from the character toward the reference point.
    Towards,
    /// Up points from the reference point toward the character.
    Away,
}

/// Where the character's up direction comes from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpDirection {
    Fixed(Vec3),
    Reference { point: Vec3, mode: ReferenceMode },
}

impl Default for UpDirection {
    fn default() -> Self {
        UpDirection::Fixed(Vec3::y())
    }
}

/// Planar mode keeps every displacement in the XY plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Two,
    #[default]
    Three,
}

/// How much of the ground velocity a character keeps when it leaves moving ground.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritedVelocity {
    /// Minimum planar ground speed that gets inherited (m/s).
    pub planar_threshold: f32,
    pub planar_multiplier: f32,
    /// Minimum vertical ground speed that gets inherited (m/s).
    pub vertical_threshold: f32,
    pub vertical_multiplier: f32,
}

impl Default for InheritedVelocity {
    fn default() -> Self {
        Self {
            planar_threshold: 2.0,
            planar_multiplier: 1.0,
            vertical_threshold: 2.0,
            vertical_multiplier: 1.0,
        }
    }
}

/// Per-character tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSettings {
    pub body_size: BodySize,
    pub size_reference: SizeReference,
    /// Rate at which the body size approaches its target (1/s). Zero applies sizes instantly.
    pub size_lerp_speed: f32,
    /// Mass used for the weight pushed into dynamic ground (kg).
    pub mass: f32,

    pub layers: LayerSettings,

    /// Steepest walkable slope (degrees, 1..=89).
    pub slope_limit: f32,
    /// When landing, stand stably on edges whose resolved normal is walkable.
    pub use_stable_edge_when_landing: bool,
    /// Highest ledge the character walks onto without jumping (meters).
    pub step_up_distance: f32,
    /// Deepest drop the character stays glued to the ground over (meters).
    pub step_down_distance: f32,
    /// Treat the bottom of the body as flat when standing on an edge.
    pub edge_compensation: bool,
    /// Undo a step that ends on unwalkable ground.
    pub prevent_bad_steps: bool,
    /// Upward speed cap while sliding up unstable slopes (m/s).
    pub max_unstable_upwards_velocity: f32,
    pub slide_on_walls: bool,
    pub detect_ground_while_ascending: bool,
    pub always_not_grounded: bool,
    pub force_grounded_at_start: bool,
    /// Arc around up, seen from the bottom sphere, in which one-way platform contacts count
    /// (degrees, 0..=179).
    pub one_way_platforms_valid_arc: f32,
    pub can_push_dynamic_bodies: bool,

    pub apply_weight_to_ground: bool,
    pub weight_gravity: f32,

    pub support_dynamic_ground: bool,
    /// Turn the character with the yaw of the ground it stands on.
    pub rotate_forward_direction: bool,
    /// Ground velocity changes above this within one step break the coupling (m/s).
    pub max_ground_velocity_change: f32,
    pub inherited_velocity: InheritedVelocity,

    pub stable_velocity_mode: VelocityMode,
    pub unstable_velocity_mode: VelocityMode,

    pub constraint_rotation: bool,
    pub up_direction: UpDirection,
    pub dimension: Dimension,

    pub max_slide_iterations: u32,
    pub max_post_simulation_slide_iterations: u32,
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            body_size: BodySize::new(1.0, 2.0),
            size_reference: SizeReference::Bottom,
            size_lerp_speed: 8.0,
            mass: 1.0,
            layers: LayerSettings::default(),
            slope_limit: 55.0,
            use_stable_edge_when_landing: true,
            step_up_distance: 0.5,
            step_down_distance: 0.5,
            edge_compensation: false,
            prevent_bad_steps: true,
            max_unstable_upwards_velocity: 7.0,
            slide_on_walls: true,
            detect_ground_while_ascending: false,
            always_not_grounded: false,
            force_grounded_at_start: true,
            one_way_platforms_valid_arc: 175.0,
            can_push_dynamic_bodies: true,
            apply_weight_to_ground: true,
            weight_gravity: DEFAULT_GRAVITY,
            support_dynamic_ground: true,
            rotate_forward_direction: true,
            max_ground_velocity_change: 30.0,
            inherited_velocity: InheritedVelocity::default(),
            stable_velocity_mode: VelocityMode::PostSimulation,
            unstable_velocity_mode: VelocityMode::PostSimulation,
            constraint_rotation: true,
            up_direction: UpDirection::default(),
            dimension: Dimension::Three,
            max_slide_iterations: MAX_SLIDE_ITERATIONS,
            max_post_simulation_slide_iterations: MAX_POST_SIMULATION_SLIDE_ITERATIONS,
        }
    }
}

impl ActorSettings {
    /// Parse settings from TOML, filling missing fields with defaults, and validate them.
    pub fn from_toml_str(src: &str) -> Result<Self, SettingsError> {
        let settings: ActorSettings = toml::from_str(src)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let size = self.body_size;
        if !(size.width.is_finite() && size.height.is_finite()) || !size.is_valid() {
            return Err(SettingsError::InvalidBodySize {
                width: size.width,
                height: size.height,
            });
        }
        if size.height < size.width {
            warn!(
                "body height {} is below its width {}, the body degenerates to a sphere",
                size.height, size.width
            );
        }

        in_range("slope_limit", self.slope_limit, 1.0, 89.0)?;
        in_range(
            "one_way_platforms_valid_arc",
            self.one_way_platforms_valid_arc,
            0.0,
            179.0,
        )?;

        let inherited = &self.inherited_velocity;
        for (field, value) in [
            ("size_lerp_speed", self.size_lerp_speed),
            ("mass", self.mass),
            ("step_up_distance", self.step_up_distance),
            ("step_down_distance", self.step_down_distance),
            ("max_unstable_upwards_velocity", self.max_unstable_upwards_velocity),
            ("weight_gravity", self.weight_gravity),
            ("max_ground_velocity_change", self.max_ground_velocity_change),
            ("inherited_velocity.planar_threshold", inherited.planar_threshold),
            ("inherited_velocity.planar_multiplier", inherited.planar_multiplier),
            ("inherited_velocity.vertical_threshold", inherited.vertical_threshold),
            ("inherited_velocity.vertical_multiplier", inherited.vertical_multiplier),
        ] {
            non_negative(field, value)?;
        }

        match self.up_direction {
            UpDirection::Fixed(up) => {
                if !is_finite(&up) {
                    return Err(SettingsError::NonFinite {
                        field: "up_direction",
                    });
                }
                if is_zero(&up) {
                    return Err(SettingsError::ZeroUpDirection);
                }
            }
            UpDirection::Reference { point, .. } => {
                if !is_finite(&point) {
                    return Err(SettingsError::NonFinite {
                        field: "up_direction",
                    });
                }
            }
        }

        if self.max_slide_iterations == 0 {
            return Err(SettingsError::ZeroIterations {
                field: "max_slide_iterations",
            });
        }
        if self.max_post_simulation_slide_iterations == 0 {
            return Err(SettingsError::ZeroIterations {
                field: "max_post_simulation_slide_iterations",
            });
        }
        Ok(())
    }
}

fn in_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), SettingsError> {
    if !value.is_finite() {
        return Err(SettingsError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if !value.is_finite() {
        return Err(SettingsError::NonFinite { field });
    }
    if value < 0.0 {
        return Err(SettingsError::Negative { field, value });
    }
    Ok(())
}
