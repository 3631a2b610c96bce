use kinematic_actor::math::{Iso, Vec3};
use nalgebra as na;
use rapier3d::parry::shape::SharedShape;
use serde::{Deserialize, Serialize};

/// Supported collider shapes, in the collider's local frame.
///
/// In TOML a shape is an inline table tagged by `type`:
/// `shape = { type = "cuboid", half_extents = [1.0, 0.1, 1.0] }`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeDef {
    /// Infinite plane (half-space).
    ///
    /// The plane normal is derived from the collider pose as `rotation * +Y`; the solid side lies
    /// below it.
    Plane {
        /// Offset along the plane normal (meters).
        #[serde(default)]
        offset_along_normal: f32,
    },

    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vec3 },

    /// Sphere/ball (meters).
    Sphere { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },
}

impl ShapeDef {
    /// Planes have no bounding box and skip the broad phase.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        matches!(self, ShapeDef::Plane { .. })
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            ShapeDef::Plane {
                offset_along_normal,
            } => offset_along_normal.is_finite(),
            ShapeDef::Cuboid { half_extents } => half_extents.iter().all(|v| v.is_finite()),
            ShapeDef::Sphere { radius } => radius.is_finite(),
            ShapeDef::CapsuleY {
                radius,
                half_height,
            }
            | ShapeDef::CylinderY {
                radius,
                half_height,
            } => radius.is_finite() && half_height.is_finite(),
        }
    }

    /// Dimensions check: `None` when the shape can be built.
    pub fn invalid_reason(&self) -> Option<&'static str> {
        match *self {
            ShapeDef::Plane { .. } => None,
            ShapeDef::Cuboid { half_extents } => {
                (half_extents.iter().any(|v| *v <= 0.0)).then_some("half extents must be positive")
            }
            ShapeDef::Sphere { radius } => (radius <= 0.0).then_some("radius must be positive"),
            ShapeDef::CapsuleY {
                radius,
                half_height,
            }
            | ShapeDef::CylinderY {
                radius,
                half_height,
            } => {
                if radius <= 0.0 {
                    Some("radius must be positive")
                } else if half_height < 0.0 {
                    Some("half height must not be negative")
                } else {
                    None
                }
            }
        }
    }

    /// The parry shape and its offset inside the collider frame.
    pub fn build(&self) -> (SharedShape, Iso) {
        match *self {
            ShapeDef::Plane {
                offset_along_normal,
            } => (
                SharedShape::halfspace(Vec3::y_axis()),
                Iso::translation(0.0, offset_along_normal, 0.0),
            ),
            ShapeDef::Cuboid { half_extents } => (
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
                Iso::identity(),
            ),
            ShapeDef::Sphere { radius } => (SharedShape::ball(radius), Iso::identity()),
            ShapeDef::CapsuleY {
                radius,
                half_height,
            } => (SharedShape::capsule_y(half_height, radius), Iso::identity()),
            ShapeDef::CylinderY {
                radius,
                half_height,
            } => (SharedShape::cylinder(half_height, radius), Iso::identity()),
        }
    }
}

/// Rotation from Euler angles in degrees (roll about X, pitch about Y, yaw about Z).
#[inline]
pub fn rotation_from_euler_deg(euler_deg: Vec3) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_euler_angles(
        euler_deg.x.to_radians(),
        euler_deg.y.to_radians(),
        euler_deg.z.to_radians(),
    )
}
