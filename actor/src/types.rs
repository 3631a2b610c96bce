/*!
Value types exchanged between the solver and the shape caster.

This module intentionally contains no algorithms. Hits and collision infos are small `Copy`
records produced per query; the solver never keeps them beyond the iteration that asked for them,
except for the ground state derived from them.
*/

use serde::{Deserialize, Serialize};

use crate::{
    layers::{Layer, LayerMask},
    math::Vec3,
};

/// Stable handle of a collider in the host world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderId(pub u32);

/// Stable handle of a rigid body in the host world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    /// Moved by script; ignores forces.
    #[default]
    Kinematic,
    /// Moved by the simulation; reacts to forces.
    Dynamic,
}

/// A capsule in world space, given by its two sphere centers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capsule {
    pub bottom: Vec3,
    pub top: Vec3,
    pub radius: f32,
}

/// First blocking hit of a cast.
#[derive(Clone, Copy, Debug)]
pub struct HitInfo {
    /// Distance travelled along the cast direction until contact.
    pub distance: f32,
    /// World-space contact point.
    pub point: Vec3,
    /// World-space surface normal, pointing out of the hit collider.
    pub normal: Vec3,
    pub layer: Layer,
    pub collider: ColliderId,
    /// Body the collider is attached to, if any.
    pub body: Option<(BodyId, BodyKind)>,
}

impl HitInfo {
    #[inline]
    pub fn body_id(&self) -> Option<BodyId> {
        self.body.map(|(id, _)| id)
    }

    #[inline]
    pub fn is_rigidbody(&self) -> bool {
        self.body.is_some()
    }

    #[inline]
    pub fn is_dynamic_rigidbody(&self) -> bool {
        matches!(self.body, Some((_, BodyKind::Dynamic)))
    }

    #[inline]
    pub fn is_kinematic_rigidbody(&self) -> bool {
        matches!(self.body, Some((_, BodyKind::Kinematic)))
    }
}

/// Surfaces on both sides of a ground contact.
#[derive(Clone, Copy, Debug)]
pub struct EdgeInfo {
    pub is_edge: bool,
    pub edge_angle: f32,
    pub upper_normal: Vec3,
    pub lower_normal: Vec3,
    pub upper_slope_angle: f32,
    pub lower_slope_angle: f32,
}

impl EdgeInfo {
    /// A contact on a single surface.
    pub fn flat(normal: Vec3, slope_angle: f32) -> Self {
        Self {
            is_edge: false,
            edge_angle: 0.0,
            upper_normal: normal,
            lower_normal: normal,
            upper_slope_angle: slope_angle,
            lower_slope_angle: slope_angle,
        }
    }
}

/// Outcome of one body cast.
#[derive(Clone, Copy, Debug)]
pub struct CollisionInfo {
    pub hit: Option<HitInfo>,
    /// How far the body may move along the cast: the whole request on a miss, up to the skin
    /// on a hit. Ground probes report the move that puts the feet on the ground.
    pub displacement: Vec3,
    /// Angle between up and the hit normal (degrees).
    pub contact_slope_angle: f32,
    pub edge: EdgeInfo,
}

impl CollisionInfo {
    pub fn miss(displacement: Vec3) -> Self {
        Self {
            hit: None,
            displacement,
            contact_slope_angle: 0.0,
            edge: EdgeInfo::flat(Vec3::zeros(), 0.0),
        }
    }

    #[inline]
    pub fn collided(&self) -> bool {
        self.hit.is_some()
    }
}

/// A touching pair reported after the simulation.
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    pub point: Vec3,
    /// Points from the other collider toward the character.
    pub normal: Vec3,
    pub collider: ColliderId,
    pub layer: Layer,
    pub body: Option<(BodyId, BodyKind)>,
}

impl Contact {
    #[inline]
    pub fn body_id(&self) -> Option<BodyId> {
        self.body.map(|(id, _)| id)
    }
}

/// Which colliders a query may report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CastFilter {
    /// Only colliders on these layers are reported.
    pub mask: LayerMask,
    /// Skip colliders attached to rigid bodies.
    pub ignore_rigidbodies: bool,
    pub ignore_triggers: bool,
    /// Colliders whose collision with the character is ignored are skipped, unless their layer
    /// is in this mask.
    pub keep_ignored: LayerMask,
}

impl CastFilter {
    /// Solid colliders on `mask`; triggers skipped.
    pub fn solid(mask: LayerMask) -> Self {
        Self {
            mask,
            ignore_rigidbodies: false,
            ignore_triggers: true,
            keep_ignored: LayerMask::none(),
        }
    }

    pub fn keeping_ignored(mut self, layers: LayerMask) -> Self {
        self.keep_ignored = layers;
        self
    }

    pub fn without_rigidbodies(mut self) -> Self {
        self.ignore_rigidbodies = true;
        self
    }
}
