/*!
Serializable world definition.

A [`WorldDef`] lists rigid bodies and colliders. Colliders without a body are static and placed in
world space; colliders attached to a body are placed relative to it and move with it.

```toml
[[bodies]]
id = 0
kind = "kinematic"
position = [0.0, 0.0, 0.0]
linear_velocity = [1.0, 0.0, 0.0]

[[colliders]]
id = 0
shape = { type = "plane" }

[[colliders]]
id = 1
body = 0
translation = [0.0, -0.1, 0.0]
shape = { type = "cuboid", half_extents = [2.0, 0.1, 2.0] }
```
*/

use std::collections::HashSet;

use kinematic_actor::{BodyKind, Layer, math::Vec3};
use serde::{Deserialize, Serialize};

use crate::{error::WorldError, shapes::ShapeDef};

fn zero() -> Vec3 {
    Vec3::zeros()
}

fn default_mass() -> f32 {
    1.0
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyDef {
    pub id: u32,
    #[serde(default)]
    pub kind: BodyKind,
    #[serde(default = "zero")]
    pub position: Vec3,
    /// Orientation as Euler angles in degrees.
    #[serde(default = "zero")]
    pub euler_deg: Vec3,
    #[serde(default = "zero")]
    pub linear_velocity: Vec3,
    /// Angular velocity in radians per second, world axes.
    #[serde(default = "zero")]
    pub angular_velocity: Vec3,
    /// Only dynamic bodies use their mass.
    #[serde(default = "default_mass")]
    pub mass: f32,
}

impl BodyDef {
    pub fn kinematic(id: u32, position: Vec3) -> Self {
        Self {
            id,
            kind: BodyKind::Kinematic,
            position,
            euler_deg: Vec3::zeros(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            mass: default_mass(),
        }
    }

    pub fn dynamic(id: u32, position: Vec3, mass: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass,
            ..Self::kinematic(id, position)
        }
    }

    pub fn moving(mut self, linear_velocity: Vec3) -> Self {
        self.linear_velocity = linear_velocity;
        self
    }

    pub fn spinning(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    fn is_finite(&self) -> bool {
        [self.position, self.euler_deg, self.linear_velocity, self.angular_velocity]
            .iter()
            .all(|v| v.iter().all(|c| c.is_finite()))
            && self.mass.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColliderDef {
    pub id: u32,
    pub shape: ShapeDef,
    /// World translation for static colliders, body-local otherwise.
    #[serde(default = "zero")]
    pub translation: Vec3,
    #[serde(default = "zero")]
    pub euler_deg: Vec3,
    #[serde(default)]
    pub layer: Layer,
    /// Triggers report overlaps only and never block.
    #[serde(default)]
    pub trigger: bool,
    #[serde(default)]
    pub body: Option<u32>,
}

impl ColliderDef {
    pub fn new(id: u32, shape: ShapeDef) -> Self {
        Self {
            id,
            shape,
            translation: Vec3::zeros(),
            euler_deg: Vec3::zeros(),
            layer: Layer::DEFAULT,
            trigger: false,
            body: None,
        }
    }

    pub fn at(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn rotated(mut self, euler_deg: Vec3) -> Self {
        self.euler_deg = euler_deg;
        self
    }

    pub fn on_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn as_trigger(mut self) -> Self {
        self.trigger = true;
        self
    }

    pub fn attached_to(mut self, body: u32) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldDef {
    #[serde(default)]
    pub bodies: Vec<BodyDef>,
    #[serde(default)]
    pub colliders: Vec<ColliderDef>,
}

impl WorldDef {
    /// Parse and validate a world definition.
    pub fn from_toml_str(src: &str) -> Result<Self, WorldError> {
        let def: WorldDef = toml::from_str(src)?;
        def.validate()?;
        Ok(def)
    }

    pub fn validate(&self) -> Result<(), WorldError> {
        let mut body_ids = HashSet::new();
        for body in &self.bodies {
            if !body_ids.insert(body.id) {
                return Err(WorldError::DuplicateBody(body.id));
            }
            if !body.is_finite() {
                return Err(WorldError::NonFinite {
                    what: "body",
                    id: body.id,
                });
            }
            if body.kind == BodyKind::Dynamic && body.mass <= 0.0 {
                return Err(WorldError::InvalidMass {
                    id: body.id,
                    mass: body.mass,
                });
            }
        }

        let mut collider_ids = HashSet::new();
        for collider in &self.colliders {
            if !collider_ids.insert(collider.id) {
                return Err(WorldError::DuplicateCollider(collider.id));
            }
            let finite = collider.shape.is_finite()
                && collider.translation.iter().all(|c| c.is_finite())
                && collider.euler_deg.iter().all(|c| c.is_finite());
            if !finite {
                return Err(WorldError::NonFinite {
                    what: "collider",
                    id: collider.id,
                });
            }
            if !collider.layer.is_valid() {
                return Err(WorldError::InvalidLayer {
                    id: collider.id,
                    layer: collider.layer.0,
                });
            }
            if let Some(reason) = collider.shape.invalid_reason() {
                return Err(WorldError::InvalidShape {
                    id: collider.id,
                    reason,
                });
            }
            if let Some(body) = collider.body {
                if !body_ids.contains(&body) {
                    return Err(WorldError::UnknownBody {
                        collider: collider.id,
                        body,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_bodies_and_colliders() {
        let src = r#"
            [[bodies]]
            id = 3
            kind = "dynamic"
            mass = 20.0

            [[colliders]]
            id = 0
            shape = { type = "plane" }

            [[colliders]]
            id = 1
            body = 3
            layer = 2
            translation = [0.0, 0.5, 0.0]
            shape = { type = "sphere", radius = 0.5 }
        "#;
        let def = WorldDef::from_toml_str(src).unwrap();

        assert_eq!(def.bodies.len(), 1);
        assert_eq!(def.bodies[0].kind, BodyKind::Dynamic);
        assert!((def.bodies[0].mass - 20.0).abs() < 1.0e-6);
        assert_eq!(def.colliders[1].body, Some(3));
        assert_eq!(def.colliders[1].layer, Layer(2));
        assert!(!def.colliders[0].trigger);
    }

    #[test]
    fn rejects_dangling_and_duplicate_references() {
        let def = WorldDef {
            bodies: vec![],
            colliders: vec![ColliderDef::new(0, ShapeDef::Sphere { radius: 1.0 }).attached_to(9)],
        };
        assert!(matches!(
            def.validate(),
            Err(WorldError::UnknownBody { collider: 0, body: 9 })
        ));

        let def = WorldDef {
            bodies: vec![],
            colliders: vec![
                ColliderDef::new(1, ShapeDef::Sphere { radius: 1.0 }),
                ColliderDef::new(1, ShapeDef::Sphere { radius: 2.0 }),
            ],
        };
        assert!(matches!(def.validate(), Err(WorldError::DuplicateCollider(1))));
    }

    #[test]
    fn rejects_bad_values() {
        let def = WorldDef {
            bodies: vec![BodyDef::dynamic(0, Vec3::zeros(), 0.0)],
            colliders: vec![],
        };
        assert!(matches!(def.validate(), Err(WorldError::InvalidMass { id: 0, .. })));

        let def = WorldDef {
            bodies: vec![],
            colliders: vec![ColliderDef::new(0, ShapeDef::Plane { offset_along_normal: 0.0 })
                .at(Vec3::new(f32::NAN, 0.0, 0.0))],
        };
        assert!(matches!(def.validate(), Err(WorldError::NonFinite { .. })));

        let def = WorldDef {
            bodies: vec![],
            colliders: vec![ColliderDef::new(2, ShapeDef::Sphere { radius: 1.0 }).on_layer(Layer(32))],
        };
        assert!(matches!(
            def.validate(),
            Err(WorldError::InvalidLayer { id: 2, layer: 32 })
        ));
        assert!(matches!(
            WorldDef::from_toml_str(
                r#"
                [[colliders]]
                id = 0
                layer = 40
                shape = { type = "plane" }
                "#
            ),
            Err(WorldError::InvalidLayer { id: 0, layer: 40 })
        ));

        assert!(matches!(
            WorldDef::from_toml_str("colliders = 4"),
            Err(WorldError::Parse(_))
        ));
    }
}
