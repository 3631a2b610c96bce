//! A small collision world for [`kinematic_actor`] characters.
//!
//! [`CollisionWorld`] answers the actor's shape casts, ray casts, overlap and contact queries with
//! parry, and runs a minimal simulation of kinematic and dynamic bodies. Worlds are described by a
//! serializable [`WorldDef`], usually loaded from TOML.

pub mod broad;
pub mod error;
pub mod narrow_phase;
pub mod scene_def;
pub mod shapes;
pub mod world;

pub use error::WorldError;
pub use rapier3d;
pub use scene_def::{BodyDef, ColliderDef, WorldDef};
pub use shapes::ShapeDef;
pub use world::CollisionWorld;
