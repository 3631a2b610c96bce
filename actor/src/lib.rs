/*!
Kinematic character actor.

A capsule-shaped character moved by collide-and-slide against a host world. The host provides
collision queries and rigid body access through the traits in [`scene`] and runs its own
simulation between [`CharacterActor::pre_simulation_step`] and
[`CharacterActor::post_simulation_step`].

- actor:          the character, its update phases and public API
- solver:         stable, unstable and post-simulation collide-and-slide
- ground:         ground probing, prediction and forced (un)grounding
- dynamic_ground: following and inheriting the motion of ground bodies
- stability:      grounded/stable classification and state timers
- contacts:       post-simulation contact sorting
- collisions:     body casts, ground checks and edge detection
- body:           capsule geometry derived from the feet position
*/

pub mod actor;
pub mod body;
pub mod collisions;
pub mod contacts;
pub mod dynamic_ground;
pub mod error;
pub mod events;
pub mod ground;
pub mod layers;
pub mod math;
pub mod scene;
pub mod settings;
pub mod solver;
pub mod stability;
pub mod types;

#[cfg(test)]
mod test_scene;

pub use actor::{CharacterActor, ProbingRecord, VelocityState};
pub use body::{BodyGeometry, BodySize};
pub use error::SettingsError;
pub use events::ActorEvent;
pub use ground::GroundState;
pub use layers::{Layer, LayerMask, LayerSettings};
pub use math::{Quat, Vec3};
pub use scene::{BodyAccess, Scene, ShapeCaster, SimulatedBody, Simulation};
pub use settings::{
    ActorSettings, Dimension, InheritedVelocity, ReferenceMode, SizeReference, UpDirection,
    VelocityMode,
};
pub use stability::Stability;
pub use types::{BodyId, BodyKind, CastFilter, Capsule, ColliderId, Contact, HitInfo};
