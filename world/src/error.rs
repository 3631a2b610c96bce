use thiserror::Error;

/// Why a world definition could not be loaded or a world edit was refused.
#[derive(Error, Debug)]
pub enum WorldError {
    #[error("failed to parse world definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate collider id {0}")]
    DuplicateCollider(u32),

    #[error("duplicate body id {0}")]
    DuplicateBody(u32),

    #[error("collider {collider} is attached to unknown body {body}")]
    UnknownBody { collider: u32, body: u32 },

    #[error("no body with id {0}")]
    NoSuchBody(u32),

    #[error("{what} {id} has a non-finite value")]
    NonFinite { what: &'static str, id: u32 },

    #[error("collider {id} has an invalid shape: {reason}")]
    InvalidShape { id: u32, reason: &'static str },

    #[error("collider {id} is on layer {layer}, layers go up to {max}", max = kinematic_actor::Layer::COUNT - 1)]
    InvalidLayer { id: u32, layer: u8 },

    #[error("body {id} must have a positive mass, got {mass}")]
    InvalidMass { id: u32, mass: f32 },
}
