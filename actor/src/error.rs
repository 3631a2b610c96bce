use thiserror::Error;

/// Why a set of [`ActorSettings`](crate::settings::ActorSettings) was rejected.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to parse actor settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must lie within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("{field} must be finite")]
    NonFinite { field: &'static str },

    #[error("body size must be positive, got width {width} and height {height}")]
    InvalidBodySize { width: f32, height: f32 },

    #[error("up direction must not be a zero vector")]
    ZeroUpDirection,

    #[error("{field} must be at least 1")]
    ZeroIterations { field: &'static str },
}
