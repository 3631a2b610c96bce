/*!
Grounded/stable classification and the timers that track it.

Stability is never stored: it is recomputed from the ground state whenever asked, so it can not
drift from the ground it describes.
*/

use crate::math::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stability {
    NotGrounded,
    StableGrounded,
    UnstableGrounded,
}

impl Stability {
    #[inline]
    pub fn is_grounded(self) -> bool {
        self != Stability::NotGrounded
    }

    #[inline]
    pub fn is_stable(self) -> bool {
        self == Stability::StableGrounded
    }
}

/// Facts the classification depends on.
#[derive(Clone, Copy, Debug)]
pub struct StabilityInput {
    pub grounded: bool,
    pub stable_layer: bool,
    pub was_stable: bool,
    /// Angle between up and the resolved (edge aware) ground normal.
    pub slope_angle: f32,
    /// Angle between up and the raw contact normal.
    pub contact_slope_angle: f32,
    pub slope_limit: f32,
    pub use_stable_edge_when_landing: bool,
}

/// Classify the current ground.
///
/// A character that was stable keeps judging the ground by its resolved normal. A landing
/// character does the same only when it may land on edges; otherwise the raw contact normal
/// decides, so landing on a corner is unstable.
pub fn classify(input: &StabilityInput) -> Stability {
    if !input.grounded {
        return Stability::NotGrounded;
    }
    if !input.stable_layer {
        return Stability::UnstableGrounded;
    }

    let angle = if input.was_stable || input.use_stable_edge_when_landing {
        input.slope_angle
    } else {
        input.contact_slope_angle
    };

    if angle <= input.slope_limit {
        Stability::StableGrounded
    } else {
        Stability::UnstableGrounded
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundedTransition {
    Enter,
    Exit,
}

#[inline]
pub fn grounded_transition(was_grounded: bool, is_grounded: bool) -> Option<GroundedTransition> {
    match (was_grounded, is_grounded) {
        (false, true) => Some(GroundedTransition::Enter),
        (true, false) => Some(GroundedTransition::Exit),
        _ => None,
    }
}

/// Time spent in the current grounded and stable states (seconds).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateTimers {
    pub grounded_time: f32,
    pub not_grounded_time: f32,
    pub stable_elapsed_time: f32,
    pub unstable_elapsed_time: f32,
}

impl StateTimers {
    pub fn advance(&mut self, stability: Stability, dt: f32) {
        if stability.is_stable() {
            self.stable_elapsed_time += dt;
            self.unstable_elapsed_time = 0.0;
        } else {
            self.unstable_elapsed_time += dt;
            self.stable_elapsed_time = 0.0;
        }

        if stability.is_grounded() {
            self.grounded_time += dt;
            self.not_grounded_time = 0.0;
        } else {
            self.not_grounded_time += dt;
            self.grounded_time = 0.0;
        }
    }
}

/// Velocity remembered from the last grounded step.
#[inline]
pub fn last_grounded_velocity(previous: Vec3, velocity: Vec3, stability: Stability) -> Vec3 {
    if stability.is_grounded() {
        velocity
    } else {
        previous
    }
}
