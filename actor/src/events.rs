//! Actor events: synchronous observers plus a log of what happened during the last step.

use std::fmt;

use crate::{
    math::{Quat, Vec3},
    types::{ColliderId, Contact},
};

#[derive(Clone, Copy, Debug)]
pub enum ActorEvent {
    /// The character touched ground; carries its velocity in local space at that moment.
    GroundedStateEnter { local_velocity: Vec3 },
    GroundedStateExit,
    /// The ground collider changed.
    NewGroundEnter { collider: ColliderId },
    WallHit(Contact),
    HeadHit(Contact),
    Teleport { position: Vec3, rotation: Quat },
}

pub type Observer = Box<dyn FnMut(&ActorEvent) + Send>;

/// Delivers events to observers as they happen and keeps them until the next step starts.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Observer>,
    log: Vec<ActorEvent>,
}

impl EventBus {
    pub fn subscribe(&mut self, observer: impl FnMut(&ActorEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn emit(&mut self, event: ActorEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
        self.log.push(event);
    }

    /// Events emitted since the last call to [`EventBus::clear_log`].
    pub fn log(&self) -> &[ActorEvent] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .field("log", &self.log)
            .finish()
    }
}
