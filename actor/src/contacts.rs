//! Contacts gathered after the simulation, sorted into ground, wall and head contacts.

use crate::{
    math::{Vec3, angle_deg},
    settings::{GROUND_CONTACT_MAX_ANGLE, HEAD_CONTACT_MIN_ANGLE, WALL_CONTACT_ANGLE_TOLERANCE},
    types::Contact,
};

#[inline]
pub fn is_wall_contact(vertical_angle: f32) -> bool {
    (vertical_angle - 90.0).abs() <= WALL_CONTACT_ANGLE_TOLERANCE
}

#[inline]
pub fn is_head_contact(vertical_angle: f32) -> bool {
    vertical_angle >= HEAD_CONTACT_MIN_ANGLE
}

#[inline]
pub fn is_ground_contact(vertical_angle: f32) -> bool {
    vertical_angle <= GROUND_CONTACT_MAX_ANGLE
}

/// New first contacts produced by [`ContactSet::classify`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NewContacts {
    pub wall: Option<Contact>,
    pub head: Option<Contact>,
}

#[derive(Clone, Debug, Default)]
pub struct ContactSet {
    pub all: Vec<Contact>,
    pub ground: Vec<Contact>,
    pub wall: Vec<Contact>,
    pub head: Vec<Contact>,
    /// Touching a wall as of the last classification. Survives [`ContactSet::clear`].
    pub wall_collision: bool,
    pub head_collision: bool,
}

impl ContactSet {
    /// Forget the raw contacts of the previous step.
    pub fn clear(&mut self) {
        self.all.clear();
    }

    /// Sort `all` by the angle between `up` and each contact normal.
    ///
    /// A contact may land in several lists. Returns the first wall and head contacts when the
    /// character was not touching a wall or a head surface before.
    pub fn classify(&mut self, up: Vec3) -> NewContacts {
        self.ground.clear();
        self.wall.clear();
        self.head.clear();

        for contact in &self.all {
            let angle = angle_deg(&up, &contact.normal);
            if is_wall_contact(angle) {
                self.wall.push(*contact);
            }
            if is_head_contact(angle) {
                self.head.push(*contact);
            }
            if is_ground_contact(angle) {
                self.ground.push(*contact);
            }
        }

        let new = NewContacts {
            wall: self.wall.first().copied().filter(|_| !self.wall_collision),
            head: self.head.first().copied().filter(|_| !self.head_collision),
        };
        self.wall_collision = !self.wall.is_empty();
        self.head_collision = !self.head.is_empty();
        new
    }
}
