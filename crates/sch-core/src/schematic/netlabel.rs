//! Net label: a visual marker naming a net segment's signal

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Angle, Point};

/// A text marker displaying the net name of its segment. Carries no
/// connectivity of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetLabel {
    pub uuid: Uuid,
    position: Point,
    rotation: Angle,
    #[serde(skip)]
    selected: bool,
}

impl NetLabel {
    pub fn new(position: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            rotation: Angle::ZERO,
            selected: false,
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn rotation(&self) -> Angle {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Angle) {
        self.rotation = rotation;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}
