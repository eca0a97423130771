//! Net line: an edge between two net points of the same segment

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Length;

/// An edge between two net points. The owning segment holds both endpoints;
/// the line only refers to them by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetLine {
    pub uuid: Uuid,
    width: Length,
    start: Uuid,
    end: Uuid,
    #[serde(skip)]
    selected: bool,
}

impl NetLine {
    pub fn new(start: Uuid, end: Uuid, width: Length) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            width,
            start,
            end,
            selected: false,
        }
    }

    pub fn width(&self) -> Length {
        self.width
    }

    pub fn set_width(&mut self, width: Length) {
        self.width = width;
    }

    pub fn start(&self) -> Uuid {
        self.start
    }

    pub fn end(&self) -> Uuid {
        self.end
    }

    /// The endpoint opposite to `point`, if `point` is an endpoint at all
    pub fn other_point(&self, point: Uuid) -> Option<Uuid> {
        if point == self.start {
            Some(self.end)
        } else if point == self.end {
            Some(self.start)
        } else {
            None
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}
