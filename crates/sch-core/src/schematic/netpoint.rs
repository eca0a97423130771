//! Net point: a connection vertex of a net segment

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Point;
use crate::schematic::SchematicError;

/// Reference to a symbol pin: `(symbol, pin)`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PinRef {
    pub symbol: Uuid,
    pub pin: Uuid,
}

/// A connection vertex, optionally anchored to a symbol pin.
///
/// While anchored, the position is derived from the pin; detaching freezes it
/// at the last pin position. The connected-line set is registration state and
/// only maintained while the owning segment is part of a live schematic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetPoint {
    pub uuid: Uuid,
    position: Point,
    pin: Option<PinRef>,
    #[serde(skip)]
    lines: BTreeSet<Uuid>,
    #[serde(skip)]
    selected: bool,
}

impl NetPoint {
    /// Create a free (floating) net point
    pub fn new(position: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            pin: None,
            lines: BTreeSet::new(),
            selected: false,
        }
    }

    /// Create a net point anchored to a symbol pin
    pub fn new_attached(pin: PinRef, position: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            pin: Some(pin),
            lines: BTreeSet::new(),
            selected: false,
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn pin(&self) -> Option<PinRef> {
        self.pin
    }

    pub fn is_attached_to_pin(&self) -> bool {
        self.pin.is_some()
    }

    pub(crate) fn set_pin(&mut self, pin: Option<PinRef>) {
        self.pin = pin;
    }

    /// Net lines currently terminating at this point
    pub fn lines(&self) -> &BTreeSet<Uuid> {
        &self.lines
    }

    pub fn is_used(&self) -> bool {
        !self.lines.is_empty()
    }

    /// A dead net point has no connected lines (ERC diagnostic)
    pub fn is_dead(&self) -> bool {
        self.lines.is_empty()
    }

    /// Junction dots are drawn for points joining more than two lines, or
    /// more than one line while sitting on a pin
    pub fn is_visible(&self) -> bool {
        if self.lines.len() > 2 {
            true
        } else {
            self.lines.len() > 1 && self.is_attached_to_pin()
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub(crate) fn register_line(&mut self, line: Uuid) -> Result<(), SchematicError> {
        if !self.lines.insert(line) {
            return Err(SchematicError::LineAlreadyRegistered(line));
        }
        Ok(())
    }

    pub(crate) fn unregister_line(&mut self, line: Uuid) -> Result<(), SchematicError> {
        if !self.lines.remove(&line) {
            return Err(SchematicError::LineNotRegistered(line));
        }
        Ok(())
    }

    pub(crate) fn clear_registrations(&mut self) {
        self.lines.clear();
    }
}
