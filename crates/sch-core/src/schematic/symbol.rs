//! Symbol instances and their pins

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::circuit::ElementRef;
use crate::geometry::{Angle, Point};

/// A pin of a placed symbol, bound to one component signal instance.
///
/// The pin's scene position is derived from the symbol transform and the
/// pin's offset. At most one net point may be registered at a pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolPin {
    pub uuid: Uuid,
    name: String,
    /// Offset from the symbol origin, before symbol rotation
    offset: Point,
    /// Component signal instance this pin belongs to
    component_signal: Uuid,
    /// Net point currently anchored here: `(segment, point)`
    #[serde(skip)]
    net_point: Option<ElementRef>,
}

impl SymbolPin {
    pub fn new(name: impl Into<String>, offset: Point, component_signal: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            offset,
            component_signal,
            net_point: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn component_signal(&self) -> Uuid {
        self.component_signal
    }

    pub fn net_point(&self) -> Option<ElementRef> {
        self.net_point
    }

    pub fn is_used(&self) -> bool {
        self.net_point.is_some()
    }

    pub(crate) fn set_net_point(&mut self, net_point: Option<ElementRef>) {
        self.net_point = net_point;
    }
}

/// A placed instance of a library symbol, belonging to one component instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub uuid: Uuid,
    component: Uuid,
    position: Point,
    rotation: Angle,
    pins: Vec<SymbolPin>,
    #[serde(skip)]
    selected: bool,
}

impl Symbol {
    pub fn new(component: Uuid, position: Point, rotation: Angle) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            component,
            position,
            rotation,
            pins: Vec::new(),
            selected: false,
        }
    }

    pub fn with_pin(mut self, pin: SymbolPin) -> Self {
        self.pins.push(pin);
        self
    }

    pub fn component(&self) -> Uuid {
        self.component
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn rotation(&self) -> Angle {
        self.rotation
    }

    pub(crate) fn set_transform(&mut self, position: Point, rotation: Angle) {
        self.position = position;
        self.rotation = rotation;
    }

    pub fn pins(&self) -> &[SymbolPin] {
        &self.pins
    }

    pub fn pin(&self, uuid: Uuid) -> Option<&SymbolPin> {
        self.pins.iter().find(|p| p.uuid == uuid)
    }

    pub(crate) fn pin_mut(&mut self, uuid: Uuid) -> Option<&mut SymbolPin> {
        self.pins.iter_mut().find(|p| p.uuid == uuid)
    }

    /// Scene position of a pin: symbol position + rotated pin offset
    pub fn pin_position(&self, pin: Uuid) -> Option<Point> {
        let pin = self.pin(pin)?;
        Some(self.position + pin.offset().rotated(self.rotation, Point::ORIGIN))
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Length;

    #[test]
    fn test_pin_position_follows_rotation() {
        let signal = Uuid::new_v4();
        let pin = SymbolPin::new("1", Point::from_mm(5.0, 0.0), signal);
        let pin_id = pin.uuid;
        let mut symbol = Symbol::new(Uuid::new_v4(), Point::from_mm(10.0, 10.0), Angle::ZERO)
            .with_pin(pin);

        assert_eq!(symbol.pin_position(pin_id), Some(Point::from_mm(15.0, 10.0)));

        symbol.set_transform(symbol.position(), Angle::deg_90());
        assert_eq!(symbol.pin_position(pin_id), Some(Point::from_mm(10.0, 15.0)));

        symbol.set_transform(Point::from_mm(0.0, 0.0), Angle::deg_180());
        assert_eq!(symbol.pin_position(pin_id), Some(Point::from_mm(-5.0, 0.0)));
        assert_eq!(symbol.pin_position(Uuid::new_v4()), None);
        assert_eq!(
            symbol.pin(pin_id).unwrap().offset().x,
            Length::from_mm(5.0)
        );
    }
}
