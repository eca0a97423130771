//! Schematic sheet: symbols and net segments
//!
//! The schematic owns its symbols and net segments and enforces the
//! registration protocol between them and the circuit: a net segment only
//! participates in hit-testing, connectivity and signal registries while it
//! is added to the sheet, and all cross-entity bookkeeping (net signal
//! registries, pin anchoring) happens in the add/remove methods here.

mod netlabel;
mod netline;
mod netpoint;
mod netsegment;
mod selection;
mod symbol;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::circuit::{Circuit, CircuitError, ElementRef};
use crate::constants::{
    DEFAULT_GRID_INTERVAL, NETLABEL_GRAB_HALF_HEIGHT, NETLABEL_GRAB_HALF_WIDTH,
    NETLINE_GRAB_TOLERANCE, NETPOINT_GRAB_RADIUS, PIN_GRAB_RADIUS, SYMBOL_GRAB_RADIUS,
};
use crate::geometry::{Angle, Length, Point};

pub use netlabel::NetLabel;
pub use netline::NetLine;
pub use netpoint::{NetPoint, PinRef};
pub use netsegment::NetSegment;
pub use selection::{NetPointFilter, SelectionQuery};
pub use symbol::{Symbol, SymbolPin};

/// Reference to any selectable item on a sheet, ordered the way hit-testing
/// reports them (nearest entity type first)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchematicItem {
    /// `(segment, point)`
    NetPoint(ElementRef),
    /// `(segment, line)`
    NetLine(ElementRef),
    /// `(segment, label)`
    NetLabel(ElementRef),
    Pin(PinRef),
    Symbol(Uuid),
}

/// One schematic sheet of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schematic {
    pub uuid: Uuid,
    name: String,
    grid_interval: Length,
    symbols: Vec<Symbol>,
    net_segments: Vec<NetSegment>,
}

impl Schematic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            grid_interval: DEFAULT_GRID_INTERVAL,
            symbols: Vec::new(),
            net_segments: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid_interval(&self) -> Length {
        self.grid_interval
    }

    pub fn set_grid_interval(&mut self, interval: Length) {
        self.grid_interval = interval;
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.net_segments.is_empty()
    }

    // ============== Symbols ==============

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, uuid: Uuid) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.uuid == uuid)
    }

    pub(crate) fn symbol_mut(&mut self, uuid: Uuid) -> Option<&mut Symbol> {
        self.symbols.iter_mut().find(|s| s.uuid == uuid)
    }

    /// Place a symbol on the sheet and register it with its component
    pub fn add_symbol(&mut self, circuit: &mut Circuit, symbol: Symbol) -> Result<(), SchematicError> {
        if self.symbol(symbol.uuid).is_some() {
            return Err(SchematicError::DuplicateUuid(symbol.uuid));
        }
        let component = circuit
            .component(symbol.component())
            .ok_or(SchematicError::ComponentNotFound(symbol.component()))?;
        for pin in symbol.pins() {
            if component.signal(pin.component_signal()).is_none() {
                return Err(SchematicError::ComponentSignalNotFound(pin.component_signal()));
            }
        }
        circuit
            .component_mut(symbol.component())
            .ok_or(SchematicError::ComponentNotFound(symbol.component()))?
            .register_placed_symbol((self.uuid, symbol.uuid))?;
        self.symbols.push(symbol);
        Ok(())
    }

    /// Remove a symbol, returning ownership of it. Rejected while any net
    /// point is still anchored to one of its pins.
    pub fn remove_symbol(
        &mut self,
        circuit: &mut Circuit,
        uuid: Uuid,
    ) -> Result<Symbol, SchematicError> {
        let pos = self
            .symbols
            .iter()
            .position(|s| s.uuid == uuid)
            .ok_or(SchematicError::SymbolNotFound(uuid))?;
        if self.symbols[pos].pins().iter().any(|p| p.is_used()) {
            return Err(SchematicError::SymbolInUse(uuid));
        }
        let component = self.symbols[pos].component();
        circuit
            .component_mut(component)
            .ok_or(SchematicError::ComponentNotFound(component))?
            .unregister_placed_symbol((self.uuid, uuid))?;
        Ok(self.symbols.remove(pos))
    }

    /// Move/rotate a symbol, dragging the net points anchored to its pins
    /// along. Returns the previous transform.
    pub fn set_symbol_transform(
        &mut self,
        uuid: Uuid,
        position: Point,
        rotation: Angle,
    ) -> Result<(Point, Angle), SchematicError> {
        let symbol = self
            .symbol_mut(uuid)
            .ok_or(SchematicError::SymbolNotFound(uuid))?;
        let old = (symbol.position(), symbol.rotation());
        symbol.set_transform(position, rotation);

        let symbol = self
            .symbol(uuid)
            .ok_or(SchematicError::SymbolNotFound(uuid))?;
        let mut updates: Vec<(ElementRef, Point)> = Vec::new();
        for pin in symbol.pins() {
            if let Some(anchor) = pin.net_point()
                && let Some(pin_pos) = symbol.pin_position(pin.uuid)
            {
                updates.push((anchor, pin_pos));
            }
        }
        for ((segment, point), pin_pos) in updates {
            self.net_segment_mut(segment)
                .ok_or(SchematicError::NetSegmentNotFound(segment))?
                .point_mut(point)
                .ok_or(SchematicError::NetPointNotFound(point))?
                .set_position(pin_pos);
        }
        Ok(old)
    }

    // ============== Net Segments ==============

    pub fn net_segments(&self) -> &[NetSegment] {
        &self.net_segments
    }

    pub fn net_segment(&self, uuid: Uuid) -> Option<&NetSegment> {
        self.net_segments.iter().find(|s| s.uuid == uuid)
    }

    pub(crate) fn net_segment_mut(&mut self, uuid: Uuid) -> Option<&mut NetSegment> {
        self.net_segments.iter_mut().find(|s| s.uuid == uuid)
    }

    /// Add a net segment to the sheet. Registers it with its net signal and
    /// anchors every pin-attached point at its symbol pin (validating that
    /// the pin's resolved net signal equals the segment's signal).
    pub fn add_net_segment(
        &mut self,
        circuit: &mut Circuit,
        mut segment: NetSegment,
    ) -> Result<(), SchematicError> {
        if self.net_segment(segment.uuid).is_some() {
            return Err(SchematicError::DuplicateUuid(segment.uuid));
        }
        if circuit.net_signal(segment.net_signal()).is_none() {
            return Err(SchematicError::NetSignalNotFound(segment.net_signal()));
        }

        // validate all pin anchors before touching anything
        let mut anchors: Vec<(Uuid, PinRef, Point)> = Vec::new();
        for point in segment.points() {
            if let Some(pin) = point.pin() {
                let position =
                    self.checked_pin_anchor(circuit, pin, segment.net_signal())?;
                anchors.push((point.uuid, pin, position));
            }
        }

        segment.rebuild_registrations()?;
        for (point, pin, position) in &anchors {
            segment
                .point_mut(*point)
                .ok_or(SchematicError::NetPointNotFound(*point))?
                .set_position(*position);
        }
        circuit
            .net_signal_mut(segment.net_signal())
            .ok_or(SchematicError::NetSignalNotFound(segment.net_signal()))?
            .register_schematic_segment((self.uuid, segment.uuid))?;
        let segment_uuid = segment.uuid;
        self.net_segments.push(segment);
        for (point, pin, _) in anchors {
            self.pin_mut(pin)?.set_net_point(Some((segment_uuid, point)));
        }
        Ok(())
    }

    /// Remove a net segment, returning ownership of it. Unregisters the
    /// segment from its net signal and frees all symbol pins it anchored to;
    /// the returned segment carries no registration state.
    pub fn remove_net_segment(
        &mut self,
        circuit: &mut Circuit,
        uuid: Uuid,
    ) -> Result<NetSegment, SchematicError> {
        let pos = self
            .net_segments
            .iter()
            .position(|s| s.uuid == uuid)
            .ok_or(SchematicError::NetSegmentNotFound(uuid))?;

        let pins: Vec<PinRef> = self.net_segments[pos]
            .points()
            .iter()
            .filter_map(|p| p.pin())
            .collect();
        for pin in pins {
            self.pin_mut(pin)?.set_net_point(None);
        }
        let net_signal = self.net_segments[pos].net_signal();
        circuit
            .net_signal_mut(net_signal)
            .ok_or(SchematicError::NetSignalNotFound(net_signal))?
            .unregister_schematic_segment((self.uuid, uuid))?;
        let mut segment = self.net_segments.remove(pos);
        segment.clear_registrations();
        Ok(segment)
    }

    /// Reassign a live segment's net signal. Fails if any pin-attached point
    /// resolves to a different signal (callers pre-validate / rebind pins).
    /// Returns the previous signal.
    pub fn set_net_segment_signal(
        &mut self,
        circuit: &mut Circuit,
        segment: Uuid,
        net_signal: Uuid,
    ) -> Result<Uuid, SchematicError> {
        let old = self
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .net_signal();
        if old == net_signal {
            return Ok(old);
        }
        if circuit.net_signal(net_signal).is_none() {
            return Err(SchematicError::NetSignalNotFound(net_signal));
        }
        let seg = self
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?;
        for point in seg.points() {
            if let Some(pin) = point.pin() {
                // the pins stay anchored; only their resolved signal matters
                let symbol = self
                    .symbol(pin.symbol)
                    .ok_or(SchematicError::SymbolNotFound(pin.symbol))?;
                let signal_uuid = symbol
                    .pin(pin.pin)
                    .ok_or(SchematicError::PinNotFound(pin.pin))?
                    .component_signal();
                let signal = circuit
                    .component_signal(symbol.component(), signal_uuid)
                    .ok_or(SchematicError::ComponentSignalNotFound(signal_uuid))?;
                if signal.net_signal() != Some(net_signal) {
                    return Err(SchematicError::PinSignalMismatch(pin.pin));
                }
            }
        }
        circuit
            .net_signal_mut(old)
            .ok_or(SchematicError::NetSignalNotFound(old))?
            .unregister_schematic_segment((self.uuid, segment))?;
        circuit
            .net_signal_mut(net_signal)
            .ok_or(SchematicError::NetSignalNotFound(net_signal))?
            .register_schematic_segment((self.uuid, segment))?;
        self.net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .set_net_signal_id(net_signal);
        Ok(old)
    }

    /// Bulk-register points and lines with a live segment, anchoring new
    /// pin-attached points at their pins
    pub fn add_segment_elements(
        &mut self,
        circuit: &Circuit,
        segment: Uuid,
        mut points: Vec<NetPoint>,
        lines: Vec<NetLine>,
    ) -> Result<(), SchematicError> {
        let net_signal = self
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .net_signal();

        let mut anchors: Vec<(Uuid, PinRef)> = Vec::new();
        for point in &mut points {
            if let Some(pin) = point.pin() {
                let position = self.checked_pin_anchor(circuit, pin, net_signal)?;
                point.set_position(position);
                anchors.push((point.uuid, pin));
            }
        }
        self.net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .add_points_and_lines(points, lines)?;
        for (point, pin) in anchors {
            self.pin_mut(pin)?.set_net_point(Some((segment, point)));
        }
        Ok(())
    }

    /// Bulk-unregister points and lines from a live segment, freeing the
    /// pins of removed attached points. Returns ownership of the removed
    /// entities (exact inverse of [`add_segment_elements`](Self::add_segment_elements)).
    pub fn remove_segment_elements(
        &mut self,
        segment: Uuid,
        point_ids: &[Uuid],
        line_ids: &[Uuid],
    ) -> Result<(Vec<NetPoint>, Vec<NetLine>), SchematicError> {
        let (points, lines) = self
            .net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .remove_points_and_lines(point_ids, line_ids)?;
        let pins: Vec<PinRef> = points.iter().filter_map(|p| p.pin()).collect();
        for pin in pins {
            self.pin_mut(pin)?.set_net_point(None);
        }
        Ok((points, lines))
    }

    /// Move a net point. Returns the previous position.
    pub fn set_net_point_position(
        &mut self,
        segment: Uuid,
        point: Uuid,
        position: Point,
    ) -> Result<Point, SchematicError> {
        let point = self
            .net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .point_mut(point)
            .ok_or(SchematicError::NetPointNotFound(point))?;
        let old = point.position();
        point.set_position(position);
        Ok(old)
    }

    /// Attach a live net point to a pin, or detach it (`None`).
    ///
    /// The point must not have any registered lines while its pin binding
    /// changes; callers detach and re-add the lines around this call.
    /// Detaching freezes the position at the last pin position. Returns the
    /// previous pin.
    pub fn set_net_point_pin(
        &mut self,
        circuit: &Circuit,
        segment: Uuid,
        point: Uuid,
        pin: Option<PinRef>,
    ) -> Result<Option<PinRef>, SchematicError> {
        let seg = self
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?;
        let net_signal = seg.net_signal();
        let current = seg
            .point(point)
            .ok_or(SchematicError::NetPointNotFound(point))?;
        let old = current.pin();
        if old == pin {
            return Ok(old);
        }
        if current.is_used() {
            return Err(SchematicError::NetPointInUse(point));
        }
        let new_position = match pin {
            Some(p) => Some(self.checked_pin_anchor(circuit, p, net_signal)?),
            None => None,
        };
        if let Some(old_pin) = old {
            self.pin_mut(old_pin)?.set_net_point(None);
        }
        if let Some(new_pin) = pin {
            self.pin_mut(new_pin)?.set_net_point(Some((segment, point)));
        }
        let target = self
            .net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .point_mut(point)
            .ok_or(SchematicError::NetPointNotFound(point))?;
        target.set_pin(pin);
        if let Some(position) = new_position {
            target.set_position(position);
        }
        Ok(old)
    }

    /// Distinct forced net names mandated by the component signals reachable
    /// through the segment's pin-attached points, in sorted order
    pub fn forced_net_names(
        &self,
        circuit: &Circuit,
        segment: Uuid,
    ) -> Result<BTreeSet<String>, SchematicError> {
        let seg = self
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?;
        let mut names = BTreeSet::new();
        for point in seg.points() {
            if let Some(pin) = point.pin() {
                let symbol = self
                    .symbol(pin.symbol)
                    .ok_or(SchematicError::SymbolNotFound(pin.symbol))?;
                let signal_uuid = symbol
                    .pin(pin.pin)
                    .ok_or(SchematicError::PinNotFound(pin.pin))?
                    .component_signal();
                let signal = circuit
                    .component_signal(symbol.component(), signal_uuid)
                    .ok_or(SchematicError::ComponentSignalNotFound(signal_uuid))?;
                if let Some(name) = signal.forced_net_name() {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }

    // ============== Hit Testing ==============

    /// All items whose visual footprint contains `pos`, nearest entity type
    /// first: visible net points, hidden net points, net lines, net labels,
    /// pins, symbols
    pub fn items_at_pos(&self, pos: Point) -> Vec<SchematicItem> {
        let mut items = Vec::new();
        let points = self.net_points_at_pos(pos);
        for &(segment, point) in &points {
            if self.net_segment(segment).and_then(|s| s.point(point)).is_some_and(|p| p.is_visible())
            {
                items.push(SchematicItem::NetPoint((segment, point)));
            }
        }
        for &(segment, point) in &points {
            if self.net_segment(segment).and_then(|s| s.point(point)).is_some_and(|p| !p.is_visible())
            {
                items.push(SchematicItem::NetPoint((segment, point)));
            }
        }
        for line in self.net_lines_at_pos(pos) {
            items.push(SchematicItem::NetLine(line));
        }
        for label in self.net_labels_at_pos(pos) {
            items.push(SchematicItem::NetLabel(label));
        }
        for symbol in &self.symbols {
            for pin in symbol.pins() {
                if let Some(pin_pos) = symbol.pin_position(pin.uuid)
                    && within_radius(pos, pin_pos, PIN_GRAB_RADIUS)
                {
                    items.push(SchematicItem::Pin(PinRef {
                        symbol: symbol.uuid,
                        pin: pin.uuid,
                    }));
                }
            }
            if within_radius(pos, symbol.position(), SYMBOL_GRAB_RADIUS) {
                items.push(SchematicItem::Symbol(symbol.uuid));
            }
        }
        items
    }

    pub fn net_points_at_pos(&self, pos: Point) -> Vec<ElementRef> {
        let mut points = Vec::new();
        for segment in &self.net_segments {
            for point in segment.points() {
                if within_radius(pos, point.position(), NETPOINT_GRAB_RADIUS) {
                    points.push((segment.uuid, point.uuid));
                }
            }
        }
        points
    }

    pub fn net_lines_at_pos(&self, pos: Point) -> Vec<ElementRef> {
        let mut lines = Vec::new();
        for segment in &self.net_segments {
            for line in segment.lines() {
                let (Some(start), Some(end)) =
                    (segment.point(line.start()), segment.point(line.end()))
                else {
                    continue;
                };
                let tolerance = line.width() / 2 + NETLINE_GRAB_TOLERANCE;
                if near_segment(pos, start.position(), end.position(), tolerance) {
                    lines.push((segment.uuid, line.uuid));
                }
            }
        }
        lines
    }

    pub fn net_labels_at_pos(&self, pos: Point) -> Vec<ElementRef> {
        let mut labels = Vec::new();
        for segment in &self.net_segments {
            for label in segment.labels() {
                let local = pos.rotated(-label.rotation(), label.position()) - label.position();
                if local.x.abs() <= NETLABEL_GRAB_HALF_WIDTH
                    && local.y.abs() <= NETLABEL_GRAB_HALF_HEIGHT
                {
                    labels.push((segment.uuid, label.uuid));
                }
            }
        }
        labels
    }

    pub fn pins_at_pos(&self, pos: Point) -> Vec<PinRef> {
        let mut pins = Vec::new();
        for symbol in &self.symbols {
            for pin in symbol.pins() {
                if let Some(pin_pos) = symbol.pin_position(pin.uuid)
                    && within_radius(pos, pin_pos, PIN_GRAB_RADIUS)
                {
                    pins.push(PinRef {
                        symbol: symbol.uuid,
                        pin: pin.uuid,
                    });
                }
            }
        }
        pins
    }

    /// Derived position of a net line: the midpoint of its endpoints
    pub fn net_line_position(&self, segment: Uuid, line: Uuid) -> Option<Point> {
        let seg = self.net_segment(segment)?;
        let line = seg.line(line)?;
        Some(
            seg.point(line.start())?
                .position()
                .midpoint(seg.point(line.end())?.position()),
        )
    }

    // ============== Selection ==============

    pub fn selection_query(&self) -> SelectionQuery<'_> {
        SelectionQuery::new(self)
    }

    pub fn set_symbol_selected(&mut self, uuid: Uuid, selected: bool) -> Result<(), SchematicError> {
        self.symbol_mut(uuid)
            .ok_or(SchematicError::SymbolNotFound(uuid))?
            .set_selected(selected);
        Ok(())
    }

    pub fn set_net_point_selected(
        &mut self,
        segment: Uuid,
        point: Uuid,
        selected: bool,
    ) -> Result<(), SchematicError> {
        self.net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .point_mut(point)
            .ok_or(SchematicError::NetPointNotFound(point))?
            .set_selected(selected);
        Ok(())
    }

    pub fn set_net_line_selected(
        &mut self,
        segment: Uuid,
        line: Uuid,
        selected: bool,
    ) -> Result<(), SchematicError> {
        self.net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .line_mut(line)
            .ok_or(SchematicError::NetLineNotFound(line))?
            .set_selected(selected);
        Ok(())
    }

    pub fn set_net_label_selected(
        &mut self,
        segment: Uuid,
        label: Uuid,
        selected: bool,
    ) -> Result<(), SchematicError> {
        self.net_segment_mut(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?
            .label_mut(label)
            .ok_or(SchematicError::NetLabelNotFound(label))?
            .set_selected(selected);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        for symbol in &mut self.symbols {
            symbol.set_selected(false);
        }
        for segment in &mut self.net_segments {
            let point_ids: Vec<Uuid> = segment.points().iter().map(|p| p.uuid).collect();
            for id in point_ids {
                if let Some(p) = segment.point_mut(id) {
                    p.set_selected(false);
                }
            }
            let line_ids: Vec<Uuid> = segment.lines().iter().map(|l| l.uuid).collect();
            for id in line_ids {
                if let Some(l) = segment.line_mut(id) {
                    l.set_selected(false);
                }
            }
            let label_ids: Vec<Uuid> = segment.labels().iter().map(|l| l.uuid).collect();
            for id in label_ids {
                if let Some(l) = segment.label_mut(id) {
                    l.set_selected(false);
                }
            }
        }
    }

    // ============== Internal ==============

    /// Validate a pin anchor: the pin must exist, be free, and its component
    /// signal must resolve to `net_signal`. Returns the pin's scene position.
    fn checked_pin_anchor(
        &self,
        circuit: &Circuit,
        pin: PinRef,
        net_signal: Uuid,
    ) -> Result<Point, SchematicError> {
        let symbol = self
            .symbol(pin.symbol)
            .ok_or(SchematicError::SymbolNotFound(pin.symbol))?;
        let sym_pin = symbol
            .pin(pin.pin)
            .ok_or(SchematicError::PinNotFound(pin.pin))?;
        if sym_pin.is_used() {
            return Err(SchematicError::PinAlreadyOccupied(pin.pin));
        }
        let signal = circuit
            .component_signal(symbol.component(), sym_pin.component_signal())
            .ok_or(SchematicError::ComponentSignalNotFound(sym_pin.component_signal()))?;
        if signal.net_signal() != Some(net_signal) {
            return Err(SchematicError::PinSignalMismatch(pin.pin));
        }
        symbol
            .pin_position(pin.pin)
            .ok_or(SchematicError::PinNotFound(pin.pin))
    }

    fn pin_mut(&mut self, pin: PinRef) -> Result<&mut SymbolPin, SchematicError> {
        self.symbol_mut(pin.symbol)
            .ok_or(SchematicError::SymbolNotFound(pin.symbol))?
            .pin_mut(pin.pin)
            .ok_or(SchematicError::PinNotFound(pin.pin))
    }

    /// Rebuild all registration state after deserialization
    pub(crate) fn restore_registrations(
        &mut self,
        circuit: &mut Circuit,
    ) -> Result<(), SchematicError> {
        // duplicate UUIDs are a corrupt-file condition, not a defect
        let mut seen = BTreeSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.uuid) {
                return Err(SchematicError::DuplicateUuid(symbol.uuid));
            }
        }
        for segment in &self.net_segments {
            if !seen.insert(segment.uuid) {
                return Err(SchematicError::DuplicateUuid(segment.uuid));
            }
        }

        for symbol in &self.symbols {
            circuit
                .component_mut(symbol.component())
                .ok_or(SchematicError::ComponentNotFound(symbol.component()))?
                .register_placed_symbol((self.uuid, symbol.uuid))?;
        }
        let segment_ids: Vec<Uuid> = self.net_segments.iter().map(|s| s.uuid).collect();
        for uuid in segment_ids {
            let segment = self
                .net_segment_mut(uuid)
                .ok_or(SchematicError::NetSegmentNotFound(uuid))?;
            segment.rebuild_registrations()?;
            let net_signal = segment.net_signal();
            circuit
                .net_signal_mut(net_signal)
                .ok_or(SchematicError::NetSignalNotFound(net_signal))?
                .register_schematic_segment((self.uuid, uuid))?;
            let anchors: Vec<(Uuid, PinRef)> = self
                .net_segment(uuid)
                .ok_or(SchematicError::NetSegmentNotFound(uuid))?
                .points()
                .iter()
                .filter_map(|p| p.pin().map(|pin| (p.uuid, pin)))
                .collect();
            for (point, pin) in anchors {
                // consistency of pin signal vs segment signal
                let seg = self
                    .net_segment(uuid)
                    .ok_or(SchematicError::NetSegmentNotFound(uuid))?;
                let position = {
                    let symbol = self
                        .symbol(pin.symbol)
                        .ok_or(SchematicError::SymbolNotFound(pin.symbol))?;
                    let sym_pin = symbol
                        .pin(pin.pin)
                        .ok_or(SchematicError::PinNotFound(pin.pin))?;
                    if sym_pin.is_used() {
                        return Err(SchematicError::PinAlreadyOccupied(pin.pin));
                    }
                    let signal = circuit
                        .component_signal(symbol.component(), sym_pin.component_signal())
                        .ok_or(SchematicError::ComponentSignalNotFound(
                            sym_pin.component_signal(),
                        ))?;
                    if signal.net_signal() != Some(seg.net_signal()) {
                        return Err(SchematicError::PinSignalMismatch(pin.pin));
                    }
                    symbol
                        .pin_position(pin.pin)
                        .ok_or(SchematicError::PinNotFound(pin.pin))?
                };
                self.pin_mut(pin)?.set_net_point(Some((uuid, point)));
                self.net_segment_mut(uuid)
                    .ok_or(SchematicError::NetSegmentNotFound(uuid))?
                    .point_mut(point)
                    .ok_or(SchematicError::NetPointNotFound(point))?
                    .set_position(position);
            }
        }
        Ok(())
    }
}

fn within_radius(pos: Point, center: Point, radius: Length) -> bool {
    let r = radius.to_nm() as i128;
    pos.distance_squared(center) <= r * r
}

/// Distance check from `pos` to the segment `a`-`b`, within `tolerance`
fn near_segment(pos: Point, a: Point, b: Point, tolerance: Length) -> bool {
    let tol = tolerance.to_nm() as i128;
    let len2 = a.distance_squared(b);
    if len2 == 0 {
        return within_radius(pos, a, tolerance);
    }
    let apx = (pos.x.to_nm() - a.x.to_nm()) as i128;
    let apy = (pos.y.to_nm() - a.y.to_nm()) as i128;
    let abx = (b.x.to_nm() - a.x.to_nm()) as i128;
    let aby = (b.y.to_nm() - a.y.to_nm()) as i128;
    let dot = apx * abx + apy * aby;
    if dot < 0 {
        return within_radius(pos, a, tolerance);
    }
    if dot > len2 {
        return within_radius(pos, b, tolerance);
    }
    // squared perpendicular distance, rounded down by the integer division
    let d2 = apx * apx + apy * apy - (dot * dot) / len2;
    d2 <= tol * tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, ComponentInstance, ComponentSignalInstance, NetSignal};
    use crate::constants::DEFAULT_NETLINE_WIDTH;

    fn circuit_with_signal() -> (Circuit, Uuid) {
        let mut circuit = Circuit::new();
        let signal = NetSignal::new("N#1", false);
        let uuid = signal.uuid;
        circuit.add_net_signal(signal).unwrap();
        (circuit, uuid)
    }

    fn chain_segment(signal: Uuid, positions: &[(f64, f64)]) -> (NetSegment, Vec<Uuid>, Vec<Uuid>) {
        let mut segment = NetSegment::new(signal);
        let points: Vec<NetPoint> = positions
            .iter()
            .map(|&(x, y)| NetPoint::new(Point::from_mm(x, y)))
            .collect();
        let point_ids: Vec<Uuid> = points.iter().map(|p| p.uuid).collect();
        let lines: Vec<NetLine> = point_ids
            .windows(2)
            .map(|w| NetLine::new(w[0], w[1], DEFAULT_NETLINE_WIDTH))
            .collect();
        let line_ids: Vec<Uuid> = lines.iter().map(|l| l.uuid).collect();
        segment.add_points_and_lines(points, lines).unwrap();
        (segment, point_ids, line_ids)
    }

    fn symbol_with_pin(
        circuit: &mut Circuit,
        net_signal: Uuid,
        position: (f64, f64),
        offset: (f64, f64),
    ) -> (Symbol, PinRef, Uuid, Uuid) {
        let cmp_signal = ComponentSignalInstance::new("1");
        let cmp_signal_uuid = cmp_signal.uuid;
        let component = ComponentInstance::new("U1").with_signal(cmp_signal);
        let component_uuid = component.uuid;
        circuit.add_component(component).unwrap();
        circuit
            .set_component_signal_net_signal(component_uuid, cmp_signal_uuid, Some(net_signal))
            .unwrap();
        let pin = SymbolPin::new("1", Point::from_mm(offset.0, offset.1), cmp_signal_uuid);
        let pin_uuid = pin.uuid;
        let symbol = Symbol::new(
            component_uuid,
            Point::from_mm(position.0, position.1),
            Angle::ZERO,
        )
        .with_pin(pin);
        let symbol_uuid = symbol.uuid;
        (
            symbol,
            PinRef {
                symbol: symbol_uuid,
                pin: pin_uuid,
            },
            component_uuid,
            cmp_signal_uuid,
        )
    }

    #[test]
    fn test_segment_add_remove_registration() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (segment, _, _) = chain_segment(signal, &[(0.0, 0.0), (5.0, 0.0)]);
        let seg_uuid = segment.uuid;

        schematic.add_net_segment(&mut circuit, segment).unwrap();
        assert!(circuit
            .net_signal(signal)
            .unwrap()
            .schematic_segments()
            .contains(&(schematic.uuid, seg_uuid)));

        let removed = schematic.remove_net_segment(&mut circuit, seg_uuid).unwrap();
        assert!(!circuit.net_signal(signal).unwrap().is_used());
        // registration state is cleared on the returned segment
        assert!(removed.points().iter().all(|p| p.lines().is_empty()));

        // re-adding rebuilds the line registrations
        schematic.add_net_segment(&mut circuit, removed).unwrap();
        let seg = schematic.net_segment(seg_uuid).unwrap();
        assert!(seg.points().iter().all(|p| p.lines().len() == 1));
    }

    #[test]
    fn test_duplicate_segment_uuid_rejected() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (segment, _, _) = chain_segment(signal, &[(0.0, 0.0), (5.0, 0.0)]);
        let mut clone = NetSegment::new(signal);
        clone.uuid = segment.uuid;
        schematic.add_net_segment(&mut circuit, segment).unwrap();
        assert!(matches!(
            schematic.add_net_segment(&mut circuit, clone),
            Err(SchematicError::DuplicateUuid(_))
        ));
    }

    #[test]
    fn test_pin_anchor_position_and_freeze_on_detach() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (symbol, pin, _, _) = symbol_with_pin(&mut circuit, signal, (10.0, 10.0), (2.54, 0.0));
        schematic.add_symbol(&mut circuit, symbol).unwrap();

        let mut segment = NetSegment::new(signal);
        let seg_uuid = segment.uuid;
        // position is wrong on purpose; the anchor derives it from the pin
        let point = NetPoint::new_attached(pin, Point::ORIGIN);
        let point_uuid = point.uuid;
        segment.add_points_and_lines(vec![point], vec![]).unwrap();
        schematic.add_net_segment(&mut circuit, segment).unwrap();

        let pin_pos = Point::from_mm(12.54, 10.0);
        assert_eq!(
            schematic
                .net_segment(seg_uuid)
                .unwrap()
                .point(point_uuid)
                .unwrap()
                .position(),
            pin_pos
        );
        assert_eq!(
            schematic.symbol(pin.symbol).unwrap().pin(pin.pin).unwrap().net_point(),
            Some((seg_uuid, point_uuid))
        );

        // detaching frees the pin and freezes the position
        let old = schematic
            .set_net_point_pin(&circuit, seg_uuid, point_uuid, None)
            .unwrap();
        assert_eq!(old, Some(pin));
        let point = schematic.net_segment(seg_uuid).unwrap().point(point_uuid).unwrap();
        assert!(!point.is_attached_to_pin());
        assert_eq!(point.position(), pin_pos);
        assert!(schematic.symbol(pin.symbol).unwrap().pin(pin.pin).unwrap().net_point().is_none());
    }

    #[test]
    fn test_pin_change_rejected_while_lines_registered() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (symbol, pin, _, _) = symbol_with_pin(&mut circuit, signal, (0.0, 0.0), (0.0, 0.0));
        schematic.add_symbol(&mut circuit, symbol).unwrap();
        let (segment, points, _) = chain_segment(signal, &[(0.0, 0.0), (5.0, 0.0)]);
        let seg_uuid = segment.uuid;
        schematic.add_net_segment(&mut circuit, segment).unwrap();

        assert!(matches!(
            schematic.set_net_point_pin(&circuit, seg_uuid, points[0], Some(pin)),
            Err(SchematicError::NetPointInUse(_))
        ));
    }

    #[test]
    fn test_hit_testing_order_and_types() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (segment, points, lines) = chain_segment(signal, &[(0.0, 0.0), (10.0, 0.0)]);
        let seg_uuid = segment.uuid;
        schematic.add_net_segment(&mut circuit, segment).unwrap();

        // exactly on the first point: the point comes before its line
        let items = schematic.items_at_pos(Point::from_mm(0.0, 0.0));
        assert_eq!(items[0], SchematicItem::NetPoint((seg_uuid, points[0])));
        assert!(items.contains(&SchematicItem::NetLine((seg_uuid, lines[0]))));

        // in the middle of the line: only the line
        let items = schematic.items_at_pos(Point::from_mm(5.0, 0.0));
        assert_eq!(items, vec![SchematicItem::NetLine((seg_uuid, lines[0]))]);
        assert_eq!(
            schematic.net_line_position(seg_uuid, lines[0]),
            Some(Point::from_mm(5.0, 0.0))
        );

        // far away: nothing
        assert!(schematic.items_at_pos(Point::from_mm(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_symbol_transform_drags_anchored_points() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (symbol, pin, _, _) = symbol_with_pin(&mut circuit, signal, (0.0, 0.0), (2.54, 0.0));
        let symbol_uuid = symbol.uuid;
        schematic.add_symbol(&mut circuit, symbol).unwrap();
        let mut segment = NetSegment::new(signal);
        let seg_uuid = segment.uuid;
        let point = NetPoint::new_attached(pin, Point::ORIGIN);
        let point_uuid = point.uuid;
        segment.add_points_and_lines(vec![point], vec![]).unwrap();
        schematic.add_net_segment(&mut circuit, segment).unwrap();

        schematic
            .set_symbol_transform(symbol_uuid, Point::from_mm(10.0, 0.0), Angle::deg_90())
            .unwrap();
        assert_eq!(
            schematic
                .net_segment(seg_uuid)
                .unwrap()
                .point(point_uuid)
                .unwrap()
                .position(),
            Point::from_mm(10.0, 2.54)
        );
    }

    #[test]
    fn test_selection_query_filters() {
        let (mut circuit, signal) = circuit_with_signal();
        let mut schematic = Schematic::new("Page 1");
        let (segment, points, lines) =
            chain_segment(signal, &[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        let seg_uuid = segment.uuid;
        schematic.add_net_segment(&mut circuit, segment).unwrap();
        schematic.set_net_line_selected(seg_uuid, lines[0], true).unwrap();

        let mut query = schematic.selection_query();
        query.add_selected_net_lines();
        query.add_net_points_of_net_lines(NetPointFilter::AllConnectedLinesSelected);
        // only the chain end has all its lines selected; the middle point
        // still carries the unselected second line
        assert_eq!(query.net_lines().len(), 1);
        assert_eq!(query.net_points().len(), 1);
        assert!(query.net_points().contains(&(seg_uuid, points[0])));
    }
}

/// Schematic-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchematicError {
    #[error("Net segment not found: {0}")]
    NetSegmentNotFound(Uuid),
    #[error("Net point not found: {0}")]
    NetPointNotFound(Uuid),
    #[error("Net line not found: {0}")]
    NetLineNotFound(Uuid),
    #[error("Net label not found: {0}")]
    NetLabelNotFound(Uuid),
    #[error("Symbol not found: {0}")]
    SymbolNotFound(Uuid),
    #[error("Symbol pin not found: {0}")]
    PinNotFound(Uuid),
    #[error("Component instance not found: {0}")]
    ComponentNotFound(Uuid),
    #[error("Component signal instance not found: {0}")]
    ComponentSignalNotFound(Uuid),
    #[error("There is already an element with the UUID \"{0}\"")]
    DuplicateUuid(Uuid),
    #[error("Net signal not found: {0}")]
    NetSignalNotFound(Uuid),
    #[error("Net line endpoint does not belong to the segment: {0}")]
    LineEndpointNotInSegment(Uuid),
    #[error("Net point still has connected lines: {0}")]
    NetPointInUse(Uuid),
    #[error("Symbol still has anchored net points: {0}")]
    SymbolInUse(Uuid),
    #[error("Symbol pin already has an anchored net point: {0}")]
    PinAlreadyOccupied(Uuid),
    #[error("Pin net signal differs from the segment's net signal: {0}")]
    PinSignalMismatch(Uuid),
    #[error("Net line already registered: {0}")]
    LineAlreadyRegistered(Uuid),
    #[error("Net line not registered: {0}")]
    LineNotRegistered(Uuid),
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}
