//! Board layout mirror graph
//!
//! The schematic-side composite commands cascade into the board: combining
//! net signals rebinds vias and trace points, and disconnecting a component
//! signal removes the traces at its pads. This module carries just enough of
//! the board graph to honor that choreography: devices with footprint pads,
//! trace net points and lines, and vias. Copper routing itself is out of
//! scope.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::circuit::{Circuit, CircuitError};
use crate::geometry::{Length, Point};

/// Reference to a footprint pad: `(device, pad)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PadRef {
    pub device: Uuid,
    pub pad: Uuid,
}

/// A pad of a device footprint, bound to one component signal instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintPad {
    pub uuid: Uuid,
    name: String,
    offset: Point,
    component_signal: Uuid,
    #[serde(skip)]
    net_points: BTreeSet<Uuid>,
}

impl FootprintPad {
    pub fn new(name: impl Into<String>, offset: Point, component_signal: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            offset,
            component_signal,
            net_points: BTreeSet::new(),
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

    /// Trace net points currently anchored at this pad
    pub fn net_points(&self) -> &BTreeSet<Uuid> {
        &self.net_points
    }

    pub fn is_used(&self) -> bool {
        !self.net_points.is_empty()
    }
}

/// A placed device footprint, belonging to one component instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub uuid: Uuid,
    component: Uuid,
    position: Point,
    pads: Vec<FootprintPad>,
}

impl Device {
    pub fn new(component: Uuid, position: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            component,
            position,
            pads: Vec::new(),
        }
    }

    pub fn with_pad(mut self, pad: FootprintPad) -> Self {
        self.pads.push(pad);
        self
    }

    pub fn component(&self) -> Uuid {
        self.component
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn pads(&self) -> &[FootprintPad] {
        &self.pads
    }

    pub fn pad(&self, uuid: Uuid) -> Option<&FootprintPad> {
        self.pads.iter().find(|p| p.uuid == uuid)
    }

    fn pad_mut(&mut self, uuid: Uuid) -> Option<&mut FootprintPad> {
        self.pads.iter_mut().find(|p| p.uuid == uuid)
    }
}

/// A vertex of a board trace, optionally anchored at a pad or a via
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardNetPoint {
    pub uuid: Uuid,
    position: Point,
    net_signal: Uuid,
    pad: Option<PadRef>,
    via: Option<Uuid>,
    #[serde(skip)]
    lines: BTreeSet<Uuid>,
}

impl BoardNetPoint {
    pub fn new(position: Point, net_signal: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            net_signal,
            pad: None,
            via: None,
            lines: BTreeSet::new(),
        }
    }

    pub fn new_on_pad(position: Point, net_signal: Uuid, pad: PadRef) -> Self {
        let mut point = Self::new(position, net_signal);
        point.pad = Some(pad);
        point
    }

    pub fn new_on_via(position: Point, net_signal: Uuid, via: Uuid) -> Self {
        let mut point = Self::new(position, net_signal);
        point.via = Some(via);
        point
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn net_signal(&self) -> Uuid {
        self.net_signal
    }

    /// Only legal while the point is not part of a live board
    pub(crate) fn set_net_signal_id(&mut self, net_signal: Uuid) {
        self.net_signal = net_signal;
    }

    pub fn pad(&self) -> Option<PadRef> {
        self.pad
    }

    pub fn via(&self) -> Option<Uuid> {
        self.via
    }

    pub fn lines(&self) -> &BTreeSet<Uuid> {
        &self.lines
    }

    pub fn is_used(&self) -> bool {
        !self.lines.is_empty()
    }
}

/// A trace edge between two board net points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardNetLine {
    pub uuid: Uuid,
    width: Length,
    start: Uuid,
    end: Uuid,
}

impl BoardNetLine {
    pub fn new(start: Uuid, end: Uuid, width: Length) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            width,
            start,
            end,
        }
    }

    pub fn width(&self) -> Length {
        self.width
    }

    pub fn start(&self) -> Uuid {
        self.start
    }

    pub fn end(&self) -> Uuid {
        self.end
    }
}

/// A via connecting copper layers, carrying one net signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardVia {
    pub uuid: Uuid,
    position: Point,
    net_signal: Uuid,
    #[serde(skip)]
    net_points: BTreeSet<Uuid>,
}

impl BoardVia {
    pub fn new(position: Point, net_signal: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            net_signal,
            net_points: BTreeSet::new(),
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn net_signal(&self) -> Uuid {
        self.net_signal
    }

    /// Only legal while the via is not part of a live board
    pub(crate) fn set_net_signal_id(&mut self, net_signal: Uuid) {
        self.net_signal = net_signal;
    }

    pub fn net_points(&self) -> &BTreeSet<Uuid> {
        &self.net_points
    }

    pub fn is_used(&self) -> bool {
        !self.net_points.is_empty()
    }
}

/// One board of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub uuid: Uuid,
    name: String,
    devices: Vec<Device>,
    net_points: Vec<BoardNetPoint>,
    net_lines: Vec<BoardNetLine>,
    vias: Vec<BoardVia>,
}

impl Board {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            devices: Vec::new(),
            net_points: Vec::new(),
            net_lines: Vec::new(),
            vias: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ============== Devices ==============

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, uuid: Uuid) -> Option<&Device> {
        self.devices.iter().find(|d| d.uuid == uuid)
    }

    pub fn device_by_component(&self, component: Uuid) -> Option<&Device> {
        self.devices.iter().find(|d| d.component() == component)
    }

    pub fn add_device(&mut self, circuit: &Circuit, device: Device) -> Result<(), BoardError> {
        if self.device(device.uuid).is_some() {
            return Err(BoardError::DuplicateUuid(device.uuid));
        }
        let component = circuit
            .component(device.component())
            .ok_or(BoardError::ComponentNotFound(device.component()))?;
        for pad in device.pads() {
            if component.signal(pad.component_signal()).is_none() {
                return Err(BoardError::ComponentSignalNotFound(pad.component_signal()));
            }
        }
        self.devices.push(device);
        Ok(())
    }

    /// Remove a device, returning ownership of it. Rejected while any trace
    /// point is still anchored at one of its pads.
    pub fn remove_device(&mut self, uuid: Uuid) -> Result<Device, BoardError> {
        let pos = self
            .devices
            .iter()
            .position(|d| d.uuid == uuid)
            .ok_or(BoardError::DeviceNotFound(uuid))?;
        if self.devices[pos].pads().iter().any(|p| p.is_used()) {
            return Err(BoardError::DeviceInUse(uuid));
        }
        Ok(self.devices.remove(pos))
    }

    // ============== Net Points ==============

    pub fn net_points(&self) -> &[BoardNetPoint] {
        &self.net_points
    }

    pub fn net_point(&self, uuid: Uuid) -> Option<&BoardNetPoint> {
        self.net_points.iter().find(|p| p.uuid == uuid)
    }

    fn net_point_mut(&mut self, uuid: Uuid) -> Option<&mut BoardNetPoint> {
        self.net_points.iter_mut().find(|p| p.uuid == uuid)
    }

    pub fn add_net_point(
        &mut self,
        circuit: &mut Circuit,
        point: BoardNetPoint,
    ) -> Result<(), BoardError> {
        if self.net_point(point.uuid).is_some() {
            return Err(BoardError::DuplicateUuid(point.uuid));
        }
        if circuit.net_signal(point.net_signal()).is_none() {
            return Err(BoardError::NetSignalNotFound(point.net_signal()));
        }
        if let Some(pad) = point.pad() {
            let device = self
                .device(pad.device)
                .ok_or(BoardError::DeviceNotFound(pad.device))?;
            let fp_pad = device.pad(pad.pad).ok_or(BoardError::PadNotFound(pad.pad))?;
            let signal = circuit
                .component_signal(device.component(), fp_pad.component_signal())
                .ok_or(BoardError::ComponentSignalNotFound(fp_pad.component_signal()))?;
            if signal.net_signal() != Some(point.net_signal()) {
                return Err(BoardError::PadSignalMismatch(pad.pad));
            }
        }
        if let Some(via) = point.via() {
            let via = self.via(via).ok_or(BoardError::ViaNotFound(via))?;
            if via.net_signal() != point.net_signal() {
                return Err(BoardError::ViaSignalMismatch(via.uuid));
            }
        }

        circuit
            .net_signal_mut(point.net_signal())
            .ok_or(BoardError::NetSignalNotFound(point.net_signal()))?
            .register_board_net_point((self.uuid, point.uuid))?;
        if let Some(pad) = point.pad() {
            if let Some(device) = self.devices.iter_mut().find(|d| d.uuid == pad.device)
                && let Some(fp_pad) = device.pad_mut(pad.pad)
            {
                fp_pad.net_points.insert(point.uuid);
            }
        }
        if let Some(via) = point.via()
            && let Some(via) = self.vias.iter_mut().find(|v| v.uuid == via)
        {
            via.net_points.insert(point.uuid);
        }
        self.net_points.push(point);
        Ok(())
    }

    /// Remove a trace point, returning ownership of it. Rejected while any
    /// trace line still terminates at it.
    pub fn remove_net_point(
        &mut self,
        circuit: &mut Circuit,
        uuid: Uuid,
    ) -> Result<BoardNetPoint, BoardError> {
        let pos = self
            .net_points
            .iter()
            .position(|p| p.uuid == uuid)
            .ok_or(BoardError::NetPointNotFound(uuid))?;
        if self.net_points[pos].is_used() {
            return Err(BoardError::NetPointInUse(uuid));
        }
        let point = &self.net_points[pos];
        circuit
            .net_signal_mut(point.net_signal())
            .ok_or(BoardError::NetSignalNotFound(point.net_signal()))?
            .unregister_board_net_point((self.uuid, uuid))?;
        if let Some(pad) = point.pad() {
            if let Some(device) = self.devices.iter_mut().find(|d| d.uuid == pad.device)
                && let Some(fp_pad) = device.pad_mut(pad.pad)
            {
                fp_pad.net_points.remove(&uuid);
            }
        }
        if let Some(via) = self.net_points[pos].via()
            && let Some(via) = self.vias.iter_mut().find(|v| v.uuid == via)
        {
            via.net_points.remove(&uuid);
        }
        let mut point = self.net_points.remove(pos);
        point.lines.clear();
        Ok(point)
    }

    // ============== Net Lines ==============

    pub fn net_lines(&self) -> &[BoardNetLine] {
        &self.net_lines
    }

    pub fn net_line(&self, uuid: Uuid) -> Option<&BoardNetLine> {
        self.net_lines.iter().find(|l| l.uuid == uuid)
    }

    pub fn add_net_line(&mut self, line: BoardNetLine) -> Result<(), BoardError> {
        if self.net_line(line.uuid).is_some() {
            return Err(BoardError::DuplicateUuid(line.uuid));
        }
        let start = self
            .net_point(line.start())
            .ok_or(BoardError::NetPointNotFound(line.start()))?;
        let end = self
            .net_point(line.end())
            .ok_or(BoardError::NetPointNotFound(line.end()))?;
        if start.net_signal() != end.net_signal() {
            return Err(BoardError::LineSignalMismatch(line.uuid));
        }
        let (start, end, uuid) = (line.start(), line.end(), line.uuid);
        self.net_lines.push(line);
        if let Some(p) = self.net_point_mut(start) {
            p.lines.insert(uuid);
        }
        if let Some(p) = self.net_point_mut(end) {
            p.lines.insert(uuid);
        }
        Ok(())
    }

    pub fn remove_net_line(&mut self, uuid: Uuid) -> Result<BoardNetLine, BoardError> {
        let pos = self
            .net_lines
            .iter()
            .position(|l| l.uuid == uuid)
            .ok_or(BoardError::NetLineNotFound(uuid))?;
        let line = self.net_lines.remove(pos);
        if let Some(p) = self.net_point_mut(line.start()) {
            p.lines.remove(&uuid);
        }
        if let Some(p) = self.net_point_mut(line.end()) {
            p.lines.remove(&uuid);
        }
        Ok(line)
    }

    // ============== Vias ==============

    pub fn vias(&self) -> &[BoardVia] {
        &self.vias
    }

    pub fn via(&self, uuid: Uuid) -> Option<&BoardVia> {
        self.vias.iter().find(|v| v.uuid == uuid)
    }

    pub fn add_via(&mut self, circuit: &mut Circuit, via: BoardVia) -> Result<(), BoardError> {
        if self.via(via.uuid).is_some() {
            return Err(BoardError::DuplicateUuid(via.uuid));
        }
        if circuit.net_signal(via.net_signal()).is_none() {
            return Err(BoardError::NetSignalNotFound(via.net_signal()));
        }
        circuit
            .net_signal_mut(via.net_signal())
            .ok_or(BoardError::NetSignalNotFound(via.net_signal()))?
            .register_board_via((self.uuid, via.uuid))?;
        self.vias.push(via);
        Ok(())
    }

    /// Remove a via, returning ownership of it. Rejected while any trace
    /// point is still anchored on it.
    pub fn remove_via(&mut self, circuit: &mut Circuit, uuid: Uuid) -> Result<BoardVia, BoardError> {
        let pos = self
            .vias
            .iter()
            .position(|v| v.uuid == uuid)
            .ok_or(BoardError::ViaNotFound(uuid))?;
        if self.vias[pos].is_used() {
            return Err(BoardError::ViaInUse(uuid));
        }
        circuit
            .net_signal_mut(self.vias[pos].net_signal())
            .ok_or(BoardError::NetSignalNotFound(self.vias[pos].net_signal()))?
            .unregister_board_via((self.uuid, uuid))?;
        let mut via = self.vias.remove(pos);
        via.net_points.clear();
        Ok(via)
    }

    // ============== Internal ==============

    /// Rebuild all registration state after deserialization
    pub(crate) fn restore_registrations(
        &mut self,
        circuit: &mut Circuit,
    ) -> Result<(), BoardError> {
        let mut seen = BTreeSet::new();
        for device in &self.devices {
            if !seen.insert(device.uuid) {
                return Err(BoardError::DuplicateUuid(device.uuid));
            }
        }
        for point in &self.net_points {
            if !seen.insert(point.uuid) {
                return Err(BoardError::DuplicateUuid(point.uuid));
            }
        }
        for line in &self.net_lines {
            if !seen.insert(line.uuid) {
                return Err(BoardError::DuplicateUuid(line.uuid));
            }
        }
        for via in &self.vias {
            if !seen.insert(via.uuid) {
                return Err(BoardError::DuplicateUuid(via.uuid));
            }
        }

        for via in &self.vias {
            circuit
                .net_signal_mut(via.net_signal())
                .ok_or(BoardError::NetSignalNotFound(via.net_signal()))?
                .register_board_via((self.uuid, via.uuid))?;
        }
        let point_info: Vec<(Uuid, Uuid, Option<PadRef>, Option<Uuid>)> = self
            .net_points
            .iter()
            .map(|p| (p.uuid, p.net_signal(), p.pad(), p.via()))
            .collect();
        for (uuid, net_signal, pad, via) in point_info {
            circuit
                .net_signal_mut(net_signal)
                .ok_or(BoardError::NetSignalNotFound(net_signal))?
                .register_board_net_point((self.uuid, uuid))?;
            if let Some(pad) = pad {
                let device = self
                    .devices
                    .iter_mut()
                    .find(|d| d.uuid == pad.device)
                    .ok_or(BoardError::DeviceNotFound(pad.device))?;
                device
                    .pad_mut(pad.pad)
                    .ok_or(BoardError::PadNotFound(pad.pad))?
                    .net_points
                    .insert(uuid);
            }
            if let Some(via) = via {
                self.vias
                    .iter_mut()
                    .find(|v| v.uuid == via)
                    .ok_or(BoardError::ViaNotFound(via))?
                    .net_points
                    .insert(uuid);
            }
        }
        let line_info: Vec<(Uuid, Uuid, Uuid)> = self
            .net_lines
            .iter()
            .map(|l| (l.uuid, l.start(), l.end()))
            .collect();
        for (uuid, start, end) in line_info {
            self.net_point_mut(start)
                .ok_or(BoardError::NetPointNotFound(start))?
                .lines
                .insert(uuid);
            self.net_point_mut(end)
                .ok_or(BoardError::NetPointNotFound(end))?
                .lines
                .insert(uuid);
        }
        Ok(())
    }
}


/// Board-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum BoardError {
    #[error("Device not found: {0}")]
    DeviceNotFound(Uuid),
    #[error("Footprint pad not found: {0}")]
    PadNotFound(Uuid),
    #[error("Board net point not found: {0}")]
    NetPointNotFound(Uuid),
    #[error("Board net line not found: {0}")]
    NetLineNotFound(Uuid),
    #[error("Via not found: {0}")]
    ViaNotFound(Uuid),
    #[error("Component instance not found: {0}")]
    ComponentNotFound(Uuid),
    #[error("Component signal instance not found: {0}")]
    ComponentSignalNotFound(Uuid),
    #[error("Net signal not found: {0}")]
    NetSignalNotFound(Uuid),
    #[error("There is already an element with the UUID \"{0}\"")]
    DuplicateUuid(Uuid),
    #[error("Board net point still has connected lines: {0}")]
    NetPointInUse(Uuid),
    #[error("Device still has anchored trace points: {0}")]
    DeviceInUse(Uuid),
    #[error("Via still has anchored trace points: {0}")]
    ViaInUse(Uuid),
    #[error("Pad net signal differs from the trace point's net signal: {0}")]
    PadSignalMismatch(Uuid),
    #[error("Via net signal differs from the trace point's net signal: {0}")]
    ViaSignalMismatch(Uuid),
    #[error("Trace endpoints carry different net signals: {0}")]
    LineSignalMismatch(Uuid),
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}
