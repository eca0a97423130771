//! Atomic commands on schematic sheets: net labels, net segments, net
//! segment elements, net points and symbols

use uuid::Uuid;

use crate::command::{CommandError, UndoCommand};
use crate::commands::schematic_and_circuit;
use crate::constants::DEFAULT_NETLINE_WIDTH;
use crate::geometry::{Angle, Length, Point};
use crate::project::Project;
use crate::schematic::{NetLabel, NetLine, NetPoint, NetSegment, PinRef, SchematicError};

// ============== Net Labels ==============

/// Insert a net label into a segment. The label itself is constructed
/// lazily at first execution, so a failed transaction never leaves an
/// orphaned object behind.
pub struct NetLabelAdd {
    schematic: Uuid,
    segment: Uuid,
    position: Point,
    label_uuid: Uuid,
    held: Option<NetLabel>,
}

impl NetLabelAdd {
    pub fn new(schematic: Uuid, segment: Uuid, position: Point) -> Self {
        Self {
            schematic,
            segment,
            position,
            label_uuid: Uuid::new_v4(),
            held: None,
        }
    }

    pub fn label_uuid(&self) -> Uuid {
        self.label_uuid
    }
}

impl UndoCommand for NetLabelAdd {
    fn text(&self) -> &str {
        "Add net label"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let mut label = NetLabel::new(self.position);
        label.uuid = self.label_uuid;
        self.held = Some(label);
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let label = schematic
            .net_segment_mut(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
            .remove_net_label(self.label_uuid)?;
        self.held = Some(label);
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let label = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.label_uuid))?;
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let segment = schematic
            .net_segment_mut(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?;
        if let Err(e) = segment.add_net_label(label.clone()) {
            self.held = Some(label);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Remove a net label from its segment
pub struct NetLabelRemove {
    schematic: Uuid,
    segment: Uuid,
    label: Uuid,
    held: Option<NetLabel>,
}

impl NetLabelRemove {
    pub fn new(schematic: Uuid, segment: Uuid, label: Uuid) -> Self {
        Self {
            schematic,
            segment,
            label,
            held: None,
        }
    }
}

impl UndoCommand for NetLabelRemove {
    fn text(&self) -> &str {
        "Remove net label"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let label = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.label))?;
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let segment = schematic
            .net_segment_mut(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?;
        if let Err(e) = segment.add_net_label(label.clone()) {
            self.held = Some(label);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let label = schematic
            .net_segment_mut(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
            .remove_net_label(self.label)?;
        self.held = Some(label);
        Ok(())
    }
}

/// Edit a net label's position and rotation
pub struct NetLabelEdit {
    schematic: Uuid,
    segment: Uuid,
    label: Uuid,
    new_position: Option<Point>,
    new_rotation: Option<Angle>,
    old_position: Option<Point>,
    old_rotation: Option<Angle>,
    executed: bool,
}

impl NetLabelEdit {
    pub fn new(schematic: Uuid, segment: Uuid, label: Uuid) -> Self {
        Self {
            schematic,
            segment,
            label,
            new_position: None,
            new_rotation: None,
            old_position: None,
            old_rotation: None,
            executed: false,
        }
    }

    pub fn set_position(&mut self, position: Point) {
        debug_assert!(!self.executed);
        self.new_position = Some(position);
    }

    pub fn set_rotation(&mut self, rotation: Angle) {
        debug_assert!(!self.executed);
        self.new_rotation = Some(rotation);
    }

    fn apply(
        &self,
        project: &mut Project,
        position: Option<Point>,
        rotation: Option<Angle>,
    ) -> Result<(), CommandError> {
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let label = schematic
            .net_segment_mut(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
            .label_mut(self.label)
            .ok_or(SchematicError::NetLabelNotFound(self.label))?;
        if let Some(position) = position {
            label.set_position(position);
        }
        if let Some(rotation) = rotation {
            label.set_rotation(rotation);
        }
        Ok(())
    }
}

impl UndoCommand for NetLabelEdit {
    fn text(&self) -> &str {
        "Edit net label"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.executed = true;
        let label = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?
            .net_segment(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
            .label(self.label)
            .ok_or(SchematicError::NetLabelNotFound(self.label))?;
        self.old_position = Some(label.position());
        self.old_rotation = Some(label.rotation());
        let modified = self.new_position.is_some_and(|p| p != label.position())
            || self.new_rotation.is_some_and(|r| r != label.rotation());
        if !modified {
            return Ok(false);
        }
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.apply(project, self.old_position, self.old_rotation)
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.apply(project, self.new_position, self.new_rotation)
    }
}

// ============== Net Segments ==============

enum SegmentSource {
    /// Construct a new empty segment at first execution
    New { net_signal: Uuid, constructed: bool },
    /// Re-add a segment that a previous command detached
    Detached,
}

/// Register a net segment with a sheet, constructing it lazily if none was
/// supplied
pub struct NetSegmentAdd {
    schematic: Uuid,
    segment_uuid: Uuid,
    source: SegmentSource,
}

impl NetSegmentAdd {
    /// Add a brand-new empty segment on `net_signal`
    pub fn new(schematic: Uuid, net_signal: Uuid) -> Self {
        Self {
            schematic,
            segment_uuid: Uuid::new_v4(),
            source: SegmentSource::New {
                net_signal,
                constructed: false,
            },
        }
    }

    /// Re-add a segment currently held in the detached store
    pub fn readd(schematic: Uuid, segment: Uuid) -> Self {
        Self {
            schematic,
            segment_uuid: segment,
            source: SegmentSource::Detached,
        }
    }

    pub fn segment_uuid(&self) -> Uuid {
        self.segment_uuid
    }
}

impl UndoCommand for NetSegmentAdd {
    fn text(&self) -> &str {
        "Add net segment"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let mut first_construction = false;
        if let SegmentSource::New {
            net_signal,
            constructed,
        } = &mut self.source
            && !*constructed
        {
            let mut segment = NetSegment::new(*net_signal);
            segment.uuid = self.segment_uuid;
            project.detached_mut().put_net_segment(segment);
            *constructed = true;
            first_construction = true;
        }
        if let Err(e) = self.perform_redo(project) {
            if first_construction {
                // never existed before this command, do not leak it
                project.detached_mut().take_net_segment(self.segment_uuid);
                if let SegmentSource::New { constructed, .. } = &mut self.source {
                    *constructed = false;
                }
            }
            return Err(e);
        }
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        let segment = schematic.remove_net_segment(circuit, self.segment_uuid)?;
        project.detached_mut().put_net_segment(segment);
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let segment = project
            .detached_mut()
            .take_net_segment(self.segment_uuid)
            .ok_or(CommandError::NotDetached(self.segment_uuid))?;
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        if let Err(e) = schematic.add_net_segment(circuit, segment.clone()) {
            project.detached_mut().put_net_segment(segment);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Unregister a net segment from its sheet, keeping it detached for the
/// remainder of the transaction
pub struct NetSegmentRemove {
    schematic: Uuid,
    segment: Uuid,
}

impl NetSegmentRemove {
    pub fn new(schematic: Uuid, segment: Uuid) -> Self {
        Self { schematic, segment }
    }
}

impl UndoCommand for NetSegmentRemove {
    fn text(&self) -> &str {
        "Remove net segment"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let segment = project
            .detached_mut()
            .take_net_segment(self.segment)
            .ok_or(CommandError::NotDetached(self.segment))?;
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        if let Err(e) = schematic.add_net_segment(circuit, segment.clone()) {
            project.detached_mut().put_net_segment(segment);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        let segment = schematic.remove_net_segment(circuit, self.segment)?;
        project.detached_mut().put_net_segment(segment);
        Ok(())
    }
}

/// Change a net segment's net signal.
///
/// Works on a live segment when all attached pins already resolve to the new
/// signal, or on a detached segment while a combine transaction has it out of
/// the sheet.
pub struct NetSegmentEdit {
    schematic: Uuid,
    segment: Uuid,
    new_signal: Option<Uuid>,
    old_signal: Option<Uuid>,
    executed: bool,
}

impl NetSegmentEdit {
    pub fn new(schematic: Uuid, segment: Uuid) -> Self {
        Self {
            schematic,
            segment,
            new_signal: None,
            old_signal: None,
            executed: false,
        }
    }

    pub fn set_net_signal(&mut self, net_signal: Uuid) {
        debug_assert!(!self.executed);
        self.new_signal = Some(net_signal);
    }

    fn apply(&self, project: &mut Project, net_signal: Uuid) -> Result<Uuid, CommandError> {
        let live = project
            .schematic(self.schematic)
            .is_some_and(|s| s.net_segment(self.segment).is_some());
        if live {
            let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
            Ok(schematic.set_net_segment_signal(circuit, self.segment, net_signal)?)
        } else {
            let segment = project
                .detached_mut()
                .net_segment_mut(self.segment)
                .ok_or(CommandError::NotDetached(self.segment))?;
            let old = segment.net_signal();
            segment.set_net_signal_id(net_signal);
            Ok(old)
        }
    }
}

impl UndoCommand for NetSegmentEdit {
    fn text(&self) -> &str {
        "Edit net segment"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.executed = true;
        let Some(new_signal) = self.new_signal else {
            return Ok(false);
        };
        let old = self.apply(project, new_signal)?;
        self.old_signal = Some(old);
        Ok(old != new_signal)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        if let Some(old) = self.old_signal {
            self.apply(project, old)?;
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        if let Some(new) = self.new_signal {
            self.apply(project, new)?;
        }
        Ok(())
    }
}

// ============== Net Segment Elements ==============

enum PendingPoint {
    New { uuid: Uuid, position: Point },
    NewAttached { uuid: Uuid, pin: PinRef },
}

struct PendingLine {
    uuid: Uuid,
    start: Uuid,
    end: Uuid,
    width: Length,
}

/// Bulk-register a batch of net points and net lines with a live segment.
///
/// New entities are constructed at first execution with the UUIDs handed out
/// by the builder methods, so callers can wire lines to points created by the
/// same command. Lines detached by an earlier command of the transaction can
/// be re-added with [`readd_net_line`](Self::readd_net_line).
pub struct NetSegmentAddElements {
    schematic: Uuid,
    segment: Uuid,
    new_points: Vec<PendingPoint>,
    new_lines: Vec<PendingLine>,
    readd_lines: Vec<Uuid>,
    constructed: bool,
    point_ids: Vec<Uuid>,
    line_ids: Vec<Uuid>,
}

impl NetSegmentAddElements {
    pub fn new(schematic: Uuid, segment: Uuid) -> Self {
        Self {
            schematic,
            segment,
            new_points: Vec::new(),
            new_lines: Vec::new(),
            readd_lines: Vec::new(),
            constructed: false,
            point_ids: Vec::new(),
            line_ids: Vec::new(),
        }
    }

    /// Queue a new floating net point; returns its UUID
    pub fn add_net_point(&mut self, position: Point) -> Uuid {
        debug_assert!(!self.constructed);
        let uuid = Uuid::new_v4();
        self.new_points.push(PendingPoint::New { uuid, position });
        uuid
    }

    /// Queue a new pin-attached net point; returns its UUID
    pub fn add_net_point_attached(&mut self, pin: PinRef) -> Uuid {
        debug_assert!(!self.constructed);
        let uuid = Uuid::new_v4();
        self.new_points.push(PendingPoint::NewAttached { uuid, pin });
        uuid
    }

    /// Queue a new net line between two points of the segment (either
    /// existing or queued in this command); returns its UUID
    pub fn add_net_line(&mut self, start: Uuid, end: Uuid) -> Uuid {
        self.add_net_line_with_width(start, end, DEFAULT_NETLINE_WIDTH)
    }

    pub fn add_net_line_with_width(&mut self, start: Uuid, end: Uuid, width: Length) -> Uuid {
        debug_assert!(!self.constructed);
        let uuid = Uuid::new_v4();
        self.new_lines.push(PendingLine {
            uuid,
            start,
            end,
            width,
        });
        uuid
    }

    /// Queue a detached net line for re-registration
    pub fn readd_net_line(&mut self, line: Uuid) {
        debug_assert!(!self.constructed);
        self.readd_lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.new_points.is_empty() && self.new_lines.is_empty() && self.readd_lines.is_empty()
    }
}

impl UndoCommand for NetSegmentAddElements {
    fn text(&self) -> &str {
        "Add net segment elements"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if !self.constructed {
            // materialize new entities into the detached store
            for spec in &self.new_points {
                let point = match spec {
                    PendingPoint::New { uuid, position } => {
                        let mut p = NetPoint::new(*position);
                        p.uuid = *uuid;
                        p
                    }
                    PendingPoint::NewAttached { uuid, pin } => {
                        let mut p = NetPoint::new_attached(*pin, Point::ORIGIN);
                        p.uuid = *uuid;
                        p
                    }
                };
                self.point_ids.push(point.uuid);
                project.detached_mut().put_net_point(point);
            }
            for spec in &self.new_lines {
                let mut line = NetLine::new(spec.start, spec.end, spec.width);
                line.uuid = spec.uuid;
                self.line_ids.push(line.uuid);
                project.detached_mut().put_net_line(line);
            }
            self.line_ids.extend(self.readd_lines.iter().copied());
            self.constructed = true;
        }
        if let Err(e) = self.perform_redo(project) {
            // drop the freshly materialized entities again; detached lines
            // queued for re-add stay in the store for their remove command
            for spec in &self.new_points {
                let uuid = match spec {
                    PendingPoint::New { uuid, .. } | PendingPoint::NewAttached { uuid, .. } => *uuid,
                };
                project.detached_mut().take_net_point(uuid);
            }
            for spec in &self.new_lines {
                project.detached_mut().take_net_line(spec.uuid);
            }
            self.point_ids.clear();
            self.line_ids.clear();
            self.constructed = false;
            return Err(e);
        }
        Ok(!self.point_ids.is_empty() || !self.line_ids.is_empty())
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let (points, lines) =
            schematic.remove_segment_elements(self.segment, &self.point_ids, &self.line_ids)?;
        for point in points {
            project.detached_mut().put_net_point(point);
        }
        for line in lines {
            project.detached_mut().put_net_line(line);
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (points, lines) = take_detached_elements(project, &self.point_ids, &self.line_ids)?;
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        if let Err(e) =
            schematic.add_segment_elements(circuit, self.segment, points.clone(), lines.clone())
        {
            for point in points {
                project.detached_mut().put_net_point(point);
            }
            for line in lines {
                project.detached_mut().put_net_line(line);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Bulk-unregister a batch of net points and net lines from a live segment,
/// keeping them detached for the remainder of the transaction
pub struct NetSegmentRemoveElements {
    schematic: Uuid,
    segment: Uuid,
    point_ids: Vec<Uuid>,
    line_ids: Vec<Uuid>,
}

impl NetSegmentRemoveElements {
    pub fn new(schematic: Uuid, segment: Uuid) -> Self {
        Self {
            schematic,
            segment,
            point_ids: Vec::new(),
            line_ids: Vec::new(),
        }
    }

    pub fn remove_net_point(&mut self, point: Uuid) {
        self.point_ids.push(point);
    }

    pub fn remove_net_line(&mut self, line: Uuid) {
        self.line_ids.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.point_ids.is_empty() && self.line_ids.is_empty()
    }
}

impl UndoCommand for NetSegmentRemoveElements {
    fn text(&self) -> &str {
        "Remove net segment elements"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(!self.point_ids.is_empty() || !self.line_ids.is_empty())
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (points, lines) = take_detached_elements(project, &self.point_ids, &self.line_ids)?;
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        if let Err(e) =
            schematic.add_segment_elements(circuit, self.segment, points.clone(), lines.clone())
        {
            for point in points {
                project.detached_mut().put_net_point(point);
            }
            for line in lines {
                project.detached_mut().put_net_line(line);
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let (points, lines) =
            schematic.remove_segment_elements(self.segment, &self.point_ids, &self.line_ids)?;
        for point in points {
            project.detached_mut().put_net_point(point);
        }
        for line in lines {
            project.detached_mut().put_net_line(line);
        }
        Ok(())
    }
}

/// Take a batch of detached points and lines from the store; on a missing
/// entity everything already taken is put back, so a failed call changes
/// nothing
fn take_detached_elements(
    project: &mut Project,
    point_ids: &[Uuid],
    line_ids: &[Uuid],
) -> Result<(Vec<NetPoint>, Vec<NetLine>), CommandError> {
    let mut points = Vec::new();
    let mut lines = Vec::new();
    let mut missing = None;
    for &uuid in point_ids {
        match project.detached_mut().take_net_point(uuid) {
            Some(point) => points.push(point),
            None => {
                missing = Some(uuid);
                break;
            }
        }
    }
    if missing.is_none() {
        for &uuid in line_ids {
            match project.detached_mut().take_net_line(uuid) {
                Some(line) => lines.push(line),
                None => {
                    missing = Some(uuid);
                    break;
                }
            }
        }
    }
    if let Some(uuid) = missing {
        for point in points {
            project.detached_mut().put_net_point(point);
        }
        for line in lines {
            project.detached_mut().put_net_line(line);
        }
        return Err(CommandError::NotDetached(uuid));
    }
    Ok((points, lines))
}

// ============== Net Points ==============

/// Edit a net point: move it, or change its pin anchoring.
///
/// The pin anchoring of a point can only change while no lines are registered
/// at it; composites detach and re-add the lines around this command.
pub struct NetPointEdit {
    schematic: Uuid,
    segment: Uuid,
    point: Uuid,
    new_position: Option<Point>,
    new_pin: Option<Option<PinRef>>,
    old_position: Option<Point>,
    old_pin: Option<Option<PinRef>>,
    executed: bool,
}

impl NetPointEdit {
    pub fn new(schematic: Uuid, segment: Uuid, point: Uuid) -> Self {
        Self {
            schematic,
            segment,
            point,
            new_position: None,
            new_pin: None,
            old_position: None,
            old_pin: None,
            executed: false,
        }
    }

    pub fn set_position(&mut self, position: Point) {
        debug_assert!(!self.executed);
        self.new_position = Some(position);
    }

    /// Attach to a pin, or detach with `None`
    pub fn set_pin_to_attach(&mut self, pin: Option<PinRef>) {
        debug_assert!(!self.executed);
        self.new_pin = Some(pin);
    }

    fn current(&self, project: &Project) -> Option<(Option<PinRef>, Point)> {
        let point = project
            .schematic(self.schematic)?
            .net_segment(self.segment)?
            .point(self.point)?;
        Some((point.pin(), point.position()))
    }

    fn current_detached(&self, project: &mut Project) -> Option<(Option<PinRef>, Point)> {
        let point = project
            .detached_mut()
            .net_segment_mut(self.segment)?
            .point(self.point)?;
        Some((point.pin(), point.position()))
    }

    fn apply(
        &self,
        project: &mut Project,
        pin: Option<Option<PinRef>>,
        position: Option<Point>,
    ) -> Result<(), CommandError> {
        let live = project
            .schematic(self.schematic)
            .is_some_and(|s| s.net_segment(self.segment).is_some());
        if live {
            let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
            if let Some(pin) = pin {
                schematic.set_net_point_pin(circuit, self.segment, self.point, pin)?;
            }
            if let Some(position) = position {
                schematic.set_net_point_position(self.segment, self.point, position)?;
            }
        } else {
            let point = project
                .detached_mut()
                .net_segment_mut(self.segment)
                .ok_or(CommandError::NotDetached(self.segment))?
                .point_mut(self.point)
                .ok_or(SchematicError::NetPointNotFound(self.point))?;
            if let Some(pin) = pin {
                point.set_pin(pin);
            }
            if let Some(position) = position {
                point.set_position(position);
            }
        }
        Ok(())
    }
}

impl UndoCommand for NetPointEdit {
    fn text(&self) -> &str {
        "Edit net point"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.executed = true;
        let (pin, position) = self
            .current(project)
            .or_else(|| self.current_detached(project))
            .ok_or(SchematicError::NetPointNotFound(self.point))?;
        self.old_pin = Some(pin);
        self.old_position = Some(position);
        let modified = self.new_pin.is_some_and(|p| p != pin)
            || self.new_position.is_some_and(|p| p != position);
        if !modified {
            return Ok(false);
        }
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        // restoring the pin may snap the position back to the pin; restore
        // the recorded position afterwards so a detached point stays frozen
        self.apply(project, self.old_pin, self.old_position)
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.apply(project, self.new_pin, self.new_position)
    }
}

// ============== Symbols ==============

/// Move/rotate a symbol, dragging anchored net points along
pub struct SymbolEdit {
    schematic: Uuid,
    symbol: Uuid,
    new_position: Option<Point>,
    new_rotation: Option<Angle>,
    old_position: Option<Point>,
    old_rotation: Option<Angle>,
    executed: bool,
}

impl SymbolEdit {
    pub fn new(schematic: Uuid, symbol: Uuid) -> Self {
        Self {
            schematic,
            symbol,
            new_position: None,
            new_rotation: None,
            old_position: None,
            old_rotation: None,
            executed: false,
        }
    }

    pub fn set_position(&mut self, position: Point) {
        debug_assert!(!self.executed);
        self.new_position = Some(position);
    }

    pub fn set_rotation(&mut self, rotation: Angle) {
        debug_assert!(!self.executed);
        self.new_rotation = Some(rotation);
    }

    fn apply(
        &self,
        project: &mut Project,
        position: Option<Point>,
        rotation: Option<Angle>,
    ) -> Result<(), CommandError> {
        let schematic = project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let symbol = schematic
            .symbol(self.symbol)
            .ok_or(SchematicError::SymbolNotFound(self.symbol))?;
        let position = position.unwrap_or(symbol.position());
        let rotation = rotation.unwrap_or(symbol.rotation());
        schematic.set_symbol_transform(self.symbol, position, rotation)?;
        Ok(())
    }
}

impl UndoCommand for SymbolEdit {
    fn text(&self) -> &str {
        "Edit symbol"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.executed = true;
        let symbol = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?
            .symbol(self.symbol)
            .ok_or(SchematicError::SymbolNotFound(self.symbol))?;
        self.old_position = Some(symbol.position());
        self.old_rotation = Some(symbol.rotation());
        let modified = self.new_position.is_some_and(|p| p != symbol.position())
            || self.new_rotation.is_some_and(|r| r != symbol.rotation());
        if !modified {
            return Ok(false);
        }
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.apply(project, self.old_position, self.old_rotation)
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.apply(project, self.new_position, self.new_rotation)
    }
}

/// Remove a symbol from its sheet (all pins must be free)
pub struct SymbolRemove {
    schematic: Uuid,
    symbol: Uuid,
    held: Option<crate::schematic::Symbol>,
}

impl SymbolRemove {
    pub fn new(schematic: Uuid, symbol: Uuid) -> Self {
        Self {
            schematic,
            symbol,
            held: None,
        }
    }
}

impl UndoCommand for SymbolRemove {
    fn text(&self) -> &str {
        "Remove symbol"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let symbol = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.symbol))?;
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        if let Err(e) = schematic.add_symbol(circuit, symbol.clone()) {
            self.held = Some(symbol);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (schematic, circuit) = schematic_and_circuit(project, self.schematic)?;
        let symbol = schematic.remove_symbol(circuit, self.symbol)?;
        self.held = Some(symbol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NetSignal;
    use crate::project::Project;
    use crate::schematic::Schematic;

    fn project_with_signal() -> (Project, Uuid, Uuid) {
        let mut project = Project::new("Test");
        let schematic = Schematic::new("Page 1");
        let sch_uuid = schematic.uuid;
        project.add_schematic(schematic).unwrap();
        let signal = NetSignal::new("N#1", false);
        let signal_uuid = signal.uuid;
        project.circuit.add_net_signal(signal).unwrap();
        (project, sch_uuid, signal_uuid)
    }

    #[test]
    fn test_segment_add_constructs_lazily() {
        let (mut project, sheet, signal) = project_with_signal();
        let mut cmd = NetSegmentAdd::new(sheet, signal);
        let segment = cmd.segment_uuid();
        // nothing exists before the first execution
        assert!(project.schematic(sheet).unwrap().net_segment(segment).is_none());
        assert!(!project.has_detached_items());

        assert!(cmd.perform_execute(&mut project).unwrap());
        assert!(project.schematic(sheet).unwrap().net_segment(segment).is_some());

        cmd.perform_undo(&mut project).unwrap();
        assert!(project.schematic(sheet).unwrap().net_segment(segment).is_none());
        assert!(project.has_detached_items());

        cmd.perform_redo(&mut project).unwrap();
        assert!(project.schematic(sheet).unwrap().net_segment(segment).is_some());
        assert!(!project.has_detached_items());
    }

    #[test]
    fn test_add_then_remove_elements_restores_prior_sets() {
        let (mut project, sheet, signal) = project_with_signal();
        let mut add_seg = NetSegmentAdd::new(sheet, signal);
        let segment = add_seg.segment_uuid();
        add_seg.perform_execute(&mut project).unwrap();

        let mut add = NetSegmentAddElements::new(sheet, segment);
        let a = add.add_net_point(Point::from_mm(0.0, 0.0));
        let b = add.add_net_point(Point::from_mm(5.0, 0.0));
        let line = add.add_net_line(a, b);
        assert!(add.perform_execute(&mut project).unwrap());
        {
            let seg = project.schematic(sheet).unwrap().net_segment(segment).unwrap();
            assert_eq!(seg.points().len(), 2);
            assert_eq!(seg.lines().len(), 1);
            assert_eq!(seg.point(a).unwrap().lines().len(), 1);
        }

        let mut remove = NetSegmentRemoveElements::new(sheet, segment);
        remove.remove_net_point(a);
        remove.remove_net_point(b);
        remove.remove_net_line(line);
        assert!(remove.perform_execute(&mut project).unwrap());
        assert!(project
            .schematic(sheet)
            .unwrap()
            .net_segment(segment)
            .unwrap()
            .is_empty());

        // the inverse pair restores the prior point/line set exactly
        remove.perform_undo(&mut project).unwrap();
        let seg = project.schematic(sheet).unwrap().net_segment(segment).unwrap();
        assert!(seg.point(a).is_some());
        assert!(seg.point(b).is_some());
        assert!(seg.line(line).is_some());
        assert!(seg.are_all_points_connected_together());

        add.perform_undo(&mut project).unwrap();
        assert!(project
            .schematic(sheet)
            .unwrap()
            .net_segment(segment)
            .unwrap()
            .is_empty());
        add.perform_redo(&mut project).unwrap();
        let seg = project.schematic(sheet).unwrap().net_segment(segment).unwrap();
        assert_eq!(seg.points().len(), 2);
    }

    #[test]
    fn test_segment_edit_is_noop_for_same_signal() {
        let (mut project, sheet, signal) = project_with_signal();
        let mut add_seg = NetSegmentAdd::new(sheet, signal);
        let segment = add_seg.segment_uuid();
        add_seg.perform_execute(&mut project).unwrap();

        let mut edit = NetSegmentEdit::new(sheet, segment);
        edit.set_net_signal(signal);
        assert!(!edit.perform_execute(&mut project).unwrap());
    }

    #[test]
    fn test_label_add_remove_roundtrip() {
        let (mut project, sheet, signal) = project_with_signal();
        let mut add_seg = NetSegmentAdd::new(sheet, signal);
        let segment = add_seg.segment_uuid();
        add_seg.perform_execute(&mut project).unwrap();

        let mut add = NetLabelAdd::new(sheet, segment, Point::from_mm(1.0, 1.0));
        let label = add.label_uuid();
        add.perform_execute(&mut project).unwrap();
        assert!(project
            .schematic(sheet)
            .unwrap()
            .net_segment(segment)
            .unwrap()
            .label(label)
            .is_some());

        let mut remove = NetLabelRemove::new(sheet, segment, label);
        remove.perform_execute(&mut project).unwrap();
        assert!(project
            .schematic(sheet)
            .unwrap()
            .net_segment(segment)
            .unwrap()
            .labels()
            .is_empty());
        remove.perform_undo(&mut project).unwrap();
        assert!(project
            .schematic(sheet)
            .unwrap()
            .net_segment(segment)
            .unwrap()
            .label(label)
            .is_some());

        add.perform_undo(&mut project).unwrap();
        assert!(project
            .schematic(sheet)
            .unwrap()
            .net_segment(segment)
            .unwrap()
            .labels()
            .is_empty());
    }
}
