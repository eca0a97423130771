//! Atomic commands on boards: trace net points/lines, vias, devices
//!
//! The schematic-side composites drive these when a net signal change has to
//! cascade into the board graph. Trace elements carry cached per-signal state
//! that may only change while they are detached, so the combine commands
//! remove them, edit them in the detached store, and re-add them.

use uuid::Uuid;

use crate::board::{BoardNetLine, BoardNetPoint, BoardVia, Device};
use crate::command::{CommandError, UndoCommand};
use crate::commands::board_and_circuit;
use crate::project::Project;

/// Register a trace net point with a board: a pre-built one, or one a
/// previous command of the transaction detached
pub struct BoardNetPointAdd {
    board: Uuid,
    point_uuid: Uuid,
    held: Option<BoardNetPoint>,
}

impl BoardNetPointAdd {
    pub fn new(board: Uuid, point: BoardNetPoint) -> Self {
        Self {
            board,
            point_uuid: point.uuid,
            held: Some(point),
        }
    }

    /// Re-add a point currently held in the detached store
    pub fn readd(board: Uuid, point: Uuid) -> Self {
        Self {
            board,
            point_uuid: point,
            held: None,
        }
    }

    pub fn point_uuid(&self) -> Uuid {
        self.point_uuid
    }
}

impl UndoCommand for BoardNetPointAdd {
    fn text(&self) -> &str {
        "Add board net point"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (board, circuit) = board_and_circuit(project, self.board)?;
        let point = board.remove_net_point(circuit, self.point_uuid)?;
        project.detached_mut().put_board_net_point(point);
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let point = match self.held.take() {
            Some(point) => point,
            None => project
                .detached_mut()
                .take_board_net_point(self.point_uuid)
                .ok_or(CommandError::NotDetached(self.point_uuid))?,
        };
        let (board, circuit) = board_and_circuit(project, self.board)?;
        if let Err(e) = board.add_net_point(circuit, point.clone()) {
            project.detached_mut().put_board_net_point(point);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Unregister a trace net point, keeping it detached
pub struct BoardNetPointRemove {
    board: Uuid,
    point: Uuid,
}

impl BoardNetPointRemove {
    pub fn new(board: Uuid, point: Uuid) -> Self {
        Self { board, point }
    }
}

impl UndoCommand for BoardNetPointRemove {
    fn text(&self) -> &str {
        "Remove board net point"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let point = project
            .detached_mut()
            .take_board_net_point(self.point)
            .ok_or(CommandError::NotDetached(self.point))?;
        let (board, circuit) = board_and_circuit(project, self.board)?;
        if let Err(e) = board.add_net_point(circuit, point.clone()) {
            project.detached_mut().put_board_net_point(point);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (board, circuit) = board_and_circuit(project, self.board)?;
        let point = board.remove_net_point(circuit, self.point)?;
        project.detached_mut().put_board_net_point(point);
        Ok(())
    }
}

/// Rebind a detached trace net point to another net signal
pub struct BoardNetPointEdit {
    point: Uuid,
    new_signal: Option<Uuid>,
    old_signal: Option<Uuid>,
    executed: bool,
}

impl BoardNetPointEdit {
    pub fn new(point: Uuid) -> Self {
        Self {
            point,
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
        let point = project
            .detached_mut()
            .board_net_point_mut(self.point)
            .ok_or(CommandError::NotDetached(self.point))?;
        let old = point.net_signal();
        point.set_net_signal_id(net_signal);
        Ok(old)
    }
}

impl UndoCommand for BoardNetPointEdit {
    fn text(&self) -> &str {
        "Edit board net point"
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

/// Register a trace line with a board
pub struct BoardNetLineAdd {
    board: Uuid,
    line_uuid: Uuid,
    held: Option<BoardNetLine>,
}

impl BoardNetLineAdd {
    pub fn new(board: Uuid, line: BoardNetLine) -> Self {
        Self {
            board,
            line_uuid: line.uuid,
            held: Some(line),
        }
    }

    /// Re-add a line currently held in the detached store
    pub fn readd(board: Uuid, line: Uuid) -> Self {
        Self {
            board,
            line_uuid: line,
            held: None,
        }
    }
}

impl UndoCommand for BoardNetLineAdd {
    fn text(&self) -> &str {
        "Add board net line"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let board = project
            .board_mut(self.board)
            .ok_or(CommandError::BoardNotFound(self.board))?;
        let line = board.remove_net_line(self.line_uuid)?;
        project.detached_mut().put_board_net_line(line);
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let line = match self.held.take() {
            Some(line) => line,
            None => project
                .detached_mut()
                .take_board_net_line(self.line_uuid)
                .ok_or(CommandError::NotDetached(self.line_uuid))?,
        };
        let board = project
            .board_mut(self.board)
            .ok_or(CommandError::BoardNotFound(self.board))?;
        if let Err(e) = board.add_net_line(line.clone()) {
            project.detached_mut().put_board_net_line(line);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Unregister a trace line, keeping it detached
pub struct BoardNetLineRemove {
    board: Uuid,
    line: Uuid,
}

impl BoardNetLineRemove {
    pub fn new(board: Uuid, line: Uuid) -> Self {
        Self { board, line }
    }
}

impl UndoCommand for BoardNetLineRemove {
    fn text(&self) -> &str {
        "Remove board net line"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let line = project
            .detached_mut()
            .take_board_net_line(self.line)
            .ok_or(CommandError::NotDetached(self.line))?;
        let board = project
            .board_mut(self.board)
            .ok_or(CommandError::BoardNotFound(self.board))?;
        if let Err(e) = board.add_net_line(line.clone()) {
            project.detached_mut().put_board_net_line(line);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let board = project
            .board_mut(self.board)
            .ok_or(CommandError::BoardNotFound(self.board))?;
        let line = board.remove_net_line(self.line)?;
        project.detached_mut().put_board_net_line(line);
        Ok(())
    }
}

/// Register a via with a board
pub struct BoardViaAdd {
    board: Uuid,
    via_uuid: Uuid,
    held: Option<BoardVia>,
}

impl BoardViaAdd {
    pub fn new(board: Uuid, via: BoardVia) -> Self {
        Self {
            board,
            via_uuid: via.uuid,
            held: Some(via),
        }
    }

    /// Re-add a via currently held in the detached store
    pub fn readd(board: Uuid, via: Uuid) -> Self {
        Self {
            board,
            via_uuid: via,
            held: None,
        }
    }
}

impl UndoCommand for BoardViaAdd {
    fn text(&self) -> &str {
        "Add via"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (board, circuit) = board_and_circuit(project, self.board)?;
        let via = board.remove_via(circuit, self.via_uuid)?;
        project.detached_mut().put_board_via(via);
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let via = match self.held.take() {
            Some(via) => via,
            None => project
                .detached_mut()
                .take_board_via(self.via_uuid)
                .ok_or(CommandError::NotDetached(self.via_uuid))?,
        };
        let (board, circuit) = board_and_circuit(project, self.board)?;
        if let Err(e) = board.add_via(circuit, via.clone()) {
            project.detached_mut().put_board_via(via);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Unregister a via, keeping it detached
pub struct BoardViaRemove {
    board: Uuid,
    via: Uuid,
}

impl BoardViaRemove {
    pub fn new(board: Uuid, via: Uuid) -> Self {
        Self { board, via }
    }
}

impl UndoCommand for BoardViaRemove {
    fn text(&self) -> &str {
        "Remove via"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let via = project
            .detached_mut()
            .take_board_via(self.via)
            .ok_or(CommandError::NotDetached(self.via))?;
        let (board, circuit) = board_and_circuit(project, self.board)?;
        if let Err(e) = board.add_via(circuit, via.clone()) {
            project.detached_mut().put_board_via(via);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let (board, circuit) = board_and_circuit(project, self.board)?;
        let via = board.remove_via(circuit, self.via)?;
        project.detached_mut().put_board_via(via);
        Ok(())
    }
}

/// Rebind a detached via to another net signal
pub struct BoardViaEdit {
    via: Uuid,
    new_signal: Option<Uuid>,
    old_signal: Option<Uuid>,
    executed: bool,
}

impl BoardViaEdit {
    pub fn new(via: Uuid) -> Self {
        Self {
            via,
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
        let via = project
            .detached_mut()
            .board_via_mut(self.via)
            .ok_or(CommandError::NotDetached(self.via))?;
        let old = via.net_signal();
        via.set_net_signal_id(net_signal);
        Ok(old)
    }
}

impl UndoCommand for BoardViaEdit {
    fn text(&self) -> &str {
        "Edit via"
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

/// Remove a device from a board (all pads must be free)
pub struct DeviceRemove {
    board: Uuid,
    device: Uuid,
    held: Option<Device>,
}

impl DeviceRemove {
    pub fn new(board: Uuid, device: Uuid) -> Self {
        Self {
            board,
            device,
            held: None,
        }
    }
}

impl UndoCommand for DeviceRemove {
    fn text(&self) -> &str {
        "Remove device"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let device = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.device))?;
        let (board, circuit) = board_and_circuit(project, self.board)?;
        if let Err(e) = board.add_device(circuit, device.clone()) {
            self.held = Some(device);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let board = project
            .board_mut(self.board)
            .ok_or(CommandError::BoardNotFound(self.board))?;
        let device = board.remove_device(self.device)?;
        self.held = Some(device);
        Ok(())
    }
}
