//! Merge one net signal into another across all sheets and boards

use std::collections::BTreeSet;

use sch_core::circuit::CircuitError;
use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{
    BoardNetLineAdd, BoardNetLineRemove, BoardNetPointAdd, BoardNetPointEdit, BoardNetPointRemove,
    BoardViaAdd, BoardViaEdit, BoardViaRemove, ComponentSignalSetNetSignal, NetSegmentAdd,
    NetSegmentEdit, NetSegmentRemove, NetSignalRemove,
};
use sch_core::project::Project;
use uuid::Uuid;

use crate::composite::exec;

/// Merge `signal_to_remove` into `resulting_signal`.
///
/// Every element of the losing signal is unregistered (lines before points
/// before vias, since lines depend on points), rebound to the resulting
/// signal while detached, and re-registered in reverse dependency order.
/// Entities carry cached per-signal registration state, so a registered
/// element's net signal is never mutated in place. Finally the losing signal
/// itself is removed.
pub struct CombineNetSignals {
    signal_to_remove: Uuid,
    resulting_signal: Uuid,
    group: CommandGroup,
}

impl CombineNetSignals {
    pub fn new(signal_to_remove: Uuid, resulting_signal: Uuid) -> Self {
        Self {
            signal_to_remove,
            resulting_signal,
            group: CommandGroup::new("Combine net signals"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if self.signal_to_remove == self.resulting_signal {
            return Ok(false);
        }
        let signal = project
            .circuit
            .net_signal(self.signal_to_remove)
            .ok_or(CircuitError::NetSignalNotFound(self.signal_to_remove))?;
        let segments: Vec<(Uuid, Uuid)> = signal.schematic_segments().iter().copied().collect();
        let vias: Vec<(Uuid, Uuid)> = signal.board_vias().iter().copied().collect();
        let points: Vec<(Uuid, Uuid)> = signal.board_net_points().iter().copied().collect();
        let component_signals: Vec<(Uuid, Uuid)> =
            signal.component_signals().iter().copied().collect();
        let mut lines: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
        for &(board_uuid, point_uuid) in &points {
            let board = project
                .board(board_uuid)
                .ok_or(CommandError::BoardNotFound(board_uuid))?;
            if let Some(point) = board.net_point(point_uuid) {
                for &line in point.lines() {
                    lines.insert((board_uuid, line));
                }
            }
        }

        // unregister everything that carries the losing signal
        for &(schematic, segment) in &segments {
            exec(
                &mut self.group,
                project,
                NetSegmentRemove::new(schematic, segment),
            )?;
        }
        for &(board, line) in &lines {
            exec(&mut self.group, project, BoardNetLineRemove::new(board, line))?;
        }
        for &(board, point) in &points {
            exec(
                &mut self.group,
                project,
                BoardNetPointRemove::new(board, point),
            )?;
        }
        for &(board, via) in &vias {
            exec(&mut self.group, project, BoardViaRemove::new(board, via))?;
        }

        // rebind the component signal instances
        for &(component, signal) in &component_signals {
            exec(
                &mut self.group,
                project,
                ComponentSignalSetNetSignal::new(component, signal, Some(self.resulting_signal)),
            )?;
        }

        // re-register everything on the resulting signal
        for &(board, via) in &vias {
            let mut edit = BoardViaEdit::new(via);
            edit.set_net_signal(self.resulting_signal);
            exec(&mut self.group, project, edit)?;
            exec(&mut self.group, project, BoardViaAdd::readd(board, via))?;
        }
        for &(board, point) in &points {
            let mut edit = BoardNetPointEdit::new(point);
            edit.set_net_signal(self.resulting_signal);
            exec(&mut self.group, project, edit)?;
            exec(
                &mut self.group,
                project,
                BoardNetPointAdd::readd(board, point),
            )?;
        }
        for &(board, line) in &lines {
            exec(&mut self.group, project, BoardNetLineAdd::readd(board, line))?;
        }
        for &(schematic, segment) in &segments {
            let mut edit = NetSegmentEdit::new(schematic, segment);
            edit.set_net_signal(self.resulting_signal);
            exec(&mut self.group, project, edit)?;
            exec(
                &mut self.group,
                project,
                NetSegmentAdd::readd(schematic, segment),
            )?;
        }

        // the losing signal is now unused
        exec(
            &mut self.group,
            project,
            NetSignalRemove::new(self.signal_to_remove),
        )?;
        Ok(true)
    }
}

impl UndoCommand for CombineNetSignals {
    fn text(&self) -> &str {
        "Combine net signals"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        match self.run(project) {
            Ok(modified) => Ok(modified),
            Err(e) => {
                self.group.rollback(project)?;
                Err(e)
            }
        }
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.group.undo_children(project)
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.group.redo_children(project)
    }
}
