//! Reassign a net segment to another net signal

use std::collections::BTreeSet;

use sch_core::circuit::CircuitError;
use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{NetSegmentAdd, NetSegmentEdit, NetSegmentRemove};
use sch_core::project::Project;
use sch_core::schematic::SchematicError;
use uuid::Uuid;

use crate::composite::{exec, rebind_component_signal, resolve_pin, CombineNetSignals};

/// Move one net segment to `new_signal`.
///
/// When the segment is the only one of its current signal this degenerates
/// into combining the two signals, which is cheaper and keeps the segment's
/// identity. Otherwise the segment is removed, rebound and re-added, and
/// every component signal reachable through its attached pins is rebound as
/// well, disconnecting the board traces at the affected pads.
pub struct ChangeNetSignalOfSegment {
    schematic: Uuid,
    segment: Uuid,
    new_signal: Uuid,
    group: CommandGroup,
}

impl ChangeNetSignalOfSegment {
    pub fn new(schematic: Uuid, segment: Uuid, new_signal: Uuid) -> Self {
        Self {
            schematic,
            segment,
            new_signal,
            group: CommandGroup::new("Change net signal of net segment"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let segment = sch
            .net_segment(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?;
        let old_signal = segment.net_signal();
        if old_signal == self.new_signal {
            return Ok(false);
        }
        let segment_count = project
            .circuit
            .net_signal(old_signal)
            .ok_or(CircuitError::NetSignalNotFound(old_signal))?
            .schematic_segments()
            .len();

        if segment_count == 1 {
            // the segment is the only one of its signal
            exec(
                &mut self.group,
                project,
                CombineNetSignals::new(old_signal, self.new_signal),
            )?;
            return Ok(true);
        }

        // collect the component signals bound through attached pins
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let segment = sch
            .net_segment(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?;
        let pins: Vec<_> = segment.points().iter().filter_map(|p| p.pin()).collect();
        let mut component_signals: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
        for pin in pins {
            let (component, signal, _, _) = resolve_pin(project, self.schematic, pin)?;
            component_signals.insert((component, signal));
        }

        exec(
            &mut self.group,
            project,
            NetSegmentRemove::new(self.schematic, self.segment),
        )?;
        let mut edit = NetSegmentEdit::new(self.schematic, self.segment);
        edit.set_net_signal(self.new_signal);
        exec(&mut self.group, project, edit)?;
        for (component, signal) in component_signals {
            rebind_component_signal(
                &mut self.group,
                project,
                component,
                signal,
                Some(self.new_signal),
            )?;
        }
        exec(
            &mut self.group,
            project,
            NetSegmentAdd::readd(self.schematic, self.segment),
        )?;
        Ok(true)
    }
}

impl UndoCommand for ChangeNetSignalOfSegment {
    fn text(&self) -> &str {
        "Change net signal of net segment"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testbench::*;

    #[test]
    fn test_degenerates_to_combine_for_only_segment() {
        let (mut project, sheet) = project_with_sheet();
        let signal_a = add_signal(&mut project, "A");
        let signal_b = add_signal(&mut project, "B");
        let (seg, _, _) = add_chain(&mut project, sheet, signal_a, &[(0.0, 0.0), (5.0, 0.0)]);
        add_chain(&mut project, sheet, signal_b, &[(0.0, 10.0), (5.0, 10.0)]);

        let mut cmd = ChangeNetSignalOfSegment::new(sheet, seg, signal_b);
        assert!(cmd.perform_execute(&mut project).unwrap());

        // signal A was absorbed entirely
        assert!(project.circuit.net_signal(signal_a).is_none());
        assert_eq!(
            project.schematic(sheet).unwrap().net_segment(seg).unwrap().net_signal(),
            signal_b
        );

        cmd.perform_undo(&mut project).unwrap();
        assert!(project.circuit.net_signal(signal_a).is_some());
        assert_eq!(
            project.schematic(sheet).unwrap().net_segment(seg).unwrap().net_signal(),
            signal_a
        );
    }

    #[test]
    fn test_moves_single_segment_and_rebinds_pins() {
        let (mut project, sheet) = project_with_sheet();
        let signal_a = add_signal(&mut project, "A");
        let signal_b = add_signal(&mut project, "B");
        let (component, cmp_signal, _symbol, pin) = add_component_with_symbol(
            &mut project,
            sheet,
            "U1",
            None,
            (0.0, 0.0),
            (0.0, 0.0),
        );
        project
            .circuit
            .set_component_signal_net_signal(component, cmp_signal, Some(signal_a))
            .unwrap();
        let (seg1, _, _) =
            add_chain_on_pin(&mut project, sheet, signal_a, pin, &[(0.0, 0.0), (5.0, 0.0)]);
        // a second segment keeps signal A alive
        let (seg2, _, _) = add_chain(&mut project, sheet, signal_a, &[(0.0, 10.0), (5.0, 10.0)]);
        // board trace at the pad must be disconnected by the move
        let (board, _device, trace_point) =
            add_board_with_pad_trace(&mut project, component, cmp_signal, signal_a);

        let mut cmd = ChangeNetSignalOfSegment::new(sheet, seg1, signal_b);
        assert!(cmd.perform_execute(&mut project).unwrap());

        assert!(project.circuit.net_signal(signal_a).is_some());
        let sch = project.schematic(sheet).unwrap();
        assert_eq!(sch.net_segment(seg1).unwrap().net_signal(), signal_b);
        assert_eq!(sch.net_segment(seg2).unwrap().net_signal(), signal_a);
        assert_eq!(
            project
                .circuit
                .component_signal(component, cmp_signal)
                .unwrap()
                .net_signal(),
            Some(signal_b)
        );
        // the trace at the pad is gone
        assert!(project.board(board).unwrap().net_point(trace_point).is_none());

        cmd.perform_undo(&mut project).unwrap();
        assert_eq!(
            project.schematic(sheet).unwrap().net_segment(seg1).unwrap().net_signal(),
            signal_a
        );
        assert!(project.board(board).unwrap().net_point(trace_point).is_some());
    }
}
