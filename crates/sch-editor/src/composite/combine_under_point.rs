//! Interactive "merge junction": combine everything coincident with a net
//! point into that point

use std::collections::BTreeSet;

use sch_core::circuit::CircuitError;
use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{
    ComponentSignalSetNetSignal, NetPointEdit, NetSegmentAddElements, NetSegmentRemoveElements,
    NetSignalEdit,
};
use sch_core::project::Project;
use sch_core::schematic::SchematicError;
use uuid::Uuid;

use crate::composite::{exec, resolve_pin, CombineNetPoints, CombineNetSignals, RemoveUnusedNetSignals};

/// Combine all net points, net lines and symbol pins that are geometrically
/// coincident with one net point.
///
/// The resulting net name follows forced-name precedence: with no forced
/// name in sight the current name is kept, exactly one forced name is
/// adopted, and more than one distinct forced name is an error that needs
/// user disambiguation. All coincident net signals are combined into the
/// resulting one, coincident points are merged into this point, a single
/// not-yet-attached pin is attached, and lines running through the position
/// are split so they terminate here. Unused signals are pruned at the end.
pub struct CombineAllUnderNetPoint {
    schematic: Uuid,
    segment: Uuid,
    point: Uuid,
    group: CommandGroup,
}

impl CombineAllUnderNetPoint {
    pub fn new(schematic: Uuid, segment: Uuid, point: Uuid) -> Self {
        Self {
            schematic,
            segment,
            point,
            group: CommandGroup::new("Combine schematic items"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let pos = sch
            .net_segment(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
            .point(self.point)
            .ok_or(SchematicError::NetPointNotFound(self.point))?
            .position();
        let current_signal = sch
            .net_segment(self.segment)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
            .net_signal();

        // gather everything under the cursor
        let points_under = sch.net_points_at_pos(pos);
        let lines_under = sch.net_lines_at_pos(pos);
        let pins_under = sch.pins_at_pos(pos);

        let mut signals_under: Vec<Uuid> = Vec::new();
        for &(segment, _) in points_under.iter().chain(lines_under.iter()) {
            let signal = sch
                .net_segment(segment)
                .ok_or(SchematicError::NetSegmentNotFound(segment))?
                .net_signal();
            if !signals_under.contains(&signal) {
                signals_under.push(signal);
            }
        }
        let mut forced_names: BTreeSet<String> = BTreeSet::new();
        let mut pin_info = Vec::new();
        for &pin in &pins_under {
            let (component, signal, net, forced) = resolve_pin(project, self.schematic, pin)?;
            if let Some(net) = net
                && !signals_under.contains(&net)
            {
                signals_under.push(net);
            }
            if let Some(name) = forced {
                forced_names.insert(name);
            }
            pin_info.push((pin, component, signal, net));
        }
        for &signal in &signals_under {
            let signal = project
                .circuit
                .net_signal(signal)
                .ok_or(CircuitError::NetSignalNotFound(signal))?;
            if signal.is_name_forced() {
                forced_names.insert(signal.name().to_string());
            }
        }

        // forced-name precedence
        let resulting_name = match forced_names.len() {
            0 => project
                .circuit
                .net_signal(current_signal)
                .ok_or(CircuitError::NetSignalNotFound(current_signal))?
                .name()
                .to_string(),
            1 => forced_names
                .first()
                .cloned()
                .unwrap_or_default(),
            _ => {
                return Err(CommandError::user(
                    "There are multiple different nets with forced names at this position.",
                ));
            }
        };
        let name_is_forced = !forced_names.is_empty();

        // determine the resulting net signal
        let resulting_signal = match project.circuit.net_signal_by_name(&resulting_name) {
            Some(signal) => signal.uuid,
            None => {
                // rename the current net signal
                let mut edit = NetSignalEdit::new(current_signal);
                edit.set_name(resulting_name.clone(), name_is_forced);
                exec(&mut self.group, project, edit)?;
                current_signal
            }
        };

        // combine all net signals together
        for signal in signals_under {
            if signal != resulting_signal {
                exec(
                    &mut self.group,
                    project,
                    CombineNetSignals::new(signal, resulting_signal),
                )?;
            }
        }

        // combine all coincident net points into this one. Combining may
        // re-create points of a removed segment, so re-query each round.
        loop {
            let sch = project
                .schematic(self.schematic)
                .ok_or(CommandError::SchematicNotFound(self.schematic))?;
            let candidate = sch
                .net_points_at_pos(pos)
                .into_iter()
                .find(|&(_, point)| point != self.point);
            let Some(candidate) = candidate else {
                break;
            };
            exec(
                &mut self.group,
                project,
                CombineNetPoints::new(self.schematic, candidate, (self.segment, self.point)),
            )?;
        }

        // attach a single coincident pin
        if pin_info.len() == 1 {
            let (pin, component, signal, net) = pin_info[0];
            let our_pin = project
                .schematic(self.schematic)
                .ok_or(CommandError::SchematicNotFound(self.schematic))?
                .net_segment(self.segment)
                .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
                .point(self.point)
                .ok_or(SchematicError::NetPointNotFound(self.point))?
                .pin();
            if our_pin != Some(pin) {
                if our_pin.is_some() {
                    return Err(CommandError::user("Sorry, not yet implemented..."));
                }
                if net != Some(resulting_signal) {
                    exec(
                        &mut self.group,
                        project,
                        ComponentSignalSetNetSignal::new(component, signal, Some(resulting_signal)),
                    )?;
                }
                // the pin binding can only change while no lines terminate at
                // the point, so detach them and re-add them afterwards
                let lines: Vec<Uuid> = project
                    .schematic(self.schematic)
                    .ok_or(CommandError::SchematicNotFound(self.schematic))?
                    .net_segment(self.segment)
                    .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
                    .point(self.point)
                    .ok_or(SchematicError::NetPointNotFound(self.point))?
                    .lines()
                    .iter()
                    .copied()
                    .collect();
                for &line in &lines {
                    let mut remove = NetSegmentRemoveElements::new(self.schematic, self.segment);
                    remove.remove_net_line(line);
                    exec(&mut self.group, project, remove)?;
                }
                let mut edit = NetPointEdit::new(self.schematic, self.segment, self.point);
                edit.set_pin_to_attach(Some(pin));
                exec(&mut self.group, project, edit)?;
                for &line in &lines {
                    let mut add = NetSegmentAddElements::new(self.schematic, self.segment);
                    add.readd_net_line(line);
                    exec(&mut self.group, project, add)?;
                }
            }
        } else if pin_info.len() > 1 {
            return Err(CommandError::user("Sorry, not yet implemented..."));
        }

        // split lines running through the point so they terminate here.
        // Splitting can merge segments, so re-query each round.
        loop {
            let sch = project
                .schematic(self.schematic)
                .ok_or(CommandError::SchematicNotFound(self.schematic))?;
            let pos_now = sch
                .net_segment(self.segment)
                .ok_or(SchematicError::NetSegmentNotFound(self.segment))?
                .point(self.point)
                .ok_or(SchematicError::NetPointNotFound(self.point))?
                .position();
            let mut crossing = None;
            for (segment, line) in sch.net_lines_at_pos(pos_now) {
                let l = sch
                    .net_segment(segment)
                    .and_then(|s| s.line(line))
                    .ok_or(SchematicError::NetLineNotFound(line))?;
                if l.start() != self.point && l.end() != self.point {
                    crossing = Some((segment, line, l.start(), l.end()));
                    break;
                }
            }
            let Some((segment, line, start, end)) = crossing else {
                break;
            };
            if segment == self.segment {
                let mut add = NetSegmentAddElements::new(self.schematic, segment);
                add.add_net_line(start, self.point);
                add.add_net_line(self.point, end);
                exec(&mut self.group, project, add)?;
                let mut remove = NetSegmentRemoveElements::new(self.schematic, segment);
                remove.remove_net_line(line);
                exec(&mut self.group, project, remove)?;
            } else {
                // the line belongs to another segment of the same signal:
                // split it there, then merge the split point into this one
                let mut add = NetSegmentAddElements::new(self.schematic, segment);
                let split_point = add.add_net_point(pos_now);
                add.add_net_line(start, split_point);
                add.add_net_line(split_point, end);
                exec(&mut self.group, project, add)?;
                let mut remove = NetSegmentRemoveElements::new(self.schematic, segment);
                remove.remove_net_line(line);
                exec(&mut self.group, project, remove)?;
                exec(
                    &mut self.group,
                    project,
                    CombineNetPoints::new(
                        self.schematic,
                        (segment, split_point),
                        (self.segment, self.point),
                    ),
                )?;
            }
        }

        if self.group.child_count() > 0 {
            exec(&mut self.group, project, RemoveUnusedNetSignals::new())?;
        }
        Ok(self.group.child_count() > 0)
    }
}

impl UndoCommand for CombineAllUnderNetPoint {
    fn text(&self) -> &str {
        "Combine schematic items"
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
    fn test_combines_signals_and_splits_crossing_line() {
        let (mut project, sheet) = project_with_sheet();
        let signal_a = add_signal(&mut project, "A");
        let signal_b = add_signal(&mut project, "B");
        // signal A: a horizontal line crossing (5,0)
        let (seg_a, _, _) = add_chain(&mut project, sheet, signal_a, &[(0.0, 0.0), (10.0, 0.0)]);
        // signal B: our point at (5,0) with a stub upwards
        let (seg_b, points_b, _) = add_chain(&mut project, sheet, signal_b, &[(5.0, 0.0), (5.0, 5.0)]);

        let mut cmd = CombineAllUnderNetPoint::new(sheet, seg_b, points_b[0]);
        assert!(cmd.perform_execute(&mut project).unwrap());

        // no forced names: the current signal (B) keeps its name, A is gone
        assert!(project.circuit.net_signal(signal_a).is_none());
        assert!(project.circuit.net_signal(signal_b).is_some());

        // one single connected segment remains, with the crossing line split
        let sch = project.schematic(sheet).unwrap();
        assert!(sch.net_segment(seg_a).is_none());
        let merged = sch.net_segment(seg_b).unwrap();
        assert_eq!(merged.net_signal(), signal_b);
        assert_eq!(merged.points().len(), 4);
        assert_eq!(merged.lines().len(), 3);
        assert!(merged.are_all_points_connected_together());
        // the junction now joins three lines and becomes visible
        assert!(merged.point(points_b[0]).unwrap().is_visible());

        // undo restores both signals and segments
        cmd.perform_undo(&mut project).unwrap();
        assert!(project.circuit.net_signal(signal_a).is_some());
        let sch = project.schematic(sheet).unwrap();
        assert_eq!(sch.net_segment(seg_a).unwrap().points().len(), 2);
        assert_eq!(sch.net_segment(seg_b).unwrap().points().len(), 2);
    }

    #[test]
    fn test_adopts_single_forced_name() {
        let (mut project, sheet) = project_with_sheet();
        let signal_a = add_signal(&mut project, "A");
        let signal_gnd = add_signal(&mut project, "SUPPLY");
        // a pin forcing "GND", connected to SUPPLY, with its net point
        let (component, cmp_signal, _symbol, pin) = add_component_with_symbol(
            &mut project,
            sheet,
            "U1",
            Some("GND"),
            (5.0, 0.0),
            (0.0, 0.0),
        );
        project
            .circuit
            .set_component_signal_net_signal(component, cmp_signal, Some(signal_gnd))
            .unwrap();
        add_chain_on_pin(&mut project, sheet, signal_gnd, pin, &[(5.0, 0.0), (5.0, 5.0)]);
        // our point on signal A at the same position
        let (seg_a, points_a, _) = add_chain(&mut project, sheet, signal_a, &[(5.0, 0.0), (10.0, 0.0)]);

        let mut cmd = CombineAllUnderNetPoint::new(sheet, seg_a, points_a[0]);
        cmd.perform_execute(&mut project).unwrap();

        // exactly one forced name: the resulting net adopts it
        let merged_signal = project
            .schematic(sheet)
            .unwrap()
            .net_segment(seg_a)
            .unwrap()
            .net_signal();
        assert_eq!(project.circuit.net_signal(merged_signal).unwrap().name(), "GND");
        assert!(project.circuit.net_signal(signal_a).is_none() || merged_signal == signal_a);
    }

    #[test]
    fn test_attaches_single_free_pin() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
        let (component, cmp_signal, _symbol, pin) = add_component_with_symbol(
            &mut project,
            sheet,
            "U1",
            None,
            (5.0, 0.0),
            (0.0, 0.0),
        );
        let (seg, points, lines) = add_chain(&mut project, sheet, signal, &[(5.0, 0.0), (5.0, 5.0)]);

        let mut cmd = CombineAllUnderNetPoint::new(sheet, seg, points[0]);
        assert!(cmd.perform_execute(&mut project).unwrap());

        let sch = project.schematic(sheet).unwrap();
        let point = sch.net_segment(seg).unwrap().point(points[0]).unwrap();
        assert_eq!(point.pin(), Some(pin));
        // the lines were detached and re-registered around the pin change
        assert_eq!(point.lines().len(), 1);
        assert!(sch.net_segment(seg).unwrap().line(lines[0]).is_some());
        assert_eq!(
            project
                .circuit
                .component_signal(component, cmp_signal)
                .unwrap()
                .net_signal(),
            Some(signal)
        );

        cmd.perform_undo(&mut project).unwrap();
        let sch = project.schematic(sheet).unwrap();
        let point = sch.net_segment(seg).unwrap().point(points[0]).unwrap();
        assert_eq!(point.pin(), None);
        assert_eq!(
            project
                .circuit
                .component_signal(component, cmp_signal)
                .unwrap()
                .net_signal(),
            None
        );
    }

    #[test]
    fn test_multiple_forced_names_fails_and_rolls_back() {
        let (mut project, sheet) = project_with_sheet();
        let signal_a = add_signal(&mut project, "SUP1");
        let signal_b = add_signal(&mut project, "SUP2");
        let (comp_a, sig_a, _, pin_a) = add_component_with_symbol(
            &mut project,
            sheet,
            "U1",
            Some("GND"),
            (5.0, 0.0),
            (0.0, 0.0),
        );
        project
            .circuit
            .set_component_signal_net_signal(comp_a, sig_a, Some(signal_a))
            .unwrap();
        add_chain_on_pin(&mut project, sheet, signal_a, pin_a, &[(5.0, 0.0), (5.0, 5.0)]);
        let (comp_b, sig_b, _, pin_b) = add_component_with_symbol(
            &mut project,
            sheet,
            "U2",
            Some("VCC"),
            (5.0, 0.0),
            (0.0, 0.0),
        );
        project
            .circuit
            .set_component_signal_net_signal(comp_b, sig_b, Some(signal_b))
            .unwrap();
        let (seg_b, points_b, _) =
            add_chain_on_pin(&mut project, sheet, signal_b, pin_b, &[(5.0, 0.0), (5.0, -5.0)]);

        let mut cmd = CombineAllUnderNetPoint::new(sheet, seg_b, points_b[0]);
        let err = cmd.perform_execute(&mut project).unwrap_err();
        assert!(err.is_user_error());

        // rollback left the document untouched
        assert!(project.circuit.net_signal(signal_a).is_some());
        assert!(project.circuit.net_signal(signal_b).is_some());
        assert_eq!(project.schematic(sheet).unwrap().net_segments().len(), 2);
    }
}
