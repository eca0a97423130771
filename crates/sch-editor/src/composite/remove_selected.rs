//! Remove the current selection, splitting net segments where needed

use std::collections::{BTreeMap, BTreeSet};

use sch_core::circuit::CircuitError;
use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{
    BoardNetLineRemove, BoardNetPointRemove, ComponentInstanceRemove, ComponentSignalSetNetSignal,
    DeviceRemove, NetLabelRemove, NetPointEdit, NetSegmentAdd, NetSegmentAddElements,
    NetSegmentRemove, NetSignalAdd, SymbolRemove,
};
use sch_core::geometry::Point;
use sch_core::project::Project;
use sch_core::schematic::{NetPointFilter, PinRef, SchematicError};
use uuid::Uuid;

use crate::composite::{
    exec, rebind_component_signal, resolve_pin, ChangeNetSignalOfSegment, RemoveUnusedNetSignals,
};

#[derive(Debug, Default)]
struct SegmentItems {
    points: BTreeSet<Uuid>,
    lines: BTreeSet<Uuid>,
    labels: BTreeSet<Uuid>,
}

/// Remove all selected items of one sheet.
///
/// Per affected net segment one of three strategies applies: only labels
/// selected removes just the labels (re-signaling the segment when its last
/// label named the net), all lines selected removes the whole segment
/// (disconnecting component signals that lose their last anchored pin), and
/// a strict subset of lines splits the segment into the maximal connected
/// components of the remaining graph. Selected symbols are removed last,
/// cascading into component instances and board devices that lose their last
/// placed symbol. Unused net signals are pruned at the end.
pub struct RemoveSelectedItems {
    schematic: Uuid,
    group: CommandGroup,
}

impl RemoveSelectedItems {
    pub fn new(schematic: Uuid) -> Self {
        Self {
            schematic,
            group: CommandGroup::new("Remove schematic elements"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let mut query = sch.selection_query();
        query.add_selected_symbols();
        query.add_selected_net_lines();
        query.add_selected_net_labels();
        query.add_net_points_of_net_lines(NetPointFilter::AllConnectedLinesSelected);
        let symbols: Vec<Uuid> = query.symbols().iter().copied().collect();
        let sel_points: Vec<(Uuid, Uuid)> = query.net_points().iter().copied().collect();
        let sel_lines: Vec<(Uuid, Uuid)> = query.net_lines().iter().copied().collect();
        let sel_labels: Vec<(Uuid, Uuid)> = query.net_labels().iter().copied().collect();

        // these items are going away, drop the selection now
        project
            .schematic_mut(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?
            .clear_selection();

        let mut per_segment: BTreeMap<Uuid, SegmentItems> = BTreeMap::new();
        for (segment, point) in sel_points {
            per_segment.entry(segment).or_default().points.insert(point);
        }
        for (segment, line) in sel_lines {
            per_segment.entry(segment).or_default().lines.insert(line);
        }
        for (segment, label) in sel_labels {
            per_segment.entry(segment).or_default().labels.insert(label);
        }

        for (segment, items) in &per_segment {
            let total_lines = project
                .schematic(self.schematic)
                .ok_or(CommandError::SchematicNotFound(self.schematic))?
                .net_segment(*segment)
                .ok_or(SchematicError::NetSegmentNotFound(*segment))?
                .lines()
                .len();
            if items.lines.is_empty() {
                // only labels of this segment are selected
                if !items.points.is_empty() {
                    tracing::warn!(
                        segment = %segment,
                        "selection query returned net points without their lines"
                    );
                }
                for &label in &items.labels {
                    self.remove_net_label(project, *segment, label)?;
                }
            } else if items.lines.len() == total_lines {
                self.remove_net_segment(project, *segment)?;
            } else {
                self.split_net_segment(project, *segment, items)?;
            }
        }

        for symbol in symbols {
            self.remove_symbol(project, symbol)?;
        }

        if self.group.child_count() > 0 {
            exec(&mut self.group, project, RemoveUnusedNetSignals::new())?;
        }
        Ok(self.group.child_count() > 0)
    }

    /// Remove one label; when the segment's last label goes away and the
    /// net name came from the label, move the segment to a replacement
    /// signal (named by a remaining forced name, or auto-named)
    fn remove_net_label(
        &mut self,
        project: &mut Project,
        segment: Uuid,
        label: Uuid,
    ) -> Result<(), CommandError> {
        exec(
            &mut self.group,
            project,
            NetLabelRemove::new(self.schematic, segment, label),
        )?;
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let seg = sch
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?;
        if !seg.labels().is_empty() {
            return Ok(());
        }
        let signal_uuid = seg.net_signal();
        let signal = project
            .circuit
            .net_signal(signal_uuid)
            .ok_or(CircuitError::NetSignalNotFound(signal_uuid))?;
        let signal_name = signal.name().to_string();
        let auto_named = signal.is_auto_named();
        let forced = sch.forced_net_names(&project.circuit, segment)?;

        if let Some(name) = forced.first() {
            if *name != signal_name {
                let target = match project.circuit.net_signal_by_name(name) {
                    Some(existing) => existing.uuid,
                    None => {
                        let add = NetSignalAdd::new_named(name.clone(), true);
                        let uuid = add.signal_uuid();
                        exec(&mut self.group, project, add)?;
                        uuid
                    }
                };
                exec(
                    &mut self.group,
                    project,
                    ChangeNetSignalOfSegment::new(self.schematic, segment, target),
                )?;
            }
        } else if !auto_named {
            // the name was purely label-derived
            let add = NetSignalAdd::new_auto();
            let target = add.signal_uuid();
            exec(&mut self.group, project, add)?;
            exec(
                &mut self.group,
                project,
                ChangeNetSignalOfSegment::new(self.schematic, segment, target),
            )?;
        }
        Ok(())
    }

    /// Remove a whole net segment and disconnect the component signals that
    /// lose their last anchored pin with it
    fn remove_net_segment(&mut self, project: &mut Project, segment: Uuid) -> Result<(), CommandError> {
        let seg = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?;
        let pins: Vec<PinRef> = seg.points().iter().filter_map(|p| p.pin()).collect();
        let mut to_disconnect: Vec<(Uuid, Uuid)> = Vec::new();
        for pin in pins {
            if let Some(signal) = self.signal_to_disconnect(project, pin)?
                && !to_disconnect.contains(&signal)
            {
                to_disconnect.push(signal);
            }
        }

        exec(
            &mut self.group,
            project,
            NetSegmentRemove::new(self.schematic, segment),
        )?;
        for (component, signal) in to_disconnect {
            rebind_component_signal(&mut self.group, project, component, signal, None)?;
        }
        Ok(())
    }

    /// A component signal has to be disconnected when the given pin is its
    /// last one with an anchored net point
    fn signal_to_disconnect(
        &self,
        project: &Project,
        pin: PinRef,
    ) -> Result<Option<(Uuid, Uuid)>, CommandError> {
        let (component, signal, _, _) = resolve_pin(project, self.schematic, pin)?;
        for schematic in project.schematics() {
            for symbol in schematic.symbols() {
                if symbol.component() != component {
                    continue;
                }
                for other in symbol.pins() {
                    if other.component_signal() != signal {
                        continue;
                    }
                    if (symbol.uuid, other.uuid) != (pin.symbol, pin.pin)
                        && other.net_point().is_some()
                    {
                        return Ok(None);
                    }
                }
            }
        }
        Ok(Some((component, signal)))
    }

    /// Remove the selected subset of a segment and re-materialize every
    /// maximal connected component of the remaining graph as a new segment
    /// on the same signal
    fn split_net_segment(
        &mut self,
        project: &mut Project,
        segment: Uuid,
        items: &SegmentItems,
    ) -> Result<(), CommandError> {
        let seg = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?
            .net_segment(segment)
            .ok_or(SchematicError::NetSegmentNotFound(segment))?;
        let signal = seg.net_signal();
        let all_points: BTreeSet<Uuid> = seg.points().iter().map(|p| p.uuid).collect();
        let all_lines: BTreeSet<Uuid> = seg.lines().iter().map(|l| l.uuid).collect();
        let remaining_points: BTreeSet<Uuid> =
            all_points.difference(&items.points).copied().collect();
        let remaining_lines: BTreeSet<Uuid> = all_lines.difference(&items.lines).copied().collect();
        let components = seg.connected_components(&remaining_points, &remaining_lines);
        let point_info: BTreeMap<Uuid, (Option<PinRef>, Point)> = seg
            .points()
            .iter()
            .map(|p| (p.uuid, (p.pin(), p.position())))
            .collect();
        let line_info: BTreeMap<Uuid, (Uuid, Uuid)> = seg
            .lines()
            .iter()
            .map(|l| (l.uuid, (l.start(), l.end())))
            .collect();

        // component signals losing their last anchored pin with the removal
        let mut to_disconnect: Vec<(Uuid, Uuid)> = Vec::new();
        for &point in &items.points {
            let Some((Some(pin), _)) = point_info.get(&point) else {
                continue;
            };
            if let Some(signal) = self.signal_to_disconnect(project, *pin)?
                && !to_disconnect.contains(&signal)
            {
                to_disconnect.push(signal);
            }
        }

        exec(
            &mut self.group,
            project,
            NetSegmentRemove::new(self.schematic, segment),
        )?;
        for (component, signal) in to_disconnect {
            rebind_component_signal(&mut self.group, project, component, signal, None)?;
        }

        for (component_points, component_lines) in components {
            let add_segment = NetSegmentAdd::new(self.schematic, signal);
            let new_segment = add_segment.segment_uuid();
            exec(&mut self.group, project, add_segment)?;

            let mut add_elements = NetSegmentAddElements::new(self.schematic, new_segment);
            let mut point_map: BTreeMap<Uuid, Uuid> = BTreeMap::new();
            for &point in &component_points {
                let (pin, position) = point_info
                    .get(&point)
                    .ok_or(SchematicError::NetPointNotFound(point))?;
                let new_point = match pin {
                    Some(pin) => add_elements.add_net_point_attached(*pin),
                    None => add_elements.add_net_point(*position),
                };
                point_map.insert(point, new_point);
            }
            for &line in &component_lines {
                let (start, end) = line_info
                    .get(&line)
                    .ok_or(SchematicError::NetLineNotFound(line))?;
                let start = *point_map
                    .get(start)
                    .ok_or(SchematicError::NetPointNotFound(*start))?;
                let end = *point_map
                    .get(end)
                    .ok_or(SchematicError::NetPointNotFound(*end))?;
                add_elements.add_net_line(start, end);
            }
            if !add_elements.is_empty() {
                exec(&mut self.group, project, add_elements)?;
            }
        }
        Ok(())
    }

    /// Remove a symbol: detach anchored net points from its pins, remove the
    /// symbol, and when this was the component's last placed symbol remove
    /// its board devices and the component instance itself
    fn remove_symbol(&mut self, project: &mut Project, symbol: Uuid) -> Result<(), CommandError> {
        let sym = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?
            .symbol(symbol)
            .ok_or(SchematicError::SymbolNotFound(symbol))?;
        let component = sym.component();
        let anchored: Vec<(Uuid, Uuid)> = sym.pins().iter().filter_map(|p| p.net_point()).collect();

        // a point's pin binding can only change while its segment is out of
        // the sheet
        for (segment, point) in anchored {
            exec(
                &mut self.group,
                project,
                NetSegmentRemove::new(self.schematic, segment),
            )?;
            let mut edit = NetPointEdit::new(self.schematic, segment, point);
            edit.set_pin_to_attach(None);
            exec(&mut self.group, project, edit)?;
            exec(
                &mut self.group,
                project,
                NetSegmentAdd::readd(self.schematic, segment),
            )?;
        }

        exec(
            &mut self.group,
            project,
            SymbolRemove::new(self.schematic, symbol),
        )?;

        let instance = project
            .circuit
            .component(component)
            .ok_or(CircuitError::ComponentNotFound(component))?;
        if instance.placed_symbol_count() > 0 {
            return Ok(());
        }

        // last placed symbol: the board devices and the component go as well
        let devices: Vec<(Uuid, Uuid)> = project
            .boards()
            .iter()
            .filter_map(|b| b.device_by_component(component).map(|d| (b.uuid, d.uuid)))
            .collect();
        for (board_uuid, device_uuid) in devices {
            let board = project
                .board(board_uuid)
                .ok_or(CommandError::BoardNotFound(board_uuid))?;
            let device = board
                .device(device_uuid)
                .ok_or(sch_core::board::BoardError::DeviceNotFound(device_uuid))?;
            let mut trace_points: BTreeSet<Uuid> = BTreeSet::new();
            let mut trace_lines: BTreeSet<Uuid> = BTreeSet::new();
            for pad in device.pads() {
                for &point in pad.net_points() {
                    trace_points.insert(point);
                    if let Some(p) = board.net_point(point) {
                        trace_lines.extend(p.lines().iter().copied());
                    }
                }
            }
            for line in trace_lines {
                exec(
                    &mut self.group,
                    project,
                    BoardNetLineRemove::new(board_uuid, line),
                )?;
            }
            for point in trace_points {
                exec(
                    &mut self.group,
                    project,
                    BoardNetPointRemove::new(board_uuid, point),
                )?;
            }
            exec(
                &mut self.group,
                project,
                DeviceRemove::new(board_uuid, device_uuid),
            )?;
        }

        let connected: Vec<Uuid> = project
            .circuit
            .component(component)
            .ok_or(CircuitError::ComponentNotFound(component))?
            .signals()
            .iter()
            .filter(|s| s.net_signal().is_some())
            .map(|s| s.uuid)
            .collect();
        for signal in connected {
            exec(
                &mut self.group,
                project,
                ComponentSignalSetNetSignal::new(component, signal, None),
            )?;
        }
        exec(
            &mut self.group,
            project,
            ComponentInstanceRemove::new(component),
        )?;
        Ok(())
    }
}

impl UndoCommand for RemoveSelectedItems {
    fn text(&self) -> &str {
        "Remove schematic elements"
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
    use sch_core::commands::NetLabelAdd;
    use sch_core::constants::DEFAULT_NETLINE_WIDTH;
    use sch_core::schematic::{NetLine, NetPoint, NetSegment};

    #[test]
    fn test_split_chain_into_two_components() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
        // chain A-B-C-D-E; selecting lines B-C and C-D removes C and leaves
        // the components {A,B} and {D,E}
        let (seg, points, lines) = add_chain(
            &mut project,
            sheet,
            signal,
            &[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (15.0, 0.0), (20.0, 0.0)],
        );
        {
            let sch = project.schematic_mut(sheet).unwrap();
            sch.set_net_line_selected(seg, lines[1], true).unwrap();
            sch.set_net_line_selected(seg, lines[2], true).unwrap();
        }

        let mut cmd = RemoveSelectedItems::new(sheet);
        assert!(cmd.perform_execute(&mut project).unwrap());

        let sch = project.schematic(sheet).unwrap();
        assert!(sch.net_segment(seg).is_none());
        assert_eq!(sch.net_segments().len(), 2);
        let mut sizes: Vec<usize> = sch
            .net_segments()
            .iter()
            .map(|s| s.points().len())
            .collect();
        sizes.sort();
        assert_eq!(sizes, vec![2, 2]);
        for segment in sch.net_segments() {
            assert_eq!(segment.net_signal(), signal);
            assert!(segment.are_all_points_connected_together());
            assert_eq!(segment.lines().len(), 1);
        }

        cmd.perform_undo(&mut project).unwrap();
        let sch = project.schematic(sheet).unwrap();
        assert_eq!(sch.net_segments().len(), 1);
        let restored = sch.net_segment(seg).unwrap();
        assert_eq!(restored.points().len(), 5);
        assert_eq!(restored.lines().len(), 4);
        assert!(restored.point(points[2]).is_some());
    }

    #[test]
    fn test_diamond_partition_matches_remaining_graph() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
        // diamond N-E-S-W with lines N-E, E-S, S-W, W-N
        let mut segment = NetSegment::new(signal);
        let seg_uuid = segment.uuid;
        let n = NetPoint::new(Point::from_mm(0.0, 2.0));
        let e = NetPoint::new(Point::from_mm(2.0, 0.0));
        let s = NetPoint::new(Point::from_mm(0.0, -2.0));
        let w = NetPoint::new(Point::from_mm(-2.0, 0.0));
        let (n_id, e_id, s_id, w_id) = (n.uuid, e.uuid, s.uuid, w.uuid);
        let ne = NetLine::new(n_id, e_id, DEFAULT_NETLINE_WIDTH);
        let es = NetLine::new(e_id, s_id, DEFAULT_NETLINE_WIDTH);
        let sw = NetLine::new(s_id, w_id, DEFAULT_NETLINE_WIDTH);
        let wn = NetLine::new(w_id, n_id, DEFAULT_NETLINE_WIDTH);
        let (ne_id, es_id) = (ne.uuid, es.uuid);
        segment
            .add_points_and_lines(vec![n, e, s, w], vec![ne, es, sw, wn])
            .unwrap();
        {
            let (sch, circuit) = project.schematic_and_circuit_mut(sheet).unwrap();
            sch.add_net_segment(circuit, segment).unwrap();
        }
        {
            let sch = project.schematic_mut(sheet).unwrap();
            sch.set_net_line_selected(seg_uuid, ne_id, true).unwrap();
            sch.set_net_line_selected(seg_uuid, es_id, true).unwrap();
        }

        let mut cmd = RemoveSelectedItems::new(sheet);
        assert!(cmd.perform_execute(&mut project).unwrap());

        // E lost both its lines and was removed with them; the remaining
        // graph {N,S,W} with S-W and W-N is one component
        let sch = project.schematic(sheet).unwrap();
        assert_eq!(sch.net_segments().len(), 1);
        let remaining = &sch.net_segments()[0];
        assert_eq!(remaining.points().len(), 3);
        assert_eq!(remaining.lines().len(), 2);
        assert!(remaining.are_all_points_connected_together());
    }

    #[test]
    fn test_remove_whole_segment_disconnects_pin_and_board() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
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
            .set_component_signal_net_signal(component, cmp_signal, Some(signal))
            .unwrap();
        let (seg, _, lines) =
            add_chain_on_pin(&mut project, sheet, signal, pin, &[(0.0, 0.0), (5.0, 0.0)]);
        let (board, _device, trace_point) =
            add_board_with_pad_trace(&mut project, component, cmp_signal, signal);
        project
            .schematic_mut(sheet)
            .unwrap()
            .set_net_line_selected(seg, lines[0], true)
            .unwrap();

        let mut cmd = RemoveSelectedItems::new(sheet);
        assert!(cmd.perform_execute(&mut project).unwrap());

        let sch = project.schematic(sheet).unwrap();
        assert!(sch.net_segment(seg).is_none());
        assert_eq!(
            project
                .circuit
                .component_signal(component, cmp_signal)
                .unwrap()
                .net_signal(),
            None
        );
        // board trace at the pad is gone, and the orphaned signal was pruned
        assert!(project.board(board).unwrap().net_point(trace_point).is_none());
        assert!(project.circuit.net_signal(signal).is_none());

        cmd.perform_undo(&mut project).unwrap();
        assert!(project.schematic(sheet).unwrap().net_segment(seg).is_some());
        assert!(project.board(board).unwrap().net_point(trace_point).is_some());
        assert_eq!(
            project
                .circuit
                .component_signal(component, cmp_signal)
                .unwrap()
                .net_signal(),
            Some(signal)
        );
    }

    #[test]
    fn test_label_removal_resignals_label_named_segment() {
        let (mut project, sheet) = project_with_sheet();
        // the signal name came from the label (user-named, not auto)
        let signal = add_signal(&mut project, "DATA");
        let (seg, _, _) = add_chain(&mut project, sheet, signal, &[(0.0, 0.0), (5.0, 0.0)]);
        let mut add_label = NetLabelAdd::new(sheet, seg, Point::from_mm(2.0, 1.0));
        let label_uuid = add_label.label_uuid();
        add_label.perform_execute(&mut project).unwrap();
        project
            .schematic_mut(sheet)
            .unwrap()
            .set_net_label_selected(seg, label_uuid, true)
            .unwrap();

        let mut cmd = RemoveSelectedItems::new(sheet);
        assert!(cmd.perform_execute(&mut project).unwrap());

        let sch = project.schematic(sheet).unwrap();
        let segment = sch.net_segment(seg).unwrap();
        assert!(segment.labels().is_empty());
        // the segment moved to a fresh auto-named signal; "DATA" is gone
        let new_signal = project.circuit.net_signal(segment.net_signal()).unwrap();
        assert!(new_signal.is_auto_named());
        assert!(project.circuit.net_signal_by_name("DATA").is_none());

        cmd.perform_undo(&mut project).unwrap();
        let sch = project.schematic(sheet).unwrap();
        let segment = sch.net_segment(seg).unwrap();
        assert_eq!(segment.labels().len(), 1);
        assert_eq!(
            project.circuit.net_signal(segment.net_signal()).unwrap().name(),
            "DATA"
        );
    }

    #[test]
    fn test_symbol_removal_detaches_points_and_removes_component() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
        let (component, cmp_signal, symbol, pin) = add_component_with_symbol(
            &mut project,
            sheet,
            "U1",
            None,
            (0.0, 0.0),
            (2.54, 0.0),
        );
        project
            .circuit
            .set_component_signal_net_signal(component, cmp_signal, Some(signal))
            .unwrap();
        let (seg, points, _) =
            add_chain_on_pin(&mut project, sheet, signal, pin, &[(2.54, 0.0), (10.0, 0.0)]);
        let (board, device, _trace_point) =
            add_board_with_pad_trace(&mut project, component, cmp_signal, signal);
        project
            .schematic_mut(sheet)
            .unwrap()
            .set_symbol_selected(symbol, true)
            .unwrap();

        let mut cmd = RemoveSelectedItems::new(sheet);
        assert!(cmd.perform_execute(&mut project).unwrap());

        let sch = project.schematic(sheet).unwrap();
        assert!(sch.symbol(symbol).is_none());
        // the net point survived, detached and frozen at the pin position
        let point = sch.net_segment(seg).unwrap().point(points[0]).unwrap();
        assert_eq!(point.pin(), None);
        assert_eq!(point.position(), Point::from_mm(2.54, 0.0));
        // component and device are gone with their last symbol
        assert!(project.circuit.component(component).is_none());
        assert!(project.board(board).unwrap().device(device).is_none());

        cmd.perform_undo(&mut project).unwrap();
        let sch = project.schematic(sheet).unwrap();
        assert!(sch.symbol(symbol).is_some());
        assert_eq!(
            sch.net_segment(seg).unwrap().point(points[0]).unwrap().pin(),
            Some(pin)
        );
        assert!(project.circuit.component(component).is_some());
    }
}
