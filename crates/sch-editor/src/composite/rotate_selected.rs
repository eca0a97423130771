//! Rotate the current selection around its grid-snapped centroid

use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{NetLabelEdit, NetPointEdit, SymbolEdit};
use sch_core::geometry::{Angle, Point};
use sch_core::project::Project;
use sch_core::schematic::{NetPointFilter, SchematicError};
use uuid::Uuid;

use crate::composite::exec;

/// Rotate all selected symbols, floating net points and net labels by one
/// angle around the unweighted centroid of the selection, snapped to the
/// sheet's grid. An empty selection leaves the document unmodified.
pub struct RotateSelectedItems {
    schematic: Uuid,
    angle: Angle,
    group: CommandGroup,
}

impl RotateSelectedItems {
    pub fn new(schematic: Uuid, angle: Angle) -> Self {
        Self {
            schematic,
            angle,
            group: CommandGroup::new("Rotate schematic elements"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let mut query = sch.selection_query();
        query.add_selected_symbols();
        query.add_selected_net_points(NetPointFilter::Floating);
        query.add_selected_net_lines();
        query.add_selected_net_labels();
        query.add_net_points_of_net_lines(NetPointFilter::Floating);

        // unweighted centroid of symbols, floating points and labels
        let mut sum = Point::ORIGIN;
        let mut count: i64 = 0;
        let mut symbols = Vec::new();
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for &symbol in query.symbols() {
            let s = sch
                .symbol(symbol)
                .ok_or(SchematicError::SymbolNotFound(symbol))?;
            sum += s.position();
            count += 1;
            symbols.push((symbol, s.position(), s.rotation()));
        }
        for &(segment, point) in query.net_points() {
            let p = sch
                .net_segment(segment)
                .ok_or(SchematicError::NetSegmentNotFound(segment))?
                .point(point)
                .ok_or(SchematicError::NetPointNotFound(point))?;
            sum += p.position();
            count += 1;
            points.push((segment, point, p.position()));
        }
        for &(segment, label) in query.net_labels() {
            let l = sch
                .net_segment(segment)
                .ok_or(SchematicError::NetSegmentNotFound(segment))?
                .label(label)
                .ok_or(SchematicError::NetLabelNotFound(label))?;
            sum += l.position();
            count += 1;
            labels.push((segment, label, l.position(), l.rotation()));
        }
        if count == 0 {
            return Ok(false);
        }
        let center = Point::new(sum.x / count, sum.y / count).mapped_to_grid(sch.grid_interval());

        for (symbol, position, rotation) in symbols {
            let mut edit = SymbolEdit::new(self.schematic, symbol);
            edit.set_position(position.rotated(self.angle, center));
            edit.set_rotation(rotation + self.angle);
            exec(&mut self.group, project, edit)?;
        }
        for (segment, point, position) in points {
            let mut edit = NetPointEdit::new(self.schematic, segment, point);
            edit.set_position(position.rotated(self.angle, center));
            exec(&mut self.group, project, edit)?;
        }
        for (segment, label, position, rotation) in labels {
            let mut edit = NetLabelEdit::new(self.schematic, segment, label);
            edit.set_position(position.rotated(self.angle, center));
            edit.set_rotation(rotation + self.angle);
            exec(&mut self.group, project, edit)?;
        }
        Ok(self.group.child_count() > 0)
    }
}

impl UndoCommand for RotateSelectedItems {
    fn text(&self) -> &str {
        "Rotate schematic elements"
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
    use sch_core::geometry::Length;

    #[test]
    fn test_empty_selection_is_noop() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
        add_chain(&mut project, sheet, signal, &[(0.0, 0.0), (5.0, 0.0)]);
        let mut cmd = RotateSelectedItems::new(sheet, Angle::deg_90());
        assert!(!cmd.perform_execute(&mut project).unwrap());
    }

    #[test]
    fn test_rotates_points_around_snapped_centroid() {
        let (mut project, sheet) = project_with_sheet();
        let signal = add_signal(&mut project, "N#1");
        // grid 2.54mm; centroid of (0,0) and (5.0,0) is (2.5,0), which is
        // off-grid and snaps to (2.54,0)
        let (seg, points, lines) =
            add_chain(&mut project, sheet, signal, &[(0.0, 0.0), (5.0, 0.0)]);
        {
            let sch = project.schematic_mut(sheet).unwrap();
            sch.set_grid_interval(Length::from_mm(2.54));
            sch.set_net_point_selected(seg, points[0], true).unwrap();
            sch.set_net_point_selected(seg, points[1], true).unwrap();
            sch.set_net_line_selected(seg, lines[0], true).unwrap();
        }

        let mut cmd = RotateSelectedItems::new(sheet, Angle::deg_90());
        assert!(cmd.perform_execute(&mut project).unwrap());

        let center = Point::from_mm(2.54, 0.0);
        let sch = project.schematic(sheet).unwrap();
        let segment = sch.net_segment(seg).unwrap();
        assert_eq!(
            segment.point(points[0]).unwrap().position(),
            Point::from_mm(0.0, 0.0).rotated(Angle::deg_90(), center)
        );
        assert_eq!(
            segment.point(points[1]).unwrap().position(),
            Point::from_mm(5.0, 0.0).rotated(Angle::deg_90(), center)
        );

        cmd.perform_undo(&mut project).unwrap();
        let sch = project.schematic(sheet).unwrap();
        assert_eq!(
            sch.net_segment(seg).unwrap().point(points[0]).unwrap().position(),
            Point::from_mm(0.0, 0.0)
        );
    }

    #[test]
    fn test_rotates_symbol_and_attached_point() {
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
            add_chain_on_pin(&mut project, sheet, signal, pin, &[(2.54, 0.0), (2.54, 5.08)]);
        project
            .schematic_mut(sheet)
            .unwrap()
            .set_symbol_selected(symbol, true)
            .unwrap();

        let mut cmd = RotateSelectedItems::new(sheet, Angle::deg_90());
        assert!(cmd.perform_execute(&mut project).unwrap());

        // centroid = the symbol position itself (only selected item)
        let sch = project.schematic(sheet).unwrap();
        let sym = sch.symbol(symbol).unwrap();
        assert_eq!(sym.rotation(), Angle::deg_90());
        // the attached net point followed the rotated pin
        assert_eq!(
            sch.net_segment(seg).unwrap().point(points[0]).unwrap().position(),
            sym.pin_position(pin.pin).unwrap()
        );
        assert_eq!(
            sch.net_segment(seg).unwrap().point(points[0]).unwrap().position(),
            Point::from_mm(0.0, 2.54)
        );
    }
}
