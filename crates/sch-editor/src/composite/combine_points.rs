//! Merge one net point into another, possibly across segments

use std::collections::BTreeMap;

use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{
    NetLabelAdd, NetSegmentAddElements, NetSegmentRemove, NetSegmentRemoveElements,
};
use sch_core::project::Project;
use sch_core::schematic::SchematicError;
use uuid::Uuid;

use crate::composite::exec;

/// Merge `point_to_remove` into `resulting_point`.
///
/// Across two segments the losing segment is removed entirely and each of
/// its points, lines and labels is re-created inside the winning segment;
/// the re-created entities carry fresh UUIDs, identity is intentionally not
/// preserved. Within one segment every line at the losing point is re-routed
/// to the winning point (self-loops are dropped) before the point itself is
/// removed.
pub struct CombineNetPoints {
    schematic: Uuid,
    segment_to_remove: Uuid,
    point_to_remove: Uuid,
    resulting_segment: Uuid,
    resulting_point: Uuid,
    group: CommandGroup,
}

impl CombineNetPoints {
    pub fn new(
        schematic: Uuid,
        point_to_remove: (Uuid, Uuid),
        resulting_point: (Uuid, Uuid),
    ) -> Self {
        Self {
            schematic,
            segment_to_remove: point_to_remove.0,
            point_to_remove: point_to_remove.1,
            resulting_segment: resulting_point.0,
            resulting_point: resulting_point.1,
            group: CommandGroup::new("Combine net points"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if self.segment_to_remove != self.resulting_segment {
            self.merge_segments(project)
        } else {
            self.merge_within_segment(project)
        }
    }

    /// Remove the losing segment and re-create its contents in the winning
    /// segment, identifying the losing point with the winning one
    fn merge_segments(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let losing = sch
            .net_segment(self.segment_to_remove)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment_to_remove))?;
        let points: Vec<_> = losing
            .points()
            .iter()
            .map(|p| (p.uuid, p.pin(), p.position()))
            .collect();
        let lines: Vec<_> = losing
            .lines()
            .iter()
            .map(|l| (l.start(), l.end()))
            .collect();
        let labels: Vec<_> = losing.labels().iter().map(|l| l.position()).collect();

        exec(
            &mut self.group,
            project,
            NetSegmentRemove::new(self.schematic, self.segment_to_remove),
        )?;

        // re-create the points
        let mut point_map: BTreeMap<Uuid, Uuid> = BTreeMap::new();
        point_map.insert(self.point_to_remove, self.resulting_point);
        let mut add_points = NetSegmentAddElements::new(self.schematic, self.resulting_segment);
        for (uuid, pin, position) in points {
            if uuid == self.point_to_remove {
                continue;
            }
            let new_uuid = match pin {
                Some(pin) => add_points.add_net_point_attached(pin),
                None => add_points.add_net_point(position),
            };
            point_map.insert(uuid, new_uuid);
        }
        if !add_points.is_empty() {
            exec(&mut self.group, project, add_points)?;
        }

        // re-create the lines between the mapped endpoints
        let mut add_lines = NetSegmentAddElements::new(self.schematic, self.resulting_segment);
        for (start, end) in lines {
            let start = *point_map
                .get(&start)
                .ok_or(SchematicError::NetPointNotFound(start))?;
            let end = *point_map
                .get(&end)
                .ok_or(SchematicError::NetPointNotFound(end))?;
            add_lines.add_net_line(start, end);
        }
        if !add_lines.is_empty() {
            exec(&mut self.group, project, add_lines)?;
        }

        // re-create the labels
        for position in labels {
            exec(
                &mut self.group,
                project,
                NetLabelAdd::new(self.schematic, self.resulting_segment, position),
            )?;
        }
        Ok(true)
    }

    /// Re-route every line at the losing point to the winning point, then
    /// remove the losing point
    fn merge_within_segment(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if self.point_to_remove == self.resulting_point {
            return Ok(false);
        }
        let sch = project
            .schematic(self.schematic)
            .ok_or(CommandError::SchematicNotFound(self.schematic))?;
        let segment = sch
            .net_segment(self.segment_to_remove)
            .ok_or(SchematicError::NetSegmentNotFound(self.segment_to_remove))?;
        let point = segment
            .point(self.point_to_remove)
            .ok_or(SchematicError::NetPointNotFound(self.point_to_remove))?;
        let lines: Vec<(Uuid, Uuid)> = point
            .lines()
            .iter()
            .map(|&line| {
                let other = segment
                    .line(line)
                    .and_then(|l| l.other_point(self.point_to_remove))
                    .ok_or(SchematicError::NetLineNotFound(line))?;
                Ok((line, other))
            })
            .collect::<Result<_, SchematicError>>()?;

        for (line, other) in lines {
            let mut remove = NetSegmentRemoveElements::new(self.schematic, self.segment_to_remove);
            remove.remove_net_line(line);
            exec(&mut self.group, project, remove)?;
            if other != self.resulting_point {
                let mut add = NetSegmentAddElements::new(self.schematic, self.resulting_segment);
                add.add_net_line(self.resulting_point, other);
                exec(&mut self.group, project, add)?;
            }
        }

        let mut remove = NetSegmentRemoveElements::new(self.schematic, self.segment_to_remove);
        remove.remove_net_point(self.point_to_remove);
        exec(&mut self.group, project, remove)?;
        Ok(true)
    }
}

impl UndoCommand for CombineNetPoints {
    fn text(&self) -> &str {
        "Combine net points"
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
