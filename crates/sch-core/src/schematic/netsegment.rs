//! Net segment: a set of net points/lines/labels sharing one net signal

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schematic::netlabel::NetLabel;
use crate::schematic::netline::NetLine;
use crate::schematic::netpoint::NetPoint;
use crate::schematic::SchematicError;

/// A connected subgraph of net points and lines on one sheet, all carrying
/// the same net signal. The segment exclusively owns its points, lines and
/// labels; lines refer to their endpoints by id.
///
/// A segment without net points is invalid and must not persist outside an
/// open transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetSegment {
    pub uuid: Uuid,
    net_signal: Uuid,
    points: Vec<NetPoint>,
    lines: Vec<NetLine>,
    labels: Vec<NetLabel>,
}

impl NetSegment {
    pub fn new(net_signal: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            net_signal,
            points: Vec::new(),
            lines: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn net_signal(&self) -> Uuid {
        self.net_signal
    }

    pub(crate) fn set_net_signal_id(&mut self, net_signal: Uuid) {
        self.net_signal = net_signal;
    }

    /// A segment with no net points is invalid (transiently tolerated inside
    /// an open transaction)
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    // ============== Net Points ==============

    pub fn points(&self) -> &[NetPoint] {
        &self.points
    }

    pub fn point(&self, uuid: Uuid) -> Option<&NetPoint> {
        self.points.iter().find(|p| p.uuid == uuid)
    }

    pub(crate) fn point_mut(&mut self, uuid: Uuid) -> Option<&mut NetPoint> {
        self.points.iter_mut().find(|p| p.uuid == uuid)
    }

    // ============== Net Lines ==============

    pub fn lines(&self) -> &[NetLine] {
        &self.lines
    }

    pub fn line(&self, uuid: Uuid) -> Option<&NetLine> {
        self.lines.iter().find(|l| l.uuid == uuid)
    }

    pub(crate) fn line_mut(&mut self, uuid: Uuid) -> Option<&mut NetLine> {
        self.lines.iter_mut().find(|l| l.uuid == uuid)
    }

    // ============== Net Labels ==============

    pub fn labels(&self) -> &[NetLabel] {
        &self.labels
    }

    pub fn label(&self, uuid: Uuid) -> Option<&NetLabel> {
        self.labels.iter().find(|l| l.uuid == uuid)
    }

    pub(crate) fn label_mut(&mut self, uuid: Uuid) -> Option<&mut NetLabel> {
        self.labels.iter_mut().find(|l| l.uuid == uuid)
    }

    pub fn add_net_label(&mut self, label: NetLabel) -> Result<(), SchematicError> {
        if self.label(label.uuid).is_some() {
            return Err(SchematicError::DuplicateUuid(label.uuid));
        }
        self.labels.push(label);
        Ok(())
    }

    pub fn remove_net_label(&mut self, uuid: Uuid) -> Result<NetLabel, SchematicError> {
        let pos = self
            .labels
            .iter()
            .position(|l| l.uuid == uuid)
            .ok_or(SchematicError::NetLabelNotFound(uuid))?;
        Ok(self.labels.remove(pos))
    }

    // ============== Bulk Point/Line Registration ==============

    /// Bulk atomic registration of points and lines.
    ///
    /// Every new line must connect two points that are (or become) part of
    /// this segment; registering a line registers it with both endpoints.
    /// All inputs are validated before anything is mutated, so a failed call
    /// leaves the segment untouched.
    ///
    /// This is the raw intra-segment registration; on a live segment, use the
    /// schematic-level wrapper so pin anchors are maintained as well.
    pub fn add_points_and_lines(
        &mut self,
        points: Vec<NetPoint>,
        lines: Vec<NetLine>,
    ) -> Result<(), SchematicError> {
        // validation pass
        let mut new_point_ids = BTreeSet::new();
        for point in &points {
            if self.point(point.uuid).is_some() || !new_point_ids.insert(point.uuid) {
                return Err(SchematicError::DuplicateUuid(point.uuid));
            }
        }
        let mut new_line_ids = BTreeSet::new();
        for line in &lines {
            if self.line(line.uuid).is_some() || !new_line_ids.insert(line.uuid) {
                return Err(SchematicError::DuplicateUuid(line.uuid));
            }
            for endpoint in [line.start(), line.end()] {
                if self.point(endpoint).is_none() && !new_point_ids.contains(&endpoint) {
                    return Err(SchematicError::LineEndpointNotInSegment(endpoint));
                }
            }
            if line.start() == line.end() {
                return Err(SchematicError::LineEndpointNotInSegment(line.start()));
            }
        }

        // mutation pass
        self.points.extend(points);
        for line in lines {
            let uuid = line.uuid;
            let (start, end) = (line.start(), line.end());
            self.lines.push(line);
            self.point_mut(start)
                .ok_or(SchematicError::NetPointNotFound(start))?
                .register_line(uuid)?;
            self.point_mut(end)
                .ok_or(SchematicError::NetPointNotFound(end))?
                .register_line(uuid)?;
        }
        Ok(())
    }

    /// Bulk atomic unregistration; the exact inverse of
    /// [`add_points_and_lines`](Self::add_points_and_lines).
    ///
    /// A point may only be removed when every line still terminating at it is
    /// part of the same batch. Returns ownership of the removed entities.
    pub fn remove_points_and_lines(
        &mut self,
        point_ids: &[Uuid],
        line_ids: &[Uuid],
    ) -> Result<(Vec<NetPoint>, Vec<NetLine>), SchematicError> {
        // validation pass
        let line_set: BTreeSet<Uuid> = line_ids.iter().copied().collect();
        for &uuid in line_ids {
            if self.line(uuid).is_none() {
                return Err(SchematicError::NetLineNotFound(uuid));
            }
        }
        for &uuid in point_ids {
            let point = self
                .point(uuid)
                .ok_or(SchematicError::NetPointNotFound(uuid))?;
            if !point.lines().is_subset(&line_set) {
                return Err(SchematicError::NetPointInUse(uuid));
            }
        }

        // mutation pass: lines first, so the points become unused
        let mut removed_lines = Vec::new();
        for &uuid in line_ids {
            let pos = self
                .lines
                .iter()
                .position(|l| l.uuid == uuid)
                .ok_or(SchematicError::NetLineNotFound(uuid))?;
            let line = self.lines.remove(pos);
            self.point_mut(line.start())
                .ok_or(SchematicError::NetPointNotFound(line.start()))?
                .unregister_line(uuid)?;
            self.point_mut(line.end())
                .ok_or(SchematicError::NetPointNotFound(line.end()))?
                .unregister_line(uuid)?;
            removed_lines.push(line);
        }
        let mut removed_points = Vec::new();
        for &uuid in point_ids {
            let pos = self
                .points
                .iter()
                .position(|p| p.uuid == uuid)
                .ok_or(SchematicError::NetPointNotFound(uuid))?;
            removed_points.push(self.points.remove(pos));
        }
        Ok((removed_points, removed_lines))
    }

    // ============== Connectivity ==============

    /// Worklist flood fill over the segment's lines: true if all net points
    /// form a single connected component (or the segment has at most one
    /// point). Used as a consistency check after composite commands.
    pub fn are_all_points_connected_together(&self) -> bool {
        let Some(first) = self.points.first() else {
            return true;
        };
        let adjacency = self.adjacency();
        let mut visited = BTreeSet::new();
        let mut worklist = vec![first.uuid];
        while let Some(point) = worklist.pop() {
            if !visited.insert(point) {
                continue;
            }
            if let Some(neighbors) = adjacency.get(&point) {
                for &(_, other) in neighbors {
                    if !visited.contains(&other) {
                        worklist.push(other);
                    }
                }
            }
        }
        visited.len() == self.points.len()
    }

    /// Partition a subset of this segment's points/lines into maximal
    /// connected components, following only lines present in the subset.
    /// Every point of the subset ends up in exactly one component.
    pub fn connected_components(
        &self,
        points: &BTreeSet<Uuid>,
        lines: &BTreeSet<Uuid>,
    ) -> Vec<(BTreeSet<Uuid>, BTreeSet<Uuid>)> {
        let adjacency = self.adjacency();
        let mut remaining: BTreeSet<Uuid> = points.clone();
        let mut components = Vec::new();
        while let Some(&start) = remaining.iter().next() {
            let mut component_points = BTreeSet::new();
            let mut component_lines = BTreeSet::new();
            let mut worklist = vec![start];
            while let Some(point) = worklist.pop() {
                if !component_points.insert(point) {
                    continue;
                }
                remaining.remove(&point);
                if let Some(neighbors) = adjacency.get(&point) {
                    for &(line, other) in neighbors {
                        if lines.contains(&line) && points.contains(&other) {
                            component_lines.insert(line);
                            if !component_points.contains(&other) {
                                worklist.push(other);
                            }
                        }
                    }
                }
            }
            components.push((component_points, component_lines));
        }
        components
    }

    fn adjacency(&self) -> BTreeMap<Uuid, Vec<(Uuid, Uuid)>> {
        let mut adjacency: BTreeMap<Uuid, Vec<(Uuid, Uuid)>> = BTreeMap::new();
        for line in &self.lines {
            adjacency
                .entry(line.start())
                .or_default()
                .push((line.uuid, line.end()));
            adjacency
                .entry(line.end())
                .or_default()
                .push((line.uuid, line.start()));
        }
        adjacency
    }

    pub(crate) fn clear_registrations(&mut self) {
        for point in &mut self.points {
            point.clear_registrations();
        }
    }

    pub(crate) fn rebuild_registrations(&mut self) -> Result<(), SchematicError> {
        self.clear_registrations();
        let line_refs: Vec<(Uuid, Uuid, Uuid)> = self
            .lines
            .iter()
            .map(|l| (l.uuid, l.start(), l.end()))
            .collect();
        for (line, start, end) in line_refs {
            self.point_mut(start)
                .ok_or(SchematicError::NetPointNotFound(start))?
                .register_line(line)?;
            self.point_mut(end)
                .ok_or(SchematicError::NetPointNotFound(end))?
                .register_line(line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_NETLINE_WIDTH;
    use crate::geometry::Point;

    fn segment_with_chain(n: usize) -> (NetSegment, Vec<Uuid>) {
        let mut segment = NetSegment::new(Uuid::new_v4());
        let points: Vec<NetPoint> = (0..n)
            .map(|i| NetPoint::new(Point::from_mm(i as f64 * 2.54, 0.0)))
            .collect();
        let ids: Vec<Uuid> = points.iter().map(|p| p.uuid).collect();
        let lines: Vec<NetLine> = ids
            .windows(2)
            .map(|w| NetLine::new(w[0], w[1], DEFAULT_NETLINE_WIDTH))
            .collect();
        segment.add_points_and_lines(points, lines).unwrap();
        (segment, ids)
    }

    #[test]
    fn test_add_registers_lines_with_endpoints() {
        let (segment, ids) = segment_with_chain(3);
        assert_eq!(segment.point(ids[0]).unwrap().lines().len(), 1);
        assert_eq!(segment.point(ids[1]).unwrap().lines().len(), 2);
        assert!(segment.are_all_points_connected_together());
    }

    #[test]
    fn test_add_then_remove_restores_prior_state() {
        let (mut segment, _) = segment_with_chain(2);
        let extra = NetPoint::new(Point::from_mm(10.0, 0.0));
        let extra_id = extra.uuid;
        let anchor = segment.points()[1].uuid;
        let line = NetLine::new(anchor, extra_id, DEFAULT_NETLINE_WIDTH);
        let line_id = line.uuid;

        let points_before = segment.points().len();
        let lines_before = segment.lines().len();
        segment.add_points_and_lines(vec![extra], vec![line]).unwrap();
        let (points, lines) = segment
            .remove_points_and_lines(&[extra_id], &[line_id])
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(lines.len(), 1);
        assert_eq!(segment.points().len(), points_before);
        assert_eq!(segment.lines().len(), lines_before);
        assert!(segment.point(anchor).unwrap().lines().len() == 1);
    }

    #[test]
    fn test_remove_used_point_rejected() {
        let (mut segment, ids) = segment_with_chain(3);
        let err = segment.remove_points_and_lines(&[ids[1]], &[]);
        assert!(matches!(err, Err(SchematicError::NetPointInUse(_))));
    }

    #[test]
    fn test_line_with_foreign_endpoint_rejected() {
        let (mut segment, ids) = segment_with_chain(2);
        let foreign = Uuid::new_v4();
        let line = NetLine::new(ids[0], foreign, DEFAULT_NETLINE_WIDTH);
        let err = segment.add_points_and_lines(vec![], vec![line]);
        assert!(matches!(
            err,
            Err(SchematicError::LineEndpointNotInSegment(_))
        ));
        // failed call left the segment untouched
        assert_eq!(segment.lines().len(), 1);
    }

    #[test]
    fn test_point_visibility_rule() {
        // star center with increasing line count
        let mut segment = NetSegment::new(Uuid::new_v4());
        let center = NetPoint::new(Point::from_mm(0.0, 0.0));
        let center_id = center.uuid;
        segment.add_points_and_lines(vec![center], vec![]).unwrap();
        assert!(segment.point(center_id).unwrap().is_dead());

        for i in 0..3 {
            let arm = NetPoint::new(Point::from_mm(5.0, i as f64 * 2.0));
            let line = NetLine::new(center_id, arm.uuid, DEFAULT_NETLINE_WIDTH);
            segment.add_points_and_lines(vec![arm], vec![line]).unwrap();
            let center = segment.point(center_id).unwrap();
            match center.lines().len() {
                // a plain joint of one or two lines is never drawn
                1 | 2 => assert!(!center.is_visible()),
                // three and more lines always form a visible junction
                _ => assert!(center.is_visible()),
            }
        }

        // with a pin attachment, two lines are already a junction
        let mut attached = NetPoint::new_attached(
            crate::schematic::PinRef {
                symbol: Uuid::new_v4(),
                pin: Uuid::new_v4(),
            },
            Point::from_mm(0.0, 0.0),
        );
        attached.register_line(Uuid::new_v4()).unwrap();
        assert!(!attached.is_visible());
        attached.register_line(Uuid::new_v4()).unwrap();
        assert!(attached.is_visible());
    }

    #[test]
    fn test_connectivity_detects_islands() {
        let (mut segment, ids) = segment_with_chain(4);
        // cut the chain in the middle
        let middle_line = segment
            .lines()
            .iter()
            .find(|l| l.other_point(ids[1]) == Some(ids[2]))
            .unwrap()
            .uuid;
        segment.remove_points_and_lines(&[], &[middle_line]).unwrap();
        assert!(!segment.are_all_points_connected_together());
    }

    #[test]
    fn test_connected_components_partition() {
        // diamond N-E-S-W with lines N-E, E-S, S-W, W-N
        let mut segment = NetSegment::new(Uuid::new_v4());
        let n = NetPoint::new(Point::from_mm(0.0, 2.0));
        let e = NetPoint::new(Point::from_mm(2.0, 0.0));
        let s = NetPoint::new(Point::from_mm(0.0, -2.0));
        let w = NetPoint::new(Point::from_mm(-2.0, 0.0));
        let (n_id, e_id, s_id, w_id) = (n.uuid, e.uuid, s.uuid, w.uuid);
        let ne = NetLine::new(n_id, e_id, DEFAULT_NETLINE_WIDTH);
        let es = NetLine::new(e_id, s_id, DEFAULT_NETLINE_WIDTH);
        let sw = NetLine::new(s_id, w_id, DEFAULT_NETLINE_WIDTH);
        let wn = NetLine::new(w_id, n_id, DEFAULT_NETLINE_WIDTH);
        let (sw_id, wn_id) = (sw.uuid, wn.uuid);
        segment
            .add_points_and_lines(vec![n, e, s, w], vec![ne, es, sw, wn])
            .unwrap();

        // remaining graph after deleting lines N-E and E-S: {E} isolated,
        // {N, W, S} connected through W-N and S-W
        let points: BTreeSet<Uuid> = [n_id, e_id, s_id, w_id].into_iter().collect();
        let lines: BTreeSet<Uuid> = [sw_id, wn_id].into_iter().collect();
        let mut components = segment.connected_components(&points, &lines);
        components.sort_by_key(|(points, _)| points.len());

        assert_eq!(components.len(), 2);
        assert_eq!(components[0].0, [e_id].into_iter().collect());
        assert!(components[0].1.is_empty());
        assert_eq!(components[1].0, [n_id, s_id, w_id].into_iter().collect());
        assert_eq!(components[1].1, lines);
    }
}
