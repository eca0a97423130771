//! Selection query over a schematic sheet
//!
//! Composite commands consume the collected sets; the query itself only
//! reads selection flags, it never mutates the sheet.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::circuit::ElementRef;
use crate::schematic::Schematic;

/// Filter for collecting net points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetPointFilter {
    /// Only points not attached to a symbol pin
    Floating,
    /// Only points whose connected lines are all part of the collected line set
    AllConnectedLinesSelected,
    All,
}

/// Collects the currently selected items of a sheet, filtered the way the
/// composite commands need them
#[derive(Debug)]
pub struct SelectionQuery<'a> {
    schematic: &'a Schematic,
    symbols: BTreeSet<Uuid>,
    net_points: BTreeSet<ElementRef>,
    net_lines: BTreeSet<ElementRef>,
    net_labels: BTreeSet<ElementRef>,
}

impl<'a> SelectionQuery<'a> {
    pub(crate) fn new(schematic: &'a Schematic) -> Self {
        Self {
            schematic,
            symbols: BTreeSet::new(),
            net_points: BTreeSet::new(),
            net_lines: BTreeSet::new(),
            net_labels: BTreeSet::new(),
        }
    }

    pub fn add_selected_symbols(&mut self) {
        for symbol in self.schematic.symbols() {
            if symbol.is_selected() {
                self.symbols.insert(symbol.uuid);
            }
        }
    }

    pub fn add_selected_net_points(&mut self, filter: NetPointFilter) {
        for segment in self.schematic.net_segments() {
            for point in segment.points() {
                if point.is_selected() && self.point_matches(segment.uuid, point.uuid, filter) {
                    self.net_points.insert((segment.uuid, point.uuid));
                }
            }
        }
    }

    pub fn add_selected_net_lines(&mut self) {
        for segment in self.schematic.net_segments() {
            for line in segment.lines() {
                if line.is_selected() {
                    self.net_lines.insert((segment.uuid, line.uuid));
                }
            }
        }
    }

    pub fn add_selected_net_labels(&mut self) {
        for segment in self.schematic.net_segments() {
            for label in segment.labels() {
                if label.is_selected() {
                    self.net_labels.insert((segment.uuid, label.uuid));
                }
            }
        }
    }

    /// Add the endpoints of every collected net line, subject to `filter`
    pub fn add_net_points_of_net_lines(&mut self, filter: NetPointFilter) {
        let mut found = Vec::new();
        for &(segment_id, line_id) in &self.net_lines {
            let Some(segment) = self.schematic.net_segment(segment_id) else {
                continue;
            };
            let Some(line) = segment.line(line_id) else {
                continue;
            };
            for endpoint in [line.start(), line.end()] {
                if self.point_matches(segment_id, endpoint, filter) {
                    found.push((segment_id, endpoint));
                }
            }
        }
        self.net_points.extend(found);
    }

    fn point_matches(&self, segment: Uuid, point: Uuid, filter: NetPointFilter) -> bool {
        let Some(p) = self.schematic.net_segment(segment).and_then(|s| s.point(point)) else {
            return false;
        };
        match filter {
            NetPointFilter::Floating => !p.is_attached_to_pin(),
            NetPointFilter::AllConnectedLinesSelected => p
                .lines()
                .iter()
                .all(|line| self.net_lines.contains(&(segment, *line))),
            NetPointFilter::All => true,
        }
    }

    pub fn symbols(&self) -> &BTreeSet<Uuid> {
        &self.symbols
    }

    pub fn net_points(&self) -> &BTreeSet<ElementRef> {
        &self.net_points
    }

    pub fn net_lines(&self) -> &BTreeSet<ElementRef> {
        &self.net_lines
    }

    pub fn net_labels(&self) -> &BTreeSet<ElementRef> {
        &self.net_labels
    }
}
