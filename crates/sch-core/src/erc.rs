//! Electrical rule check diagnostics
//!
//! Pull-based: callers collect the current messages whenever they need them;
//! nothing here observes document changes.

use uuid::Uuid;

use crate::schematic::Schematic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErcSeverity {
    Warning,
    SchematicError,
}

/// One diagnostic finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErcMessage {
    pub severity: ErcSeverity,
    /// Entity the finding is about
    pub item: Uuid,
    pub message: String,
}

/// Collect the diagnostics of one schematic sheet: dead net points and
/// net segments without any net point.
pub fn schematic_messages(schematic: &Schematic) -> Vec<ErcMessage> {
    let mut messages = Vec::new();
    for segment in schematic.net_segments() {
        if segment.is_empty() {
            messages.push(ErcMessage {
                severity: ErcSeverity::SchematicError,
                item: segment.uuid,
                message: format!(
                    "Empty net segment in schematic page \"{}\": {}",
                    schematic.name(),
                    segment.uuid
                ),
            });
        }
        for point in segment.points() {
            if point.is_dead() {
                messages.push(ErcMessage {
                    severity: ErcSeverity::SchematicError,
                    item: point.uuid,
                    message: format!(
                        "Dead net point in schematic page \"{}\": {}",
                        schematic.name(),
                        point.uuid
                    ),
                });
            }
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, NetSignal};
    use crate::constants::DEFAULT_NETLINE_WIDTH;
    use crate::geometry::Point;
    use crate::schematic::{NetLine, NetPoint, NetSegment};

    #[test]
    fn test_dead_point_and_empty_segment_reported() {
        let mut circuit = Circuit::new();
        let signal = NetSignal::new("N#1", false);
        let signal_uuid = signal.uuid;
        circuit.add_net_signal(signal).unwrap();
        let mut schematic = Schematic::new("Page 1");

        // connected pair plus one dead point
        let mut segment = NetSegment::new(signal_uuid);
        let a = NetPoint::new(Point::from_mm(0.0, 0.0));
        let b = NetPoint::new(Point::from_mm(5.0, 0.0));
        let dead = NetPoint::new(Point::from_mm(10.0, 10.0));
        let dead_uuid = dead.uuid;
        let line = NetLine::new(a.uuid, b.uuid, DEFAULT_NETLINE_WIDTH);
        segment
            .add_points_and_lines(vec![a, b, dead], vec![line])
            .unwrap();
        schematic.add_net_segment(&mut circuit, segment).unwrap();

        // empty segment
        let empty = NetSegment::new(signal_uuid);
        let empty_uuid = empty.uuid;
        schematic.add_net_segment(&mut circuit, empty).unwrap();

        let messages = schematic_messages(&schematic);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.item == dead_uuid));
        assert!(messages.iter().any(|m| m.item == empty_uuid));
        assert!(messages
            .iter()
            .all(|m| m.severity == ErcSeverity::SchematicError));
    }
}
