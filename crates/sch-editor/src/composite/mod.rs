//! Composite commands: multi-step edits with all-or-nothing semantics

mod change_segment_signal;
mod combine_points;
mod combine_signals;
mod combine_under_point;
mod remove_selected;
mod remove_unused_signals;
mod rotate_selected;

pub use change_segment_signal::ChangeNetSignalOfSegment;
pub use combine_points::CombineNetPoints;
pub use combine_signals::CombineNetSignals;
pub use combine_under_point::CombineAllUnderNetPoint;
pub use remove_selected::RemoveSelectedItems;
pub use remove_unused_signals::RemoveUnusedNetSignals;
pub use rotate_selected::RotateSelectedItems;

use std::collections::BTreeSet;

use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::{BoardNetLineRemove, BoardNetPointRemove, ComponentSignalSetNetSignal};
use sch_core::project::Project;
use sch_core::schematic::{PinRef, SchematicError};
use uuid::Uuid;

pub(crate) fn exec(
    group: &mut CommandGroup,
    project: &mut Project,
    command: impl UndoCommand + 'static,
) -> Result<(), CommandError> {
    group.exec_new_child(project, Box::new(command))
}

/// Resolve a symbol pin to its component signal instance:
/// `(component, signal, connected net, forced net name)`
pub(crate) fn resolve_pin(
    project: &Project,
    schematic: Uuid,
    pin: PinRef,
) -> Result<(Uuid, Uuid, Option<Uuid>, Option<String>), CommandError> {
    let sch = project
        .schematic(schematic)
        .ok_or(CommandError::SchematicNotFound(schematic))?;
    let symbol = sch
        .symbol(pin.symbol)
        .ok_or(SchematicError::SymbolNotFound(pin.symbol))?;
    let signal_uuid = symbol
        .pin(pin.pin)
        .ok_or(SchematicError::PinNotFound(pin.pin))?
        .component_signal();
    let signal = project
        .circuit
        .component_signal(symbol.component(), signal_uuid)
        .ok_or(SchematicError::ComponentSignalNotFound(signal_uuid))?;
    Ok((
        symbol.component(),
        signal_uuid,
        signal.net_signal(),
        signal.forced_net_name().map(str::to_string),
    ))
}

/// Remove all board traces anchored at the pads of one component signal
/// instance, then disconnect the signal from its net (`net = None`) or
/// rebind it (`net = Some(..)`).
pub(crate) fn rebind_component_signal(
    group: &mut CommandGroup,
    project: &mut Project,
    component: Uuid,
    signal: Uuid,
    net: Option<Uuid>,
) -> Result<(), CommandError> {
    // snapshot the affected trace elements before mutating anything
    let mut lines: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
    let mut points: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
    for board in project.boards() {
        for device in board.devices() {
            if device.component() != component {
                continue;
            }
            for pad in device.pads() {
                if pad.component_signal() != signal {
                    continue;
                }
                for &point in pad.net_points() {
                    points.insert((board.uuid, point));
                    if let Some(p) = board.net_point(point) {
                        for &line in p.lines() {
                            lines.insert((board.uuid, line));
                        }
                    }
                }
            }
        }
    }
    for (board, line) in lines {
        exec(group, project, BoardNetLineRemove::new(board, line))?;
    }
    for (board, point) in points {
        exec(group, project, BoardNetPointRemove::new(board, point))?;
    }
    exec(
        group,
        project,
        ComponentSignalSetNetSignal::new(component, signal, net),
    )?;
    Ok(())
}
