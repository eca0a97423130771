//! Atomic undo commands
//!
//! Each command wraps exactly one forward mutation and its exact inverse.
//! Removal commands keep the removed entity detached (owned by the project's
//! detached store or by the command itself) so that later commands of the
//! same transaction can edit and re-add it, and so that undo can restore it
//! with identical UUID and attributes.

mod board;
mod circuit;
mod schematic;

pub use board::{
    BoardNetLineAdd, BoardNetLineRemove, BoardNetPointAdd, BoardNetPointEdit, BoardNetPointRemove,
    BoardViaAdd, BoardViaEdit, BoardViaRemove, DeviceRemove,
};
pub use circuit::{
    ComponentInstanceRemove, ComponentSignalSetNetSignal, NetSignalAdd, NetSignalEdit,
    NetSignalRemove,
};
pub use schematic::{
    NetLabelAdd, NetLabelEdit, NetLabelRemove, NetPointEdit, NetSegmentAdd,
    NetSegmentAddElements, NetSegmentEdit, NetSegmentRemove, NetSegmentRemoveElements,
    SymbolEdit, SymbolRemove,
};

use uuid::Uuid;

use crate::circuit::Circuit;
use crate::command::CommandError;
use crate::project::Project;
use crate::schematic::Schematic;

pub(crate) fn schematic_and_circuit(
    project: &mut Project,
    uuid: Uuid,
) -> Result<(&mut Schematic, &mut Circuit), CommandError> {
    project
        .schematic_and_circuit_mut(uuid)
        .ok_or(CommandError::SchematicNotFound(uuid))
}

pub(crate) fn board_and_circuit(
    project: &mut Project,
    uuid: Uuid,
) -> Result<(&mut crate::board::Board, &mut Circuit), CommandError> {
    project
        .board_and_circuit_mut(uuid)
        .ok_or(CommandError::BoardNotFound(uuid))
}
