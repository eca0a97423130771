//! Project file: the root container with RON serialization
//!
//! Registration state (net signal registries, pin anchors, connected-line
//! sets) is not persisted; it is rebuilt and validated when a project file is
//! loaded. A rebuild failure means the file is corrupt and is reported as a
//! recoverable error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::{Board, BoardNetLine, BoardNetPoint, BoardVia};
use crate::circuit::Circuit;
use crate::schematic::{NetLine, NetPoint, NetSegment, Schematic};

/// Raw project data for deserialization (used internally)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectData {
    version: u32,
    name: String,
    circuit: Circuit,
    schematics: Vec<Schematic>,
    boards: Vec<Board>,
}

/// Entities that are currently constructed but not registered with any
/// container. Undo commands move entities here while they are removed, so
/// that later commands of the same transaction can edit and re-add them.
#[derive(Debug, Clone, Default)]
pub struct DetachedItems {
    net_segments: Vec<NetSegment>,
    net_points: Vec<NetPoint>,
    net_lines: Vec<NetLine>,
    board_net_points: Vec<BoardNetPoint>,
    board_net_lines: Vec<BoardNetLine>,
    board_vias: Vec<BoardVia>,
}

macro_rules! detached_accessors {
    ($put:ident, $take:ident, $field:ident, $ty:ty) => {
        pub(crate) fn $put(&mut self, item: $ty) {
            self.$field.push(item);
        }

        pub(crate) fn $take(&mut self, uuid: Uuid) -> Option<$ty> {
            let pos = self.$field.iter().position(|i| i.uuid == uuid)?;
            Some(self.$field.remove(pos))
        }
    };
}

impl DetachedItems {
    detached_accessors!(put_net_segment, take_net_segment, net_segments, NetSegment);
    detached_accessors!(put_net_point, take_net_point, net_points, NetPoint);
    detached_accessors!(put_net_line, take_net_line, net_lines, NetLine);
    detached_accessors!(put_board_net_point, take_board_net_point, board_net_points, BoardNetPoint);
    detached_accessors!(put_board_net_line, take_board_net_line, board_net_lines, BoardNetLine);
    detached_accessors!(put_board_via, take_board_via, board_vias, BoardVia);

    /// Detached segments stay editable so a transaction can rebind them
    /// before re-adding
    pub(crate) fn net_segment_mut(&mut self, uuid: Uuid) -> Option<&mut NetSegment> {
        self.net_segments.iter_mut().find(|s| s.uuid == uuid)
    }

    pub(crate) fn board_net_point_mut(&mut self, uuid: Uuid) -> Option<&mut BoardNetPoint> {
        self.board_net_points.iter_mut().find(|p| p.uuid == uuid)
    }

    pub(crate) fn board_via_mut(&mut self, uuid: Uuid) -> Option<&mut BoardVia> {
        self.board_vias.iter_mut().find(|v| v.uuid == uuid)
    }

    pub fn is_empty(&self) -> bool {
        self.net_segments.is_empty()
            && self.net_points.is_empty()
            && self.net_lines.is_empty()
            && self.board_net_points.is_empty()
            && self.board_net_lines.is_empty()
            && self.board_vias.is_empty()
    }
}

/// Project file containing the whole document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ProjectData", try_from = "ProjectData")]
pub struct Project {
    /// File format version
    pub version: u32,
    pub name: String,
    pub circuit: Circuit,
    schematics: Vec<Schematic>,
    boards: Vec<Board>,
    detached: DetachedItems,
}

impl From<Project> for ProjectData {
    fn from(project: Project) -> Self {
        Self {
            version: project.version,
            name: project.name,
            circuit: project.circuit,
            schematics: project.schematics,
            boards: project.boards,
        }
    }
}

impl TryFrom<ProjectData> for Project {
    type Error = ProjectError;

    fn try_from(data: ProjectData) -> Result<Self, Self::Error> {
        let mut project = Self {
            version: data.version,
            name: data.name,
            circuit: data.circuit,
            schematics: data.schematics,
            boards: data.boards,
            detached: DetachedItems::default(),
        };
        project.restore_registrations()?;
        Ok(project)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("New Project")
    }
}

impl Project {
    /// Create a new empty project
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: 1,
            name: name.into(),
            circuit: Circuit::new(),
            schematics: Vec::new(),
            boards: Vec::new(),
            detached: DetachedItems::default(),
        }
    }

    // ============== Schematics ==============

    pub fn schematics(&self) -> &[Schematic] {
        &self.schematics
    }

    pub fn schematic(&self, uuid: Uuid) -> Option<&Schematic> {
        self.schematics.iter().find(|s| s.uuid == uuid)
    }

    pub fn schematic_mut(&mut self, uuid: Uuid) -> Option<&mut Schematic> {
        self.schematics.iter_mut().find(|s| s.uuid == uuid)
    }

    /// Split borrow used by operations that update circuit registries while
    /// mutating a sheet
    pub fn schematic_and_circuit_mut(
        &mut self,
        uuid: Uuid,
    ) -> Option<(&mut Schematic, &mut Circuit)> {
        let schematic = self.schematics.iter_mut().find(|s| s.uuid == uuid)?;
        Some((schematic, &mut self.circuit))
    }

    pub fn add_schematic(&mut self, schematic: Schematic) -> Result<(), ProjectError> {
        if self.schematic(schematic.uuid).is_some() {
            return Err(ProjectError::DuplicateUuid(schematic.uuid));
        }
        self.schematics.push(schematic);
        Ok(())
    }

    // ============== Boards ==============

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn board(&self, uuid: Uuid) -> Option<&Board> {
        self.boards.iter().find(|b| b.uuid == uuid)
    }

    pub fn board_mut(&mut self, uuid: Uuid) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.uuid == uuid)
    }

    pub fn board_and_circuit_mut(&mut self, uuid: Uuid) -> Option<(&mut Board, &mut Circuit)> {
        let board = self.boards.iter_mut().find(|b| b.uuid == uuid)?;
        Some((board, &mut self.circuit))
    }

    pub fn add_board(&mut self, board: Board) -> Result<(), ProjectError> {
        if self.board(board.uuid).is_some() {
            return Err(ProjectError::DuplicateUuid(board.uuid));
        }
        self.boards.push(board);
        Ok(())
    }

    // ============== Detached Entities ==============

    pub(crate) fn detached_mut(&mut self) -> &mut DetachedItems {
        &mut self.detached
    }

    /// True while a transaction holds removed entities that are not yet
    /// re-added or dropped
    pub fn has_detached_items(&self) -> bool {
        !self.detached.is_empty()
    }

    // ============== Serialization ==============

    /// Save the project to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        let content = self.to_bytes()?;
        std::fs::write(path, content).map_err(|e| ProjectError::Io(e.to_string()))?;
        Ok(())
    }

    /// Serialize the project to bytes. Detached entities of undone commands
    /// are not part of the document and are not persisted.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProjectError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ProjectError::Serialize(e.to_string()))?;
        Ok(content.into_bytes())
    }

    /// Load a project from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ProjectError::Io(e.to_string()))?;
        let project: Project =
            ron::from_str(&content).map_err(|e| ProjectError::Deserialize(e.to_string()))?;
        Ok(project)
    }

    /// Load a project from bytes
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, ProjectError> {
        let content =
            std::str::from_utf8(data).map_err(|e| ProjectError::Deserialize(e.to_string()))?;
        let project: Project =
            ron::from_str(content).map_err(|e| ProjectError::Deserialize(e.to_string()))?;
        Ok(project)
    }

    /// Rebuild all registration state after deserialization
    fn restore_registrations(&mut self) -> Result<(), ProjectError> {
        let mut seen = std::collections::BTreeSet::new();
        for schematic in &self.schematics {
            if !seen.insert(schematic.uuid) {
                return Err(ProjectError::DuplicateUuid(schematic.uuid));
            }
        }
        for board in &self.boards {
            if !seen.insert(board.uuid) {
                return Err(ProjectError::DuplicateUuid(board.uuid));
            }
        }
        for schematic in &mut self.schematics {
            schematic
                .restore_registrations(&mut self.circuit)
                .map_err(|e| ProjectError::Restore(e.to_string()))?;
        }
        for board in &mut self.boards {
            board
                .restore_registrations(&mut self.circuit)
                .map_err(|e| ProjectError::Restore(e.to_string()))?;
        }
        Ok(())
    }
}


/// Project-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Invalid project file: {0}")]
    Restore(String),
    #[error("There is already an element with the UUID \"{0}\"")]
    DuplicateUuid(Uuid),
}
