//! Schematic Editor Core Data Structures
//!
//! This crate contains the core document model for schematic editing:
//! - Circuit: net signals and component instances
//! - Schematic: sheets with symbols, net segments, net points/lines/labels
//! - Board: the layout mirror graph (devices, trace points/lines, vias)
//! - Project: serializable project file
//! - Command layer: the undo command contract and the atomic commands

pub mod board;
pub mod circuit;
pub mod command;
pub mod commands;
pub mod constants;
pub mod erc;
pub mod geometry;
pub mod project;
pub mod schematic;

pub use board::*;
pub use circuit::*;
pub use command::*;
pub use constants::*;
pub use geometry::*;
pub use project::*;
pub use schematic::*;
