//! Schematic Editor Composite Commands
//!
//! Transaction scripts built from the atomic commands in `sch-core`:
//! combining net signals and net points, changing a segment's signal,
//! removing and rotating selections, and pruning unused signals. Each
//! composite executes its children in order and rolls back all applied
//! children in reverse order when any step fails.

pub mod composite;

pub use composite::*;
