//! Atomic commands on the circuit: net signals, component signal
//! connections, component instances

use uuid::Uuid;

use crate::circuit::{ComponentInstance, NetSignal};
use crate::command::{CommandError, UndoCommand};
use crate::project::Project;

/// Create a net signal, either auto-named or with an explicit (possibly
/// forced) name. The name is resolved at first execution and stays stable
/// across undo/redo.
pub struct NetSignalAdd {
    name: Option<String>,
    name_forced: bool,
    signal_uuid: Uuid,
    held: Option<NetSignal>,
    constructed: bool,
}

impl NetSignalAdd {
    /// Auto-named signal ("N#1" style)
    pub fn new_auto() -> Self {
        Self {
            name: None,
            name_forced: false,
            signal_uuid: Uuid::new_v4(),
            held: None,
            constructed: false,
        }
    }

    pub fn new_named(name: impl Into<String>, name_forced: bool) -> Self {
        Self {
            name: Some(name.into()),
            name_forced,
            signal_uuid: Uuid::new_v4(),
            held: None,
            constructed: false,
        }
    }

    pub fn signal_uuid(&self) -> Uuid {
        self.signal_uuid
    }
}

impl UndoCommand for NetSignalAdd {
    fn text(&self) -> &str {
        "Add net signal"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if !self.constructed {
            let mut signal = match &self.name {
                Some(name) => NetSignal::new(name.clone(), self.name_forced),
                None => NetSignal::new_auto(project.circuit.generate_auto_name()),
            };
            signal.uuid = self.signal_uuid;
            self.held = Some(signal);
            self.constructed = true;
        }
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.held = Some(project.circuit.remove_net_signal(self.signal_uuid)?);
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let signal = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.signal_uuid))?;
        if let Err(e) = project.circuit.add_net_signal(signal.clone()) {
            self.held = Some(signal);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Remove an unused net signal
pub struct NetSignalRemove {
    signal: Uuid,
    held: Option<NetSignal>,
}

impl NetSignalRemove {
    pub fn new(signal: Uuid) -> Self {
        Self { signal, held: None }
    }
}

impl UndoCommand for NetSignalRemove {
    fn text(&self) -> &str {
        "Remove net signal"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let signal = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.signal))?;
        if let Err(e) = project.circuit.add_net_signal(signal.clone()) {
            self.held = Some(signal);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.held = Some(project.circuit.remove_net_signal(self.signal)?);
        Ok(())
    }
}

/// Rename a net signal
pub struct NetSignalEdit {
    signal: Uuid,
    new_name: Option<(String, bool)>,
    old_name: Option<(String, bool, bool)>,
    executed: bool,
}

impl NetSignalEdit {
    pub fn new(signal: Uuid) -> Self {
        Self {
            signal,
            new_name: None,
            old_name: None,
            executed: false,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>, name_forced: bool) {
        debug_assert!(!self.executed);
        self.new_name = Some((name.into(), name_forced));
    }
}

impl UndoCommand for NetSignalEdit {
    fn text(&self) -> &str {
        "Edit net signal"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.executed = true;
        let Some((name, forced)) = self.new_name.clone() else {
            return Ok(false);
        };
        let current = project
            .circuit
            .net_signal(self.signal)
            .ok_or(crate::circuit::CircuitError::NetSignalNotFound(self.signal))?;
        if current.name() == name && current.is_name_forced() == forced {
            return Ok(false);
        }
        let old = project
            .circuit
            .set_net_signal_name(self.signal, name, forced, false)?;
        self.old_name = Some(old);
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        if let Some((name, forced, auto)) = self.old_name.clone() {
            project
                .circuit
                .set_net_signal_name(self.signal, name, forced, auto)?;
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        if let Some((name, forced)) = self.new_name.clone() {
            project
                .circuit
                .set_net_signal_name(self.signal, name, forced, false)?;
        }
        Ok(())
    }
}

/// Connect a component signal instance to a net signal (or disconnect it
/// with `None`). A no-op when the signal is already connected accordingly.
pub struct ComponentSignalSetNetSignal {
    component: Uuid,
    signal: Uuid,
    new_net: Option<Uuid>,
    old_net: Option<Option<Uuid>>,
    executed: bool,
}

impl ComponentSignalSetNetSignal {
    pub fn new(component: Uuid, signal: Uuid, net_signal: Option<Uuid>) -> Self {
        Self {
            component,
            signal,
            new_net: net_signal,
            old_net: None,
            executed: false,
        }
    }

    /// The component signal must not have any live anchored symbol pins or
    /// footprint pads while its net signal changes
    fn check_not_anchored(&self, project: &Project) -> Result<(), CommandError> {
        for schematic in project.schematics() {
            for symbol in schematic.symbols() {
                if symbol.component() != self.component {
                    continue;
                }
                for pin in symbol.pins() {
                    if pin.component_signal() == self.signal && pin.net_point().is_some() {
                        return Err(CommandError::SignalStillAnchored(self.signal));
                    }
                }
            }
        }
        for board in project.boards() {
            for device in board.devices() {
                if device.component() != self.component {
                    continue;
                }
                for pad in device.pads() {
                    if pad.component_signal() == self.signal && pad.is_used() {
                        return Err(CommandError::SignalStillAnchored(self.signal));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&self, project: &mut Project, net: Option<Uuid>) -> Result<(), CommandError> {
        self.check_not_anchored(project)?;
        project
            .circuit
            .set_component_signal_net_signal(self.component, self.signal, net)?;
        Ok(())
    }
}

impl UndoCommand for ComponentSignalSetNetSignal {
    fn text(&self) -> &str {
        "Change component signal net"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.executed = true;
        let current = project
            .circuit
            .component_signal(self.component, self.signal)
            .ok_or(crate::circuit::CircuitError::ComponentSignalNotFound(self.signal))?
            .net_signal();
        if current == self.new_net {
            return Ok(false);
        }
        self.old_net = Some(current);
        self.apply(project, self.new_net)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        if let Some(old) = self.old_net {
            self.apply(project, old)?;
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        if self.old_net.is_some() {
            self.apply(project, self.new_net)?;
        }
        Ok(())
    }
}

/// Remove a component instance (no placed symbols, all signals disconnected)
pub struct ComponentInstanceRemove {
    component: Uuid,
    held: Option<ComponentInstance>,
}

impl ComponentInstanceRemove {
    pub fn new(component: Uuid) -> Self {
        Self {
            component,
            held: None,
        }
    }
}

impl UndoCommand for ComponentInstanceRemove {
    fn text(&self) -> &str {
        "Remove component"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        self.perform_redo(project)?;
        Ok(true)
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        let component = self
            .held
            .take()
            .ok_or(CommandError::NotDetached(self.component))?;
        if let Err(e) = project.circuit.add_component(component.clone()) {
            self.held = Some(component);
            return Err(e.into());
        }
        Ok(())
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.held = Some(project.circuit.remove_component(self.component)?);
        Ok(())
    }
}
