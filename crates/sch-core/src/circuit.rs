//! Circuit-level registries: net signals and component instances
//!
//! The circuit is the sheet-independent electrical model. Net signals span
//! schematic sheets and the board; schematic net segments, board elements and
//! component signal instances register themselves here while they are part of
//! a live container (two-phase add/remove protocol).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to an element owned by a sheet-level container: `(container, element)`
pub type ElementRef = (Uuid, Uuid);

/// A named electrical net spanning schematics and boards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetSignal {
    pub uuid: Uuid,
    name: String,
    /// Name is mandated by a net label or a component signal ("GND" style)
    name_forced: bool,
    /// Name was generated automatically ("N#1" style)
    auto_name: bool,
    #[serde(skip)]
    highlighted: bool,
    #[serde(skip)]
    schematic_segments: BTreeSet<ElementRef>,
    #[serde(skip)]
    board_vias: BTreeSet<ElementRef>,
    #[serde(skip)]
    board_net_points: BTreeSet<ElementRef>,
    #[serde(skip)]
    component_signals: BTreeSet<ElementRef>,
}

impl NetSignal {
    /// Create a signal with a user- or pin-mandated name
    pub fn new(name: impl Into<String>, name_forced: bool) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            name_forced,
            auto_name: false,
            highlighted: false,
            schematic_segments: BTreeSet::new(),
            board_vias: BTreeSet::new(),
            board_net_points: BTreeSet::new(),
            component_signals: BTreeSet::new(),
        }
    }

    /// Create a signal with an automatically generated name
    pub fn new_auto(name: impl Into<String>) -> Self {
        let mut signal = Self::new(name, false);
        signal.auto_name = true;
        signal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_name_forced(&self) -> bool {
        self.name_forced
    }

    pub fn is_auto_named(&self) -> bool {
        self.auto_name
    }

    /// Pull-based highlight state, queried at render time
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    /// True while any schematic segment, board element or component signal
    /// is registered with this signal
    pub fn is_used(&self) -> bool {
        !self.schematic_segments.is_empty()
            || !self.board_vias.is_empty()
            || !self.board_net_points.is_empty()
            || !self.component_signals.is_empty()
    }

    pub fn schematic_segments(&self) -> &BTreeSet<ElementRef> {
        &self.schematic_segments
    }

    pub fn board_vias(&self) -> &BTreeSet<ElementRef> {
        &self.board_vias
    }

    pub fn board_net_points(&self) -> &BTreeSet<ElementRef> {
        &self.board_net_points
    }

    pub fn component_signals(&self) -> &BTreeSet<ElementRef> {
        &self.component_signals
    }

    pub(crate) fn register_schematic_segment(
        &mut self,
        segment: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.schematic_segments.insert(segment) {
            return Err(CircuitError::AlreadyRegistered);
        }
        Ok(())
    }

    pub(crate) fn unregister_schematic_segment(
        &mut self,
        segment: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.schematic_segments.remove(&segment) {
            return Err(CircuitError::NotRegistered);
        }
        Ok(())
    }

    pub(crate) fn register_board_via(&mut self, via: ElementRef) -> Result<(), CircuitError> {
        if !self.board_vias.insert(via) {
            return Err(CircuitError::AlreadyRegistered);
        }
        Ok(())
    }

    pub(crate) fn unregister_board_via(&mut self, via: ElementRef) -> Result<(), CircuitError> {
        if !self.board_vias.remove(&via) {
            return Err(CircuitError::NotRegistered);
        }
        Ok(())
    }

    pub(crate) fn register_board_net_point(
        &mut self,
        point: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.board_net_points.insert(point) {
            return Err(CircuitError::AlreadyRegistered);
        }
        Ok(())
    }

    pub(crate) fn unregister_board_net_point(
        &mut self,
        point: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.board_net_points.remove(&point) {
            return Err(CircuitError::NotRegistered);
        }
        Ok(())
    }

    pub(crate) fn register_component_signal(
        &mut self,
        signal: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.component_signals.insert(signal) {
            return Err(CircuitError::AlreadyRegistered);
        }
        Ok(())
    }

    pub(crate) fn unregister_component_signal(
        &mut self,
        signal: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.component_signals.remove(&signal) {
            return Err(CircuitError::NotRegistered);
        }
        Ok(())
    }
}

/// One electrical signal of a component instance (e.g. pin "VCC" of "U1")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSignalInstance {
    pub uuid: Uuid,
    name: String,
    /// Name the connected net signal must carry (e.g. power pins forcing "GND")
    forced_net_name: Option<String>,
    net_signal: Option<Uuid>,
}

impl ComponentSignalInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            forced_net_name: None,
            net_signal: None,
        }
    }

    pub fn with_forced_net_name(mut self, name: impl Into<String>) -> Self {
        self.forced_net_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_net_signal_name_forced(&self) -> bool {
        self.forced_net_name.is_some()
    }

    pub fn forced_net_name(&self) -> Option<&str> {
        self.forced_net_name.as_deref()
    }

    pub fn net_signal(&self) -> Option<Uuid> {
        self.net_signal
    }
}

/// An instance of a library component in the circuit (one reference designator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub uuid: Uuid,
    name: String,
    signals: Vec<ComponentSignalInstance>,
    /// Symbols placed for this component: `(schematic, symbol)`
    #[serde(skip)]
    placed_symbols: BTreeSet<ElementRef>,
}

impl ComponentInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            signals: Vec::new(),
            placed_symbols: BTreeSet::new(),
        }
    }

    pub fn with_signal(mut self, signal: ComponentSignalInstance) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signals(&self) -> &[ComponentSignalInstance] {
        &self.signals
    }

    pub fn signal(&self, uuid: Uuid) -> Option<&ComponentSignalInstance> {
        self.signals.iter().find(|s| s.uuid == uuid)
    }

    fn signal_mut(&mut self, uuid: Uuid) -> Option<&mut ComponentSignalInstance> {
        self.signals.iter_mut().find(|s| s.uuid == uuid)
    }

    pub fn placed_symbols(&self) -> &BTreeSet<ElementRef> {
        &self.placed_symbols
    }

    pub fn placed_symbol_count(&self) -> usize {
        self.placed_symbols.len()
    }

    pub(crate) fn register_placed_symbol(&mut self, symbol: ElementRef) -> Result<(), CircuitError> {
        if !self.placed_symbols.insert(symbol) {
            return Err(CircuitError::AlreadyRegistered);
        }
        Ok(())
    }

    pub(crate) fn unregister_placed_symbol(
        &mut self,
        symbol: ElementRef,
    ) -> Result<(), CircuitError> {
        if !self.placed_symbols.remove(&symbol) {
            return Err(CircuitError::NotRegistered);
        }
        Ok(())
    }
}

/// The circuit: all net signals and component instances of a project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Circuit {
    net_signals: Vec<NetSignal>,
    components: Vec<ComponentInstance>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    // ============== Net Signals ==============

    pub fn net_signals(&self) -> &[NetSignal] {
        &self.net_signals
    }

    pub fn net_signal(&self, uuid: Uuid) -> Option<&NetSignal> {
        self.net_signals.iter().find(|s| s.uuid == uuid)
    }

    pub(crate) fn net_signal_mut(&mut self, uuid: Uuid) -> Option<&mut NetSignal> {
        self.net_signals.iter_mut().find(|s| s.uuid == uuid)
    }

    pub fn net_signal_by_name(&self, name: &str) -> Option<&NetSignal> {
        self.net_signals.iter().find(|s| s.name == name)
    }

    /// First unused name of the form "N#1", "N#2", ...
    pub fn generate_auto_name(&self) -> String {
        for i in 1.. {
            let name = format!("N#{}", i);
            if self.net_signal_by_name(&name).is_none() {
                return name;
            }
        }
        unreachable!()
    }

    pub fn add_net_signal(&mut self, signal: NetSignal) -> Result<(), CircuitError> {
        if self.net_signal(signal.uuid).is_some() {
            return Err(CircuitError::DuplicateNetSignal(signal.uuid));
        }
        if self.net_signal_by_name(signal.name()).is_some() {
            return Err(CircuitError::NetSignalNameInUse(signal.name.clone()));
        }
        self.net_signals.push(signal);
        Ok(())
    }

    /// Remove an unused net signal, returning ownership of it
    pub fn remove_net_signal(&mut self, uuid: Uuid) -> Result<NetSignal, CircuitError> {
        let pos = self
            .net_signals
            .iter()
            .position(|s| s.uuid == uuid)
            .ok_or(CircuitError::NetSignalNotFound(uuid))?;
        if self.net_signals[pos].is_used() {
            return Err(CircuitError::NetSignalInUse(
                self.net_signals[pos].name.clone(),
            ));
        }
        Ok(self.net_signals.remove(pos))
    }

    /// Rename a net signal. Returns the previous `(name, name_forced,
    /// auto_name)` triple so callers can restore it exactly.
    pub fn set_net_signal_name(
        &mut self,
        uuid: Uuid,
        name: impl Into<String>,
        name_forced: bool,
        auto_name: bool,
    ) -> Result<(String, bool, bool), CircuitError> {
        let name = name.into();
        if let Some(other) = self.net_signal_by_name(&name)
            && other.uuid != uuid
        {
            return Err(CircuitError::NetSignalNameInUse(name));
        }
        let signal = self
            .net_signal_mut(uuid)
            .ok_or(CircuitError::NetSignalNotFound(uuid))?;
        let old_name = std::mem::replace(&mut signal.name, name);
        let old = (old_name, signal.name_forced, signal.auto_name);
        signal.name_forced = name_forced;
        signal.auto_name = auto_name;
        Ok(old)
    }

    // ============== Component Instances ==============

    pub fn components(&self) -> &[ComponentInstance] {
        &self.components
    }

    pub fn component(&self, uuid: Uuid) -> Option<&ComponentInstance> {
        self.components.iter().find(|c| c.uuid == uuid)
    }

    pub(crate) fn component_mut(&mut self, uuid: Uuid) -> Option<&mut ComponentInstance> {
        self.components.iter_mut().find(|c| c.uuid == uuid)
    }

    pub fn component_signal(
        &self,
        component: Uuid,
        signal: Uuid,
    ) -> Option<&ComponentSignalInstance> {
        self.component(component).and_then(|c| c.signal(signal))
    }

    pub fn add_component(&mut self, component: ComponentInstance) -> Result<(), CircuitError> {
        if self.component(component.uuid).is_some() {
            return Err(CircuitError::DuplicateComponent(component.uuid));
        }
        self.components.push(component);
        Ok(())
    }

    /// Remove a component instance, returning ownership of it.
    ///
    /// Rejected while symbols are still placed or any signal is still
    /// connected to a net signal.
    pub fn remove_component(&mut self, uuid: Uuid) -> Result<ComponentInstance, CircuitError> {
        let pos = self
            .components
            .iter()
            .position(|c| c.uuid == uuid)
            .ok_or(CircuitError::ComponentNotFound(uuid))?;
        let component = &self.components[pos];
        if component.placed_symbol_count() > 0
            || component.signals.iter().any(|s| s.net_signal.is_some())
        {
            return Err(CircuitError::ComponentInUse(component.name.clone()));
        }
        Ok(self.components.remove(pos))
    }

    /// Connect or disconnect a component signal instance.
    ///
    /// Returns the previously connected net signal. The caller is responsible
    /// for ensuring that no live schematic net point or board net point is
    /// still attached through this signal (two-phase protocol).
    pub fn set_component_signal_net_signal(
        &mut self,
        component: Uuid,
        signal: Uuid,
        net_signal: Option<Uuid>,
    ) -> Result<Option<Uuid>, CircuitError> {
        if let Some(net) = net_signal
            && self.net_signal(net).is_none()
        {
            return Err(CircuitError::NetSignalNotFound(net));
        }
        let old = self
            .component(component)
            .ok_or(CircuitError::ComponentNotFound(component))?
            .signal(signal)
            .ok_or(CircuitError::ComponentSignalNotFound(signal))?
            .net_signal;
        if old == net_signal {
            return Ok(old);
        }
        if let Some(old_net) = old {
            self.net_signal_mut(old_net)
                .ok_or(CircuitError::NetSignalNotFound(old_net))?
                .unregister_component_signal((component, signal))?;
        }
        if let Some(new_net) = net_signal {
            self.net_signal_mut(new_net)
                .ok_or(CircuitError::NetSignalNotFound(new_net))?
                .register_component_signal((component, signal))?;
        }
        self.component_mut(component)
            .ok_or(CircuitError::ComponentNotFound(component))?
            .signal_mut(signal)
            .ok_or(CircuitError::ComponentSignalNotFound(signal))?
            .net_signal = net_signal;
        Ok(old)
    }
}

/// Circuit-related errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum CircuitError {
    #[error("Net signal not found: {0}")]
    NetSignalNotFound(Uuid),
    #[error("There is already a net signal with the UUID \"{0}\"")]
    DuplicateNetSignal(Uuid),
    #[error("There is already a net signal with the name \"{0}\"")]
    NetSignalNameInUse(String),
    #[error("The net signal \"{0}\" is still in use")]
    NetSignalInUse(String),
    #[error("Component instance not found: {0}")]
    ComponentNotFound(Uuid),
    #[error("There is already a component instance with the UUID \"{0}\"")]
    DuplicateComponent(Uuid),
    #[error("Component signal instance not found: {0}")]
    ComponentSignalNotFound(Uuid),
    #[error("The component \"{0}\" is still in use")]
    ComponentInUse(String),
    #[error("Element already registered with the circuit")]
    AlreadyRegistered,
    #[error("Element not registered with the circuit")]
    NotRegistered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_name_skips_used_names() {
        let mut circuit = Circuit::new();
        assert_eq!(circuit.generate_auto_name(), "N#1");
        circuit
            .add_net_signal(NetSignal::new_auto("N#1"))
            .unwrap();
        circuit.add_net_signal(NetSignal::new("N#2", false)).unwrap();
        assert_eq!(circuit.generate_auto_name(), "N#3");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut circuit = Circuit::new();
        circuit.add_net_signal(NetSignal::new("GND", true)).unwrap();
        let err = circuit.add_net_signal(NetSignal::new("GND", false));
        assert!(matches!(err, Err(CircuitError::NetSignalNameInUse(_))));
    }

    #[test]
    fn test_remove_used_signal_rejected() {
        let mut circuit = Circuit::new();
        let signal = NetSignal::new("VCC", false);
        let uuid = signal.uuid;
        circuit.add_net_signal(signal).unwrap();
        circuit
            .net_signal_mut(uuid)
            .unwrap()
            .register_schematic_segment((Uuid::new_v4(), Uuid::new_v4()))
            .unwrap();
        assert!(matches!(
            circuit.remove_net_signal(uuid),
            Err(CircuitError::NetSignalInUse(_))
        ));
    }

    #[test]
    fn test_component_signal_connection() {
        let mut circuit = Circuit::new();
        let net = NetSignal::new("VCC", false);
        let net_uuid = net.uuid;
        circuit.add_net_signal(net).unwrap();

        let sig = ComponentSignalInstance::new("VCC");
        let sig_uuid = sig.uuid;
        let comp = ComponentInstance::new("U1").with_signal(sig);
        let comp_uuid = comp.uuid;
        circuit.add_component(comp).unwrap();

        let old = circuit
            .set_component_signal_net_signal(comp_uuid, sig_uuid, Some(net_uuid))
            .unwrap();
        assert_eq!(old, None);
        assert!(circuit.net_signal(net_uuid).unwrap().is_used());

        // component removal rejected while connected
        assert!(matches!(
            circuit.remove_component(comp_uuid),
            Err(CircuitError::ComponentInUse(_))
        ));

        circuit
            .set_component_signal_net_signal(comp_uuid, sig_uuid, None)
            .unwrap();
        assert!(!circuit.net_signal(net_uuid).unwrap().is_used());
        assert!(circuit.remove_component(comp_uuid).is_ok());
    }

    #[test]
    fn test_rename_tracks_forced_flag() {
        let mut circuit = Circuit::new();
        let signal = NetSignal::new_auto("N#1");
        let uuid = signal.uuid;
        circuit.add_net_signal(signal).unwrap();
        let old = circuit.set_net_signal_name(uuid, "CLK", true, false).unwrap();
        assert_eq!(old, ("N#1".to_string(), false, true));
        let signal = circuit.net_signal(uuid).unwrap();
        assert_eq!(signal.name(), "CLK");
        assert!(signal.is_name_forced());
        assert!(!signal.is_auto_named());
    }
}
