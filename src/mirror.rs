//! Per-modem property mirror (C2).
//!
//! Holds the last-known property map for the modem's own interface and for
//! each currently-present oFono sub-interface. Projection (C3) only ever
//! reads through here — never synchronously back onto the bus from a signal
//! handler (spec §4.2).

use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

pub type PropMap = HashMap<String, OwnedValue>;

/// Last-known property map for one interface.
#[derive(Debug, Default, Clone)]
pub struct InterfaceMirror {
    props: PropMap,
}

impl InterfaceMirror {
    pub fn new(props: PropMap) -> Self {
        Self { props }
    }

    pub fn set(&mut self, name: String, value: OwnedValue) {
        self.props.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&OwnedValue> {
        self.props.get(name)
    }

    pub fn props(&self) -> &PropMap {
        &self.props
    }
}

/// Every interface a modem currently exposes, keyed by bare interface name
/// (`"SimManager"`, not `"org.ofono.SimManager"`), plus the modem's own
/// property bag.
#[derive(Debug, Default)]
pub struct PropertyMirror {
    modem: InterfaceMirror,
    interfaces: HashMap<String, InterfaceMirror>,
}

impl PropertyMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modem_props(&self) -> &InterfaceMirror {
        &self.modem
    }

    pub fn set_modem_props(&mut self, props: PropMap) {
        self.modem = InterfaceMirror::new(props);
    }

    pub fn set_modem_property(&mut self, name: String, value: OwnedValue) {
        self.modem.set(name, value);
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceMirror> {
        self.interfaces.get(name)
    }

    pub fn add_interface(&mut self, name: impl Into<String>, props: PropMap) {
        self.interfaces.insert(name.into(), InterfaceMirror::new(props));
    }

    pub fn remove_interface(&mut self, name: &str) {
        self.interfaces.remove(name);
    }

    pub fn set_interface_property(&mut self, interface: &str, name: String, value: OwnedValue) {
        if let Some(mirror) = self.interfaces.get_mut(interface) {
            mirror.set(name, value);
        }
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Value;

    fn owned(v: bool) -> OwnedValue {
        OwnedValue::try_from(Value::from(v)).unwrap()
    }

    #[test]
    fn absent_interface_reads_as_none() {
        let mirror = PropertyMirror::new();
        assert!(mirror.interface("SimManager").is_none());
    }

    #[test]
    fn property_updates_are_isolated_per_interface() {
        let mut mirror = PropertyMirror::new();
        mirror.add_interface("SimManager", HashMap::new());
        mirror.add_interface("NetworkRegistration", HashMap::new());
        mirror.set_interface_property("SimManager", "Present".into(), owned(true));
        assert!(mirror
            .interface("NetworkRegistration")
            .unwrap()
            .get("Present")
            .is_none());
        assert!(mirror.interface("SimManager").unwrap().get("Present").is_some());
    }

    #[test]
    fn removing_interface_drops_its_properties() {
        let mut mirror = PropertyMirror::new();
        mirror.add_interface("SimManager", HashMap::new());
        mirror.remove_interface("SimManager");
        assert!(!mirror.has_interface("SimManager"));
    }
}
