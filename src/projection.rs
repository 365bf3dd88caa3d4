//! State projection (C3): a pure function mapping the property mirror plus
//! the bearer connected-set onto the upper-protocol modem state machine
//! (spec §4.3). Nothing in this module touches the bus.

use crate::mirror::PropMap;
use crate::types::*;
use std::collections::HashMap;
use zbus::zvariant::OwnedValue;

/// One row of a `SupportedModes`/`CurrentModes` table: `(allowed-mask, preferred)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeEntry(pub u32, pub u32);

/// Everything projection needs to look at. Borrowed, never owned — this is
/// rebuilt from the property mirror on every run.
pub struct ProjectionInputs<'a> {
    pub modem_props: &'a PropMap,
    pub sim: Option<&'a PropMap>,
    pub sim_path: &'a str,
    pub network_registration: Option<&'a PropMap>,
    pub radio_settings: Option<&'a PropMap>,
    pub any_bearer_connected: bool,
}

/// The derived upper-protocol state for one modem (spec §3, "Projection state").
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub state: ModemState,
    pub state_failed_reason: StateFailedReason,
    pub power_state: u32,
    pub sim: String,
    pub unlock_required: Lock,
    pub access_technologies: u32,
    pub cell_type: CellType,
    pub signal_quality: (u32, bool),
    pub current_capabilities: u32,
    pub supported_capabilities: Vec<u32>,
    pub supported_modes: Vec<ModeEntry>,
    pub current_modes: ModeEntry,
    pub own_numbers: Vec<String>,
    pub unlock_retries: HashMap<u32, u32>,
    pub equipment_identifier: String,
    pub hardware_revision: String,
    pub revision: String,
    pub manufacturer: String,
    pub model: String,
}

fn prop_bool(props: &PropMap, key: &str) -> Option<bool> {
    props.get(key).and_then(|v| bool::try_from(v.clone()).ok())
}

fn prop_str(props: &PropMap, key: &str) -> Option<String> {
    props.get(key).and_then(|v| String::try_from(v.clone()).ok())
}

fn prop_str_vec(props: &PropMap, key: &str) -> Vec<String> {
    props
        .get(key)
        .and_then(|v| <Vec<String>>::try_from(v.clone()).ok())
        .unwrap_or_default()
}

fn prop_retries(props: &PropMap) -> HashMap<String, u8> {
    props
        .get("Retries")
        .and_then(|v| <HashMap<String, u8>>::try_from(v.clone()).ok())
        .unwrap_or_default()
}

fn prop_u8(props: &PropMap, key: &str) -> Option<u8> {
    props.get(key).and_then(|v: &OwnedValue| u8::try_from(v.clone()).ok())
}

/// Rules 1–11 of spec §4.3, plus the parallel computations that run on
/// every projection regardless of which rule stopped the state machine.
pub fn project(inputs: &ProjectionInputs) -> Projection {
    let powered = prop_bool(inputs.modem_props, "Powered").unwrap_or(false);

    let own_numbers = inputs
        .sim
        .map(|s| prop_str_vec(s, "SubscriberNumbers"))
        .unwrap_or_default();
    let unlock_retries: HashMap<u32, u32> = inputs
        .sim
        .map(|s| {
            prop_retries(s)
                .into_iter()
                .filter_map(|(k, v)| ofono_retry_lock(&k).map(|lock| (lock as u32, v as u32)))
                .collect()
        })
        .unwrap_or_default();

    let equipment_identifier = prop_str(inputs.modem_props, "Serial").unwrap_or_default();
    let hardware_revision = prop_str(inputs.modem_props, "Revision").unwrap_or_default();
    let revision = prop_str(inputs.modem_props, "SoftwareVersionNumber").unwrap_or_default();
    let manufacturer = prop_str(inputs.modem_props, "Manufacturer").unwrap_or_else(|| "ofono".to_string());
    let model = prop_str(inputs.modem_props, "Model").unwrap_or_else(|| "binder".to_string());

    let mut signal_quality: (u32, bool) = (0, false);

    let (state, state_failed_reason, sim_path, unlock_required, power_state) = 'decide: {
        if !powered || inputs.sim.is_none() {
            break 'decide (
                ModemState::Disabled,
                StateFailedReason::None,
                "/".to_string(),
                Lock::None,
                POWER_STATE_OFF,
            );
        }
        let sim = inputs.sim.unwrap();
        if !prop_bool(sim, "Present").unwrap_or(false) {
            break 'decide (
                ModemState::Failed,
                StateFailedReason::SimMissing,
                "/".to_string(),
                Lock::None,
                POWER_STATE_ON,
            );
        }
        let pin_required = prop_str(sim, "PinRequired").unwrap_or_else(|| "none".to_string());
        if pin_required != "none" {
            break 'decide (
                ModemState::Locked,
                StateFailedReason::None,
                inputs.sim_path.to_string(),
                Lock::SimPin,
                POWER_STATE_ON,
            );
        }
        if !prop_bool(inputs.modem_props, "Online").unwrap_or(false) {
            break 'decide (
                ModemState::Disabled,
                StateFailedReason::None,
                inputs.sim_path.to_string(),
                Lock::None,
                POWER_STATE_ON,
            );
        }
        let status = match inputs.network_registration.and_then(|n| prop_str(n, "Status")) {
            Some(s) if s != "denied" => s,
            _ => {
                break 'decide (
                    ModemState::Enabled,
                    StateFailedReason::None,
                    inputs.sim_path.to_string(),
                    Lock::None,
                    POWER_STATE_ON,
                )
            }
        };
        if status == "searching" {
            if let Some(strength) = inputs.network_registration.and_then(|n| prop_u8(n, "Strength")) {
                signal_quality = (strength as u32, true);
            }
            break 'decide (
                ModemState::Searching,
                StateFailedReason::None,
                inputs.sim_path.to_string(),
                Lock::None,
                POWER_STATE_ON,
            );
        }
        if inputs.any_bearer_connected {
            break 'decide (
                ModemState::Connected,
                StateFailedReason::None,
                inputs.sim_path.to_string(),
                Lock::None,
                POWER_STATE_ON,
            );
        }
        if status == "registered" || status == "roaming" {
            break 'decide (
                ModemState::Registered,
                StateFailedReason::None,
                inputs.sim_path.to_string(),
                Lock::None,
                POWER_STATE_ON,
            );
        }
        (
            ModemState::Enabled,
            StateFailedReason::None,
            inputs.sim_path.to_string(),
            Lock::None,
            POWER_STATE_ON,
        )
    };

    let mut access_technologies = AccessTechnology::Unknown as u32;
    let mut cell_type = CellType::Unknown;
    if matches!(state, ModemState::Registered | ModemState::Connected) {
        match inputs.network_registration.and_then(|n| prop_str(n, "Technology")) {
            Some(tech) => {
                if let Some((at, ct)) = ofono_technology(&tech) {
                    access_technologies = at as u32;
                    cell_type = ct;
                }
            }
            None => signal_quality = (0, false),
        }
    }

    let current_capabilities = match inputs.radio_settings {
        Some(radio) => {
            let cap = prop_str_vec(radio, "AvailableTechnologies")
                .iter()
                .filter_map(|t| ofono_capability(t))
                .fold(0u32, |acc, bit| acc | bit);
            if cap == 0 {
                Capability::Lte as u32
            } else {
                cap
            }
        }
        None => Capability::Lte as u32,
    };
    let supported_capabilities = vec![current_capabilities];

    let mm_modes = inputs
        .radio_settings
        .map(|radio| {
            prop_str_vec(radio, "AvailableTechnologies")
                .iter()
                .filter_map(|t| ofono_mode(t))
                .fold(0u32, |acc, bit| acc | bit)
        })
        .unwrap_or(0);
    let supported_modes: Vec<ModeEntry> = supported_modes_for(mm_modes)
        .into_iter()
        .map(|(allowed, preferred)| ModeEntry(allowed, preferred))
        .collect();

    let preferred_bit = inputs
        .radio_settings
        .and_then(|r| prop_str(r, "TechnologyPreference"))
        .and_then(|t| ofono_mode(&t));

    let current_modes = match preferred_bit {
        Some(pref) => {
            if let Some(row) = supported_modes.iter().find(|row| row.1 == pref) {
                *row
            } else if supported_modes.iter().any(|row| row.0 & pref != 0) {
                ModeEntry(pref, Mode::None as u32)
            } else {
                ModeEntry(MODE_ANY, MODE_ANY)
            }
        }
        None => ModeEntry(MODE_ANY, MODE_ANY),
    };

    Projection {
        state,
        state_failed_reason,
        power_state,
        sim: sim_path,
        unlock_required,
        access_technologies,
        cell_type,
        signal_quality,
        current_capabilities,
        supported_capabilities,
        supported_modes,
        current_modes,
        own_numbers,
        unlock_retries,
        equipment_identifier,
        hardware_revision,
        revision,
        manufacturer,
        model,
    }
}

/// Diff two `a{sv}` snapshots into the `(changed, invalidated)` pair that
/// `org.freedesktop.DBus.Properties.PropertiesChanged` expects. Invalidated
/// is always empty here: every property this crate exports always has a
/// concrete value to report (spec §8, "exactly the symmetric diff").
pub fn diff_maps(old: &PropMap, new: &PropMap) -> HashMap<String, OwnedValue> {
    new.iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Value;

    fn owned<'a, T: Into<Value<'a>>>(v: T) -> OwnedValue {
        OwnedValue::try_from(v.into()).unwrap()
    }

    fn props(pairs: &[(&str, OwnedValue)]) -> PropMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn powered_off_is_disabled_and_power_off() {
        let modem = props(&[("Powered", owned(false))]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: None,
            sim_path: "/x",
            network_registration: None,
            radio_settings: None,
            any_bearer_connected: false,
        });
        assert_eq!(p.state, ModemState::Disabled);
        assert_eq!(p.power_state, POWER_STATE_OFF);
        assert_eq!(p.sim, "/");
    }

    #[test]
    fn sim_absent_is_failed_sim_missing() {
        let modem = props(&[("Powered", owned(true))]);
        let sim = props(&[("Present", owned(false))]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: Some(&sim),
            sim_path: "/org/freedesktop/ModemManager/SIM/0",
            network_registration: None,
            radio_settings: None,
            any_bearer_connected: false,
        });
        assert_eq!(p.state, ModemState::Failed);
        assert_eq!(p.state_failed_reason, StateFailedReason::SimMissing);
        assert_eq!(p.sim, "/");
    }

    #[test]
    fn pin_required_locks() {
        let modem = props(&[("Powered", owned(true))]);
        let sim = props(&[("Present", owned(true)), ("PinRequired", owned("pin"))]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: Some(&sim),
            sim_path: "/sim/0",
            network_registration: None,
            radio_settings: None,
            any_bearer_connected: false,
        });
        assert_eq!(p.state, ModemState::Locked);
        assert_eq!(p.unlock_required, Lock::SimPin);
    }

    #[test]
    fn connected_bearer_wins_over_registered_status() {
        let modem = props(&[("Powered", owned(true)), ("Online", owned(true))]);
        let sim = props(&[("Present", owned(true)), ("PinRequired", owned("none"))]);
        let netreg = props(&[("Status", owned("registered")), ("Technology", owned("lte"))]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: Some(&sim),
            sim_path: "/sim/0",
            network_registration: Some(&netreg),
            radio_settings: None,
            any_bearer_connected: true,
        });
        assert_eq!(p.state, ModemState::Connected);
        assert_eq!(p.access_technologies, AccessTechnology::Lte as u32);
    }

    #[test]
    fn searching_updates_signal_quality_from_strength() {
        let modem = props(&[("Powered", owned(true)), ("Online", owned(true))]);
        let sim = props(&[("Present", owned(true)), ("PinRequired", owned("none"))]);
        let netreg = props(&[("Status", owned("searching")), ("Strength", owned(42u8))]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: Some(&sim),
            sim_path: "/sim/0",
            network_registration: Some(&netreg),
            radio_settings: None,
            any_bearer_connected: false,
        });
        assert_eq!(p.state, ModemState::Searching);
        assert_eq!(p.signal_quality, (42, true));
    }

    #[test]
    fn current_modes_falls_back_to_preferred_with_none_when_no_exact_row() {
        let modem = props(&[("Powered", owned(true)), ("Online", owned(true))]);
        let sim = props(&[("Present", owned(true)), ("PinRequired", owned("none"))]);
        let radio = props(&[
            ("AvailableTechnologies", owned(vec!["gsm".to_string(), "umts".to_string()])),
            ("TechnologyPreference", owned("lte")),
        ]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: Some(&sim),
            sim_path: "/sim/0",
            network_registration: None,
            radio_settings: Some(&radio),
            any_bearer_connected: false,
        });
        // lte isn't in the 2G|3G supported set, so no row has preferred==4G;
        // none of the 2G|3G rows intersect the 4G bit either.
        assert_eq!(p.current_modes, ModeEntry(MODE_ANY, MODE_ANY));
    }

    #[test]
    fn current_modes_matches_exact_preferred_row() {
        let modem = props(&[("Powered", owned(true)), ("Online", owned(true))]);
        let sim = props(&[("Present", owned(true)), ("PinRequired", owned("none"))]);
        let radio = props(&[
            (
                "AvailableTechnologies",
                owned(vec!["gsm".to_string(), "umts".to_string(), "lte".to_string()]),
            ),
            ("TechnologyPreference", owned("lte")),
        ]);
        let p = project(&ProjectionInputs {
            modem_props: &modem,
            sim: Some(&sim),
            sim_path: "/sim/0",
            network_registration: None,
            radio_settings: Some(&radio),
            any_bearer_connected: false,
        });
        assert_eq!(p.current_modes.1, Mode::FourG as u32);
    }

    #[test]
    fn diff_maps_reports_only_changed_keys() {
        let old = props(&[("A", owned(1u8)), ("B", owned(2u8))]);
        let new = props(&[("A", owned(1u8)), ("B", owned(3u8)), ("C", owned(4u8))]);
        let changed = diff_maps(&old, &new);
        assert_eq!(changed.len(), 2);
        assert!(changed.contains_key("B"));
        assert!(changed.contains_key("C"));
        assert!(!changed.contains_key("A"));
    }
}
