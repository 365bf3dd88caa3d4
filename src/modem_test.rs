use super::*;

#[test]
fn modem_path_matches_template() {
    assert_eq!(modem_path(2).as_str(), "/org/freedesktop/ModemManager1/Modem/2");
}

#[test]
fn sim_path_matches_template() {
    assert_eq!(sim_path(2).as_str(), "/org/freedesktop/ModemManager/SIM/2");
}

#[test]
fn fresh_props_start_powered_off_and_unknown() {
    let props = ModemProps::new("/ril_0");
    assert_eq!(props.power_state, POWER_STATE_OFF);
    assert_eq!(props.state, ModemState::Unknown as i32);
    assert_eq!(props.unlock_required, Lock::Unknown as u32);
    assert_eq!(props.device_identifier, "/ril_0");
    assert!(props.bearers.is_empty());
}

#[test]
fn property_map_carries_fixed_capability_limits() {
    let props = ModemProps::new("/ril_0");
    let map = props.to_property_map("/ril_0", &[]);
    assert_eq!(u32::try_from(map.get("MaxBearers").unwrap().clone()).unwrap(), MAX_BEARERS);
    assert_eq!(
        u32::try_from(map.get("MaxActiveBearers").unwrap().clone()).unwrap(),
        MAX_ACTIVE_BEARERS
    );
    assert_eq!(String::try_from(map.get("Plugin").unwrap().clone()).unwrap(), "ofono2mm");
}
