use super::*;

#[test]
fn single_modem_is_never_sim_gated() {
    assert!(!should_gate_for_sim(1, false));
    assert!(!should_gate_for_sim(1, true));
}

#[test]
fn multi_modem_gates_only_when_sim_absent() {
    assert!(should_gate_for_sim(2, false));
    assert!(!should_gate_for_sim(2, true));
}

#[test]
fn bus_name_and_path_match_the_modemmanager_contract() {
    assert_eq!(MM_BUS_NAME, "org.freedesktop.ModemManager1");
    assert_eq!(MM_MANAGER_PATH, "/org/freedesktop/ModemManager1");
    assert_eq!(MM_VERSION, "1.22.0");
}
